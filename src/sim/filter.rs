//! Collision filtering (whitelist/blacklist)
//!
//! Two bodies may interact only if both have a filter that passes the
//! other's id, or if neither has a filter at all. A pair where exactly one
//! side is filtered never collides.
//!
//! Filters are loaded once into a [`FilterTable`] and shared between bodies.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FilterId(pub u32);

/// A filter id plus the ids it accepts and rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: FilterId,
    /// When non-empty, only these ids pass
    #[serde(default)]
    pub whitelist: Vec<FilterId>,
    /// Always rejected, even if whitelisted
    #[serde(default)]
    pub blacklist: Vec<FilterId>,
}

impl Filter {
    pub fn new(id: u32) -> Self {
        Self {
            id: FilterId(id),
            ..Default::default()
        }
    }

    pub fn allow(mut self, ids: &[u32]) -> Self {
        self.whitelist.extend(ids.iter().copied().map(FilterId));
        self
    }

    pub fn deny(mut self, ids: &[u32]) -> Self {
        self.blacklist.extend(ids.iter().copied().map(FilterId));
        self
    }

    /// Whether a body carrying filter id `other` may touch a body with this filter.
    pub fn pass(&self, other: FilterId) -> bool {
        if self.blacklist.contains(&other) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.contains(&other)
    }
}

/// Pair rule applied by the collision space.
#[inline]
pub fn pair_allowed(a: Option<&Filter>, b: Option<&Filter>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.pass(b.id) && b.pass(a.id),
        _ => false,
    }
}

/// Named filters shared by reference between bodies.
#[derive(Debug, Clone, Default)]
pub struct FilterTable {
    filters: HashMap<String, Rc<Filter>>,
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"name": {"id": 1, "whitelist": [..], "blacklist": [..]}, ...}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, Filter> = serde_json::from_str(json)?;
        let filters = raw
            .into_iter()
            .map(|(name, filter)| (name, Rc::new(filter)))
            .collect::<HashMap<_, _>>();
        log::debug!("Loaded {} named filters", filters.len());
        Ok(Self { filters })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn insert(&mut self, name: impl Into<String>, filter: Filter) -> Rc<Filter> {
        let filter = Rc::new(filter);
        self.filters.insert(name.into(), filter.clone());
        filter
    }

    pub fn get(&self, name: &str) -> Option<Rc<Filter>> {
        self.filters.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
