//! Kernel configuration
//!
//! Limits and run parameters, loaded from JSON. Missing fields fall back to
//! the defaults in [`crate::consts`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Maximum live behavior units per executor
    pub max_scripts: usize,
    /// Number of activation queues (N)
    pub activation_queues: usize,
    /// Maximum bodies per collision space
    pub max_bodies: usize,
    /// Frames the demo driver runs
    pub frames: u32,
    /// Seed for the demo arena's RNG
    pub seed: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_scripts: DEFAULT_MAX_SCRIPTS,
            activation_queues: DEFAULT_ACTIVATION_QUEUES,
            max_bodies: DEFAULT_MAX_BODIES,
            frames: DEFAULT_FRAMES,
            seed: DEFAULT_SEED,
        }
    }
}

impl KernelConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.activation_queues == 0 {
            return Err(ConfigError::Invalid("activation_queues must be at least 1"));
        }
        if self.max_scripts == 0 {
            return Err(ConfigError::Invalid("max_scripts must be at least 1"));
        }
        if self.max_bodies == 0 {
            return Err(ConfigError::Invalid("max_bodies must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = KernelConfig::from_json(r#"{"max_bodies": 32}"#).unwrap();
        assert_eq!(config.max_bodies, 32);
        assert_eq!(config.activation_queues, DEFAULT_ACTIVATION_QUEUES);
        assert_eq!(config.max_scripts, DEFAULT_MAX_SCRIPTS);
    }

    #[test]
    fn test_json_round_trip() {
        let config = KernelConfig {
            seed: 7,
            frames: 10,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(KernelConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validate() {
        let err = KernelConfig::from_json(r#"{"activation_queues": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = KernelConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
