//! Error types for the scheduler and collision space
//!
//! Nothing here is retried internally: every failure goes straight back to
//! the immediate caller.

use thiserror::Error;

use crate::sim::ScriptHandle;

/// Failures raised by [`crate::sim::Executor`], [`crate::sim::Space`] and
/// [`crate::sim::SlotAllocator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A bounded pool is at its configured maximum.
    #[error("capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },
    /// Slot id that was never issued (beyond the dense range).
    #[error("slot {0} was never issued")]
    InvalidIdentifier(usize),
    /// Slot id in range that currently names nothing (use after release).
    #[error("slot {0} is not active")]
    InactiveIdentifier(usize),
    /// Handle belongs to a different scheduler or space.
    #[error("handle is not owned by this instance")]
    NotOwned,
    #[error("script type `{0}` is already registered")]
    DuplicateRegistration(String),
    #[error("script type `{0}` is not registered")]
    UnknownScript(String),
    #[error("activation queue {index} out of range ({count} queues)")]
    InvalidQueue { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// A spawn drain that stopped at a failing request.
///
/// `spawned` holds the units created before the failure, in request order.
/// They are alive and counted by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} after {} spawns", .spawned.len())]
pub struct DrainError {
    pub spawned: Vec<ScriptHandle>,
    #[source]
    pub error: KernelError,
}

impl From<DrainError> for KernelError {
    fn from(e: DrainError) -> Self {
        e.error
    }
}

/// Failures while loading configuration or data tables.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value that parses but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}
