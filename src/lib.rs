//! Scriptcore - frame-driven behavior scheduling and collision for 2D games
//!
//! Core modules:
//! - `sim`: The kernel (slot ids, behavior executor, collision space, tick driver)
//! - `input`: Per-frame input snapshot read by behavior units
//! - `config`: Data-driven limits
//! - `arena`: Headless demo game built on the kernel

pub mod arena;
pub mod config;
pub mod error;
pub mod input;
pub mod sim;

pub use config::KernelConfig;
pub use error::{ConfigError, DrainError, KernelError, Result};
pub use input::InputSnapshot;

use glam::Vec2;

/// Kernel configuration defaults
pub mod consts {
    /// Live behavior units per executor
    pub const DEFAULT_MAX_SCRIPTS: usize = 1024;
    /// Activation queues per executor (control, motion)
    pub const DEFAULT_ACTIVATION_QUEUES: usize = 2;
    /// Bodies per collision space; detection is O(n²), keep this small
    pub const DEFAULT_MAX_BODIES: usize = 256;

    /// Demo run length (10 seconds at 60 Hz)
    pub const DEFAULT_FRAMES: u32 = 600;
    pub const DEFAULT_SEED: u64 = 12345;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}
