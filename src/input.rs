//! Per-frame input snapshot
//!
//! Filled by the platform layer once per frame and read (never written) by
//! behavior units. The scheduler and collision space never look at it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSnapshot {
    /// Primary action held (click/tap/space)
    pub fire: bool,
    /// Pause toggle
    pub pause: bool,
    /// Pointer position in world units, if the pointer is over the arena
    pub pointer: Option<Vec2>,
    /// Movement direction (keys or stick), not necessarily normalized
    pub direction: Vec2,
}

impl InputSnapshot {
    /// Direction clamped to unit length
    #[inline]
    pub fn heading(&self) -> Vec2 {
        self.direction.clamp_length_max(1.0)
    }

    /// Whether any movement is requested
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.direction.length_squared() > f32::EPSILON
    }
}
