//! Headless demo arena
//!
//! A turret at the center, drones converging on it, bolts fired at the
//! pointer. Small enough to read in one sitting; it exists to drive the
//! executor and the collision space the way a game would.
//!
//! Queue 0 ([`QUEUE_CONTROL`]) runs input-driven units, queue 1
//! ([`QUEUE_MOTION`]) runs units that react to this tick's collisions.

pub mod scripts;

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::KernelConfig;
use crate::error::{ConfigError, Result};
use crate::input::InputSnapshot;
use crate::sim::{
    Body, BodyHandle, BoxCollider, Executor, FilterId, FilterTable, Registration, ScriptHandle,
    Space, Subscribable, Transform, World,
};

pub use scripts::{Bolt, Drone, Spawner, Squad, Turret};

pub const QUEUE_CONTROL: usize = 0;
pub const QUEUE_MOTION: usize = 1;

pub const GROUP_PLAYER: i32 = 1;
pub const GROUP_SPAWNER: i32 = 2;
pub const GROUP_DRONE: i32 = 3;
pub const GROUP_BOLT: i32 = 4;

/// Arena boundary; anything beyond it is discarded
pub const ARENA_RADIUS: f32 = 60.0;
/// Ring on which drones appear
pub const SPAWN_RADIUS: f32 = 40.0;

pub const TURRET_SIZE: f32 = 3.0;
pub const TURRET_SPEED: f32 = 0.5;
pub const DRONE_SIZE: f32 = 2.0;
pub const DRONE_SPEED: f32 = 0.25;
pub const BOLT_SIZE: f32 = 1.0;
pub const BOLT_SPEED: f32 = 1.0;

/// Ticks between two bolts
pub const FIRE_COOLDOWN: u32 = 10;
/// Ticks between two drones from one spawner
pub const SPAWN_INTERVAL: u32 = 30;
/// Live drones per spawner
pub const SQUAD_SIZE: usize = 6;
/// Channel the default spawner announces its drones on
pub const SQUAD_CHANNEL: u64 = 1;

const PLAYER_FILTER: &str = "player";
const DRONE_FILTER: &str = "drone";
const BOLT_FILTER: &str = "bolt";
const BOLT_FILTER_ID: FilterId = FilterId(3);

/// Player hits drones; drones hit player and bolts; bolts hit drones.
const FILTERS_JSON: &str = r#"{
    "player": { "id": 1, "whitelist": [2] },
    "drone":  { "id": 2, "whitelist": [1, 3] },
    "bolt":   { "id": 3, "whitelist": [2] }
}"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub drones_spawned: u32,
    pub drones_shot: u32,
    pub drones_crashed: u32,
    pub bolts_fired: u32,
    /// Collisions the turret took
    pub hits_taken: u32,
}

/// Game context shared by every arena unit.
pub struct Arena {
    pub input: InputSnapshot,
    pub rng: Pcg32,
    pub bodies: Space<BoxCollider>,
    pub filters: FilterTable,
    /// Spawned drones, routed by their request tag
    pub roster: Subscribable<ScriptHandle>,
    pub stats: ArenaStats,
    pub frame: u64,
    attached: HashMap<ScriptHandle, BodyHandle>,
}

impl Arena {
    pub fn new(config: &KernelConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            input: InputSnapshot::default(),
            rng: Pcg32::seed_from_u64(config.seed),
            bodies: Space::from_config(config),
            filters: FilterTable::from_json(FILTERS_JSON)?,
            roster: Subscribable::new(),
            stats: ArenaStats::default(),
            frame: 0,
            attached: HashMap::new(),
        })
    }

    /// Give `script` a body. Logs and leaves the unit bodiless when the space is full.
    pub fn spawn_body(&mut self, script: ScriptHandle, body: Body) -> Option<BodyHandle> {
        match self.bodies.push(BoxCollider::new(body)) {
            Ok(handle) => {
                self.attached.insert(script, handle);
                Some(handle)
            }
            Err(e) => {
                log::warn!("No body for slot {}: {}", script.slot(), e);
                None
            }
        }
    }

    /// Erase the body attached to `script`, if any.
    pub fn detach(&mut self, script: ScriptHandle) {
        if let Some(handle) = self.attached.remove(&script) {
            if let Err(e) = self.bodies.erase(handle) {
                log::warn!("Stale body for slot {}: {}", script.slot(), e);
            }
        }
    }

    pub fn body(&self, script: ScriptHandle) -> Option<&BoxCollider> {
        self.bodies.get(*self.attached.get(&script)?)
    }

    pub fn body_mut(&mut self, script: ScriptHandle) -> Option<&mut BoxCollider> {
        self.bodies.get_mut(*self.attached.get(&script)?)
    }

    /// Input a simple bot would give: hold still, fire at the nearest drone.
    pub fn autopilot(&self) -> InputSnapshot {
        let drone = self.filters.get(DRONE_FILTER).map(|f| f.id);
        let target = self
            .bodies
            .iter()
            .filter(|(_, b)| b.filter().map(|f| f.id) == drone && b.is_active())
            .map(|(_, b)| b.position().truncate())
            .min_by(|a, b| {
                a.length()
                    .partial_cmp(&b.length())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        InputSnapshot {
            fire: target.is_some(),
            pointer: target,
            direction: Vec2::ZERO,
            ..Default::default()
        }
    }
}

impl World for Arena {
    fn collide(&mut self) -> usize {
        self.bodies.reset_collided_count();
        self.bodies.detect_collision()
    }

    fn integrate(&mut self) {
        self.bodies.step();
        self.frame += 1;
    }
}

/// Register every arena unit type.
pub fn install(executor: &mut Executor<Arena>) -> Result<()> {
    executor.register(
        "Turret",
        Registration::new(Turret::allocate)
            .group(GROUP_PLAYER)
            .remove_on_kill(true)
            .on_remove(|h, arena: &mut Arena| arena.detach(h)),
    )?;
    executor.register(
        "Spawner",
        Registration::new(Spawner::allocate)
            .group(GROUP_SPAWNER)
            .remove_on_kill(true),
    )?;
    executor.register(
        "Drone",
        Registration::new(Drone::allocate)
            .group(GROUP_DRONE)
            .remove_on_kill(true)
            .on_spawn(|_, arena: &mut Arena| arena.stats.drones_spawned += 1)
            .on_remove(|h, arena: &mut Arena| arena.detach(h)),
    )?;
    executor.register(
        "Bolt",
        Registration::new(Bolt::allocate)
            .group(GROUP_BOLT)
            .remove_on_kill(true)
            .on_spawn(|_, arena: &mut Arena| arena.stats.bolts_fired += 1)
            .on_remove(|h, arena: &mut Arena| arena.detach(h)),
    )?;
    Ok(())
}

/// Request the starting units: one turret at the center, one spawner.
pub fn populate(executor: &mut Executor<Arena>) -> Result<()> {
    executor.request_spawn(
        "Turret",
        Some(QUEUE_CONTROL),
        0,
        Transform::new(Vec3::ZERO, Vec3::splat(TURRET_SIZE)),
    )?;
    executor.request_spawn("Spawner", Some(QUEUE_CONTROL), SQUAD_CHANNEL, Transform::default())?;
    Ok(())
}
