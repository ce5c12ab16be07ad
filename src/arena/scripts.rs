//! Behavior units of the demo arena

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::{Vec2, Vec3};
use rand::Rng;

use super::*;
use crate::polar_to_cartesian;
use crate::sim::{Body, Script, ScriptCx, ScriptHandle, Spawn, Subscriber, Transform};

type Cx<'a> = ScriptCx<'a, Arena>;

/// Player-controlled turret: moves with the input direction, fires bolts at the pointer.
#[derive(Debug, Default)]
pub struct Turret {
    cooldown: u32,
}

impl Turret {
    pub fn allocate(spawn: &Spawn<'_>, arena: &mut Arena) -> Box<dyn Script<Arena>> {
        let mut body = Body::new(spawn.transform);
        body.set_filter(arena.filters.get(PLAYER_FILTER));
        arena.spawn_body(spawn.handle, body);
        Box::new(Self::default())
    }
}

impl Script<Arena> for Turret {
    fn on_activate(&mut self, cx: &mut Cx<'_>) {
        let me = cx.handle();
        let arena = cx.game();
        let input = arena.input;

        let mut muzzle = None;
        if let Some(body) = arena.body_mut(me) {
            body.velocity = input.heading().extend(0.0) * TURRET_SPEED;
            muzzle = Some(body.position());
            let hits = body.collided_count();
            arena.stats.hits_taken += hits;
        }

        if input.fire && self.cooldown == 0 {
            if let Some(position) = muzzle {
                let transform = Transform::new(position, Vec3::splat(BOLT_SIZE));
                match cx.request_spawn("Bolt", Some(QUEUE_MOTION), 0, transform) {
                    Ok(()) => self.cooldown = FIRE_COOLDOWN,
                    Err(e) => log::warn!("Turret could not fire: {}", e),
                }
            }
        }
        self.cooldown = self.cooldown.saturating_sub(1);

        if let Err(e) = cx.activate_self(QUEUE_CONTROL) {
            log::warn!("Turret could not re-arm: {}", e);
        }
    }
}

/// Collects drones announced on the spawner's channel.
#[derive(Debug, Default)]
pub struct Squad {
    members: Vec<ScriptHandle>,
}

impl Subscriber<ScriptHandle> for Squad {
    fn receive(&mut self, _channel: u64, item: &ScriptHandle) {
        self.members.push(*item);
    }
}

/// Keeps up to [`SQUAD_SIZE`] drones alive, one new drone every [`SPAWN_INTERVAL`] ticks.
pub struct Spawner {
    channel: u64,
    squad: Rc<RefCell<Squad>>,
    countdown: u32,
}

impl Spawner {
    pub fn allocate(spawn: &Spawn<'_>, arena: &mut Arena) -> Box<dyn Script<Arena>> {
        let squad = Rc::new(RefCell::new(Squad::default()));
        arena.roster.subscribe(spawn.tag, &squad);
        Box::new(Self {
            channel: spawn.tag,
            squad,
            countdown: 1,
        })
    }

    /// Drones of this spawner that are still alive
    pub fn squad_size(&self) -> usize {
        self.squad.borrow().members.len()
    }
}

impl Script<Arena> for Spawner {
    fn on_activate(&mut self, cx: &mut Cx<'_>) {
        self.squad
            .borrow_mut()
            .members
            .retain(|&h| cx.status(h).is_some_and(|s| !s.killed));

        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.countdown = SPAWN_INTERVAL;
            if self.squad_size() < SQUAD_SIZE {
                let theta = cx.game().rng.random_range(0.0..std::f32::consts::TAU);
                let position = polar_to_cartesian(SPAWN_RADIUS, theta).extend(0.0);
                let transform = Transform::new(position, Vec3::splat(DRONE_SIZE));
                if let Err(e) =
                    cx.request_spawn("Drone", Some(QUEUE_MOTION), self.channel, transform)
                {
                    log::warn!("Spawner could not request a drone: {}", e);
                }
            }
        }

        if let Err(e) = cx.activate_self(QUEUE_CONTROL) {
            log::warn!("Spawner could not re-arm: {}", e);
        }
    }
}

/// Flies straight at the arena center until something hits it.
pub struct Drone {
    shot: Rc<Cell<bool>>,
}

impl Drone {
    pub fn allocate(spawn: &Spawn<'_>, arena: &mut Arena) -> Box<dyn Script<Arena>> {
        let shot = Rc::new(Cell::new(false));
        let flag = shot.clone();
        let heading = (-spawn.transform.position).normalize_or_zero();

        let mut body = Body::new(spawn.transform)
            .with_velocity(heading * DRONE_SPEED)
            .with_callback(move |hit| {
                if hit.other_filter == Some(BOLT_FILTER_ID) {
                    flag.set(true);
                }
            });
        body.set_filter(arena.filters.get(DRONE_FILTER));
        arena.spawn_body(spawn.handle, body);

        // Announce on the requesting spawner's channel
        arena.roster.publish(spawn.tag, &spawn.handle);
        Box::new(Self { shot })
    }
}

impl Script<Arena> for Drone {
    fn on_activate(&mut self, cx: &mut Cx<'_>) {
        let me = cx.handle();
        let arena = cx.game();
        let Some(body) = arena.body(me) else {
            if let Err(e) = cx.kill_self() {
                log::warn!("Bodiless drone {} could not die: {}", me.slot(), e);
            }
            return;
        };
        let crashed = body.collided_count() > 0;
        let escaped = body.position().length() > ARENA_RADIUS;

        let done = if self.shot.get() {
            arena.stats.drones_shot += 1;
            true
        } else if crashed {
            arena.stats.drones_crashed += 1;
            true
        } else {
            escaped
        };

        let result = if done {
            cx.kill_self()
        } else {
            cx.activate_self(QUEUE_MOTION)
        };
        if let Err(e) = result {
            log::warn!("Drone {} could not reschedule: {}", me.slot(), e);
        }
    }
}

/// Straight-line projectile; dies on first hit or when it leaves the arena.
pub struct Bolt;

impl Bolt {
    pub fn allocate(spawn: &Spawn<'_>, arena: &mut Arena) -> Box<dyn Script<Arena>> {
        let origin = spawn.transform.position.truncate();
        let aim = match arena.input.pointer {
            Some(pointer) => pointer - origin,
            None => arena.input.heading(),
        };
        let aim = if aim.length_squared() > f32::EPSILON {
            aim.normalize()
        } else {
            Vec2::Y
        };

        let mut body = Body::new(spawn.transform).with_velocity(aim.extend(0.0) * BOLT_SPEED);
        body.set_filter(arena.filters.get(BOLT_FILTER));
        arena.spawn_body(spawn.handle, body);
        Box::new(Self)
    }
}

impl Script<Arena> for Bolt {
    fn on_activate(&mut self, cx: &mut Cx<'_>) {
        let me = cx.handle();
        let done = match cx.game().body(me) {
            Some(body) => body.collided_count() > 0 || body.position().length() > ARENA_RADIUS,
            None => true,
        };
        let result = if done {
            cx.kill_self()
        } else {
            cx.activate_self(QUEUE_MOTION)
        };
        if let Err(e) = result {
            log::warn!("Bolt {} could not reschedule: {}", me.slot(), e);
        }
    }
}
