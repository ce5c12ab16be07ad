//! Reference per-frame driver
//!
//! One tick, in this exact order:
//! 1. reset hit counters and detect collisions
//! 2. for each activation queue: drain spawn requests, run the queue
//! 3. drain spawn requests, run the kill queue
//! 4. integrate motion
//!
//! Spawns requested while queue `q` runs are drained before queue `q + 1`,
//! so a fresh unit can act in the same tick but never in an earlier queue.

use super::script::Executor;
use crate::error::{DrainError, KernelError, Result};

/// Game context driven by [`tick`].
pub trait World {
    /// Reset hit counters and run detection on every collision space.
    /// Returns the number of colliding pairs.
    fn collide(&mut self) -> usize;

    /// Advance motion once the kill queue has run.
    fn integrate(&mut self) {}
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub collisions: usize,
    pub spawned: usize,
    /// Spawn requests dropped because the executor was full
    pub rejected: usize,
    pub activations: usize,
    pub kills: usize,
}

/// Advance `world` by one frame.
pub fn tick<W: World>(executor: &mut Executor<W>, world: &mut W) -> Result<TickReport> {
    let mut report = TickReport {
        collisions: world.collide(),
        ..Default::default()
    };

    for queue in 0..executor.queue_count() {
        drain(executor, world, &mut report)?;
        report.activations += executor.run_activation_queue(queue, world)?;
    }
    drain(executor, world, &mut report)?;
    report.kills = executor.run_kill_queue(world);

    world.integrate();
    Ok(report)
}

/// Drain pending spawns, dropping (and counting) requests that hit the capacity limit.
fn drain<W>(executor: &mut Executor<W>, world: &mut W, report: &mut TickReport) -> Result<()> {
    loop {
        match executor.drain_spawn_queue(world) {
            Ok(spawned) => {
                report.spawned += spawned.len();
                return Ok(());
            }
            Err(DrainError {
                spawned,
                error: KernelError::CapacityExceeded { max },
            }) => {
                log::warn!("Spawn request dropped: executor full ({} units)", max);
                report.spawned += spawned.len();
                report.rejected += 1;
            }
            Err(e) => {
                report.spawned += e.spawned.len();
                return Err(e.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::sim::{Body, BoxCollider, Registration, Script, ScriptCx, Space, Spawn, Transform};

    /// Minimal world: one space, a trace of callback events
    #[derive(Default)]
    struct Trace {
        space: Space<BoxCollider>,
        events: Vec<&'static str>,
        steps: u32,
    }

    impl World for Trace {
        fn collide(&mut self) -> usize {
            self.events.push("collide");
            self.space.reset_collided_count();
            self.space.detect_collision()
        }

        fn integrate(&mut self) {
            self.space.step();
            self.steps += 1;
        }
    }

    /// Runs in queue 0 and asks for a `Child` in queue 1
    struct Parent;

    impl Script<Trace> for Parent {
        fn on_activate(&mut self, cx: &mut ScriptCx<'_, Trace>) {
            cx.game().events.push("parent");
            cx.request_spawn("Child", Some(1), 0, Transform::default())
                .unwrap();
        }
    }

    /// Activates once, then kills itself
    struct Child;

    impl Script<Trace> for Child {
        fn on_init(&mut self, cx: &mut ScriptCx<'_, Trace>) {
            cx.game().events.push("child-init");
        }

        fn on_activate(&mut self, cx: &mut ScriptCx<'_, Trace>) {
            cx.game().events.push("child");
            cx.kill_self().unwrap();
        }

        fn on_kill(&mut self, cx: &mut ScriptCx<'_, Trace>) {
            cx.game().events.push("child-kill");
        }
    }

    fn executor(max: usize) -> Executor<Trace> {
        let mut exec = Executor::new(2, max);
        exec.register(
            "Parent",
            Registration::new(|_: &Spawn<'_>, _: &mut Trace| {
                Box::new(Parent) as Box<dyn Script<Trace>>
            }),
        )
        .unwrap();
        exec.register(
            "Child",
            Registration::new(|_: &Spawn<'_>, _: &mut Trace| {
                Box::new(Child) as Box<dyn Script<Trace>>
            })
            .remove_on_kill(true),
        )
        .unwrap();
        exec
    }

    #[test]
    fn test_tick_order() {
        let mut exec = executor(8);
        let mut world = Trace::default();
        exec.request_spawn("Parent", Some(0), 0, Transform::default())
            .unwrap();

        let report = tick(&mut exec, &mut world).unwrap();
        assert_eq!(
            world.events,
            vec!["collide", "parent", "child-init", "child", "child-kill"]
        );
        assert_eq!(report.spawned, 2);
        assert_eq!(report.activations, 2);
        assert_eq!(report.kills, 1);
        assert_eq!(exec.count(), 1);
        assert_eq!(world.steps, 1);
    }

    #[test]
    fn test_parent_not_rerun_without_enqueue() {
        let mut exec = executor(8);
        let mut world = Trace::default();
        exec.request_spawn("Parent", Some(0), 0, Transform::default())
            .unwrap();

        tick(&mut exec, &mut world).unwrap();
        world.events.clear();
        let report = tick(&mut exec, &mut world).unwrap();

        assert_eq!(world.events, vec!["collide"]);
        assert_eq!(report.activations, 0);
    }

    #[test]
    fn test_rejected_spawns_are_counted() {
        let mut exec = executor(1);
        let mut world = Trace::default();
        exec.request_spawn("Parent", Some(0), 0, Transform::default())
            .unwrap();

        // Parent fills the only slot; its Child request is dropped
        let report = tick(&mut exec, &mut world).unwrap();
        assert_eq!(report.spawned, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(world.events, vec!["collide", "parent"]);
    }

    #[test]
    fn test_partial_drain_counts_spawned_units() {
        let mut exec = executor(2);
        let mut world = Trace::default();
        for _ in 0..3 {
            exec.request_spawn("Child", Some(1), 0, Transform::default())
                .unwrap();
        }

        // Two fit, the third is dropped; the two still run this tick
        let report = tick(&mut exec, &mut world).unwrap();
        assert_eq!(report.spawned, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.activations, 2);
        assert_eq!(report.kills, 2);
        assert_eq!(exec.count(), 0);
    }

    #[test]
    fn test_collisions_reported() {
        let mut exec = executor(8);
        let mut world = Trace::default();
        for x in [0.0, 1.0] {
            world
                .space
                .push(BoxCollider::new(Body::new(Transform::new(
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::splat(2.0),
                ))))
                .unwrap();
        }
        let report = tick(&mut exec, &mut world).unwrap();
        assert_eq!(report.collisions, 1);
    }
}
