//! Headless arena run: spawns the demo units and ticks them for a fixed
//! number of frames with an autopilot at the controls.
//!
//! Usage: `scriptcore [config.json]`

use scriptcore::KernelConfig;
use scriptcore::arena::{self, Arena};
use scriptcore::sim::{Executor, tick};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => KernelConfig::load(path)?,
        None => KernelConfig::default(),
    };
    log::info!(
        "Scriptcore arena starting (seed {}, {} frames)",
        config.seed,
        config.frames
    );

    let mut executor = Executor::from_config(&config);
    let mut arena = Arena::new(&config)?;
    arena::install(&mut executor)?;
    arena::populate(&mut executor)?;

    for frame in 0..config.frames {
        arena.input = arena.autopilot();
        let report = tick(&mut executor, &mut arena)?;
        if frame % 60 == 0 {
            log::info!(
                "Frame {}: {} units, {} bodies, {} collisions, {} activations",
                frame,
                executor.count(),
                arena.bodies.len(),
                report.collisions,
                report.activations
            );
        }
    }

    let stats = arena.stats;
    log::info!(
        "Done: {} drones spawned, {} shot, {} crashed, {} bolts fired, {} hits taken",
        stats.drones_spawned,
        stats.drones_shot,
        stats.drones_crashed,
        stats.bolts_fired,
        stats.hits_taken
    );
    Ok(())
}
