//! Headless ink simulation
//!
//! Runs droplets mode without a window and logs per-frame statistics.
//!
//! Usage: `inkbox-headless [config.json] [frames]`
//!
//! Set `RUST_LOG=info` (or `debug` for droplet events) to see output.

use std::path::Path;
use std::time::Instant;

use inkbox::{InkBoxConfig, Simulation};

const DEFAULT_FRAMES: u64 = 300;
const DT: f32 = 1.0 / 60.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, frames_arg) = match args.as_slice() {
        [] => (None, None),
        [one] if one.parse::<u64>().is_ok() => (None, Some(one.as_str())),
        [path] => (Some(path.as_str()), None),
        [path, frames, ..] => (Some(path.as_str()), Some(frames.as_str())),
    };

    let mut config = match config_path {
        Some(path) => InkBoxConfig::load_json(Path::new(path))?,
        None => InkBoxConfig::new_2d(128, 128),
    };
    config.vars.droplets_mode = true;

    let frames = match frames_arg {
        Some(s) => s.parse::<u64>()?,
        None => DEFAULT_FRAMES,
    };

    let mut sim = Simulation::new(config)?;
    let start = Instant::now();

    for _ in 0..frames {
        sim.step(DT)?;
        let stats = sim.stats();
        log::info!(
            "Frame {:4}: ink=({:8.2}, {:8.2}, {:8.2}) max_vel={:7.4} max_div={:8.4}",
            stats.frame,
            stats.ink_mass.x,
            stats.ink_mass.y,
            stats.ink_mass.z,
            stats.max_velocity,
            stats.max_divergence
        );
    }

    let elapsed = start.elapsed().as_secs_f64();
    log::info!(
        "{} frames on {} in {:.2}s ({:.1} fps)",
        frames,
        sim.dims(),
        elapsed,
        frames as f64 / elapsed.max(1e-9)
    );
    Ok(())
}
