//! Timer-driven synthetic impulses ("droplets mode").
//!
//! Fires at a random interval and produces an [`Impulse`] without touching the
//! pointer state. Planar grids get a radial splash between two random points;
//! volumes get an axis-aligned push from the mid plane.

use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SimulationVars;
use crate::grid::GridDims;
use crate::impulse::Impulse;

#[derive(Clone, Debug)]
pub struct DropletsScheduler {
    rng: StdRng,
    seed: u64,
    accumulator_ms: f32,
    /// Where in the interval range the next droplet lands, in `[0, 1)`.
    /// `None` until the first droplet, which fires immediately.
    next_fraction: Option<f32>,
    fired: u64,
}

impl DropletsScheduler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            accumulator_ms: 0.0,
            next_fraction: None,
            fired: 0,
        }
    }

    pub fn reset(&mut self) {
        self.accumulator_ms = 0.0;
        self.next_fraction = None;
    }

    /// Restart the random sequence if `seed` differs from the current one.
    pub fn reseed(&mut self, seed: u64) {
        if seed != self.seed {
            log::debug!("Droplets reseeded {} -> {}", self.seed, seed);
            self.rng = StdRng::seed_from_u64(seed);
            self.seed = seed;
        }
    }

    /// Droplets produced so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Delay before the next droplet for an `[min, max)` interval range.
    /// The range is read on every call, so edits apply to a pending wait.
    pub fn next_delay_ms(&self, interval_ms: [f32; 2]) -> f32 {
        let [lo, hi] = interval_ms;
        match self.next_fraction {
            None => 0.0,
            Some(t) if hi > lo => lo + t * (hi - lo),
            Some(_) => lo,
        }
    }

    /// Advance by `dt` seconds. Returns a droplet when the timer elapses.
    pub fn tick(
        &mut self,
        dt: f32,
        interval_ms: [f32; 2],
        dims: GridDims,
        vars: &SimulationVars,
    ) -> Option<Impulse> {
        self.accumulator_ms += dt * 1000.0;
        if self.accumulator_ms < self.next_delay_ms(interval_ms) {
            return None;
        }
        Some(self.fire(interval_ms, dims, vars))
    }

    /// Produce a droplet now and restart the timer.
    pub fn fire(&mut self, interval_ms: [f32; 2], dims: GridDims, vars: &SimulationVars) -> Impulse {
        self.accumulator_ms = 0.0;
        self.next_fraction = Some(self.rng.gen::<f32>());
        self.fired += 1;

        let impulse = if dims.is_3d() {
            self.volume_droplet(dims, vars)
        } else {
            self.planar_droplet(dims, vars)
        };
        log::debug!(
            "Droplet {} at ({:.1}, {:.1}, {:.1}), next in {:.0} ms",
            self.fired,
            impulse.position.x,
            impulse.position.y,
            impulse.position.z,
            self.next_delay_ms(interval_ms)
        );
        impulse
    }

    fn random_cell(&mut self, dims: GridDims) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(0..dims.width) as f32,
            self.rng.gen_range(0..dims.height) as f32,
            0.0,
        )
    }

    fn planar_droplet(&mut self, dims: GridDims, vars: &SimulationVars) -> Impulse {
        let last = self.random_cell(dims);
        let current = self.random_cell(dims);
        let limit = Vec3::splat(vars.max_force.abs());
        let force = ((current - last) * vars.force_multiplier).clamp(-limit, limit);

        Impulse::new(current, force, vars.splat_radius)
            .with_ink()
            .as_radial()
    }

    fn volume_droplet(&mut self, dims: GridDims, vars: &SimulationVars) -> Impulse {
        let strength = self.rng.gen_range(0.0..1.0) * vars.max_force;
        let z = self.rng.gen_range(0..dims.depth) as f32;

        // Either a downward push across the horizontal mid plane or a leftward
        // push across the vertical one.
        let (position, force) = if self.rng.gen_bool(0.5) {
            (
                Vec3::new(self.rng.gen_range(0..dims.width) as f32, (dims.height / 2) as f32, z),
                Vec3::new(0.0, -strength, 0.0),
            )
        } else {
            (
                Vec3::new((dims.width / 2) as f32, self.rng.gen_range(0..dims.height) as f32, z),
                Vec3::new(-strength, 0.0, 0.0),
            )
        };

        Impulse::new(position, force, vars.splat_radius).with_ink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DROPLET_MAX_INTERVAL_MS, DROPLET_MIN_INTERVAL_MS};

    const INTERVAL: [f32; 2] = [DROPLET_MIN_INTERVAL_MS, DROPLET_MAX_INTERVAL_MS];

    fn scheduler(seed: u64) -> DropletsScheduler {
        DropletsScheduler::new(seed)
    }

    #[test]
    fn test_first_tick_fires() {
        let dims = GridDims::new_2d(32, 32);
        let vars = SimulationVars::for_grid(dims);
        let mut s = scheduler(1);
        let drop = s.tick(0.016, INTERVAL, dims, &vars).expect("first tick should fire");
        assert!(drop.ink && drop.radial);
    }

    #[test]
    fn test_waits_for_interval() {
        let dims = GridDims::new_2d(32, 32);
        let vars = SimulationVars::for_grid(dims);
        let mut s = scheduler(2);
        s.tick(0.016, INTERVAL, dims, &vars);

        // Less than the minimum interval: never fires.
        let mut fired = false;
        for _ in 0..11 {
            fired |= s.tick(0.016, INTERVAL, dims, &vars).is_some();
        }
        assert!(!fired, "176 ms is below the 200 ms minimum");

        // Past the maximum interval: must have fired.
        for _ in 0..100 {
            fired |= s.tick(0.016, INTERVAL, dims, &vars).is_some();
        }
        assert!(fired);
    }

    #[test]
    fn test_same_seed_same_droplets() {
        let dims = GridDims::new_2d(64, 48);
        let vars = SimulationVars::for_grid(dims);
        let mut a = scheduler(42);
        let mut b = scheduler(42);
        for _ in 0..5 {
            assert_eq!(a.fire(INTERVAL, dims, &vars), b.fire(INTERVAL, dims, &vars));
        }
    }

    #[test]
    fn test_droplets_stay_in_grid() {
        let dims = GridDims::new_3d(16, 20, 12);
        let vars = SimulationVars::for_grid(dims);
        let mut s = scheduler(7);
        for _ in 0..50 {
            let d = s.fire(INTERVAL, dims, &vars);
            assert!(d.position.x >= 0.0 && d.position.x < 16.0);
            assert!(d.position.y >= 0.0 && d.position.y < 20.0);
            assert!(d.position.z >= 0.0 && d.position.z < 12.0);
            assert!(d.force.x <= 0.0 && d.force.y <= 0.0 && d.force.z == 0.0);
            assert!(d.force.abs().max_element() <= vars.max_force);
        }
    }

    #[test]
    fn test_interval_change_applies_to_pending_wait() {
        let dims = GridDims::new_2d(32, 32);
        let vars = SimulationVars::for_grid(dims);
        let mut s = scheduler(3);
        assert!(s.tick(0.016, INTERVAL, dims, &vars).is_some());

        // 100 ms would never fire under the default range
        let short = [20.0, 40.0];
        let mut fired = 0;
        for _ in 0..10 {
            fired += s.tick(0.010, short, dims, &vars).is_some() as u32;
        }
        assert!(fired >= 2, "a 20-40 ms range should fire within 100 ms, got {}", fired);
        assert_eq!(s.fired(), 1 + fired as u64);
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let dims = GridDims::new_2d(32, 32);
        let vars = SimulationVars::for_grid(dims);
        let mut a = scheduler(0);
        a.fire(INTERVAL, dims, &vars);
        a.reseed(9);
        let mut b = scheduler(9);
        assert_eq!(a.fire(INTERVAL, dims, &vars), b.fire(INTERVAL, dims, &vars));
    }
}
