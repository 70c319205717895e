//! Pointer-driven stimulus tracking.
//!
//! ```text
//!   Idle --(button down)--> Active --(held)--> Active
//!     ^                        |
//!     +------(released)--------+
//! ```
//!
//! Button state is sampled once per call, so a release and a fresh press
//! cannot both register in the same update.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::SimulationVars;
use crate::error::{SimError, SimResult};

/// A splat request in grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Impulse {
    /// Centre in cells.
    #[serde(with = "crate::serde_utils::vec3_serde")]
    pub position: Vec3,
    /// Velocity added at the centre (domain units / s).
    #[serde(with = "crate::serde_utils::vec3_serde")]
    pub force: Vec3,
    /// Falloff radius in cells.
    pub radius: f32,
    /// Also deposit ink with the current colour.
    #[serde(default)]
    pub ink: bool,
    /// Push outward from the centre instead of along `force`.
    #[serde(default)]
    pub radial: bool,
}

impl Impulse {
    pub fn new(position: Vec3, force: Vec3, radius: f32) -> Self {
        Self {
            position,
            force,
            radius,
            ink: false,
            radial: false,
        }
    }

    pub fn with_ink(mut self) -> Self {
        self.ink = true;
        self
    }

    pub fn as_radial(mut self) -> Self {
        self.radial = true;
        self
    }

    /// Reject splats that would write NaN or infinity into a field.
    pub fn validate(&self) -> SimResult<()> {
        if !self.position.is_finite() || !self.force.is_finite() {
            return Err(SimError::InvalidConfiguration(format!(
                "impulse position {} and force {} must be finite",
                self.position, self.force
            )));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(SimError::InvalidConfiguration(format!(
                "impulse radius must be positive, got {}",
                self.radius
            )));
        }
        Ok(())
    }
}

/// Current pointer stimulus.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImpulseState {
    pub last_pos: Vec3,
    pub current_pos: Vec3,
    /// `current_pos - last_pos`, refreshed on every update.
    pub delta: Vec3,
    pub force_active: bool,
    pub ink_active: bool,
    pub radial: bool,
}

impl ImpulseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.force_active
    }

    /// Planar pointer input. Left injects ink and force, right injects force only.
    pub fn update(&mut self, x: f32, y: f32, left_down: bool, right_down: bool) {
        self.advance(Vec3::new(x, y, 0.0), left_down || right_down, left_down);
    }

    /// Volume pointer input from a picked grid position. The single button
    /// injects both ink and force.
    pub fn update_3d(&mut self, position: Vec3, down: bool) {
        self.advance(position, down, down);
    }

    fn advance(&mut self, position: Vec3, pressed: bool, ink: bool) {
        match (self.force_active, pressed) {
            (false, false) => return,
            (false, true) => {
                self.current_pos = position;
                self.last_pos = Vec3::ZERO;
                self.force_active = true;
                self.ink_active = ink;
            }
            (true, true) => {
                self.last_pos = self.current_pos;
                self.current_pos = position;
            }
            (true, false) => {
                self.last_pos = Vec3::ZERO;
                self.reset();
                return;
            }
        }
        self.delta = self.current_pos - self.last_pos;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Force for this frame: `delta * force_multiplier`, each component
    /// clamped to `±max_force`.
    pub fn force(&self, vars: &SimulationVars) -> Vec3 {
        let limit = Vec3::splat(vars.max_force.abs());
        (self.delta * vars.force_multiplier).clamp(-limit, limit)
    }

    /// The splat this state requests, if active.
    pub fn to_impulse(&self, vars: &SimulationVars) -> Option<Impulse> {
        if !self.force_active {
            return None;
        }
        Some(Impulse {
            position: self.current_pos,
            force: self.force(vars),
            radius: vars.splat_radius,
            ink: self.ink_active,
            radial: self.radial,
        })
    }
}
