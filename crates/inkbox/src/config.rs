//! Tunable simulation state and solver settings.
//!
//! [`SimulationVars`] is the flat record the control surface edits between
//! frames. [`SolverConfig`] holds settings that rarely change at runtime.
//! [`InkBoxConfig`] bundles both with the grid size and is what gets saved
//! to and loaded from disk.

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{SimError, SimResult};
use crate::grid::GridDims;
use crate::impulse::Impulse;

/// Which field the renderer should display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldSelector {
    #[default]
    Ink,
    Velocity,
    Pressure,
    Vorticity,
    Divergence,
}

fn default_ink_colour() -> Vec4 {
    Vec4::from_array(DEFAULT_INK_COLOUR)
}

/// Per-frame tunables. Read-only while a step runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationVars {
    /// Cell spacing in domain units (`1 / width` by default).
    pub grid_scale: f32,
    pub viscosity: f32,
    pub ink_viscosity: f32,
    /// Vorticity confinement strength.
    pub vorticity: f32,
    pub velocity_dissipation: f32,
    pub ink_dissipation: f32,
    /// Force splat radius in cells.
    pub splat_radius: f32,
    /// Ink splat radius in cells.
    pub ink_volume: f32,
    #[serde(with = "crate::serde_utils::vec4_serde", default = "default_ink_colour")]
    pub ink_colour: Vec4,
    /// Signed acceleration along +y applied during velocity self-advection.
    pub gravity: f32,
    /// Scale from pointer delta (cells) to injected velocity.
    pub force_multiplier: f32,
    /// Per-component clamp on pointer-driven force.
    pub max_force: f32,

    pub boundaries_enabled: bool,
    pub self_advect: bool,
    pub advect_ink: bool,
    pub external_forces: bool,
    pub add_vorticity: bool,
    pub diffuse_velocity: bool,
    pub diffuse_ink: bool,
    pub droplets_mode: bool,
    pub rainbow_mode: bool,

    pub display: FieldSelector,
}

impl Default for SimulationVars {
    fn default() -> Self {
        Self::for_grid(GridDims::new_2d(DEFAULT_GRID_WIDTH, DEFAULT_GRID_HEIGHT))
    }
}

impl SimulationVars {
    /// Defaults scaled to a grid.
    pub fn for_grid(dims: GridDims) -> Self {
        let width = dims.width.max(1) as f32;
        Self {
            grid_scale: 1.0 / width,
            viscosity: DEFAULT_VISCOSITY,
            ink_viscosity: DEFAULT_INK_VISCOSITY,
            vorticity: DEFAULT_VORTICITY,
            velocity_dissipation: DEFAULT_VELOCITY_DISSIPATION,
            ink_dissipation: DEFAULT_INK_DISSIPATION,
            splat_radius: width * SPLAT_RADIUS_FRACTION,
            ink_volume: width * INK_VOLUME_FRACTION,
            ink_colour: default_ink_colour(),
            gravity: 0.0,
            // One cell of pointer motion per nominal frame maps to one cell per frame of flow.
            force_multiplier: 1.0 / (width * NOMINAL_DT),
            max_force: 1.0,
            boundaries_enabled: true,
            self_advect: true,
            advect_ink: true,
            external_forces: true,
            add_vorticity: true,
            diffuse_velocity: true,
            diffuse_ink: true,
            droplets_mode: false,
            rainbow_mode: false,
            display: FieldSelector::Ink,
        }
    }

    /// Rescale the grid-relative values after a resize.
    pub fn rescale_for_grid(&mut self, old: GridDims, new: GridDims) {
        let ratio = new.width as f32 / old.width.max(1) as f32;
        self.grid_scale /= ratio;
        self.splat_radius *= ratio;
        self.ink_volume *= ratio;
        self.force_multiplier /= ratio;
    }

    /// True if any part of the pipeline is switched on.
    pub fn any_step_enabled(&self) -> bool {
        self.self_advect
            || self.advect_ink
            || self.external_forces
            || self.add_vorticity
            || self.diffuse_velocity
            || self.diffuse_ink
    }

    pub fn validate(&self) -> SimResult<()> {
        let positive = [
            ("grid_scale", self.grid_scale),
            ("splat_radius", self.splat_radius),
            ("ink_volume", self.ink_volume),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimError::InvalidConfiguration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("velocity_dissipation", self.velocity_dissipation),
            ("ink_dissipation", self.ink_dissipation),
        ] {
            if value.is_nan() || value <= 0.0 || value > 1.0 {
                return Err(SimError::InvalidConfiguration(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.diffuse_velocity && (self.viscosity.is_nan() || self.viscosity <= 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "viscosity must be positive when velocity diffusion is on, got {}",
                self.viscosity
            )));
        }
        if self.diffuse_ink && (self.ink_viscosity.is_nan() || self.ink_viscosity <= 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "ink_viscosity must be positive when ink diffusion is on, got {}",
                self.ink_viscosity
            )));
        }

        let others = [
            ("vorticity", self.vorticity),
            ("gravity", self.gravity),
            ("force_multiplier", self.force_multiplier),
            ("max_force", self.max_force),
        ];
        if let Some((name, _)) = others.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::InvalidConfiguration(format!("{} is not finite", name)));
        }
        Ok(())
    }
}

fn default_iterations() -> u32 {
    DEFAULT_JACOBI_ITERATIONS
}

fn default_nominal_dt() -> f32 {
    NOMINAL_DT
}

fn default_hue_rate() -> f32 {
    DEFAULT_RAINBOW_HUE_RATE
}

fn default_droplet_interval() -> [f32; 2] {
    [DROPLET_MIN_INTERVAL_MS, DROPLET_MAX_INTERVAL_MS]
}

/// Solver settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Jacobi sweeps for velocity and ink diffusion.
    #[serde(default = "default_iterations")]
    pub diffusion_iterations: u32,
    /// Jacobi sweeps for the pressure solve.
    #[serde(default = "default_iterations")]
    pub pressure_iterations: u32,
    /// First-frame timestep cap.
    #[serde(default = "default_nominal_dt")]
    pub nominal_dt: f32,
    /// Hue cycles per second in rainbow mode.
    #[serde(default = "default_hue_rate")]
    pub rainbow_hue_rate: f32,
    /// Droplet interval range in milliseconds, `[min, max)`.
    #[serde(default = "default_droplet_interval")]
    pub droplet_interval_ms: [f32; 2],
    /// Seed for synthetic droplets.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            diffusion_iterations: DEFAULT_JACOBI_ITERATIONS,
            pressure_iterations: DEFAULT_JACOBI_ITERATIONS,
            nominal_dt: NOMINAL_DT,
            rainbow_hue_rate: DEFAULT_RAINBOW_HUE_RATE,
            droplet_interval_ms: default_droplet_interval(),
            seed: 0,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.diffusion_iterations == 0 || self.pressure_iterations == 0 {
            return Err(SimError::InvalidConfiguration(
                "Jacobi iteration counts must be at least 1".to_string(),
            ));
        }
        if !self.nominal_dt.is_finite() || self.nominal_dt <= 0.0 {
            return Err(SimError::InvalidConfiguration(format!(
                "nominal_dt must be positive, got {}",
                self.nominal_dt
            )));
        }
        let [lo, hi] = self.droplet_interval_ms;
        if lo.is_nan() || hi.is_nan() || lo <= 0.0 || hi <= lo {
            return Err(SimError::InvalidConfiguration(format!(
                "droplet interval must satisfy 0 < min < max, got [{}, {}]",
                lo, hi
            )));
        }
        Ok(())
    }
}

/// Everything needed to construct a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InkBoxConfig {
    pub dims: GridDims,
    /// When omitted from a file, defaults are those of a
    /// `DEFAULT_GRID_WIDTH`-wide grid, not of `dims`.
    #[serde(default)]
    pub vars: SimulationVars,
    #[serde(default)]
    pub solver: SolverConfig,
    /// Splats queued for the first frame.
    #[serde(default)]
    pub initial_impulses: Vec<Impulse>,
}

impl InkBoxConfig {
    /// Defaults for a planar grid.
    pub fn new_2d(width: usize, height: usize) -> Self {
        Self::for_dims(GridDims::new_2d(width, height))
    }

    /// Defaults for a volume. Walls start disabled, as the volume view has no
    /// reflecting container.
    pub fn new_3d(width: usize, height: usize, depth: usize) -> Self {
        let mut config = Self::for_dims(GridDims::new_3d(width, height, depth));
        config.vars.boundaries_enabled = false;
        config
    }

    pub fn for_dims(dims: GridDims) -> Self {
        Self {
            dims,
            vars: SimulationVars::for_grid(dims),
            solver: SolverConfig::default(),
            initial_impulses: Vec::new(),
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        self.dims.validate()?;
        self.vars.validate()?;
        self.solver.validate()?;
        for impulse in &self.initial_impulses {
            impulse.validate()?;
        }
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        if let Err(e) = config.validate() {
            log::warn!("Loaded config {} is invalid: {}", path.display(), e);
            return Err(Box::new(e));
        }
        Ok(config)
    }
}
