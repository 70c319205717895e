//! Default tunables and numeric guards for the ink simulation.
//!
//! ## Units
//!
//! Positions handed to the simulation (impulse centres, splat radii) are in
//! **grid cells**. Velocities are in **domain units per second**, where the
//! domain is one unit wide, so the cell spacing `h` equals the grid scale
//! `1 / width`. Advection converts back to cells with `dt * u / h`.

/// Timestep used for the first frame, and the default frame length.
pub const NOMINAL_DT: f32 = 1.0 / 60.0;

/// Guard for normalising near-zero vectors (vorticity gradient, radial splat).
pub const EPSILON: f32 = 1e-5;

// =============================================================================
// SOLVER
// =============================================================================

/// Default Jacobi sweeps per Poisson solve (rounded up to even when used).
pub const DEFAULT_JACOBI_ITERATIONS: u32 = 30;

// =============================================================================
// FLUID PARAMETERS
// =============================================================================

/// Kinematic viscosity of the velocity field (domain units² / s).
pub const DEFAULT_VISCOSITY: f32 = 0.001;

/// Diffusion rate of the ink field.
pub const DEFAULT_INK_VISCOSITY: f32 = 1e-5;

/// Vorticity confinement strength.
pub const DEFAULT_VORTICITY: f32 = 0.01;

/// Per-step multiplier applied while self-advecting velocity.
pub const DEFAULT_VELOCITY_DISSIPATION: f32 = 0.97;

/// Per-step multiplier applied while advecting ink.
pub const DEFAULT_INK_DISSIPATION: f32 = 0.97;

// =============================================================================
// STIMULI
// =============================================================================

/// Force splat radius as a fraction of grid width.
pub const SPLAT_RADIUS_FRACTION: f32 = 0.07;

/// Ink splat radius as a fraction of grid width.
pub const INK_VOLUME_FRACTION: f32 = 0.085;

/// Default ink colour (RGBA).
pub const DEFAULT_INK_COLOUR: [f32; 4] = [0.54, 0.2, 0.78, 1.0];

/// Hue advance per second in rainbow mode.
pub const DEFAULT_RAINBOW_HUE_RATE: f32 = 0.1;

/// Shortest gap between synthetic droplets (ms).
pub const DROPLET_MIN_INTERVAL_MS: f32 = 200.0;

/// Longest gap between synthetic droplets (ms).
pub const DROPLET_MAX_INTERVAL_MS: f32 = 1500.0;

// =============================================================================
// GRID
// =============================================================================

/// Grid width used when no dimensions are given.
pub const DEFAULT_GRID_WIDTH: usize = 256;

/// Grid height used when no dimensions are given.
pub const DEFAULT_GRID_HEIGHT: usize = 256;
