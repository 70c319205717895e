//! Stable-fluids ink simulation
//!
//! Integrates incompressible flow on a fixed 2D or 3D grid with the
//! semi-Lagrangian "stable fluids" scheme and carries a dye field along it.
//! Each frame runs advection, force injection, vorticity confinement,
//! implicit diffusion and pressure projection over double-buffered fields.
//!
//! # Example
//!
//! ```
//! use inkbox::{FieldSelector, Impulse, InkBoxConfig, Simulation, Vec3};
//!
//! let mut sim = Simulation::new(InkBoxConfig::new_2d(64, 64)).unwrap();
//!
//! // Push right from the centre and drop some ink there
//! sim.inject(Impulse::new(Vec3::new(32.0, 32.0, 0.0), Vec3::X, 5.0).with_ink())
//!     .unwrap();
//! sim.step(1.0 / 60.0).unwrap();
//!
//! assert!(sim.get_field(FieldSelector::Ink).total().x > 0.0);
//! ```

pub mod backend;
pub mod boundary;
pub mod colour;
pub mod config;
pub mod constants;
pub mod droplets;
pub mod error;
pub mod grid;
pub mod impulse;
pub mod kernels;
pub mod ops;
pub mod picking;
pub mod poisson;
pub mod serde_utils;

pub use backend::{ComputeBackend, CpuBackend, DispatchRange, KernelId, Uniforms};
pub use config::{FieldSelector, InkBoxConfig, SimulationVars, SolverConfig};
pub use error::{SimError, SimResult};
pub use glam::{Vec2, Vec3, Vec4};
pub use grid::{GridBuffer, GridDims, GridField};
pub use impulse::{Impulse, ImpulseState};
pub use picking::{pick_grid_position, Aabb, Ray};

use boundary::{BoundaryOperator, INK_SCALE, VELOCITY_SCALE};
use droplets::DropletsScheduler;
use ops::{FieldOps, FrameContext, Splat};
use poisson::PoissonRelaxer;

/// Summary numbers for logging and tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    /// Per-channel sum of the ink field.
    pub ink_mass: Vec3,
    /// Largest velocity component.
    pub max_velocity: f32,
    /// Largest divergence seen by the last projection, before the solve.
    pub max_divergence: f32,
}

/// One ink simulation. Owns every field; nothing is shared or global.
pub struct Simulation<B: ComputeBackend = CpuBackend> {
    backend: B,
    dims: GridDims,
    vars: SimulationVars,
    solver: SolverConfig,

    velocity: GridField,
    ink: GridField,
    pressure: GridField,
    divergence: GridField,
    gradient: GridField,
    vorticity: GridField,

    ops: FieldOps,
    boundary: BoundaryOperator,
    relaxer: PoissonRelaxer,

    impulse: ImpulseState,
    /// Splats queued by `inject` and droplets, consumed by the next step.
    pending: Vec<Impulse>,
    droplets: DropletsScheduler,

    first_frame: bool,
    elapsed: f32,
    frame: u64,
}

impl Simulation<CpuBackend> {
    /// Create a simulation on the CPU backend.
    pub fn new(config: InkBoxConfig) -> SimResult<Self> {
        Self::with_backend(config, CpuBackend::new())
    }
}

impl<B: ComputeBackend> Simulation<B> {
    /// Create a simulation on a specific backend. Fails if the configuration
    /// is invalid or a field cannot be allocated.
    pub fn with_backend(config: InkBoxConfig, backend: B) -> SimResult<Self> {
        config.validate()?;
        let dims = config.dims;
        let vector_channels = dims.dimensionality() as u8;
        let vorticity_channels = if dims.is_3d() { 3 } else { 1 };

        let sim = Self {
            backend,
            dims,
            velocity: GridField::new("velocity", dims, vector_channels)?,
            ink: GridField::new("ink", dims, 3)?,
            pressure: GridField::new("pressure", dims, 1)?,
            divergence: GridField::new("divergence", dims, 1)?,
            gradient: GridField::new("gradient", dims, vector_channels)?,
            vorticity: GridField::new("vorticity", dims, vorticity_channels)?,
            ops: FieldOps::new(),
            boundary: BoundaryOperator::new(),
            relaxer: PoissonRelaxer::new(dims)?,
            impulse: ImpulseState::new(),
            pending: config.initial_impulses,
            droplets: DropletsScheduler::new(config.solver.seed),
            vars: config.vars,
            solver: config.solver,
            first_frame: true,
            elapsed: 0.0,
            frame: 0,
        };

        log::info!(
            "Created {} ink simulation ({} Jacobi sweeps diffusion, {} pressure)",
            dims,
            sim.solver.diffusion_iterations,
            sim.solver.pressure_iterations
        );
        Ok(sim)
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Completed steps.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn vars(&self) -> &SimulationVars {
        &self.vars
    }

    /// Tunables for the next frame. Changes take effect at the next `step`.
    pub fn vars_mut(&mut self) -> &mut SimulationVars {
        &mut self.vars
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut SolverConfig {
        &mut self.solver
    }

    pub fn impulse_state(&self) -> &ImpulseState {
        &self.impulse
    }

    pub fn impulse_state_mut(&mut self) -> &mut ImpulseState {
        &mut self.impulse
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn field_ref(&self, selector: FieldSelector) -> &GridField {
        match selector {
            FieldSelector::Ink => &self.ink,
            FieldSelector::Velocity => &self.velocity,
            FieldSelector::Pressure => &self.pressure,
            FieldSelector::Vorticity => &self.vorticity,
            FieldSelector::Divergence => &self.divergence,
        }
    }

    /// Current (front) buffer of a field, for display.
    pub fn get_field(&self, selector: FieldSelector) -> &GridBuffer {
        self.field_ref(selector).front()
    }

    /// The field selected by `vars.display`.
    pub fn display_field(&self) -> &GridBuffer {
        self.get_field(self.vars.display)
    }

    /// Mutable access for seeding initial conditions between frames.
    pub fn field_mut(&mut self, selector: FieldSelector) -> &mut GridField {
        match selector {
            FieldSelector::Ink => &mut self.ink,
            FieldSelector::Velocity => &mut self.velocity,
            FieldSelector::Pressure => &mut self.pressure,
            FieldSelector::Vorticity => &mut self.vorticity,
            FieldSelector::Divergence => &mut self.divergence,
        }
    }

    /// Planar pointer input in grid cells.
    pub fn notify_input(&mut self, position: Vec2, left_down: bool, right_down: bool) {
        self.impulse
            .update(position.x, position.y, left_down, right_down);
    }

    /// Volume pointer input, typically from [`pick_grid_position`].
    pub fn notify_input_3d(&mut self, position: Vec3, down: bool) {
        self.impulse.update_3d(position, down);
    }

    /// Queue a splat for the next step. Non-finite or zero-radius splats
    /// are rejected and nothing is queued.
    pub fn inject(&mut self, impulse: Impulse) -> SimResult<()> {
        impulse.validate()?;
        self.pending.push(impulse);
        Ok(())
    }

    /// Queue a random droplet now, independent of the droplets timer.
    pub fn inject_droplet(&mut self) -> Impulse {
        self.droplets.reseed(self.solver.seed);
        let droplet = self
            .droplets
            .fire(self.solver.droplet_interval_ms, self.dims, &self.vars);
        self.pending.push(droplet);
        droplet
    }

    /// Zero every field and drop pending input.
    pub fn clear(&mut self) {
        for field in [
            &mut self.velocity,
            &mut self.ink,
            &mut self.pressure,
            &mut self.divergence,
            &mut self.gradient,
            &mut self.vorticity,
        ] {
            field.clear();
        }
        self.impulse.reset();
        self.pending.clear();
        self.droplets.reset();
        self.first_frame = true;
        log::info!("Cleared simulation fields");
    }

    /// Change grid size. Fields are resampled into the new grid and the
    /// grid-relative tunables are rescaled.
    pub fn resize(&mut self, dims: GridDims) -> SimResult<()> {
        dims.validate()?;
        if dims == self.dims {
            return Ok(());
        }
        if dims.is_3d() != self.dims.is_3d() {
            return Err(SimError::InvalidConfiguration(format!(
                "cannot resize {} grid to {}",
                self.dims, dims
            )));
        }

        // Allocate everything before touching any field
        let velocity = self.velocity.resized(dims)?;
        let ink = self.ink.resized(dims)?;
        let pressure = self.pressure.resized(dims)?;
        let divergence = self.divergence.resized(dims)?;
        let gradient = self.gradient.resized(dims)?;
        let vorticity = self.vorticity.resized(dims)?;
        let relaxer = PoissonRelaxer::new(dims)?;

        self.velocity = velocity;
        self.ink = ink;
        self.pressure = pressure;
        self.divergence = divergence;
        self.gradient = gradient;
        self.vorticity = vorticity;
        self.relaxer = relaxer;

        self.vars.rescale_for_grid(self.dims, dims);
        log::info!("Resized to {}", dims);
        self.dims = dims;
        self.impulse.reset();
        Ok(())
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            frame: self.frame,
            ink_mass: self.ink.total(),
            max_velocity: self.velocity.front().max_abs(),
            max_divergence: self.divergence.front().max_abs(),
        }
    }

    /// Advance by `dt` seconds.
    ///
    /// On error the frame is abandoned. Every field's front still holds the
    /// result of its last completed operation.
    pub fn step(&mut self, dt: f32) -> SimResult<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidConfiguration(format!(
                "timestep must be positive and finite, got {}",
                dt
            )));
        }
        if !self.vars.any_step_enabled() {
            return Ok(());
        }
        self.vars.validate()?;
        self.solver.validate()?;

        let dt = if self.first_frame {
            dt.min(self.solver.nominal_dt)
        } else {
            dt
        };

        // Droplets are forces, so the timer only runs while forces apply
        if self.vars.droplets_mode && self.vars.external_forces {
            self.droplets.reseed(self.solver.seed);
            if let Some(droplet) =
                self.droplets
                    .tick(dt, self.solver.droplet_interval_ms, self.dims, &self.vars)
            {
                self.pending.push(droplet);
            }
        }
        if self.vars.rainbow_mode {
            self.vars.ink_colour = colour::rainbow_colour(
                self.elapsed,
                self.solver.rainbow_hue_rate,
                self.vars.ink_colour.w,
            );
        }

        let mut impulses = Vec::new();
        if self.vars.external_forces {
            let pointer = self.impulse.to_impulse(&self.vars);
            if let Some(pointer) = &pointer {
                pointer.validate()?;
            }
            impulses.append(&mut self.pending);
            impulses.extend(pointer);
        }

        let vars = self.vars.clone();
        let ctx = FrameContext { vars: &vars, dt };
        self.advance(&ctx, &impulses)?;

        self.first_frame = false;
        self.elapsed += dt;
        self.frame += 1;
        Ok(())
    }

    /// Run only the projection pass on the current velocity.
    pub fn project(&mut self) -> SimResult<()> {
        let vars = self.vars.clone();
        let ctx = FrameContext {
            vars: &vars,
            dt: self.solver.nominal_dt,
        };
        self.project_velocity(&ctx)
    }

    fn advance(&mut self, ctx: &FrameContext<'_>, impulses: &[Impulse]) -> SimResult<()> {
        let vars = ctx.vars;
        let backend = &self.backend;

        // 1. Self-advection of velocity
        if vars.self_advect {
            self.boundary
                .apply(backend, ctx, &mut self.velocity, VELOCITY_SCALE)?;
            self.ops.self_advect(backend, ctx, &mut self.velocity)?;
        }

        // 2. Ink advection
        if vars.advect_ink {
            self.boundary.apply(backend, ctx, &mut self.ink, INK_SCALE)?;
            self.ops
                .advect_ink(backend, ctx, &mut self.ink, &self.velocity)?;
        }

        // 3. External forces and ink
        for impulse in impulses {
            let (position, force) = self.to_grid_space(impulse);
            self.ops.inject(
                backend,
                ctx,
                &mut self.velocity,
                &Splat {
                    position,
                    value: force,
                    radius: impulse.radius,
                    radial: impulse.radial,
                },
            )?;
            if impulse.ink {
                self.ops.inject(
                    backend,
                    ctx,
                    &mut self.ink,
                    &Splat {
                        position,
                        value: vars.ink_colour.truncate(),
                        radius: vars.ink_volume,
                        radial: false,
                    },
                )?;
            }
        }

        // 4. Vorticity confinement
        if vars.add_vorticity {
            self.ops
                .curl(backend, ctx, &self.velocity, &mut self.vorticity)?;
            self.boundary
                .apply(backend, ctx, &mut self.velocity, VELOCITY_SCALE)?;
            self.ops
                .confine(backend, ctx, &mut self.velocity, &self.vorticity)?;
        }

        // 5. Velocity diffusion
        if vars.diffuse_velocity {
            let (alpha, beta) =
                poisson::diffusion_coefficients(vars.grid_scale, vars.viscosity, ctx.dt, self.dims)?;
            self.relaxer.diffuse(
                backend,
                ctx,
                &mut self.velocity,
                alpha,
                beta,
                self.solver.diffusion_iterations,
            )?;
        }

        // 6. Ink diffusion
        if vars.diffuse_ink {
            let (alpha, beta) = poisson::diffusion_coefficients(
                vars.grid_scale,
                vars.ink_viscosity,
                ctx.dt,
                self.dims,
            )?;
            self.relaxer.diffuse(
                backend,
                ctx,
                &mut self.ink,
                alpha,
                beta,
                self.solver.diffusion_iterations,
            )?;
        }

        // 7. Projection
        self.project_velocity(ctx)
    }

    fn project_velocity(&mut self, ctx: &FrameContext<'_>) -> SimResult<()> {
        let backend = &self.backend;

        self.ops
            .divergence(backend, ctx, &self.velocity, &mut self.divergence)?;

        let (alpha, beta) = poisson::pressure_coefficients(ctx.vars.grid_scale, self.dims);
        self.relaxer.solve(
            backend,
            ctx,
            &mut self.pressure,
            self.divergence.front(),
            alpha,
            beta,
            self.solver.pressure_iterations,
        )?;

        self.ops
            .gradient(backend, ctx, &self.pressure, &mut self.gradient)?;
        self.ops
            .subtract(backend, ctx, &mut self.velocity, &self.gradient)?;
        self.boundary
            .apply(backend, ctx, &mut self.velocity, VELOCITY_SCALE)
    }

    /// Planar grids have no z extent: drop any z component.
    fn to_grid_space(&self, impulse: &Impulse) -> (Vec3, Vec3) {
        if self.dims.is_3d() {
            (impulse.position, impulse.force)
        } else {
            (
                impulse.position.truncate().extend(0.0),
                impulse.force.truncate().extend(0.0),
            )
        }
    }
}
