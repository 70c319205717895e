//! Field operations and their uniform binding lists.
//!
//! A [`FieldOp`] pairs a kernel with the list of uniforms it pulls from the
//! frame's [`SimulationVars`]. The lists are built once when the simulation is
//! created and re-bound every frame, so a change made between frames (say a
//! new vorticity strength) reaches the kernel without rebuilding anything.
//!
//! Every operation reads the front of its inputs, writes the back of its
//! output and swaps only after the dispatch succeeds.

use glam::Vec3;

use crate::backend::{ComputeBackend, DispatchRange, KernelId, UniformSlot, UniformValue, Uniforms};
use crate::config::SimulationVars;
use crate::error::SimResult;
use crate::grid::{GridBuffer, GridField};

/// Per-frame inputs to uniform binding.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    pub vars: &'a SimulationVars,
    pub dt: f32,
}

/// Where a bound uniform takes its value from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformSource {
    GridScale,
    DeltaT,
    VorticityScale,
    Gravity,
    VelocityDissipation,
    InkDissipation,
    Const(f32),
}

impl UniformSource {
    fn resolve(self, ctx: &FrameContext<'_>) -> f32 {
        match self {
            UniformSource::GridScale => ctx.vars.grid_scale,
            UniformSource::DeltaT => ctx.dt,
            UniformSource::VorticityScale => ctx.vars.vorticity,
            UniformSource::Gravity => ctx.vars.gravity,
            UniformSource::VelocityDissipation => ctx.vars.velocity_dissipation,
            UniformSource::InkDissipation => ctx.vars.ink_dissipation,
            UniformSource::Const(v) => v,
        }
    }
}

/// A kernel plus its fixed uniform binding list.
#[derive(Clone, Debug)]
pub struct FieldOp {
    kernel: KernelId,
    bindings: Vec<(UniformSlot, UniformSource)>,
}

impl FieldOp {
    pub fn new(kernel: KernelId) -> Self {
        Self {
            kernel,
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, slot: UniformSlot, source: UniformSource) -> Self {
        self.bindings.push((slot, source));
        self
    }

    /// Resolve the binding list, then apply per-call values on top.
    pub fn uniforms(
        &self,
        ctx: &FrameContext<'_>,
        target: &GridBuffer,
        extra: &[(UniformSlot, UniformValue)],
    ) -> SimResult<Uniforms> {
        let mut uniforms = Uniforms::new(target.dims());
        for (slot, source) in &self.bindings {
            uniforms.set(*slot, UniformValue::Scalar(source.resolve(ctx)))?;
        }
        for (slot, value) in extra {
            uniforms.set(*slot, *value)?;
        }
        Ok(uniforms)
    }

    /// Bind and dispatch over the whole grid.
    pub fn run<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        reads: &[&GridBuffer],
        write: &mut GridBuffer,
        extra: &[(UniformSlot, UniformValue)],
    ) -> SimResult<()> {
        self.run_range(backend, ctx, reads, write, extra, DispatchRange::Full)
    }

    pub fn run_range<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        reads: &[&GridBuffer],
        write: &mut GridBuffer,
        extra: &[(UniformSlot, UniformValue)],
        range: DispatchRange,
    ) -> SimResult<()> {
        let uniforms = self.uniforms(ctx, write, extra)?;
        backend.dispatch(self.kernel, reads, write, &uniforms, range)
    }
}

/// A single splat request, already converted to grid units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    /// Centre in cell coordinates.
    pub position: Vec3,
    /// Added value (velocity or colour). Radial splats use only its length.
    pub value: Vec3,
    /// Falloff radius in cells.
    pub radius: f32,
    pub radial: bool,
}

/// The stateless field operations used by one simulation.
#[derive(Clone, Debug)]
pub struct FieldOps {
    advect_velocity: FieldOp,
    advect_ink: FieldOp,
    impulse: FieldOp,
    radial_impulse: FieldOp,
    curl: FieldOp,
    confinement: FieldOp,
    divergence: FieldOp,
    gradient: FieldOp,
    subtract: FieldOp,
}

impl Default for FieldOps {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldOps {
    pub fn new() -> Self {
        use UniformSlot as S;
        use UniformSource as Src;

        Self {
            advect_velocity: FieldOp::new(KernelId::Advect)
                .bind(S::GridScale, Src::GridScale)
                .bind(S::DeltaT, Src::DeltaT)
                .bind(S::Dissipation, Src::VelocityDissipation)
                .bind(S::Gravity, Src::Gravity),
            advect_ink: FieldOp::new(KernelId::Advect)
                .bind(S::GridScale, Src::GridScale)
                .bind(S::DeltaT, Src::DeltaT)
                .bind(S::Dissipation, Src::InkDissipation)
                .bind(S::Gravity, Src::Const(0.0)),
            impulse: FieldOp::new(KernelId::Impulse),
            radial_impulse: FieldOp::new(KernelId::RadialImpulse),
            curl: FieldOp::new(KernelId::Curl).bind(S::GridScale, Src::GridScale),
            confinement: FieldOp::new(KernelId::Confinement)
                .bind(S::GridScale, Src::GridScale)
                .bind(S::DeltaT, Src::DeltaT)
                .bind(S::Scale, Src::VorticityScale),
            divergence: FieldOp::new(KernelId::Divergence).bind(S::GridScale, Src::GridScale),
            gradient: FieldOp::new(KernelId::Gradient).bind(S::GridScale, Src::GridScale),
            subtract: FieldOp::new(KernelId::Subtract),
        }
    }

    /// Velocity transports itself. Uses the velocity dissipation and gravity.
    pub fn self_advect<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        velocity: &mut GridField,
    ) -> SimResult<()> {
        let (front, back) = velocity.split();
        self.advect_velocity
            .run(backend, ctx, &[front, front], back, &[])?;
        velocity.swap();
        Ok(())
    }

    /// Transport ink along `velocity`. Uses the ink dissipation.
    pub fn advect_ink<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        ink: &mut GridField,
        velocity: &GridField,
    ) -> SimResult<()> {
        let (front, back) = ink.split();
        self.advect_ink
            .run(backend, ctx, &[front, velocity.front()], back, &[])?;
        ink.swap();
        Ok(())
    }

    /// Add a Gaussian splat to `field`.
    pub fn inject<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        field: &mut GridField,
        splat: &Splat,
    ) -> SimResult<()> {
        let op = if splat.radial {
            &self.radial_impulse
        } else {
            &self.impulse
        };
        let extra = [
            (UniformSlot::Position, UniformValue::Vector(splat.position)),
            (UniformSlot::Force, UniformValue::Vector(splat.value)),
            (UniformSlot::Radius, UniformValue::Scalar(splat.radius)),
        ];
        let (front, back) = field.split();
        op.run(backend, ctx, &[front], back, &extra)?;
        field.swap();
        Ok(())
    }

    pub fn curl<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        velocity: &GridField,
        vorticity: &mut GridField,
    ) -> SimResult<()> {
        let (_, back) = vorticity.split();
        self.curl.run(backend, ctx, &[velocity.front()], back, &[])?;
        vorticity.swap();
        Ok(())
    }

    pub fn confine<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        velocity: &mut GridField,
        vorticity: &GridField,
    ) -> SimResult<()> {
        let (front, back) = velocity.split();
        self.confinement
            .run(backend, ctx, &[front, vorticity.front()], back, &[])?;
        velocity.swap();
        Ok(())
    }

    pub fn divergence<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        velocity: &GridField,
        divergence: &mut GridField,
    ) -> SimResult<()> {
        let (_, back) = divergence.split();
        self.divergence
            .run(backend, ctx, &[velocity.front()], back, &[])?;
        divergence.swap();
        Ok(())
    }

    pub fn gradient<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        pressure: &GridField,
        gradient: &mut GridField,
    ) -> SimResult<()> {
        let (_, back) = gradient.split();
        self.gradient
            .run(backend, ctx, &[pressure.front()], back, &[])?;
        gradient.swap();
        Ok(())
    }

    /// `velocity - gradient`.
    pub fn subtract<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        velocity: &mut GridField,
        gradient: &GridField,
    ) -> SimResult<()> {
        let (front, back) = velocity.split();
        self.subtract
            .run(backend, ctx, &[front, gradient.front()], back, &[])?;
        velocity.swap();
        Ok(())
    }
}
