//! Fixed-iteration Jacobi relaxation.
//!
//! Solves `(sum of neighbours - beta * x) = -alpha * b` with a constant
//! number of sweeps per call. The sweep count bounds per-frame cost; there is
//! no convergence check.
//!
//! Two uses per frame:
//! - implicit diffusion: `alpha = h² / (nu * dt)`, `beta = alpha + 2D`, `b` = the field itself
//! - pressure: `alpha = -h²`, `beta = 2D`, `b` = divergence of velocity

use crate::backend::{ComputeBackend, KernelId, UniformSlot, UniformValue};
use crate::error::{SimError, SimResult};
use crate::grid::{GridBuffer, GridDims, GridField};
use crate::ops::{FieldOp, FrameContext};

/// Round a sweep count up to even so the result lands in the front buffer
/// after the final swap. Zero sweeps is rejected.
pub fn even_iterations(iterations: u32) -> SimResult<u32> {
    if iterations == 0 {
        return Err(SimError::InvalidConfiguration(
            "Jacobi iteration count must be at least 1".to_string(),
        ));
    }
    Ok(iterations + (iterations & 1))
}

/// Diffusion coefficients `(alpha, beta)` for viscosity `nu`.
pub fn diffusion_coefficients(grid_scale: f32, nu: f32, dt: f32, dims: GridDims) -> SimResult<(f32, f32)> {
    if !nu.is_finite() || nu <= 0.0 {
        return Err(SimError::InvalidConfiguration(format!(
            "viscosity must be positive when diffusion is enabled, got {}",
            nu
        )));
    }
    let alpha = grid_scale * grid_scale / (nu * dt);
    Ok((alpha, alpha + 2.0 * dims.dimensionality() as f32))
}

/// Pressure coefficients `(alpha, beta)`.
pub fn pressure_coefficients(grid_scale: f32, dims: GridDims) -> (f32, f32) {
    (-grid_scale * grid_scale, 2.0 * dims.dimensionality() as f32)
}

/// Jacobi solver with its own copy of the right-hand side.
#[derive(Clone, Debug)]
pub struct PoissonRelaxer {
    copy: FieldOp,
    jacobi: FieldOp,
    /// `b`, copied once per solve so it stays fixed while `x` ping-pongs.
    source: GridBuffer,
}

impl PoissonRelaxer {
    pub fn new(dims: GridDims) -> SimResult<Self> {
        Ok(Self {
            copy: FieldOp::new(KernelId::Copy),
            jacobi: FieldOp::new(KernelId::Jacobi),
            source: GridBuffer::new(dims, 3)?,
        })
    }

    pub fn dims(&self) -> GridDims {
        self.source.dims()
    }

    /// Relax `field` against `source`.
    #[allow(clippy::too_many_arguments)]
    pub fn solve<B: ComputeBackend + ?Sized>(
        &mut self,
        backend: &B,
        ctx: &FrameContext<'_>,
        field: &mut GridField,
        source: &GridBuffer,
        alpha: f32,
        beta: f32,
        iterations: u32,
    ) -> SimResult<()> {
        self.load_source(backend, ctx, source)?;
        self.relax(backend, ctx, field, alpha, beta, iterations)
    }

    /// Relax `field` using its own current value as the source (implicit diffusion).
    pub fn diffuse<B: ComputeBackend + ?Sized>(
        &mut self,
        backend: &B,
        ctx: &FrameContext<'_>,
        field: &mut GridField,
        alpha: f32,
        beta: f32,
        iterations: u32,
    ) -> SimResult<()> {
        self.load_source(backend, ctx, field.front())?;
        self.relax(backend, ctx, field, alpha, beta, iterations)
    }

    fn load_source<B: ComputeBackend + ?Sized>(
        &mut self,
        backend: &B,
        ctx: &FrameContext<'_>,
        source: &GridBuffer,
    ) -> SimResult<()> {
        self.copy.run(backend, ctx, &[source], &mut self.source, &[])
    }

    fn relax<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        field: &mut GridField,
        alpha: f32,
        beta: f32,
        iterations: u32,
    ) -> SimResult<()> {
        let iterations = even_iterations(iterations)?;
        if beta == 0.0 || !beta.is_finite() || !alpha.is_finite() {
            return Err(SimError::InvalidConfiguration(format!(
                "invalid Jacobi coefficients alpha={} beta={}",
                alpha, beta
            )));
        }

        let coefficients = [
            (UniformSlot::Alpha, UniformValue::Scalar(alpha)),
            (UniformSlot::Beta, UniformValue::Scalar(beta)),
        ];
        for _ in 0..iterations {
            let (front, back) = field.split();
            self.jacobi
                .run(backend, ctx, &[front, &self.source], back, &coefficients)?;
            field.swap();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::config::SimulationVars;
    use glam::Vec3;

    #[test]
    fn test_even_iterations() {
        assert_eq!(even_iterations(1).unwrap(), 2);
        assert_eq!(even_iterations(4).unwrap(), 4);
        assert_eq!(even_iterations(31).unwrap(), 32);
        assert!(matches!(
            even_iterations(0),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_diffusion_rejects_zero_viscosity() {
        let dims = GridDims::new_2d(8, 8);
        assert!(diffusion_coefficients(0.125, 0.0, 0.016, dims).is_err());
        let (alpha, beta) = diffusion_coefficients(0.125, 0.01, 0.5, dims).unwrap();
        assert!((alpha - 3.125).abs() < 1e-5);
        assert!((beta - (alpha + 4.0)).abs() < 1e-6);
    }

    #[test]
    fn test_pressure_beta_follows_dimensionality() {
        assert_eq!(pressure_coefficients(0.5, GridDims::new_2d(4, 4)), (-0.25, 4.0));
        assert_eq!(pressure_coefficients(0.5, GridDims::new_3d(4, 4, 4)), (-0.25, 6.0));
    }

    #[test]
    fn test_diffusion_preserves_uniform_field() {
        let dims = GridDims::new_2d(8, 8);
        let vars = SimulationVars::for_grid(dims);
        let ctx = FrameContext { vars: &vars, dt: 0.016 };
        let mut relaxer = PoissonRelaxer::new(dims).unwrap();
        let mut ink = GridField::new("ink", dims, 3).unwrap();
        ink.front_mut().fill(Vec3::splat(0.25));

        let (alpha, beta) = diffusion_coefficients(vars.grid_scale, 0.01, 0.016, dims).unwrap();
        relaxer
            .diffuse(&CpuBackend, &ctx, &mut ink, alpha, beta, 7)
            .unwrap();

        for v in ink.front().as_slice() {
            assert!((*v - Vec3::splat(0.25)).abs().max_element() < 1e-6);
        }
    }

    #[test]
    fn test_zero_beta_rejected_before_any_sweep() {
        let dims = GridDims::new_2d(4, 4);
        let vars = SimulationVars::for_grid(dims);
        let ctx = FrameContext { vars: &vars, dt: 0.016 };
        let mut relaxer = PoissonRelaxer::new(dims).unwrap();
        let mut p = GridField::new("pressure", dims, 1).unwrap();
        let src = GridBuffer::new(dims, 1).unwrap();
        let ptr = p.front().as_slice().as_ptr();

        assert!(relaxer
            .solve(&CpuBackend, &ctx, &mut p, &src, 1.0, 0.0, 4)
            .is_err());
        assert_eq!(p.front().as_slice().as_ptr(), ptr);
    }
}
