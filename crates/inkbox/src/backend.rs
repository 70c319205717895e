//! Kernel execution surface.
//!
//! The simulation issues every per-cell operation through [`ComputeBackend::dispatch`]:
//! a named kernel, the buffers it samples, the single buffer it writes, and a
//! uniform block. [`CpuBackend`] runs kernels on the rayon pool; a GPU backend
//! would map the same calls onto compute passes.
//!
//! # Ordering
//!
//! `dispatch` must not return until the write buffer is fully written. The next
//! dispatch usually samples that buffer, so this is the barrier between
//! dependent passes.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rayon::prelude::*;

use crate::error::{SimError, SimResult};
use crate::grid::{GridBuffer, GridDims};
use crate::kernels;

/// Named per-cell operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelId {
    Copy,
    Advect,
    Impulse,
    RadialImpulse,
    Curl,
    Confinement,
    Jacobi,
    Divergence,
    Gradient,
    Subtract,
    Boundary,
}

impl KernelId {
    pub fn name(self) -> &'static str {
        match self {
            KernelId::Copy => "copy",
            KernelId::Advect => "advect",
            KernelId::Impulse => "impulse",
            KernelId::RadialImpulse => "radial_impulse",
            KernelId::Curl => "curl",
            KernelId::Confinement => "confinement",
            KernelId::Jacobi => "jacobi",
            KernelId::Divergence => "divergence",
            KernelId::Gradient => "gradient",
            KernelId::Subtract => "subtract",
            KernelId::Boundary => "boundary",
        }
    }

    /// Number of buffers the kernel samples.
    pub fn read_count(self) -> usize {
        match self {
            KernelId::Advect | KernelId::Confinement | KernelId::Jacobi | KernelId::Subtract => 2,
            _ => 1,
        }
    }

    /// Uniforms that must be bound before the kernel can run.
    pub fn required_uniforms(self) -> &'static [UniformSlot] {
        use UniformSlot::*;
        match self {
            KernelId::Copy | KernelId::Subtract => &[],
            KernelId::Advect => &[GridScale, DeltaT, Dissipation, Gravity],
            KernelId::Impulse | KernelId::RadialImpulse => &[Position, Force, Radius],
            KernelId::Curl | KernelId::Divergence | KernelId::Gradient => &[GridScale],
            KernelId::Confinement => &[GridScale, DeltaT, Scale],
            KernelId::Jacobi => &[Alpha, Beta],
            KernelId::Boundary => &[Scale],
        }
    }
}

/// Named slot in the uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    GridScale,
    DeltaT,
    Dissipation,
    Alpha,
    Beta,
    Scale,
    Radius,
    Gravity,
    Position,
    Force,
}

impl UniformSlot {
    pub fn name(self) -> &'static str {
        match self {
            UniformSlot::GridScale => "grid_scale",
            UniformSlot::DeltaT => "dt",
            UniformSlot::Dissipation => "dissipation",
            UniformSlot::Alpha => "alpha",
            UniformSlot::Beta => "beta",
            UniformSlot::Scale => "scale",
            UniformSlot::Radius => "radius",
            UniformSlot::Gravity => "gravity",
            UniformSlot::Position => "position",
            UniformSlot::Force => "force",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Value bound to a [`UniformSlot`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vector(Vec3),
}

/// Uniform block handed to every dispatch (80 bytes).
///
/// Layout matches a std140 block so a GPU backend can upload it unchanged.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Uniforms {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Bit per [`UniformSlot`] that has been set.
    pub bound: u32,
    pub grid_scale: f32,
    pub dt: f32,
    pub dissipation: f32,
    pub alpha: f32,
    pub beta: f32,
    pub scale: f32,
    pub radius: f32,
    pub gravity: f32,
    pub position: [f32; 4],
    pub force: [f32; 4],
}

impl Uniforms {
    pub fn new(dims: GridDims) -> Self {
        Self {
            width: dims.width as u32,
            height: dims.height as u32,
            depth: dims.depth as u32,
            ..Default::default()
        }
    }

    pub fn set(&mut self, slot: UniformSlot, value: UniformValue) -> SimResult<()> {
        use UniformValue::{Scalar, Vector};
        match (slot, value) {
            (UniformSlot::GridScale, Scalar(v)) => self.grid_scale = v,
            (UniformSlot::DeltaT, Scalar(v)) => self.dt = v,
            (UniformSlot::Dissipation, Scalar(v)) => self.dissipation = v,
            (UniformSlot::Alpha, Scalar(v)) => self.alpha = v,
            (UniformSlot::Beta, Scalar(v)) => self.beta = v,
            (UniformSlot::Scale, Scalar(v)) => self.scale = v,
            (UniformSlot::Radius, Scalar(v)) => self.radius = v,
            (UniformSlot::Gravity, Scalar(v)) => self.gravity = v,
            (UniformSlot::Position, Vector(v)) => self.position = [v.x, v.y, v.z, 0.0],
            (UniformSlot::Force, Vector(v)) => self.force = [v.x, v.y, v.z, 0.0],
            _ => {
                return Err(SimError::InvalidConfiguration(format!(
                    "uniform '{}' bound with wrong value kind {:?}",
                    slot.name(),
                    value
                )))
            }
        }
        self.bound |= slot.bit();
        Ok(())
    }

    pub fn is_bound(&self, slot: UniformSlot) -> bool {
        self.bound & slot.bit() != 0
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    #[inline]
    pub fn force(&self) -> Vec3 {
        Vec3::new(self.force[0], self.force[1], self.force[2])
    }
}

/// Portion of the grid a dispatch covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchRange {
    /// Every cell.
    Full,
    /// Only the one-cell-thick border; interior cells of the write buffer are untouched.
    Border,
}

/// Executes named per-cell kernels.
pub trait ComputeBackend {
    /// Run `kernel` over `range`, sampling `reads` and writing `write`.
    ///
    /// Returns once every cell in `range` has been written.
    fn dispatch(
        &self,
        kernel: KernelId,
        reads: &[&GridBuffer],
        write: &mut GridBuffer,
        uniforms: &Uniforms,
        range: DispatchRange,
    ) -> SimResult<()>;
}

/// Check buffer count, buffer sizes and uniforms before a dispatch.
pub fn validate_dispatch(
    kernel: KernelId,
    reads: &[&GridBuffer],
    write: &GridBuffer,
    uniforms: &Uniforms,
) -> SimResult<()> {
    if reads.len() != kernel.read_count() {
        return Err(SimError::InvalidConfiguration(format!(
            "kernel '{}' expects {} inputs, got {}",
            kernel.name(),
            kernel.read_count(),
            reads.len()
        )));
    }

    let expected = write.dims();
    for read in reads {
        if read.dims() != expected {
            return Err(SimError::DimensionMismatch {
                op: kernel.name(),
                expected,
                found: read.dims(),
            });
        }
    }

    let uniform_dims = GridDims::new_3d(
        uniforms.width as usize,
        uniforms.height as usize,
        uniforms.depth as usize,
    );
    if uniform_dims != expected {
        return Err(SimError::DimensionMismatch {
            op: kernel.name(),
            expected,
            found: uniform_dims,
        });
    }

    if let Some(missing) = kernel
        .required_uniforms()
        .iter()
        .find(|slot| !uniforms.is_bound(**slot))
    {
        return Err(SimError::InvalidConfiguration(format!(
            "kernel '{}' missing uniform '{}'",
            kernel.name(),
            missing.name()
        )));
    }

    Ok(())
}

/// Multithreaded CPU backend. Rows are distributed over the rayon pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    fn dispatch(
        &self,
        kernel: KernelId,
        reads: &[&GridBuffer],
        write: &mut GridBuffer,
        uniforms: &Uniforms,
        range: DispatchRange,
    ) -> SimResult<()> {
        validate_dispatch(kernel, reads, write, uniforms)?;

        let dims = write.dims();
        let width = dims.width;

        write
            .as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, cells)| {
                let j = row % dims.height;
                let k = row / dims.height;

                // Interior rows only touch their first and last cell in border mode.
                let whole_row = range == DispatchRange::Full || dims.is_border(1, j, k);
                if whole_row {
                    for (i, cell) in cells.iter_mut().enumerate() {
                        *cell = kernels::evaluate(kernel, reads, i, j, k, uniforms);
                    }
                } else {
                    cells[0] = kernels::evaluate(kernel, reads, 0, j, k, uniforms);
                    cells[width - 1] = kernels::evaluate(kernel, reads, width - 1, j, k, uniforms);
                }
            });

        Ok(())
    }
}
