//! Border conditions for grid fields.
//!
//! `scale = -1` reflects velocity at the walls; `scale = 0` makes the border
//! absorb (ink, pressure-adjacent fields).

use crate::backend::{ComputeBackend, DispatchRange, KernelId, UniformSlot, UniformValue};
use crate::error::SimResult;
use crate::grid::GridField;
use crate::ops::{FieldOp, FrameContext};

/// Reflecting wall for velocity.
pub const VELOCITY_SCALE: f32 = -1.0;
/// Absorbing wall for ink.
pub const INK_SCALE: f32 = 0.0;

#[derive(Clone, Debug)]
pub struct BoundaryOperator {
    copy: FieldOp,
    boundary: FieldOp,
}

impl Default for BoundaryOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryOperator {
    pub fn new() -> Self {
        Self {
            copy: FieldOp::new(KernelId::Copy),
            boundary: FieldOp::new(KernelId::Boundary),
        }
    }

    /// Copy front to back, overwrite the border of back with `scale` times the
    /// adjacent interior cell, then swap.
    ///
    /// Does nothing when `boundaries_enabled` is off for this frame.
    pub fn apply<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        ctx: &FrameContext<'_>,
        field: &mut GridField,
        scale: f32,
    ) -> SimResult<()> {
        if !ctx.vars.boundaries_enabled {
            return Ok(());
        }

        let (front, back) = field.split();
        self.copy.run(backend, ctx, &[front], back, &[])?;
        self.boundary.run_range(
            backend,
            ctx,
            &[front],
            back,
            &[(UniformSlot::Scale, UniformValue::Scalar(scale))],
            DispatchRange::Border,
        )?;
        field.swap();
        Ok(())
    }
}
