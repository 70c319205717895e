//! Cell-centred grid storage with front/back ping-pong buffers.
//!
//! Every cell stores a `Vec3`. Scalar fields use only `x`, 2D vector fields
//! use `x` and `y`, colour and 3D vector fields use all three components.
//! A 2D grid is a 3D grid with `depth == 1`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Grid extent in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub width: usize,
    pub height: usize,
    /// 1 for a planar grid.
    pub depth: usize,
}

impl GridDims {
    pub fn new_2d(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    pub fn new_3d(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// A grid needs a one-cell border on each side plus at least one interior
    /// cell along every active axis.
    pub fn validate(&self) -> SimResult<()> {
        if self.width < 3 || self.height < 3 || self.depth == 0 || self.depth == 2 {
            return Err(SimError::InvalidConfiguration(format!(
                "grid {} too small: width and height must be >= 3, depth 1 or >= 3",
                self
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.depth > 1
    }

    /// Number of spatial axes (2 or 3).
    #[inline]
    pub fn dimensionality(&self) -> usize {
        if self.is_3d() {
            3
        } else {
            2
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.height + j) * self.width + i
    }

    /// Extent as floats, with `z == 1.0` for planar grids.
    pub fn extent(&self) -> Vec3 {
        Vec3::new(self.width as f32, self.height as f32, self.depth as f32)
    }

    /// Centre of the grid in cell coordinates (`z == 0` for planar grids).
    pub fn center(&self) -> Vec3 {
        let z = if self.is_3d() {
            (self.depth / 2) as f32
        } else {
            0.0
        };
        Vec3::new((self.width / 2) as f32, (self.height / 2) as f32, z)
    }

    /// True when the cell lies in the one-cell-thick border.
    #[inline]
    pub fn is_border(&self, i: usize, j: usize, k: usize) -> bool {
        i == 0
            || j == 0
            || i + 1 == self.width
            || j + 1 == self.height
            || (self.is_3d() && (k == 0 || k + 1 == self.depth))
    }
}

impl std::fmt::Display for GridDims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_3d() {
            write!(f, "{}x{}x{}", self.width, self.height, self.depth)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

/// One buffer of cells. Kernels read from one `GridBuffer` and write another.
#[derive(Clone, Debug)]
pub struct GridBuffer {
    dims: GridDims,
    channels: u8,
    data: Vec<Vec3>,
}

impl GridBuffer {
    /// Allocate a zeroed buffer. Allocation failure is reported, not aborted on.
    pub fn new(dims: GridDims, channels: u8) -> SimResult<Self> {
        dims.validate()
            .map_err(|e| SimError::ResourceInitialization(e.to_string()))?;
        if !(1..=3).contains(&channels) {
            return Err(SimError::ResourceInitialization(format!(
                "unsupported channel count {}",
                channels
            )));
        }

        let count = dims
            .width
            .checked_mul(dims.height)
            .and_then(|n| n.checked_mul(dims.depth))
            .ok_or_else(|| {
                SimError::ResourceInitialization(format!("{} grid has too many cells", dims))
            })?;
        let mut data = Vec::new();
        data.try_reserve_exact(count).map_err(|e| {
            SimError::ResourceInitialization(format!("cannot allocate {} grid: {}", dims, e))
        })?;
        data.resize(count, Vec3::ZERO);

        Ok(Self {
            dims,
            channels,
            data,
        })
    }

    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    #[inline]
    pub fn as_slice(&self) -> &[Vec3] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Vec3] {
        &mut self.data
    }

    /// Raw bytes for upload to a renderer (tightly packed `f32` triples).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.data[self.dims.index(i, j, k)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: Vec3) {
        let idx = self.dims.index(i, j, k);
        self.data[idx] = value;
    }

    /// Fetch with coordinates clamped to the grid (edge cells repeat outward).
    #[inline]
    pub fn fetch(&self, i: i64, j: i64, k: i64) -> Vec3 {
        let i = i.clamp(0, self.dims.width as i64 - 1) as usize;
        let j = j.clamp(0, self.dims.height as i64 - 1) as usize;
        let k = k.clamp(0, self.dims.depth as i64 - 1) as usize;
        self.get(i, j, k)
    }

    /// Bilinear (2D) or trilinear (3D) sample at a cell-space position.
    /// Positions outside the grid clamp to the edge.
    pub fn sample_linear(&self, pos: Vec3) -> Vec3 {
        let max = self.dims.extent() - Vec3::ONE;
        let p = pos.clamp(Vec3::ZERO, max);

        let i0 = p.x.floor() as i64;
        let j0 = p.y.floor() as i64;
        let fx = p.x - i0 as f32;
        let fy = p.y - j0 as f32;

        let plane = |k: i64| {
            let a = self.fetch(i0, j0, k).lerp(self.fetch(i0 + 1, j0, k), fx);
            let b = self.fetch(i0, j0 + 1, k).lerp(self.fetch(i0 + 1, j0 + 1, k), fx);
            a.lerp(b, fy)
        };

        if !self.dims.is_3d() {
            return plane(0);
        }

        let k0 = p.z.floor() as i64;
        let fz = p.z - k0 as f32;
        plane(k0).lerp(plane(k0 + 1), fz)
    }

    pub fn fill(&mut self, value: Vec3) {
        self.data.fill(value);
    }

    /// Per-component sum over all cells.
    pub fn total(&self) -> Vec3 {
        self.data.iter().fold(Vec3::ZERO, |acc, v| acc + *v)
    }

    /// Largest component magnitude in the buffer.
    pub fn max_abs(&self) -> f32 {
        self.data
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs().max_element()))
    }

    /// Allocate a buffer of `dims` whose content is resampled from `self`.
    /// Cell centres are mapped so that the two grids cover the same domain.
    pub fn resampled(&self, dims: GridDims) -> SimResult<Self> {
        let mut out = Self::new(dims, self.channels)?;
        let ratio = self.dims.extent() / dims.extent();
        for k in 0..dims.depth {
            for j in 0..dims.height {
                for i in 0..dims.width {
                    let cell = Vec3::new(i as f32, j as f32, k as f32);
                    let src = (cell + Vec3::splat(0.5)) * ratio - Vec3::splat(0.5);
                    out.set(i, j, k, self.sample_linear(src));
                }
            }
        }
        Ok(out)
    }
}

/// A quantity on the grid stored as a ping-pong pair.
///
/// After every completed operation `front` holds the valid state and `back`
/// is scratch. Kernels obtain distinct read/write handles via [`GridField::split`],
/// so reading and writing the same buffer in one pass does not type-check.
#[derive(Clone, Debug)]
pub struct GridField {
    name: &'static str,
    front: GridBuffer,
    back: GridBuffer,
}

impl GridField {
    pub fn new(name: &'static str, dims: GridDims, channels: u8) -> SimResult<Self> {
        let front = GridBuffer::new(dims, channels)?;
        let back = GridBuffer::new(dims, channels)?;
        log::debug!("Allocated field '{}' ({}, {} channels)", name, dims, channels);
        Ok(Self { name, front, back })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dims(&self) -> GridDims {
        self.front.dims
    }

    pub fn channels(&self) -> u8 {
        self.front.channels
    }

    /// Current valid state.
    pub fn front(&self) -> &GridBuffer {
        &self.front
    }

    /// Scratch buffer; content is unspecified between operations.
    pub fn back(&self) -> &GridBuffer {
        &self.back
    }

    /// Direct access for seeding initial conditions.
    pub fn front_mut(&mut self) -> &mut GridBuffer {
        &mut self.front
    }

    /// Read handle on the front, write handle on the back.
    pub fn split(&mut self) -> (&GridBuffer, &mut GridBuffer) {
        (&self.front, &mut self.back)
    }

    /// Exchange buffer roles. Moves the two `Vec` headers; cell data is not copied.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn clear(&mut self) {
        self.front.fill(Vec3::ZERO);
        self.back.fill(Vec3::ZERO);
    }

    pub fn total(&self) -> Vec3 {
        self.front.total()
    }

    /// A copy of this field at new dimensions. The front is resampled from
    /// the current front; the back starts zeroed. `self` is left untouched,
    /// so a failed allocation changes nothing.
    pub fn resized(&self, dims: GridDims) -> SimResult<Self> {
        let front = self.front.resampled(dims)?;
        let back = GridBuffer::new(dims, self.channels())?;
        log::debug!(
            "Resampled field '{}' {} -> {}",
            self.name,
            self.front.dims,
            dims
        );
        Ok(Self {
            name: self.name,
            front,
            back,
        })
    }
}
