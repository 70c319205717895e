//! Per-cell kernel math.
//!
//! Each function computes the new value of one cell `(i, j, k)` from the
//! sampled input buffers and the uniform block. Neighbour fetches clamp to
//! the grid, so edge cells see themselves across the domain boundary.
//!
//! Distances are in cells; derivatives divide by the cell spacing
//! `h = grid_scale` to give domain units.

use glam::Vec3;

use crate::backend::{KernelId, Uniforms};
use crate::constants::EPSILON;
use crate::grid::GridBuffer;

/// Evaluate `kernel` at one cell. Inputs have already been validated.
#[inline]
pub fn evaluate(
    kernel: KernelId,
    reads: &[&GridBuffer],
    i: usize,
    j: usize,
    k: usize,
    u: &Uniforms,
) -> Vec3 {
    match kernel {
        KernelId::Copy => reads[0].get(i, j, k),
        KernelId::Advect => advect(reads[0], reads[1], i, j, k, u),
        KernelId::Impulse => impulse(reads[0], i, j, k, u),
        KernelId::RadialImpulse => radial_impulse(reads[0], i, j, k, u),
        KernelId::Curl => curl(reads[0], i, j, k, u),
        KernelId::Confinement => confinement(reads[0], reads[1], i, j, k, u),
        KernelId::Jacobi => jacobi(reads[0], reads[1], i, j, k, u),
        KernelId::Divergence => divergence(reads[0], i, j, k, u),
        KernelId::Gradient => gradient(reads[0], i, j, k, u),
        KernelId::Subtract => reads[0].get(i, j, k) - reads[1].get(i, j, k),
        KernelId::Boundary => boundary(reads[0], i, j, k, u),
    }
}

#[inline]
fn cell_pos(i: usize, j: usize, k: usize) -> Vec3 {
    Vec3::new(i as f32, j as f32, k as f32)
}

/// Signed neighbour offsets as `i64` coordinates.
#[inline]
fn coords(i: usize, j: usize, k: usize) -> (i64, i64, i64) {
    (i as i64, j as i64, k as i64)
}

/// Semi-Lagrangian transport: sample `quantity` where the parcel was one step ago.
///
/// `gravity` is a signed acceleration along +y. Ink advection binds it to zero.
pub fn advect(
    quantity: &GridBuffer,
    velocity: &GridBuffer,
    i: usize,
    j: usize,
    k: usize,
    u: &Uniforms,
) -> Vec3 {
    let vel = velocity.get(i, j, k);
    let back = cell_pos(i, j, k) - u.dt * vel / u.grid_scale;
    let mut result = quantity.sample_linear(back) * u.dissipation;
    result.y += u.gravity * u.dt;
    result
}

#[inline]
fn splat_weight(i: usize, j: usize, k: usize, u: &Uniforms) -> (Vec3, f32) {
    let offset = cell_pos(i, j, k) - u.position();
    let r2 = (u.radius * u.radius).max(EPSILON);
    (offset, (-offset.length_squared() / r2).exp())
}

/// Add `force * exp(-d² / r²)` centred on `position`.
pub fn impulse(field: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let (_, w) = splat_weight(i, j, k, u);
    field.get(i, j, k) + u.force() * w
}

/// Push outward from `position` with magnitude `|force|`, zero at the centre.
pub fn radial_impulse(field: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let (offset, w) = splat_weight(i, j, k, u);
    let dist = offset.length();
    if dist < EPSILON {
        return field.get(i, j, k);
    }
    field.get(i, j, k) + offset / dist * u.force().length() * w
}

/// Discrete curl by central differences.
///
/// Planar grids store the scalar curl in `x`; volumes store the full vector.
pub fn curl(velocity: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let (i, j, k) = coords(i, j, k);
    let half_inv_h = 0.5 / u.grid_scale;

    let l = velocity.fetch(i - 1, j, k);
    let r = velocity.fetch(i + 1, j, k);
    let b = velocity.fetch(i, j - 1, k);
    let t = velocity.fetch(i, j + 1, k);

    if u.depth <= 1 {
        let w = ((r.y - l.y) - (t.x - b.x)) * half_inv_h;
        return Vec3::new(w, 0.0, 0.0);
    }

    let back = velocity.fetch(i, j, k - 1);
    let front = velocity.fetch(i, j, k + 1);

    Vec3::new(
        (t.z - b.z) - (front.y - back.y),
        (front.x - back.x) - (r.z - l.z),
        (r.y - l.y) - (t.x - b.x),
    ) * half_inv_h
}

/// Vorticity confinement: `velocity + scale * (N x w) * dt`, `N = grad|w| / |grad|w||`.
pub fn confinement(
    velocity: &GridBuffer,
    vorticity: &GridBuffer,
    i: usize,
    j: usize,
    k: usize,
    u: &Uniforms,
) -> Vec3 {
    let vel = velocity.get(i, j, k);
    let planar = u.depth <= 1;
    let (ci, cj, ck) = coords(i, j, k);

    // |w| for a planar field is |w.x|; the length covers both cases.
    let mag = |di: i64, dj: i64, dk: i64| vorticity.fetch(ci + di, cj + dj, ck + dk).length();

    let eta = Vec3::new(
        mag(1, 0, 0) - mag(-1, 0, 0),
        mag(0, 1, 0) - mag(0, -1, 0),
        if planar { 0.0 } else { mag(0, 0, 1) - mag(0, 0, -1) },
    ) * (0.5 / u.grid_scale);

    let len = eta.length();
    if len < EPSILON {
        return vel;
    }
    let n = eta / len;

    let omega = vorticity.get(i, j, k);
    let omega = if planar {
        Vec3::new(0.0, 0.0, omega.x)
    } else {
        omega
    };

    let mut force = n.cross(omega) * u.scale * u.dt;
    if planar {
        force.z = 0.0;
    }
    vel + force
}

/// One Jacobi sweep: `(sum of neighbours + alpha * b) / beta`.
pub fn jacobi(x: &GridBuffer, b: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let (ci, cj, ck) = coords(i, j, k);
    let mut sum = x.fetch(ci - 1, cj, ck)
        + x.fetch(ci + 1, cj, ck)
        + x.fetch(ci, cj - 1, ck)
        + x.fetch(ci, cj + 1, ck);
    if u.depth > 1 {
        sum += x.fetch(ci, cj, ck - 1) + x.fetch(ci, cj, ck + 1);
    }
    (sum + u.alpha * b.get(i, j, k)) / u.beta
}

/// Forward-difference divergence. Pairs with the backward-difference
/// [`gradient`] so that `div(grad p)` is exactly the Jacobi Laplacian.
pub fn divergence(velocity: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let (ci, cj, ck) = coords(i, j, k);
    let c = velocity.get(i, j, k);
    let mut d = (velocity.fetch(ci + 1, cj, ck).x - c.x) + (velocity.fetch(ci, cj + 1, ck).y - c.y);
    if u.depth > 1 {
        d += velocity.fetch(ci, cj, ck + 1).z - c.z;
    }
    Vec3::new(d / u.grid_scale, 0.0, 0.0)
}

/// Backward-difference gradient of the scalar in `x`.
pub fn gradient(pressure: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let (ci, cj, ck) = coords(i, j, k);
    let p = pressure.get(i, j, k).x;
    let gz = if u.depth > 1 {
        p - pressure.fetch(ci, cj, ck - 1).x
    } else {
        0.0
    };
    Vec3::new(
        p - pressure.fetch(ci - 1, cj, ck).x,
        p - pressure.fetch(ci, cj - 1, ck).x,
        gz,
    ) / u.grid_scale
}

/// Border cell value: `scale` times the nearest interior cell.
/// Corners take the diagonal interior neighbour.
pub fn boundary(field: &GridBuffer, i: usize, j: usize, k: usize, u: &Uniforms) -> Vec3 {
    let dims = field.dims();
    let ii = i.clamp(1, dims.width - 2);
    let jj = j.clamp(1, dims.height - 2);
    let kk = if dims.is_3d() {
        k.clamp(1, dims.depth - 2)
    } else {
        0
    };
    field.get(ii, jj, kk) * u.scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{UniformSlot, UniformValue};
    use crate::grid::GridDims;

    fn uniforms(dims: GridDims, values: &[(UniformSlot, UniformValue)]) -> Uniforms {
        let mut u = Uniforms::new(dims);
        for (slot, value) in values {
            u.set(*slot, *value).unwrap();
        }
        u
    }

    #[test]
    fn test_advect_zero_velocity_applies_dissipation() {
        let dims = GridDims::new_2d(8, 8);
        let mut ink = GridBuffer::new(dims, 3).unwrap();
        ink.fill(Vec3::ONE);
        let vel = GridBuffer::new(dims, 2).unwrap();
        let u = uniforms(
            dims,
            &[
                (UniformSlot::GridScale, UniformValue::Scalar(1.0 / 8.0)),
                (UniformSlot::DeltaT, UniformValue::Scalar(0.1)),
                (UniformSlot::Dissipation, UniformValue::Scalar(0.5)),
                (UniformSlot::Gravity, UniformValue::Scalar(0.0)),
            ],
        );
        assert_eq!(advect(&ink, &vel, 3, 3, 0, &u), Vec3::splat(0.5));
    }

    #[test]
    fn test_advect_backtraces_one_cell() {
        let dims = GridDims::new_2d(8, 8);
        let mut q = GridBuffer::new(dims, 1).unwrap();
        q.set(2, 4, 0, Vec3::X);
        let mut vel = GridBuffer::new(dims, 2).unwrap();
        // One cell per step in +x: dt * u / h == 1.
        vel.fill(Vec3::new(0.125, 0.0, 0.0));
        let u = uniforms(
            dims,
            &[
                (UniformSlot::GridScale, UniformValue::Scalar(0.125)),
                (UniformSlot::DeltaT, UniformValue::Scalar(1.0)),
                (UniformSlot::Dissipation, UniformValue::Scalar(1.0)),
                (UniformSlot::Gravity, UniformValue::Scalar(0.0)),
            ],
        );
        let moved = advect(&q, &vel, 3, 4, 0, &u);
        assert!((moved.x - 1.0).abs() < 1e-6, "value should arrive from i=2, got {}", moved.x);
    }

    #[test]
    fn test_radial_impulse_is_zero_at_centre() {
        let dims = GridDims::new_2d(8, 8);
        let field = GridBuffer::new(dims, 2).unwrap();
        let u = uniforms(
            dims,
            &[
                (UniformSlot::Position, UniformValue::Vector(Vec3::new(4.0, 4.0, 0.0))),
                (UniformSlot::Force, UniformValue::Vector(Vec3::new(3.0, 4.0, 0.0))),
                (UniformSlot::Radius, UniformValue::Scalar(2.0)),
            ],
        );
        let centre = radial_impulse(&field, 4, 4, 0, &u);
        assert!(centre.is_finite());
        assert_eq!(centre, Vec3::ZERO);

        let right = radial_impulse(&field, 5, 4, 0, &u);
        assert!(right.x > 0.0 && right.y.abs() < 1e-6, "should push outward: {:?}", right);
    }

    #[test]
    fn test_curl_of_rigid_rotation() {
        let dims = GridDims::new_2d(9, 9);
        let mut vel = GridBuffer::new(dims, 2).unwrap();
        for j in 0..9 {
            for i in 0..9 {
                // u = (-y, x) has curl 2 in unit spacing.
                vel.set(i, j, 0, Vec3::new(-(j as f32), i as f32, 0.0));
            }
        }
        let u = uniforms(dims, &[(UniformSlot::GridScale, UniformValue::Scalar(1.0))]);
        let w = curl(&vel, 4, 4, 0, &u);
        assert!((w.x - 2.0).abs() < 1e-5, "expected curl 2, got {}", w.x);
    }

    #[test]
    fn test_volume_curl_of_rigid_rotation() {
        let dims = GridDims::new_3d(7, 7, 7);
        let mut about_z = GridBuffer::new(dims, 3).unwrap();
        let mut about_x = GridBuffer::new(dims, 3).unwrap();
        for k in 0..7 {
            for j in 0..7 {
                for i in 0..7 {
                    let (x, y, z) = (i as f32, j as f32, k as f32);
                    about_z.set(i, j, k, Vec3::new(-y, x, 0.0));
                    about_x.set(i, j, k, Vec3::new(0.0, -z, y));
                }
            }
        }
        let u = uniforms(dims, &[(UniformSlot::GridScale, UniformValue::Scalar(1.0))]);

        let w = curl(&about_z, 3, 3, 3, &u);
        assert!((w - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5, "got {:?}", w);
        let w = curl(&about_x, 3, 3, 3, &u);
        assert!((w - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5, "got {:?}", w);
    }

    #[test]
    fn test_volume_confinement() {
        let dims = GridDims::new_3d(7, 7, 7);
        let mut vel = GridBuffer::new(dims, 3).unwrap();
        vel.fill(Vec3::new(0.1, 0.2, 0.3));
        let u = uniforms(
            dims,
            &[
                (UniformSlot::GridScale, UniformValue::Scalar(1.0)),
                (UniformSlot::DeltaT, UniformValue::Scalar(0.1)),
                (UniformSlot::Scale, UniformValue::Scalar(1.0)),
            ],
        );

        // Flat vorticity has no gradient to normalise
        let mut flat = GridBuffer::new(dims, 3).unwrap();
        flat.fill(Vec3::new(1.0, 2.0, 3.0));
        let out = confinement(&vel, &flat, 3, 3, 3, &u);
        assert!(out.is_finite(), "zero gradient must not produce NaN");
        assert_eq!(out, Vec3::new(0.1, 0.2, 0.3));

        // |w| grows along +x with w along z: N = +x, N x w points along -y
        let mut ramp = GridBuffer::new(dims, 3).unwrap();
        for k in 0..7 {
            for j in 0..7 {
                for i in 0..7 {
                    ramp.set(i, j, k, Vec3::new(0.0, 0.0, i as f32));
                }
            }
        }
        let out = confinement(&vel, &ramp, 3, 3, 3, &u);
        let expected = Vec3::new(0.1, 0.2 - 0.3, 0.3);
        assert!((out - expected).length() < 1e-6, "got {:?}", out);
    }

    #[test]
    fn test_confinement_flat_vorticity_is_noop() {
        let dims = GridDims::new_2d(6, 6);
        let mut vel = GridBuffer::new(dims, 2).unwrap();
        vel.fill(Vec3::new(0.3, -0.2, 0.0));
        let mut vort = GridBuffer::new(dims, 1).unwrap();
        vort.fill(Vec3::new(5.0, 0.0, 0.0));
        let u = uniforms(
            dims,
            &[
                (UniformSlot::GridScale, UniformValue::Scalar(1.0 / 6.0)),
                (UniformSlot::DeltaT, UniformValue::Scalar(0.016)),
                (UniformSlot::Scale, UniformValue::Scalar(10.0)),
            ],
        );
        let out = confinement(&vel, &vort, 3, 3, 0, &u);
        assert!(out.is_finite(), "zero gradient must not produce NaN");
        assert_eq!(out, Vec3::new(0.3, -0.2, 0.0));
    }

    #[test]
    fn test_gradient_of_linear_ramp() {
        let dims = GridDims::new_2d(6, 6);
        let mut p = GridBuffer::new(dims, 1).unwrap();
        for j in 0..6 {
            for i in 0..6 {
                p.set(i, j, 0, Vec3::new(2.0 * i as f32, 0.0, 0.0));
            }
        }
        let u = uniforms(dims, &[(UniformSlot::GridScale, UniformValue::Scalar(0.5))]);
        let g = gradient(&p, 3, 3, 0, &u);
        assert!((g.x - 4.0).abs() < 1e-6);
        assert_eq!(g.y, 0.0);
        assert_eq!(gradient(&p, 0, 3, 0, &u).x, 0.0, "low edge has no backward neighbour");
    }

    #[test]
    fn test_boundary_corner_uses_diagonal() {
        let dims = GridDims::new_2d(5, 5);
        let mut f = GridBuffer::new(dims, 1).unwrap();
        f.set(1, 1, 0, Vec3::new(7.0, 0.0, 0.0));
        let u = uniforms(dims, &[(UniformSlot::Scale, UniformValue::Scalar(-1.0))]);
        assert_eq!(boundary(&f, 0, 0, 0, &u).x, -7.0);
    }
}
