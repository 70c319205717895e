//! Cursor picking for the volume view.
//!
//! The volume is drawn as a unit cube centred on the origin. A screen
//! position is unprojected into a world-space ray, the ray is clipped
//! against the cube, and the entry point is mapped to grid cells. The result
//! feeds [`crate::Simulation::notify_input_3d`].

use glam::{Mat4, Vec2, Vec3};

use crate::constants::EPSILON;
use crate::grid::GridDims;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` for a zero-length direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    /// Ray from the camera through a cursor position.
    ///
    /// `cursor` is in window pixels with y pointing down; `inv_proj_view` is
    /// the inverse of `projection * view`.
    pub fn from_cursor(
        cursor: Vec2,
        window_size: Vec2,
        inv_proj_view: Mat4,
        camera_pos: Vec3,
    ) -> Option<Self> {
        let half = window_size * 0.5;
        if half.x <= 0.0 || half.y <= 0.0 {
            return None;
        }
        let ndc = Vec2::new(
            (cursor.x - half.x) / half.x,
            (window_size.y - cursor.y - half.y) / half.y,
        );
        let world = inv_proj_view.project_point3(ndc.extend(1.0));
        Self::new(camera_pos, world - camera_pos)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// The cube the volume is rendered into.
    pub fn unit_cube() -> Self {
        Self {
            min: Vec3::splat(-0.5),
            max: Vec3::splat(0.5),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min - EPSILON).all() && p.cmple(self.max + EPSILON).all()
    }
}

/// Slab test. Returns the distance to the nearest intersection in front of the
/// ray origin (0 if the origin is inside the box).
pub fn ray_box_intersection(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if d.abs() < EPSILON {
            // Parallel to this slab: must already be inside it.
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let t0 = (lo - o) / d;
        let t1 = (hi - o) / d;
        let (t0, t1) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }

    if t_far < 0.0 {
        return None;
    }
    Some(t_near.max(0.0))
}

/// Where `ray` enters the unit cube, in grid cell coordinates.
pub fn pick_grid_position(ray: &Ray, dims: GridDims) -> Option<Vec3> {
    let t = ray_box_intersection(ray, &Aabb::unit_cube())?;
    let hit = ray.at(t);
    let cells = (hit + Vec3::splat(0.5)) * dims.extent();
    Some(cells.clamp(Vec3::ZERO, dims.extent() - Vec3::ONE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_hits_box_from_front() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z).unwrap();
        let t = ray_box_intersection(&ray, &Aabb::unit_cube()).expect("should hit");
        assert!((t - 1.5).abs() < 1e-6);
        assert!((ray.at(t) - Vec3::new(0.0, 0.0, -0.5)).length() < 1e-6);
    }

    #[test]
    fn test_ray_hits_box_from_left() {
        let ray = Ray::new(Vec3::new(-3.0, 0.1, 0.2), Vec3::X).unwrap();
        let hit = ray.at(ray_box_intersection(&ray, &Aabb::unit_cube()).unwrap());
        assert!((hit.x + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ray_misses_box() {
        let ray = Ray::new(Vec3::new(-1.0, 0.0, -2.0), Vec3::Z).unwrap();
        assert!(ray_box_intersection(&ray, &Aabb::unit_cube()).is_none());

        let away = Ray::new(Vec3::new(0.0, 0.0, -2.0), -Vec3::Z).unwrap();
        assert!(ray_box_intersection(&away, &Aabb::unit_cube()).is_none());
    }

    #[test]
    fn test_origin_inside_box() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Y).unwrap();
        assert!(Aabb::unit_cube().contains(ray.origin));
        assert_eq!(ray_box_intersection(&ray, &Aabb::unit_cube()), Some(0.0));
    }

    #[test]
    fn test_pick_maps_to_cells() {
        let dims = GridDims::new_3d(32, 32, 32);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z).unwrap();
        let cell = pick_grid_position(&ray, dims).unwrap();
        assert!(!Aabb::unit_cube().contains(ray.origin));
        assert!((cell - Vec3::new(16.0, 16.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_cursor_at_centre_looks_forward() {
        let camera = Vec3::new(0.0, 0.0, 3.0);
        let view = Mat4::look_at_rh(camera, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 100.0);
        let size = Vec2::new(800.0, 800.0);

        let ray = Ray::from_cursor(size * 0.5, size, (proj * view).inverse(), camera).unwrap();
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-3, "{:?}", ray.direction);
        assert!(pick_grid_position(&ray, GridDims::new_3d(8, 8, 8)).is_some());
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(Ray::new(Vec3::ONE, Vec3::ZERO).is_none());
    }
}
