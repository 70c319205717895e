//! Property-based tests for grid fields and pointer input using proptest
//!
//! These tests check invariants across random inputs:
//! - Two swaps restore the initial buffer roles
//! - Border cells are `scale` times an interior neighbour
//! - Pointer force never exceeds `max_force`
//! - The pointer state machine never stays active after a release

use inkbox::boundary::BoundaryOperator;
use inkbox::ops::FrameContext;
use inkbox::poisson::PoissonRelaxer;
use inkbox::{CpuBackend, GridDims, GridField, ImpulseState, SimulationVars, Vec3};
use proptest::prelude::*;

/// Strategy for small planar grids (at least 3 cells a side so there is an interior)
fn small_dims() -> impl Strategy<Value = GridDims> {
    (3usize..12, 3usize..12).prop_map(|(w, h)| GridDims::new_2d(w, h))
}

fn cell_value() -> impl Strategy<Value = Vec3> {
    (-10.0f32..10.0, -10.0f32..10.0).prop_map(|(x, y)| Vec3::new(x, y, 0.0))
}

fn seeded_field(dims: GridDims, values: &[Vec3]) -> GridField {
    let mut field = GridField::new("velocity", dims, 2).unwrap();
    for (cell, v) in field.front_mut().as_mut_slice().iter_mut().zip(values.iter().cycle()) {
        *cell = *v;
    }
    field
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn swap_twice_restores(dims in small_dims(), values in prop::collection::vec(cell_value(), 1..32)) {
        let mut field = seeded_field(dims, &values);
        let front = field.front().as_slice().as_ptr();
        let back = field.back().as_slice().as_ptr();
        let snapshot = field.front().as_slice().to_vec();

        field.swap();
        prop_assert_eq!(field.front().as_slice().as_ptr(), back);
        field.swap();

        prop_assert_eq!(field.front().as_slice().as_ptr(), front);
        prop_assert_eq!(field.front().as_slice(), snapshot.as_slice());
    }

    #[test]
    fn border_is_scaled_interior(
        dims in small_dims(),
        values in prop::collection::vec(cell_value(), 1..32),
        scale in -2.0f32..2.0,
    ) {
        let mut field = seeded_field(dims, &values);
        let before = field.front().clone();
        let vars = SimulationVars::for_grid(dims);
        let ctx = FrameContext { vars: &vars, dt: 1.0 / 60.0 };

        BoundaryOperator::new().apply(&CpuBackend::new(), &ctx, &mut field, scale).unwrap();

        for j in 0..dims.height {
            for i in 0..dims.width {
                let got = field.front().get(i, j, 0);
                if dims.is_border(i, j, 0) {
                    let ii = i.clamp(1, dims.width - 2);
                    let jj = j.clamp(1, dims.height - 2);
                    prop_assert_eq!(got, before.get(ii, jj, 0) * scale);
                } else {
                    prop_assert_eq!(got, before.get(i, j, 0));
                }
            }
        }
    }

    #[test]
    fn pointer_force_is_bounded(
        start in (0.0f32..256.0, 0.0f32..256.0),
        end in (0.0f32..256.0, 0.0f32..256.0),
        max_force in 0.01f32..5.0,
    ) {
        let mut vars = SimulationVars::default();
        vars.max_force = max_force;
        let mut state = ImpulseState::new();
        state.update(start.0, start.1, true, false);
        state.update(end.0, end.1, true, false);

        let f = state.force(&vars);
        prop_assert!(f.abs().max_element() <= max_force, "force {:?} exceeds {}", f, max_force);
    }

    #[test]
    fn release_always_deactivates(
        presses in prop::collection::vec((any::<bool>(), any::<bool>()), 1..40),
    ) {
        let mut state = ImpulseState::new();
        for (step, (left, right)) in presses.iter().enumerate() {
            state.update(step as f32, 0.0, *left, *right);
            prop_assert_eq!(state.is_active(), *left || *right);
            if !(*left || *right) {
                prop_assert_eq!(state, ImpulseState::default());
            }
        }
    }

    #[test]
    fn jacobi_is_bitwise_deterministic(
        dims in small_dims(),
        values in prop::collection::vec(cell_value(), 1..32),
    ) {
        let vars = SimulationVars::for_grid(dims);
        let ctx = FrameContext { vars: &vars, dt: 1.0 / 60.0 };
        let backend = CpuBackend::new();

        let run = || {
            let mut field = seeded_field(dims, &values);
            let mut relaxer = PoissonRelaxer::new(dims).unwrap();
            relaxer.diffuse(&backend, &ctx, &mut field, 3.0, 7.0, 10).unwrap();
            field.front().as_slice().iter().map(|v| v.x.to_bits()).collect::<Vec<_>>()
        };

        prop_assert_eq!(run(), run());
    }
}
