//! Property tests for the equilibrium solver.

use nq_solver::{EquilibriumProblem, TrustRegionConfig, solve};
use proptest::prelude::*;

const KT: f64 = 0.6163;
const WATER_MOLARITY: f64 = 55.14;

fn two_strand_problem(g: [f64; 5], x0: [f64; 2]) -> EquilibriumProblem {
    // complexes: {a}, {b}, {ab}, {aa}, {bb}
    EquilibriumProblem::new(
        &[vec![1, 0, 1, 2, 0], vec![0, 1, 1, 0, 2]],
        &g,
        &x0,
        KT,
        WATER_MOLARITY,
    )
    .unwrap()
}

proptest! {
    #[test]
    fn converged_solutions_conserve_strand_mass(
        ga in -1.0..1.0f64,
        gb in -1.0..1.0f64,
        gab in -2.0..2.0f64,
        gaa in -2.0..2.0f64,
        gbb in -2.0..2.0f64,
        x0a in 1e-8..1e-6f64,
        x0b in 1e-8..1e-6f64,
    ) {
        let problem = two_strand_problem([ga, gb, gab, gaa, gbb], [x0a, x0b]);
        let config = TrustRegionConfig { seed: 9, ..Default::default() };
        let sol = solve(&problem, Some(config)).unwrap();
        prop_assert!(sol.converged);
        prop_assert!(sol.x.iter().all(|&v| v >= 0.0 && v.is_finite()));

        let balance_a = sol.x[0] + sol.x[2] + 2.0 * sol.x[3];
        let balance_b = sol.x[1] + sol.x[2] + 2.0 * sol.x[4];
        prop_assert!((balance_a - x0a).abs() <= config.tol * x0a);
        prop_assert!((balance_b - x0b).abs() <= config.tol * x0b);
    }

    #[test]
    fn partial_solves_stay_finite(
        gab in -2.0..2.0f64,
        x0a in 1e-8..1e-6f64,
        x0b in 1e-8..1e-6f64,
    ) {
        let problem = two_strand_problem([0.0, 0.0, gab, -1.0, -0.5], [x0a, x0b]);
        let config = TrustRegionConfig {
            max_iters: 2,
            max_trial: 2,
            seed: 13,
            ..Default::default()
        };
        let sol = solve(&problem, Some(config)).unwrap();
        prop_assert!(sol.x.iter().all(|&v| v >= 0.0 && v.is_finite()));
        prop_assert!(sol.free_energy.is_finite());
    }
}
