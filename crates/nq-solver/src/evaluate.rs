//! Evaluation of mole fractions, gradient, Hessian, and objective terms.

use crate::error::{SolverError, SolverResult};
use crate::problem::EquilibriumProblem;
use nalgebra::{DMatrix, DVector};
use nq_core::within_scaled_tol;

/// Cap on the exponent of the mole-fraction map. Checked on the log scale,
/// before any `exp` is taken, so no non-finite value can enter the state.
pub const MAX_LOG_X: f64 = 250.0;

/// Mole fractions from the dual vector: x[j] = exp(-G[j] + A[.,j] . lambda).
pub fn mole_fractions(
    problem: &EquilibriumProblem,
    lambda: &DVector<f64>,
) -> SolverResult<DVector<f64>> {
    let n = problem.num_complexes();
    let mut x = DVector::zeros(n);
    for j in 0..n {
        let logx = problem.a().column(j).dot(lambda) - problem.g()[j];
        if logx > MAX_LOG_X {
            return Err(SolverError::Overflow { complex: j, logx });
        }
        x[j] = logx.exp();
    }
    Ok(x)
}

/// Mass-balance residual: g[i] = -x0[i] + (row i of A) . x.
pub fn gradient(problem: &EquilibriumProblem, x: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(problem.num_strands(), |i, _| {
        problem.at().column(i).dot(x) - problem.x0()[i]
    })
}

/// Hessian of the dual objective: H[r][c] = sum_j A[r][j] A[c][j] x[j].
///
/// Only the upper triangle is computed; the lower triangle is mirrored.
pub fn hessian(problem: &EquilibriumProblem, x: &DVector<f64>) -> DMatrix<f64> {
    let m = problem.num_strands();
    let n = problem.num_complexes();
    let mut h = DMatrix::zeros(m, m);
    for c in 0..m {
        let col_c = problem.at().column(c);
        for r in 0..=c {
            let col_r = problem.at().column(r);
            let mut acc = 0.0;
            for j in 0..n {
                acc += col_r[j] * col_c[j] * x[j];
            }
            h[(r, c)] = acc;
        }
    }
    for c in 0..m {
        for r in 0..c {
            h[(c, r)] = h[(r, c)];
        }
    }
    h
}

/// The convex dual objective the driver minimizes: sum_j x[j] - lambda . x0.
/// Only differences of this value are ever used.
pub fn dual_objective(x: &DVector<f64>, lambda: &DVector<f64>, x0: &DVector<f64>) -> f64 {
    x.sum() - lambda.dot(x0)
}

/// Simultaneous componentwise convergence test: |g[i]| <= tol * x0[i] for all i.
pub fn is_converged(grad: &DVector<f64>, x0: &DVector<f64>, tol: f64) -> bool {
    grad.iter()
        .zip(x0.iter())
        .all(|(&g, &c)| within_scaled_tol(g, c, tol))
}

/// Total Gibbs free energy of the solution, in kcal per liter.
pub fn free_energy(problem: &EquilibriumProblem, x: &DVector<f64>) -> f64 {
    let mut f = 0.0;
    for &c in problem.x0().iter() {
        f += c * (1.0 - c.ln());
    }
    for (j, &xj) in x.iter().enumerate() {
        if xj > 0.0 {
            f += xj * (xj.ln() + problem.g()[j] - 1.0);
        }
    }
    f * problem.kt() * problem.water_molarity()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimer_problem() -> EquilibriumProblem {
        // complexes: {a}, {b}, {ab}
        EquilibriumProblem::new(
            &[vec![1, 0, 1], vec![0, 1, 1]],
            &[0.0, 0.0, -1.0],
            &[1e-6, 1e-6],
            0.6163,
            55.14,
        )
        .unwrap()
    }

    #[test]
    fn mole_fractions_exponential_map() {
        let p = dimer_problem();
        let lambda = DVector::from_vec(vec![0.0, 0.0]);
        let x = mole_fractions(&p, &lambda).unwrap();
        assert_eq!(x[0], 1.0);
        assert_eq!(x[1], 1.0);
        assert!((x[2] - 1.0_f64.exp()).abs() < 1e-15);
    }

    #[test]
    fn overflow_guard_trips_on_log_scale() {
        let p = dimer_problem();
        let lambda = DVector::from_vec(vec![300.0, 0.0]);
        match mole_fractions(&p, &lambda) {
            Err(SolverError::Overflow { complex, logx }) => {
                assert_eq!(complex, 0);
                assert!(logx > MAX_LOG_X);
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[test]
    fn gradient_mass_balance_form() {
        let p = dimer_problem();
        let x = DVector::from_vec(vec![3e-7, 4e-7, 2e-7]);
        let g = gradient(&p, &x);
        assert!((g[0] - (3e-7 + 2e-7 - 1e-6)).abs() < 1e-20);
        assert!((g[1] - (4e-7 + 2e-7 - 1e-6)).abs() < 1e-20);
    }

    #[test]
    fn hessian_mirrors_upper_triangle() {
        let p = dimer_problem();
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let h = hessian(&p, &x);
        // H[0][0] = x_a + x_ab, H[1][1] = x_b + x_ab, H[0][1] = x_ab
        assert_eq!(h[(0, 0)], 4.0);
        assert_eq!(h[(1, 1)], 5.0);
        assert_eq!(h[(0, 1)], 3.0);
        assert_eq!(h[(1, 0)], h[(0, 1)]);
    }

    #[test]
    fn converged_requires_every_component() {
        let x0 = DVector::from_vec(vec![1e-6, 1e-6]);
        let tol = 1e-8;
        let g = DVector::from_vec(vec![1e-15, 1e-15]);
        assert!(is_converged(&g, &x0, tol));
        let g = DVector::from_vec(vec![1e-15, 1e-13]);
        assert!(!is_converged(&g, &x0, tol));
    }

    #[test]
    fn free_energy_vanishes_for_pure_monomer() {
        // single strand, singleton only, G = 0, at its target: the entropy
        // terms cancel exactly
        let p = EquilibriumProblem::new(&[vec![1]], &[0.0], &[2.5e-5], 0.6163, 55.14).unwrap();
        let x = DVector::from_vec(vec![2.5e-5]);
        assert!(free_energy(&p, &x).abs() < 1e-18);
    }
}
