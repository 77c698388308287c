//! Starting-point construction for the dual iteration.
//!
//! The fresh start picks the largest uniform multiplier that keeps every
//! exponent of the mole-fraction map small; restarts perturb that point
//! randomly, shrinking the perturbation until the map is safe to evaluate.

use crate::error::SolverResult;
use crate::evaluate::mole_fractions;
use crate::problem::EquilibriumProblem;
use nalgebra::DVector;
use rand::Rng;
use rand::rngs::StdRng;

/// Exponent bound used when constructing the fresh start. Far below the
/// evaluation cap, so the first iterate starts with mole fractions of
/// order one at most.
pub const MAX_INITIAL_LOG_X: f64 = 1.0;

/// Redraw budget for one restart before the overflow is declared
/// unrecoverable.
const MAX_PERTURB_REDRAWS: usize = 64;

/// Largest uniform multiplier L with strand_count(j) * L - G[j] bounded for
/// every complex j.
pub fn lambda_cap(problem: &EquilibriumProblem) -> f64 {
    let mut cap = f64::INFINITY;
    for j in 0..problem.num_complexes() {
        let bound = (MAX_INITIAL_LOG_X + problem.g()[j]) / problem.strand_counts()[j];
        cap = cap.min(bound);
    }
    cap
}

/// Closed-form multipliers for strands that appear only in their own
/// singleton complex: lambda[i] = ln x0[i] + G[j*].
pub fn apply_inert_correction(problem: &EquilibriumProblem, lambda: &mut DVector<f64>) {
    for &(i, j) in problem.inert_pairs() {
        lambda[i] = problem.x0()[i].ln() + problem.g()[j];
    }
}

/// Fresh starting vector: every multiplier at the cap, inert strands
/// overwritten in closed form.
pub fn fresh_guess(problem: &EquilibriumProblem) -> DVector<f64> {
    let mut lambda = DVector::from_element(problem.num_strands(), lambda_cap(problem));
    apply_inert_correction(problem, &mut lambda);
    lambda
}

/// Perturbed restart: uniform offsets in [-scale, scale] around the cap.
///
/// A draw that overflows the mole-fraction map halves the scale and redraws,
/// so the scale decreases monotonically within one restart. Returns the
/// starting vector together with its mole fractions, which are safe by
/// construction. If the redraw budget runs out the overflow is structural
/// (the closed-form inert multipliers themselves overflow) and the last
/// error is surfaced.
pub fn perturbed_guess(
    problem: &EquilibriumProblem,
    cap: f64,
    rng: &mut StdRng,
    scale: f64,
) -> SolverResult<(DVector<f64>, DVector<f64>)> {
    let mut scale = scale;
    let mut redraws = 0;
    loop {
        let mut lambda =
            DVector::from_fn(problem.num_strands(), |_, _| cap + rng.gen_range(-scale..=scale));
        apply_inert_correction(problem, &mut lambda);
        match mole_fractions(problem, &lambda) {
            Ok(x) => return Ok((lambda, x)),
            Err(e) => {
                redraws += 1;
                if redraws >= MAX_PERTURB_REDRAWS {
                    return Err(e);
                }
                scale *= 0.5;
            }
        }
    }
}
