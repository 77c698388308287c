//! Trust-region iteration over the dual objective.

use crate::dogleg::{StepStats, dogleg_step};
use crate::error::{SolverError, SolverResult};
use crate::evaluate::{dual_objective, gradient, hessian, is_converged, mole_fractions};
use crate::problem::EquilibriumProblem;
use nalgebra::DVector;
use tracing::trace;

/// Relative window for deciding that a step landed on the region boundary.
const BOUNDARY_WINDOW: f64 = 1e-10;

/// Trust-region solver configuration.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrustRegionConfig {
    /// Maximum iterations per attempt
    pub max_iters: usize,
    /// Relative tolerance on the mass-balance residual, per strand
    pub tol: f64,
    /// Upper bound on the trust radius
    pub delta_bar: f64,
    /// Step acceptance threshold, in (0, 1/4)
    pub eta: f64,
    /// Consecutive rejected steps before the attempt is abandoned
    pub max_no_step: usize,
    /// Total attempts (the first plus perturbed restarts)
    pub max_trial: usize,
    /// Initial half-width of the restart perturbation
    pub perturb_scale: f64,
    /// Random seed for restart perturbations; 0 derives one from the clock
    pub seed: u64,
}

impl Default for TrustRegionConfig {
    fn default() -> Self {
        Self {
            max_iters: 10_000,
            tol: 1e-8,
            delta_bar: 1000.0,
            eta: 0.125,
            max_no_step: 50,
            max_trial: 100,
            perturb_scale: 100.0,
            seed: 0,
        }
    }
}

impl TrustRegionConfig {
    /// Check the documented parameter ranges.
    pub fn validate(&self) -> SolverResult<()> {
        if self.max_iters == 0 {
            return Err(SolverError::ProblemSetup {
                what: "max_iters must be at least 1".to_string(),
            });
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!("tol = {} must be strictly positive", self.tol),
            });
        }
        if !(self.delta_bar.is_finite() && self.delta_bar > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!("delta_bar = {} must be strictly positive", self.delta_bar),
            });
        }
        if !(self.eta > 0.0 && self.eta < 0.25) {
            return Err(SolverError::ProblemSetup {
                what: format!("eta = {} must lie in (0, 1/4)", self.eta),
            });
        }
        if self.max_no_step == 0 {
            return Err(SolverError::ProblemSetup {
                what: "max_no_step must be at least 1".to_string(),
            });
        }
        if self.max_trial == 0 {
            return Err(SolverError::ProblemSetup {
                what: "max_trial must be at least 1".to_string(),
            });
        }
        if !(self.perturb_scale.is_finite() && self.perturb_scale > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "perturb_scale = {} must be strictly positive",
                    self.perturb_scale
                ),
            });
        }
        Ok(())
    }
}

/// Per-iteration state handed to the attempt observer.
#[derive(Clone, Copy, Debug)]
pub struct IterationRecord {
    pub iteration: usize,
    pub objective: f64,
    pub grad_norm: f64,
    pub rho: f64,
    pub delta: f64,
    pub accepted: bool,
}

/// How an attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Converged,
    /// Too many consecutive rejected steps
    Stalled,
    /// Iteration budget exhausted
    IterationsExhausted,
}

pub(crate) struct AttemptReport {
    pub outcome: AttemptOutcome,
    pub iterations: usize,
}

/// One trust-region attempt from the given starting point.
///
/// `lambda` and `x` must be consistent on entry (x is the mole-fraction
/// image of lambda) and are left consistent on exit, whatever the outcome.
pub(crate) fn run_attempt(
    problem: &EquilibriumProblem,
    lambda: &mut DVector<f64>,
    x: &mut DVector<f64>,
    config: &TrustRegionConfig,
    stats: &mut StepStats,
    mut observer: Option<&mut dyn FnMut(IterationRecord)>,
) -> AttemptReport {
    let mut delta = 0.99 * config.delta_bar;
    let mut no_step = 0usize;
    let mut iters = 0usize;
    let mut grad = gradient(problem, x);

    loop {
        if is_converged(&grad, problem.x0(), config.tol) {
            return AttemptReport {
                outcome: AttemptOutcome::Converged,
                iterations: iters,
            };
        }
        if iters >= config.max_iters {
            return AttemptReport {
                outcome: AttemptOutcome::IterationsExhausted,
                iterations: iters,
            };
        }
        if no_step >= config.max_no_step {
            return AttemptReport {
                outcome: AttemptOutcome::Stalled,
                iterations: iters,
            };
        }

        let hess = hessian(problem, x);
        let (p, kind) = dogleg_step(&grad, &hess, delta);
        stats.record(kind);
        let p_norm = p.norm();

        // Ratio of actual to predicted reduction, evaluated at a scratch
        // trial point. An overflowing trial is scored -1 so the step is
        // rejected and the radius shrinks.
        let trial_lambda = &*lambda + &p;
        let trial = mole_fractions(problem, &trial_lambda);
        let rho = match &trial {
            Ok(x_trial) => {
                let actual = dual_objective(x, lambda, problem.x0())
                    - dual_objective(x_trial, &trial_lambda, problem.x0());
                let predicted = -grad.dot(&p) - 0.5 * (&hess * &p).dot(&p);
                actual / predicted
            }
            Err(_) => -1.0,
        };

        if rho < 0.25 {
            delta /= 4.0;
        } else if rho > 0.75 && p_norm >= delta * (1.0 - BOUNDARY_WINDOW) {
            delta = (2.0 * delta).min(config.delta_bar);
        }

        let accepted = rho > config.eta;
        if accepted {
            if let Ok(x_trial) = trial {
                *lambda = trial_lambda;
                *x = x_trial;
                grad = gradient(problem, x);
            }
            no_step = 0;
        } else {
            no_step += 1;
        }

        trace!(
            iteration = iters,
            step = ?kind,
            rho,
            delta,
            accepted,
            "trust-region iteration"
        );
        if let Some(observer) = observer.as_mut() {
            observer(IterationRecord {
                iteration: iters,
                objective: dual_objective(x, lambda, problem.x0()),
                grad_norm: grad.norm(),
                rho,
                delta,
                accepted,
            });
        }
        iters += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        TrustRegionConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_eta() {
        let config = TrustRegionConfig {
            eta: 0.25,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = TrustRegionConfig {
            eta: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budgets() {
        for config in [
            TrustRegionConfig {
                max_iters: 0,
                ..Default::default()
            },
            TrustRegionConfig {
                max_no_step: 0,
                ..Default::default()
            },
            TrustRegionConfig {
                max_trial: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn attempt_converges_on_homodimer() {
        let problem = EquilibriumProblem::new(
            &[vec![1, 2]],
            &[0.0, -1.0],
            &[1e-4],
            0.6163,
            55.14,
        )
        .unwrap();
        let config = TrustRegionConfig::default();
        let mut lambda = crate::initialization::fresh_guess(&problem);
        let mut x = mole_fractions(&problem, &lambda).unwrap();
        let mut stats = StepStats::default();
        let report = run_attempt(&problem, &mut lambda, &mut x, &config, &mut stats, None);
        assert_eq!(report.outcome, AttemptOutcome::Converged);
        let grad = gradient(&problem, &x);
        assert!(is_converged(&grad, problem.x0(), config.tol));
        assert_eq!(stats.total(), report.iterations);
    }
}
