//! Dogleg solution of the trust-region sub-problem.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// Which branch produced the step. Kept for diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// Full Newton step, interior to the region
    Newton,
    /// Steepest-descent step truncated to the boundary
    Cauchy,
    /// Truncated steepest-descent after a failed factorization
    CholeskyFailCauchy,
    /// Full steepest-descent minimizer after a failed factorization
    CholeskyFailFullCauchy,
    /// Convex combination of the steepest-descent and Newton points
    Dogleg,
    /// No combination root in [0, 1]; fell back to the steepest-descent point
    DoglegRootFail,
}

/// Per-attempt step counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepStats {
    pub newton: usize,
    pub cauchy: usize,
    pub cholesky_fail_cauchy: usize,
    pub cholesky_fail_full_cauchy: usize,
    pub dogleg: usize,
    pub dogleg_root_fail: usize,
}

impl StepStats {
    pub fn record(&mut self, kind: StepKind) {
        match kind {
            StepKind::Newton => self.newton += 1,
            StepKind::Cauchy => self.cauchy += 1,
            StepKind::CholeskyFailCauchy => self.cholesky_fail_cauchy += 1,
            StepKind::CholeskyFailFullCauchy => self.cholesky_fail_full_cauchy += 1,
            StepKind::Dogleg => self.dogleg += 1,
            StepKind::DoglegRootFail => self.dogleg_root_fail += 1,
        }
    }

    /// Total steps recorded across all branches.
    pub fn total(&self) -> usize {
        self.newton
            + self.cauchy
            + self.cholesky_fail_cauchy
            + self.cholesky_fail_full_cauchy
            + self.dogleg
            + self.dogleg_root_fail
    }
}

/// Minimize the local quadratic model g.p + p.H.p/2 over ||p|| <= delta.
///
/// Tries the Newton point first (Cholesky factorization; a non-positive-
/// definite Hessian fails the factorization without aborting), then the
/// Cauchy point, then the dogleg combination of the two.
pub fn dogleg_step(g: &DVector<f64>, h: &DMatrix<f64>, delta: f64) -> (DVector<f64>, StepKind) {
    let delta2 = delta * delta;

    let newton = h.clone().cholesky().map(|chol| chol.solve(&(-g)));
    if let Some(p_b) = &newton {
        if p_b.norm_squared() <= delta2 {
            return (p_b.clone(), StepKind::Newton);
        }
    }

    // Unconstrained minimizer along -g. Curvature along g can underflow to
    // zero when every mole fraction has; fall back to a boundary-length
    // descent step in that case.
    let gg = g.norm_squared();
    let ghg = (h * g).dot(g);
    let p_u = if ghg > 0.0 {
        g * (-gg / ghg)
    } else {
        g * (-delta / gg.sqrt())
    };

    let pu2 = p_u.norm_squared();
    if pu2 >= delta2 {
        let p = &p_u * (delta / pu2.sqrt());
        let kind = if newton.is_some() {
            StepKind::Cauchy
        } else {
            StepKind::CholeskyFailCauchy
        };
        return (p, kind);
    }
    let Some(p_b) = newton else {
        return (p_u, StepKind::CholeskyFailFullCauchy);
    };

    // ||p_u + alpha (p_b - p_u)||^2 = delta^2, alpha in [0, 1]. Stable
    // quadratic form: q = -(b + sgn(b) sqrt(b^2 - 4ac)) / 2, roots c/q, q/a.
    let pb2 = p_b.norm_squared();
    let pbpu = p_b.dot(&p_u);
    let a = pb2 + pu2 - 2.0 * pbpu;
    let b = 2.0 * (pbpu - pu2);
    let c = pu2 - delta2;
    let q = -0.5 * (b + b.signum() * (b * b - 4.0 * a * c).sqrt());
    let alpha = [c / q, q / a]
        .into_iter()
        .find(|r| (0.0..=1.0).contains(r));

    match alpha {
        Some(alpha) => (&p_u + (&p_b - &p_u) * alpha, StepKind::Dogleg),
        None => {
            warn!(
                root_a = c / q,
                root_b = q / a,
                "dogleg combination has no root in [0, 1]; taking the Cauchy point"
            );
            (p_u, StepKind::DoglegRootFail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newton_step_when_interior() {
        let h = DMatrix::identity(2, 2);
        let g = DVector::from_vec(vec![0.3, 0.4]);
        let (p, kind) = dogleg_step(&g, &h, 1.0);
        assert_eq!(kind, StepKind::Newton);
        assert!((p[0] + 0.3).abs() < 1e-15);
        assert!((p[1] + 0.4).abs() < 1e-15);
    }

    #[test]
    fn cauchy_step_truncated_to_boundary() {
        let h = DMatrix::identity(2, 2);
        let g = DVector::from_vec(vec![3.0, 4.0]);
        let (p, kind) = dogleg_step(&g, &h, 1.0);
        assert_eq!(kind, StepKind::Cauchy);
        assert!((p.norm() - 1.0).abs() < 1e-12);
        assert!((p[0] + 0.6).abs() < 1e-12);
        assert!((p[1] + 0.8).abs() < 1e-12);
    }

    #[test]
    fn dogleg_step_lands_on_boundary() {
        let h = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 100.0]));
        let g = DVector::from_vec(vec![1.0, 1.0]);
        let delta = 0.5;
        let (p, kind) = dogleg_step(&g, &h, delta);
        assert_eq!(kind, StepKind::Dogleg);
        assert!((p.norm() - delta).abs() < 1e-12);
    }

    #[test]
    fn indefinite_hessian_takes_cauchy_branches() {
        // det < 0: Cholesky must fail without aborting
        let h = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let g = DVector::from_vec(vec![1.0, 0.0]);

        // curvature along g is positive, so the full minimizer is -g
        let (p, kind) = dogleg_step(&g, &h, 2.0);
        assert_eq!(kind, StepKind::CholeskyFailFullCauchy);
        assert!((p[0] + 1.0).abs() < 1e-15);

        let (p, kind) = dogleg_step(&g, &h, 0.5);
        assert_eq!(kind, StepKind::CholeskyFailCauchy);
        assert!((p.norm() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn stats_count_every_branch() {
        let mut stats = StepStats::default();
        stats.record(StepKind::Newton);
        stats.record(StepKind::Newton);
        stats.record(StepKind::Dogleg);
        assert_eq!(stats.newton, 2);
        assert_eq!(stats.dogleg, 1);
        assert_eq!(stats.total(), 3);
    }
}
