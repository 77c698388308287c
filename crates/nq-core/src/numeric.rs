use crate::NqError;

/// Floating point type used throughout the suite
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Residual test against a per-component scale: |residual| <= tol * scale.
/// Mass-balance convergence checks are phrased this way, one scale per
/// conserved quantity.
pub fn within_scaled_tol(residual: Real, scale: Real, tol: Real) -> bool {
    residual.abs() <= tol * scale
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, NqError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(NqError::NonFinite { what, value: v })
    }
}
