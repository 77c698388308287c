//! Error types for solver operations.

use nq_core::NqError;
use thiserror::Error;

/// Process exit status for overflow aborts. Sibling executables parse this
/// code; the library itself only ever returns the structured error.
pub const OVERFLOW_EXIT_CODE: i32 = 144;

/// Errors that can occur while setting up or running an equilibrium solve.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("Exponent overflow for complex {complex}: log x = {logx} exceeds the safe range")]
    Overflow { complex: usize, logx: f64 },

    #[error("Numeric error: {what}")]
    Numeric { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// Exit status for process-level callers that surface errors as codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            SolverError::Overflow { .. } => OVERFLOW_EXIT_CODE,
            _ => 1,
        }
    }
}

impl From<SolverError> for NqError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::ProblemSetup { what: _ } => NqError::InvalidArg {
                what: "problem setup",
            },
            SolverError::Overflow { .. } => NqError::Invariant {
                what: "exponent overflow",
            },
            SolverError::Numeric { what: _ } => NqError::InvalidArg { what: "numeric" },
        }
    }
}
