//! Equilibrium concentration solver for dilute nucleic-acid systems.
//!
//! Given a catalog of complexes assembled from a fixed set of monomer
//! strands, each complex with a standard free energy in kT units, this crate
//! computes the equilibrium mole fraction of every complex subject to mass
//! conservation of each strand. The solver minimizes the convex dual of the
//! free-energy functional with a trust-region method using dogleg steps:
//! Newton directions come from a Cholesky factorization of the dual Hessian,
//! with steepest-descent fallbacks when the factorization fails, and failed
//! attempts restart from randomly perturbed initial conditions.

pub mod dogleg;
pub mod error;
pub mod evaluate;
pub mod initialization;
pub mod problem;
pub mod solve;
pub mod trust_region;

pub use dogleg::{StepKind, StepStats};
pub use error::{OVERFLOW_EXIT_CODE, SolverError, SolverResult};
pub use evaluate::MAX_LOG_X;
pub use problem::EquilibriumProblem;
pub use solve::{EquilibriumSolution, SolveProgressEvent, solve, solve_with_progress};
pub use trust_region::TrustRegionConfig;
