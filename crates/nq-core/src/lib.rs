//! nq-core: stable foundation for nucleq.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{NqError, NqResult};
pub use numeric::*;
