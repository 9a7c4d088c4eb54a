//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam and the congruence helpers used by
//!   animation detection

mod error;
mod math;

pub use error::*;
pub use math::*;
