//! Token/parameter marshalling.
//!
//! [`ParameterRecord`] packs one named, typed, detail-classed parameter for
//! the encoder; [`list`] holds helpers over whole parameter lists.

pub mod list;
mod record;

pub use list::ParameterList;
pub use record::*;
