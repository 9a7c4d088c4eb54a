//! Core types shared across the crate.
//!
//! - [`ObjectType`], [`LightType`], [`AnimType`] and friends tag what a data
//!   object is and how it changed between samples.
//! - [`AttributeSource`] is the host-side attribute getter data objects pull from.
//! - [`RenderSettings`] / [`FrameInfo`] carry job and frame state explicitly.

mod attributes;
mod settings;
mod types;

pub use attributes::*;
pub use settings::*;
pub use types::*;
