//! Scene registry and frame emission.
//!
//! - [`host`]: the [`HostObject`] view objects are registered from
//! - [`object`]: per-sample geometry wrappers with handle caching and
//!   reference counts
//! - [`node`]: registry nodes and their render attributes
//! - [`registry`]: node lookup, chaining and instance sharing
//! - [`emit`]: writing a registry as a RIB frame
//! - [`description`]: JSON scenes for the command-line tool

pub mod description;
pub mod emit;
pub mod host;
pub mod node;
pub mod object;
pub mod registry;

pub use description::{ObjectDescription, PopulateReport, SceneDescription};
pub use emit::{emit_frame, EmitOptions, EmitStats, SceneEmitter};
pub use host::HostObject;
pub use node::{NodeAttributes, NodeId, SceneNode};
pub use object::{ObjectWrapper, ShapeVisibility, SharedObject};
pub use registry::{Insertion, Registry, RegistrySummary};
