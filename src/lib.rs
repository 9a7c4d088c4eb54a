//! # liquid-rib
//!
//! RenderMan RIB emission for scene translators: primitive data objects,
//! a motion-sample aware scene registry with instance sharing, and an
//! encoder writing ASCII or binary RIB, optionally gzip-compressed.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math helpers
//! - [`core`] - Object kinds, host attributes and render settings
//! - [`token`] - Parameter records bound to primitive calls
//! - [`rib`] - The RIB encoder and its output stream
//! - [`data`] - Geometry and light data objects
//! - [`scene`] - Registry, object handles and frame emission
//!
//! ## Example
//!
//! ```ignore
//! use liquid_rib::prelude::*;
//!
//! let scene = SceneDescription::load("scene.json")?;
//! let mut registry = Registry::new();
//! scene.populate(&mut registry)?;
//!
//! let mut enc = RibEncoder::create("scene.rib", EncoderConfig::ascii())?;
//! emit_frame(&mut registry, &scene.settings, &scene.options, &mut enc)?;
//! enc.finish()?;
//! ```

pub mod util;
pub mod core;
pub mod token;
pub mod rib;
pub mod data;
pub mod scene;

// Re-export commonly used types
pub use util::{Error, Result};
pub use rib::{EncoderConfig, RibEncoder};
pub use scene::{Registry, SceneDescription};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::core::{AttributeMap, AttributeSource, ObjectType, RenderPass, RenderSettings};
    pub use crate::rib::{DeclarationMode, EncoderConfig, RibCompression, RibEncoder, RibFormat};
    pub use crate::data::{DataObject, RibData, RibGenRegistry, RibGenerator, RibStatus};
    pub use crate::scene::{
        emit_frame, EmitOptions, HostObject, Insertion, Registry, SceneDescription, SceneEmitter,
    };
}
