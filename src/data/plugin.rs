//! External geometry generators.
//!
//! Two extension points exist:
//!
//! - RibGen generators, created by name from a [`RibGenRegistry`] and handed
//!   a [`RibStatus`] snapshot each time they write
//! - host-supplied [`CustomGeometry`] objects, wrapped as they are
//!
//! A failing generator never aborts the frame: non-fatal errors are logged
//! and the object is skipped. Stream errors still propagate.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType, RenderPass, SampleTimes};
use crate::rib::{RibCompression, RibEncoder};
use crate::util::{DMat4, Error, Result};

/// Render state handed to a RibGen generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RibStatus {
    pub object_name: String,
    pub frame: i64,
    pub render_pass: RenderPass,
    pub transformation_blur: bool,
    pub deformation_blur: bool,
    pub compressed: bool,
    pub binary: bool,
    /// World-to-camera matrix of the render camera.
    pub camera_matrix: DMat4,
    pub sample_times: SampleTimes,
    pub motion_samples: usize,
    pub shutter_angle: f32,
}

impl RibStatus {
    /// Snapshot of the encoder's current frame for `object_name`.
    pub fn new(object_name: &str, enc: &RibEncoder) -> Self {
        let frame = enc.frame();
        Self {
            object_name: object_name.to_string(),
            frame: frame.frame,
            render_pass: frame.pass,
            transformation_blur: frame.transformation_blur,
            deformation_blur: frame.deformation_blur,
            compressed: enc.config().compression == RibCompression::Gzip,
            binary: enc.is_binary(),
            camera_matrix: frame.camera_matrix,
            sample_times: frame.sample_times.clone(),
            motion_samples: frame.motion_samples(),
            shutter_angle: frame.shutter_angle,
        }
    }
}

/// Procedural generator writing arbitrary requests for one node.
pub trait RibGenerator: Send {
    fn generate(&mut self, status: &RibStatus, enc: &mut RibEncoder) -> Result<()>;

    /// False when the generated output changes between samples.
    fn compare(&self, _status: &RibStatus) -> bool {
        true
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn RibGenerator> + Send + Sync>;

/// Named generator factories.
///
/// Creating a generator calls its factory; dropping the box destroys it.
#[derive(Clone, Default)]
pub struct RibGenRegistry {
    factories: BTreeMap<String, Factory>,
}

impl RibGenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn RibGenerator> + Send + Sync + 'static,
    {
        if self.factories.insert(name.to_string(), Arc::new(factory)).is_some() {
            debug!(plugin = name, "replaced RibGen factory");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// New generator instance from the factory registered as `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn RibGenerator>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::plugin(name, "no generator registered under this name"))?;
        Ok(factory())
    }
}

impl fmt::Debug for RibGenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RibGenRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Node whose geometry comes from a RibGen generator.
///
/// Host attribute: `liquidRibGen` names the registered generator.
pub struct RibGenData {
    name: String,
    plugin: String,
    generator: Option<Box<dyn RibGenerator>>,
    status: Option<RibStatus>,
}

impl RibGenData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource, registry: &RibGenRegistry) -> Result<Self> {
        let plugin = attrs
            .get_string("liquidRibGen")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| super::missing(name, "liquidRibGen"))?;
        let generator = registry.create(&plugin)?;
        Ok(Self::new(name, plugin, generator))
    }

    pub fn new(name: &str, plugin: impl Into<String>, generator: Box<dyn RibGenerator>) -> Self {
        Self {
            name: format!("{name}RIBGEN"),
            plugin: plugin.into(),
            generator: Some(generator),
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Status passed on the last write.
    pub fn status(&self) -> Option<&RibStatus> {
        self.status.as_ref()
    }
}

impl fmt::Debug for RibGenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RibGenData")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .field("loaded", &self.generator.is_some())
            .finish()
    }
}

impl RibPrimitive for RibGenData {
    fn object_type(&self) -> ObjectType {
        ObjectType::RibGen
    }

    fn granularity(&self) -> u32 {
        u32::from(self.generator.is_some())
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let Some(generator) = self.generator.as_mut() else {
            return Ok(());
        };
        let status = RibStatus::new(&self.name, enc);
        let result = generator.generate(&status, enc);
        self.status = Some(status);
        skip_plugin_failure(&self.plugin, result)
    }

    fn compare(&self, other: &RibData) -> bool {
        let RibData::RibGen(_) = other else {
            return false;
        };
        match (&self.generator, &self.status) {
            (Some(generator), Some(status)) => generator.compare(status),
            _ => true,
        }
    }

    /// Generators are never deformation blurred.
    fn is_grain_animated(&self, _grain: u32) -> bool {
        false
    }
}

/// Host-supplied geometry writer.
pub trait CustomGeometry: Send {
    fn write(&mut self, enc: &mut RibEncoder) -> Result<()>;

    /// True when `other` writes the same geometry.
    fn compare(&self, other: &dyn CustomGeometry) -> bool;

    fn as_any(&self) -> &dyn Any;
}

pub struct CustomData {
    name: String,
    geometry: Box<dyn CustomGeometry>,
}

impl CustomData {
    pub fn new(name: &str, geometry: Box<dyn CustomGeometry>) -> Self {
        Self { name: name.to_string(), geometry }
    }

    pub fn geometry(&self) -> &dyn CustomGeometry {
        self.geometry.as_ref()
    }
}

impl fmt::Debug for CustomData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomData").field("name", &self.name).finish_non_exhaustive()
    }
}

impl RibPrimitive for CustomData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Custom
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let result = self.geometry.write(enc);
        skip_plugin_failure(&self.name, result)
    }

    fn compare(&self, other: &RibData) -> bool {
        match other {
            RibData::Custom(other) => self.geometry.compare(other.geometry.as_ref()),
            _ => false,
        }
    }
}

fn skip_plugin_failure(plugin: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(e) if !e.is_fatal() => {
            warn!(plugin, error = %e, "plugin failed; object skipped");
            Ok(())
        }
        other => other,
    }
}
