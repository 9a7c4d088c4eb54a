//! One sample of a node's geometry, shared between instance nodes.
//!
//! An [`ObjectWrapper`] owns the data object built for one motion sample and
//! remembers the retained-object handle the first time it is written, so
//! every later instance only references it. Wrappers are reference counted
//! by the nodes holding them: the data is released when the last node lets
//! go, which may be before the wrapper itself is dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::{AnimType, AttributeSource, ObjectType};
use crate::data::{DataObject, RibPrimitive};
use crate::rib::{LightHandle, ObjectHandle, RibEncoder};
use crate::util::{matrices_equal, DMat4, Result};

/// Wrapper shared by every node referencing the same sample.
pub type SharedObject = Arc<Mutex<ObjectWrapper>>;

/// Render visibility read from the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeVisibility {
    /// Not rendered in the final pass.
    pub ignore: bool,
    /// Not rendered into shadow maps.
    pub ignore_shadow: bool,
    pub receive_shadow: bool,
}

impl Default for ShapeVisibility {
    fn default() -> Self {
        Self { ignore: false, ignore_shadow: false, receive_shadow: true }
    }
}

impl ShapeVisibility {
    pub fn from_attributes(attrs: &dyn AttributeSource) -> Self {
        let visible = attrs.get_bool("visibility").unwrap_or(true);
        let primary = attrs.get_bool("primaryVisibility").unwrap_or(true);
        let templated = attrs.get_bool("template").unwrap_or(false);
        let casts = attrs.get_bool("castsShadows").unwrap_or(true);
        Self {
            ignore: !visible || !primary || templated,
            ignore_shadow: !visible || !casts || templated,
            receive_shadow: attrs.get_bool("receiveShadows").unwrap_or(true),
        }
    }
}

#[derive(Debug)]
pub struct ObjectWrapper {
    object_type: ObjectType,
    data: Option<DataObject>,
    handle: Option<ObjectHandle>,
    ref_count: u32,
    /// World matrix of every instance of the shape, by instance number.
    instances: Vec<DMat4>,
    visibility: ShapeVisibility,
}

impl ObjectWrapper {
    /// Wrapper with no references yet.
    pub fn new(data: DataObject, instances: Vec<DMat4>, visibility: ShapeVisibility) -> Self {
        Self {
            object_type: data.object_type(),
            data: Some(data),
            handle: None,
            ref_count: 0,
            instances,
            visibility,
        }
    }

    /// Shared wrapper, see [`new`](Self::new).
    pub fn shared(data: DataObject, instances: Vec<DMat4>, visibility: ShapeVisibility) -> SharedObject {
        Arc::new(Mutex::new(Self::new(data, instances, visibility)))
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn data(&self) -> Option<&DataObject> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut DataObject> {
        self.data.as_mut()
    }

    /// Retained-object handle, set once the geometry has been defined.
    pub fn handle(&self) -> Option<ObjectHandle> {
        self.handle
    }

    pub fn light_handle(&self) -> Option<LightHandle> {
        self.data.as_ref().and_then(DataObject::light_handle)
    }

    pub fn visibility(&self) -> ShapeVisibility {
        self.visibility
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// World matrix of instance `instance`.
    pub fn matrix(&self, instance: usize) -> Option<DMat4> {
        self.instances.get(instance).copied()
    }

    /// Record the matrix of instance `instance`, growing the table with identities.
    pub fn set_matrix(&mut self, instance: usize, m: DMat4) {
        if self.instances.len() <= instance {
            self.instances.resize(instance + 1, DMat4::IDENTITY);
        }
        self.instances[instance] = m;
    }

    /// Take a reference.
    pub fn retain(&mut self) {
        self.ref_count += 1;
    }

    /// Drop a reference. The data object and handle are released at zero;
    /// returns true when that happened.
    pub fn release(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        if self.ref_count > 0 {
            return false;
        }
        if let Some(data) = self.data.take() {
            debug!(object = data.name(), "released data object");
        }
        self.handle = None;
        true
    }

    pub fn forget_handle(&mut self) {
        self.handle = None;
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn granularity(&self) -> u32 {
        self.data.as_ref().map_or(0, DataObject::granularity)
    }

    /// Matrix of `instance` against the same instance of `other`.
    pub fn compare_matrix(&self, other: &ObjectWrapper, instance: usize) -> AnimType {
        match (self.matrix(instance), other.matrix(instance)) {
            (Some(a), Some(b)) if matrices_equal(&a, &b) => AnimType::Const,
            (Some(_), Some(_)) => AnimType::Animated,
            _ => AnimType::Incompatible,
        }
    }

    /// Geometry against the geometry of `other`.
    pub fn compare_body(&self, other: &ObjectWrapper) -> AnimType {
        if self.object_type != other.object_type {
            return AnimType::Incompatible;
        }
        match (&self.data, &other.data) {
            (Some(a), Some(b)) if a.compare(b) => AnimType::Const,
            (Some(_), Some(_)) => AnimType::Animated,
            _ => AnimType::Const,
        }
    }

    /// Write the geometry for the current node.
    ///
    /// Retained kinds are defined inside `ObjectBegin`/`ObjectEnd` on the
    /// first call and referenced through their handle on every call. Other
    /// kinds are written in place each time.
    pub fn write_object(&mut self, enc: &mut RibEncoder) -> Result<()> {
        if self.instances.is_empty() {
            debug!(kind = %self.object_type, "no instances; nothing written");
            return Ok(());
        }
        let Some(data) = self.data.as_mut() else {
            debug!(kind = %self.object_type, "data released; nothing written");
            return Ok(());
        };
        if !self.object_type.is_retained() {
            return data.write(enc);
        }
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = enc.object_begin()?;
                data.write(enc)?;
                enc.object_end()?;
                debug!(object = data.name(), handle = handle.id(), "defined retained object");
                self.handle = Some(handle);
                handle
            }
        };
        enc.object_instance(handle)
    }

    /// Reference the object once per recorded instance, each under its own
    /// world matrix.
    pub fn write_instances(&mut self, enc: &mut RibEncoder) -> Result<()> {
        for instance in 0..self.instances.len() {
            enc.transform_begin()?;
            enc.transform(&self.instances[instance])?;
            self.write_object(enc)?;
            enc.transform_end()?;
        }
        Ok(())
    }

    /// Write one grain by index, outside the handle cache.
    pub fn write_grain(&mut self, grain: u32, enc: &mut RibEncoder) -> Result<()> {
        match self.data.as_mut() {
            Some(data) if grain < data.granularity() => {
                data.data_mut().write_grain(grain, enc)
            }
            _ => Ok(()),
        }
    }

    pub fn is_grain_animated(&self, grain: u32) -> bool {
        self.data
            .as_ref()
            .is_some_and(|d| d.data().is_grain_animated(grain))
    }
}
