//! The scene registry: every renderable node of a frame, keyed by name and
//! kind, with instance sharing.
//!
//! Nodes live in an arena in insertion order, which is also the order they
//! are written in. Nodes with the same name and kind form a chain; a chain
//! holds one node per instance string (particle instancing puts several
//! copies of one shape under the same path). Nodes whose shape was already
//! seen share that shape's object wrapper for each sample, so its geometry
//! is defined once and referenced by handle.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use super::host::HostObject;
use super::node::{NodeAttributes, NodeId, SceneNode};
use super::object::{ObjectWrapper, ShapeVisibility, SharedObject};
use crate::core::{ObjectType, MAX_MOTION_SAMPLES};
use crate::data::{CustomData, DataObject, RibData, RibGenData, RibGenRegistry};
use crate::util::{DMat4, Error, Result};

/// Everything that identifies one insertion besides the host object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insertion<'a> {
    pub object_type: ObjectType,
    /// Motion sample index, `0..MAX_MOTION_SAMPLES`.
    pub sample: usize,
    /// Explicit instancing matrix, combined with the host's exclusive matrix.
    pub matrix: Option<DMat4>,
    /// Particle-instancing qualifier; empty for ordinary shapes.
    pub instance_str: &'a str,
    pub particle_id: Option<i32>,
}

impl<'a> Insertion<'a> {
    pub fn new(object_type: ObjectType, sample: usize) -> Self {
        Self { object_type, sample, matrix: None, instance_str: "", particle_id: None }
    }

    pub fn with_matrix(mut self, matrix: DMat4) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn with_instance(mut self, instance_str: &'a str, particle_id: Option<i32>) -> Self {
        self.instance_str = instance_str;
        self.particle_id = particle_id;
        self
    }
}

/// Counts reported by [`Registry::summary`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RegistrySummary {
    pub nodes: usize,
    /// Nodes sharing another node's geometry.
    pub instances: usize,
    pub by_kind: BTreeMap<String, usize>,
    /// Largest number of samples stored on a node.
    pub max_samples: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    nodes: Vec<SceneNode>,
    chains: HashMap<(String, ObjectType), NodeId>,
    shapes: HashMap<(String, ObjectType), NodeId>,
    generators: RibGenRegistry,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry creating RibGen objects from `generators`.
    pub fn with_generators(generators: RibGenRegistry) -> Self {
        Self {
            nodes: Vec::new(),
            chains: HashMap::new(),
            shapes: HashMap::new(),
            generators,
        }
    }

    pub fn generators(&self) -> &RibGenRegistry {
        &self.generators
    }

    pub fn generators_mut(&mut self) -> &mut RibGenRegistry {
        &mut self.generators
    }

    /// Record `host` at the sample given by `ins`.
    ///
    /// An existing node with the same path and instance string is reused,
    /// replacing (and releasing) whatever it held at that sample. A new
    /// node is appended to its chain and, when its shape is already known,
    /// shares that node's wrapper instead of building new geometry. When
    /// the data object cannot be built nothing is registered.
    pub fn insert(&mut self, host: &dyn HostObject, ins: &Insertion<'_>) -> Result<NodeId> {
        if ins.sample >= MAX_MOTION_SAMPLES {
            return Err(Error::other(format!(
                "{}: sample {} exceeds the limit of {}",
                host.path(),
                ins.sample,
                MAX_MOTION_SAMPLES
            )));
        }

        let path = host.path();
        let name = match ins.object_type {
            ObjectType::RibGen => format!("{path}RIBGEN"),
            _ => path.to_string(),
        };
        let object_id = host.object_id();

        let mut found = None;
        let mut source = None;
        let mut tail = None;
        let mut cursor = self.chains.get(&(name.clone(), ins.object_type)).copied();
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if node.path() == path && node.instance_str() == ins.instance_str {
                found = Some(id);
                break;
            }
            if source.is_none() && node.object_id() == object_id {
                source = Some(id);
            }
            tail = Some(id);
            cursor = node.next;
        }

        let instance_of = match found {
            Some(id) => self.nodes[id.0].instance_of,
            None => source.or_else(|| self.shapes.get(&(object_id.to_string(), ins.object_type)).copied()),
        };
        let shared = instance_of
            .and_then(|src| self.nodes[src.0].object(ins.sample).cloned())
            .filter(|o| o.lock().object_type() == ins.object_type);
        let object = match shared {
            Some(object) => object,
            None => self.build_object(&name, host, ins)?,
        };
        object.lock().retain();

        let id = match found {
            Some(id) => id,
            None => {
                let id = NodeId(self.nodes.len());
                let mut node = SceneNode::new(&name, path, object_id, ins.object_type, ins.instance_str);
                node.set_instance_number(host.instance_number());
                node.instance_of = instance_of;
                self.nodes.push(node);
                match tail {
                    Some(tail) => self.nodes[tail.0].next = Some(id),
                    None => {
                        self.chains.insert((name.clone(), ins.object_type), id);
                    }
                }
                self.shapes.entry((object_id.to_string(), ins.object_type)).or_insert(id);
                id
            }
        };

        let node = &mut self.nodes[id.0];
        if ins.sample == 0 {
            let mut attributes = NodeAttributes::from_attributes(host.node_attributes());
            if !ins.instance_str.is_empty() {
                attributes.motion.deformation_blur = false;
            }
            node.set_attributes(attributes);
        }
        node.set_object(ins.sample, object);
        node.set_override(ins.sample, ins.matrix.map(|m| m * host.exclusive_matrix()));
        if ins.particle_id.is_some() {
            node.set_particle_id(ins.particle_id);
        }

        debug!(
            node = %name,
            kind = %ins.object_type,
            sample = ins.sample,
            instance = ins.instance_str,
            shared = node.instance_of().is_some(),
            "registered"
        );
        Ok(id)
    }

    fn build_object(&self, name: &str, host: &dyn HostObject, ins: &Insertion<'_>) -> Result<SharedObject> {
        let shape = host.shape_attributes();
        let data = match ins.object_type {
            ObjectType::RibGen => {
                RibData::RibGen(RibGenData::from_attributes(host.path(), shape, &self.generators)?)
            }
            ObjectType::Custom => {
                let geometry = host.custom_geometry().ok_or_else(|| {
                    Error::plugin(name, "custom shape supplied no geometry writer")
                })?;
                RibData::Custom(CustomData::new(name, geometry))
            }
            kind => RibData::from_attributes(kind, name, shape)?,
        };
        Ok(ObjectWrapper::shared(
            DataObject::new(name, data),
            host.instance_matrices(),
            ShapeVisibility::from_attributes(shape),
        ))
    }

    /// Node registered under `name` and `object_type` whose path is `path`.
    pub fn find(&self, name: &str, path: &str, object_type: ObjectType) -> Option<NodeId> {
        let mut cursor = self.chains.get(&(name.to_string(), object_type)).copied();
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if node.path() == path {
                return Some(id);
            }
            cursor = node.next;
        }
        None
    }

    /// Light node at `path`.
    pub fn find_light(&self, path: &str) -> Option<NodeId> {
        self.find(path, path, ObjectType::Light)
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Classify every node's animation across `samples` samples.
    pub fn update_anim(&mut self, samples: usize) {
        for node in &mut self.nodes {
            node.update_anim(samples);
        }
    }

    /// Drop every retained-object handle. Handles die with the world block
    /// that defined them, so each frame defines its objects again.
    pub fn forget_handles(&self) {
        for node in &self.nodes {
            for sample in 0..node.sample_count() {
                if let Some(mut object) = node.lock(sample) {
                    object.forget_handle();
                }
            }
        }
    }

    pub fn summary(&self) -> RegistrySummary {
        let mut summary = RegistrySummary { nodes: self.nodes.len(), ..RegistrySummary::default() };
        for node in &self.nodes {
            *summary.by_kind.entry(node.object_type().to_string()).or_default() += 1;
            if node.instance_of().is_some() {
                summary.instances += 1;
            }
            summary.max_samples = summary.max_samples.max(node.sample_count());
        }
        summary
    }

    /// Release every node.
    pub fn clear(&mut self) {
        for node in &mut self.nodes {
            node.clear();
        }
        self.nodes.clear();
        self.chains.clear();
        self.shapes.clear();
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttributeMap, AttributeSource};
    use crate::util::DVec3;

    struct Shape {
        path: String,
        id: String,
        instance: usize,
        matrices: Vec<DMat4>,
        shape: AttributeMap,
        node: AttributeMap,
    }

    impl Shape {
        fn sphere(path: &str, radius: f32) -> Self {
            Self {
                path: path.to_string(),
                id: path.to_string(),
                instance: 0,
                matrices: vec![DMat4::IDENTITY],
                shape: AttributeMap::new().with("radius", radius),
                node: AttributeMap::new(),
            }
        }
    }

    impl HostObject for Shape {
        fn path(&self) -> &str {
            &self.path
        }

        fn object_id(&self) -> &str {
            &self.id
        }

        fn instance_number(&self) -> usize {
            self.instance
        }

        fn instance_matrices(&self) -> Vec<DMat4> {
            self.matrices.clone()
        }

        fn shape_attributes(&self) -> &dyn AttributeSource {
            &self.shape
        }

        fn node_attributes(&self) -> &dyn AttributeSource {
            &self.node
        }
    }

    #[test]
    fn test_insert_and_find() -> Result<()> {
        let mut registry = Registry::new();
        let ball = Shape::sphere("|ball|ballShape", 1.0);
        let id = registry.insert(&ball, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        assert_eq!(registry.find("|ball|ballShape", "|ball|ballShape", ObjectType::ImplicitSphere), Some(id));
        assert_eq!(registry.find("|ball|ballShape", "|ball|ballShape", ObjectType::Mesh), None);

        let again = registry.insert(&ball, &Insertion::new(ObjectType::ImplicitSphere, 1))?;
        assert_eq!(id, again);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.node(id).sample_count(), 2);
        Ok(())
    }

    #[test]
    fn test_reinsert_releases_previous_sample() -> Result<()> {
        let mut registry = Registry::new();
        let ball = Shape::sphere("|ball", 1.0);
        let id = registry.insert(&ball, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        let first = registry.node(id).object(0).cloned().expect("sample 0");
        registry.insert(&ball, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        assert!(first.lock().data().is_none());
        assert_eq!(registry.node(id).lock(0).map(|w| w.ref_count()), Some(1));
        Ok(())
    }

    #[test]
    fn test_instances_share_geometry() -> Result<()> {
        let moved = DMat4::from_translation(DVec3::new(3.0, 0.0, 0.0));
        let mut a = Shape::sphere("|a|shape", 1.0);
        a.id = "shape".into();
        a.matrices = vec![DMat4::IDENTITY, moved];
        let mut b = Shape::sphere("|b|shape", 1.0);
        b.id = "shape".into();
        b.instance = 1;
        b.matrices = a.matrices.clone();

        let mut registry = Registry::new();
        let ia = registry.insert(&a, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        let ib = registry.insert(&b, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        assert_ne!(ia, ib);
        assert_eq!(registry.node(ib).instance_of(), Some(ia));

        let wa = registry.node(ia).object(0).cloned().expect("a");
        let wb = registry.node(ib).object(0).cloned().expect("b");
        assert!(std::sync::Arc::ptr_eq(&wa, &wb));
        assert_eq!(wa.lock().ref_count(), 2);
        assert_eq!(registry.node(ib).matrix(0), moved);

        let summary = registry.summary();
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.instances, 1);
        Ok(())
    }

    #[test]
    fn test_particle_instances_chain() -> Result<()> {
        let mut registry = Registry::new();
        let leaf = Shape::sphere("|leaf", 1.0);
        let offset = DMat4::from_translation(DVec3::new(0.0, 2.0, 0.0));
        let plain = registry.insert(&leaf, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        let copy = registry.insert(
            &leaf,
            &Insertion::new(ObjectType::ImplicitSphere, 0)
                .with_instance("|particle1|7", Some(7))
                .with_matrix(offset),
        )?;

        assert_eq!(registry.node(plain).next(), Some(copy));
        let node = registry.node(copy);
        assert_eq!(node.instance_of(), Some(plain));
        assert_eq!(node.particle_id(), Some(7));
        assert_eq!(node.matrix(0), offset);
        assert!(!node.attributes().motion.deformation_blur);
        Ok(())
    }

    #[test]
    fn test_ribgen_name_and_errors() -> Result<()> {
        let mut registry = Registry::new();
        let mut crowd = Shape::sphere("|crowd", 1.0);
        crowd.shape = AttributeMap::new().with("liquidRibGen", "unknown");
        let err = registry.insert(&crowd, &Insertion::new(ObjectType::RibGen, 0)).unwrap_err();
        assert!(matches!(err, Error::Plugin { .. }));
        assert!(!err.is_fatal());

        let err = registry
            .insert(&crowd, &Insertion::new(ObjectType::ImplicitSphere, MAX_MOTION_SAMPLES))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        Ok(())
    }

    #[test]
    fn test_clear_releases_everything() -> Result<()> {
        let mut registry = Registry::new();
        let ball = Shape::sphere("|ball", 1.0);
        let id = registry.insert(&ball, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        let wrapper = registry.node(id).object(0).cloned().expect("sample");
        registry.clear();
        assert!(registry.is_empty());
        assert!(wrapper.lock().data().is_none());
        Ok(())
    }
}
