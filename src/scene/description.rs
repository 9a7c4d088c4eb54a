//! JSON scene descriptions standing in for a live host application.
//!
//! A description lists render settings, emission options and objects. Each
//! object carries its node attributes, per-sample shape attributes and
//! per-sample world matrices; [`SceneDescription::populate`] feeds every
//! sample of every object through [`Registry::insert`].

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::emit::EmitOptions;
use super::host::HostObject;
use super::registry::{Insertion, Registry};
use crate::core::{AttributeMap, AttributeSource, ObjectType, RenderSettings};
use crate::util::{DMat4, Error, Result};

/// One shape instance of the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub path: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    /// Shared by instances of the same shape; defaults to `path`.
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub instance_number: usize,
    /// Particle-instancing qualifier.
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub particle_id: Option<i32>,
    /// World matrix per sample, column-major. The last one repeats.
    #[serde(default)]
    pub matrices: Vec<[f64; 16]>,
    /// Explicit instancing matrix per sample.
    #[serde(default)]
    pub instance_matrices: Vec<[f64; 16]>,
    /// Render attributes of the transform.
    #[serde(default)]
    pub node: AttributeMap,
    /// Shape attributes per sample. The last one repeats.
    #[serde(default)]
    pub samples: Vec<AttributeMap>,
}

impl ObjectDescription {
    pub fn object_id(&self) -> &str {
        self.object_id.as_deref().unwrap_or(&self.path)
    }

    fn matrix(&self, sample: usize) -> DMat4 {
        pick(&self.matrices, sample).map_or(DMat4::IDENTITY, |m| DMat4::from_cols_array(&m))
    }
}

fn pick<T: Copy>(values: &[T], sample: usize) -> Option<T> {
    values.get(sample).or(values.last()).copied()
}

/// What [`SceneDescription::populate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PopulateReport {
    pub inserted: usize,
    /// Objects skipped after a recoverable error.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub settings: RenderSettings,
    #[serde(default)]
    pub options: EmitOptions,
    #[serde(default)]
    pub objects: Vec<ObjectDescription>,
}

impl SceneDescription {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let scene: Self = serde_json::from_str(json)?;
        scene.settings.validate()?;
        Ok(scene)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Insert every sample of every object into `registry`.
    ///
    /// Recoverable errors skip the object at that sample with a warning.
    pub fn populate(&self, registry: &mut Registry) -> Result<PopulateReport> {
        let mut report = PopulateReport::default();
        let samples = self.settings.motion_samples();

        for sample in 0..samples {
            for object in &self.objects {
                let view = SampleView::new(self, object, sample);
                let mut ins = Insertion::new(object.object_type, sample);
                if let Some(m) = pick(&object.instance_matrices, sample) {
                    ins = ins.with_matrix(DMat4::from_cols_array(&m));
                }
                if let Some(instance) = object.instance.as_deref() {
                    ins = ins.with_instance(instance, object.particle_id);
                }
                match registry.insert(&view, &ins) {
                    Ok(_) => report.inserted += 1,
                    Err(e) if !e.is_fatal() => {
                        warn!(path = %object.path, sample, error = %e, "object skipped");
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        info!(inserted = report.inserted, skipped = report.skipped, nodes = registry.len(), "scene populated");
        Ok(report)
    }

    fn matrices_of(&self, object_id: &str, sample: usize) -> Vec<DMat4> {
        let mut matrices = Vec::new();
        for o in self.objects.iter().filter(|o| o.object_id() == object_id) {
            if matrices.len() <= o.instance_number {
                matrices.resize(o.instance_number + 1, DMat4::IDENTITY);
            }
            matrices[o.instance_number] = o.matrix(sample);
        }
        matrices
    }
}

/// An object description seen at one sample.
struct SampleView<'a> {
    object: &'a ObjectDescription,
    shape: Cow<'a, AttributeMap>,
    matrices: Vec<DMat4>,
}

impl<'a> SampleView<'a> {
    fn new(scene: &'a SceneDescription, object: &'a ObjectDescription, sample: usize) -> Self {
        let shape = match object.samples.get(sample).or(object.samples.last()) {
            Some(attrs) => Cow::Borrowed(attrs),
            None => Cow::Owned(AttributeMap::new()),
        };
        // Lights read their placement from the shape.
        let shape = if object.object_type == ObjectType::Light && !shape.has("worldMatrix") {
            let m = object.matrix(sample).to_cols_array().map(|v| v as f32);
            Cow::Owned(shape.into_owned().with("worldMatrix", m.to_vec()))
        } else {
            shape
        };
        Self { object, shape, matrices: scene.matrices_of(object.object_id(), sample) }
    }
}

impl HostObject for SampleView<'_> {
    fn path(&self) -> &str {
        &self.object.path
    }

    fn object_id(&self) -> &str {
        self.object.object_id()
    }

    fn instance_number(&self) -> usize {
        self.object.instance_number
    }

    fn instance_matrices(&self) -> Vec<DMat4> {
        self.matrices.clone()
    }

    fn shape_attributes(&self) -> &dyn AttributeSource {
        &*self.shape
    }

    fn node_attributes(&self) -> &dyn AttributeSource {
        &self.object.node
    }
}

impl std::str::FromStr for SceneDescription {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "settings": { "sample_times": [1.0, 1.5], "transformation_blur": true },
        "objects": [
            {
                "path": "|ball|ballShape",
                "type": "implicit_sphere",
                "matrices": [
                    [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
                    [1,0,0,0, 0,1,0,0, 0,0,1,0, 1,0,0,1]
                ],
                "samples": [{ "radius": 2.0 }]
            },
            {
                "path": "|crowd",
                "type": "rib_gen",
                "samples": [{ "liquidRibGen": "missing" }]
            }
        ]
    }"#;

    #[test]
    fn test_populate() -> Result<()> {
        let scene = SceneDescription::from_json_str(SCENE)?;
        assert_eq!(scene.objects.len(), 2);
        assert_eq!(scene.objects[0].object_id(), "|ball|ballShape");

        let mut registry = Registry::new();
        let report = scene.populate(&mut registry)?;
        assert_eq!(report, PopulateReport { inserted: 2, skipped: 2 });

        let id = registry
            .find("|ball|ballShape", "|ball|ballShape", ObjectType::ImplicitSphere)
            .expect("ball");
        registry.update_anim(2);
        let node = registry.node(id);
        assert_eq!(node.sample_count(), 2);
        assert!(node.mat_anim().is_animated());
        assert!(!node.body_anim().is_animated());
        Ok(())
    }

    #[test]
    fn test_light_gets_world_matrix() -> Result<()> {
        let scene = SceneDescription::from_json_str(
            r#"{ "objects": [ { "path": "|key|keyShape", "type": "light",
                 "samples": [{ "lightType": "point" }] } ] }"#,
        )?;
        let view = SampleView::new(&scene, &scene.objects[0], 0);
        assert_eq!(view.shape_attributes().get_float_array("worldMatrix").map(|m| m.len()), Some(16));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_settings() {
        let err = SceneDescription::from_json_str(r#"{ "settings": { "sample_times": [] } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
