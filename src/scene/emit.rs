//! Writing a populated registry as one RIB frame.
//!
//! The world block holds, in order, every light (each followed by its
//! `Illuminate`), every coordinate system and clipping plane, then every
//! other node inside its own attribute block. Nodes are written in
//! registry order.
//!
//! Transformation blur wraps the node matrices in a motion block when the
//! node moves between samples. Deformation blur wraps each animated grain
//! of the geometry in its own motion block; geometry without deformation
//! is written once, through its retained-object handle.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::node::SceneNode;
use super::registry::Registry;
use crate::core::{ObjectType, RenderSettings, SampleTimes};
use crate::rib::{Block, RibEncoder, RibParam};
use crate::util::{DMat4, Result};

/// Emission switches not tied to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// State passed to the `Illuminate` written after each light.
    pub illuminate_by_default: bool,
    /// Precede each node with a comment naming it.
    pub output_comments: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { illuminate_by_default: true, output_comments: false }
    }
}

/// Counts of what one frame wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EmitStats {
    pub lights: usize,
    pub coordinate_systems: usize,
    pub objects: usize,
    /// Nodes left out by visibility or after a recoverable error.
    pub skipped: usize,
}

/// Writes a registry with one set of render settings.
pub struct SceneEmitter<'a> {
    settings: &'a RenderSettings,
    options: &'a EmitOptions,
    times: SampleTimes,
    stats: EmitStats,
}

impl<'a> SceneEmitter<'a> {
    pub fn new(settings: &'a RenderSettings, options: &'a EmitOptions) -> Self {
        Self { settings, options, times: settings.motion_times(), stats: EmitStats::default() }
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    /// Header followed by one frame.
    pub fn write_document(&mut self, registry: &mut Registry, enc: &mut RibEncoder) -> Result<EmitStats> {
        enc.header()?;
        self.write_frame(registry, enc)
    }

    /// `FrameBegin` ... `FrameEnd` with the world block of `registry`.
    pub fn write_frame(&mut self, registry: &mut Registry, enc: &mut RibEncoder) -> Result<EmitStats> {
        enc.set_frame(self.settings.frame_info());
        registry.update_anim(enc.frame().motion_samples());
        registry.forget_handles();

        enc.frame_begin(self.settings.frame)?;
        enc.world_begin()?;
        self.write_lights(registry, enc)?;
        self.write_coordinate_systems(registry, enc)?;
        self.write_objects(registry, enc)?;
        enc.world_end()?;
        enc.frame_end()?;

        info!(
            frame = self.settings.frame,
            pass = ?self.settings.pass,
            lights = self.stats.lights,
            objects = self.stats.objects,
            skipped = self.stats.skipped,
            "frame written"
        );
        Ok(self.stats)
    }

    /// Every visible light, each in its own attribute block and switched on
    /// or off afterwards.
    pub fn write_lights(&mut self, registry: &Registry, enc: &mut RibEncoder) -> Result<()> {
        for (_, node) in registry.iter().filter(|(_, n)| n.object_type() == ObjectType::Light) {
            let Some(object) = node.object(0) else {
                continue;
            };
            if object.lock().visibility().ignore {
                self.stats.skipped += 1;
                continue;
            }
            let written = self.guarded(node, enc, |_, enc| {
                enc.attribute_begin()?;
                enc.attribute("identifier", &[RibParam::string("string name", node.name())])?;
                object.lock().write_object(enc)?;
                enc.attribute_end()
            })?;
            if !written {
                continue;
            }
            if let Some(handle) = object.lock().light_handle() {
                enc.illuminate(handle, self.options.illuminate_by_default)?;
                self.stats.lights += 1;
            }
        }
        Ok(())
    }

    /// Coordinate systems and clipping planes, each under its own matrix.
    pub fn write_coordinate_systems(&mut self, registry: &Registry, enc: &mut RibEncoder) -> Result<()> {
        let coords = registry
            .iter()
            .filter(|(_, n)| matches!(n.object_type(), ObjectType::Coord | ObjectType::ClipPlane));
        for (_, node) in coords {
            let Some(object) = node.object(0) else {
                continue;
            };
            if object.lock().visibility().ignore {
                self.stats.skipped += 1;
                continue;
            }
            let written = self.guarded(node, enc, |_, enc| {
                enc.transform_begin()?;
                enc.concat_transform(&node.matrix(0))?;
                object.lock().write_object(enc)?;
                enc.transform_end()
            })?;
            if written {
                self.stats.coordinate_systems += 1;
            }
        }
        Ok(())
    }

    /// Every geometry node visible in the current pass.
    pub fn write_objects(&mut self, registry: &Registry, enc: &mut RibEncoder) -> Result<()> {
        let pass = enc.frame().pass;
        for (_, node) in registry.iter() {
            if matches!(node.object_type(), ObjectType::Light | ObjectType::Coord | ObjectType::ClipPlane) {
                continue;
            }
            let Some(object) = node.object(0) else {
                continue;
            };
            let visibility = object.lock().visibility();
            let hidden = if pass.is_shadow() {
                visibility.ignore_shadow
            } else {
                visibility.ignore || node.attributes().invisible
            };
            if hidden {
                debug!(node = node.name(), ?pass, "not visible in this pass");
                self.stats.skipped += 1;
                continue;
            }
            if self.guarded(node, enc, |this, enc| this.write_node(registry, node, enc))? {
                self.stats.objects += 1;
            }
        }
        Ok(())
    }

    /// Run `write` for `node`; a recoverable error closes the blocks it
    /// opened, logs and skips the node. Returns false when skipped.
    fn guarded<F>(&mut self, node: &SceneNode, enc: &mut RibEncoder, write: F) -> Result<bool>
    where
        F: FnOnce(&mut Self, &mut RibEncoder) -> Result<()>,
    {
        let depth = enc.open_blocks().len();
        match write(self, enc) {
            Ok(()) => Ok(true),
            Err(e) if !e.is_fatal() => {
                warn!(node = node.name(), error = %e, "node skipped");
                close_blocks(enc, depth)?;
                self.stats.skipped += 1;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn write_node(&self, registry: &Registry, node: &SceneNode, enc: &mut RibEncoder) -> Result<()> {
        let attrs = node.attributes();
        let pass = enc.frame().pass;
        let receive_shadows = node.lock(0).map_or(true, |w| w.visibility().receive_shadow);

        if self.options.output_comments {
            enc.comment(&format!(" Name: {}", node.name()))?;
        }
        enc.attribute_begin()?;
        enc.attribute("identifier", &[RibParam::string("string name", node.name())])?;
        if let Some(membership) = &attrs.grouping_membership {
            enc.attribute("grouping", &[RibParam::string("string membership", membership)])?;
        }
        if !pass.is_shadow() {
            for light in &attrs.linked_lights {
                let handle = registry
                    .find_light(light)
                    .and_then(|id| registry.node(id).lock(0).and_then(|w| w.light_handle()));
                match handle {
                    Some(handle) => enc.illuminate(handle, !self.options.illuminate_by_default)?,
                    None => debug!(node = node.name(), light = %light, "linked light not written"),
                }
            }
        }

        self.write_transform(node, enc)?;
        attrs.write(enc, pass)?;
        attrs.write_user(enc, receive_shadows)?;

        if let Some(text) = &attrs.rib.rib_box {
            enc.verbatim(text)?;
            if !text.ends_with('\n') {
                enc.verbatim("\n")?;
            }
        }
        if let Some(archive) = &attrs.rib.read_archive {
            enc.read_archive(archive)?;
        }
        if let Some(archive) = &attrs.rib.delayed_read_archive {
            enc.procedural_delayed_archive(archive, &attrs.rib.delayed_bound)?;
        }

        if !attrs.ignore_shapes {
            if node.object_type().uses_bspline_basis() {
                enc.basis_bspline()?;
            }
            self.write_geometry(node, enc)?;
        }
        enc.attribute_end()
    }

    fn samples(&self, enc: &RibEncoder) -> usize {
        enc.frame().motion_samples().min(self.times.len())
    }

    fn put_matrix(&self, enc: &mut RibEncoder, m: &DMat4) -> Result<()> {
        if self.settings.relative_transforms {
            enc.concat_transform(m)
        } else {
            enc.transform(m)
        }
    }

    fn write_transform(&self, node: &SceneNode, enc: &mut RibEncoder) -> Result<()> {
        let samples = self.samples(enc);
        let blur = self.settings.transformation_blur
            && node.attributes().motion.transformation_blur
            && samples > 1
            && node.has_samples(samples)
            && node.mat_anim().is_animated();
        if !blur {
            return self.put_matrix(enc, &node.matrix(0));
        }
        enc.motion_begin(&self.times[..samples])?;
        for sample in 0..samples {
            self.put_matrix(enc, &node.matrix(sample))?;
        }
        enc.motion_end()
    }

    fn write_geometry(&self, node: &SceneNode, enc: &mut RibEncoder) -> Result<()> {
        let samples = self.samples(enc);
        let deform = self.settings.deformation_blur
            && node.attributes().motion.deformation_blur
            && node.object_type() != ObjectType::RibGen
            && samples > 1
            && node.has_samples(samples)
            && node.body_anim().is_animated();
        if !deform {
            return match node.lock(0) {
                Some(mut object) => object.write_object(enc),
                None => Ok(()),
            };
        }

        let grains = node.lock(0).map_or(0, |w| w.granularity());
        for grain in 0..grains {
            let animated = node.lock(0).is_some_and(|w| w.is_grain_animated(grain));
            if !animated {
                if let Some(mut object) = node.lock(0) {
                    object.write_grain(grain, enc)?;
                }
                continue;
            }
            enc.motion_begin(&self.times[..samples])?;
            for sample in 0..samples {
                if let Some(mut object) = node.lock(sample) {
                    object.write_grain(grain, enc)?;
                }
            }
            enc.motion_end()?;
        }
        Ok(())
    }
}

/// Close blocks opened past `depth` after a failed node.
fn close_blocks(enc: &mut RibEncoder, depth: usize) -> Result<()> {
    while enc.open_blocks().len() > depth {
        match enc.open_blocks().last().copied() {
            Some(Block::Motion) => enc.motion_end()?,
            Some(Block::Object) => enc.object_end()?,
            Some(Block::Attribute) => enc.attribute_end()?,
            Some(Block::Transform) => enc.transform_end()?,
            Some(Block::World) => enc.world_end()?,
            Some(Block::Frame) => enc.frame_end()?,
            None => break,
        }
    }
    Ok(())
}

/// Header and one frame of `registry` written with `settings`.
pub fn emit_frame(
    registry: &mut Registry,
    settings: &RenderSettings,
    options: &EmitOptions,
    enc: &mut RibEncoder,
) -> Result<EmitStats> {
    SceneEmitter::new(settings, options).write_document(registry, enc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttributeMap, AttributeSource, RenderPass};
    use crate::rib::EncoderConfig;
    use crate::scene::{HostObject, Insertion};
    use crate::util::DVec3;

    struct Host {
        path: &'static str,
        matrix: DMat4,
        shape: AttributeMap,
        node: AttributeMap,
    }

    impl Host {
        fn new(path: &'static str, shape: AttributeMap) -> Self {
            Self { path, matrix: DMat4::IDENTITY, shape, node: AttributeMap::new() }
        }
    }

    impl HostObject for Host {
        fn path(&self) -> &str {
            self.path
        }

        fn instance_matrices(&self) -> Vec<DMat4> {
            vec![self.matrix]
        }

        fn shape_attributes(&self) -> &dyn AttributeSource {
            &self.shape
        }

        fn node_attributes(&self) -> &dyn AttributeSource {
            &self.node
        }
    }

    fn settings(blur: bool) -> RenderSettings {
        RenderSettings {
            sample_times: if blur { vec![1.0, 1.5] } else { vec![1.0] },
            transformation_blur: blur,
            deformation_blur: blur,
            ..RenderSettings::default()
        }
    }

    fn emit(registry: &mut Registry, settings: &RenderSettings) -> Result<(EmitStats, String)> {
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        let stats = emit_frame(registry, settings, &EmitOptions::default(), &mut enc)?;
        Ok((stats, String::from_utf8(enc.into_bytes()?).expect("utf8")))
    }

    fn sphere(radius: f32) -> AttributeMap {
        AttributeMap::new().with("radius", radius)
    }

    #[test]
    fn test_static_frame() -> Result<()> {
        let mut registry = Registry::new();
        registry.insert(&Host::new("|ball", sphere(1.0)), &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        let light = AttributeMap::new().with("lightType", "ambient");
        registry.insert(&Host::new("|amb", light), &Insertion::new(ObjectType::Light, 0))?;

        let (stats, out) = emit(&mut registry, &settings(false))?;
        assert_eq!(stats.lights, 1);
        assert_eq!(stats.objects, 1);
        assert!(out.starts_with("##RenderMan RIB\nversion 3.04\nFrameBegin 1\nWorldBegin\n"));
        assert!(out.ends_with("WorldEnd\nFrameEnd\n"));

        let light_at = out.find("LightSource").expect("light");
        let ball_at = out.find("\"|ball\"").expect("ball");
        assert!(light_at < ball_at);
        assert!(out.contains("Illuminate 1 1\n"));
        assert!(out.contains("ObjectBegin 1\n"));
        assert!(out.contains("ObjectInstance 1\n"));
        assert!(!out.contains("MotionBegin"));
        Ok(())
    }

    #[test]
    fn test_transformation_blur() -> Result<()> {
        let mut registry = Registry::new();
        let mut host = Host::new("|ball", sphere(1.0));
        registry.insert(&host, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        host.matrix = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0));
        registry.insert(&host, &Insertion::new(ObjectType::ImplicitSphere, 1))?;

        let (_, out) = emit(&mut registry, &settings(true))?;
        assert_eq!(out.matches("MotionBegin [1 1.5]").count(), 1);
        assert_eq!(out.matches("ConcatTransform").count(), 2);
        assert_eq!(out.matches("Sphere").count(), 1);
        Ok(())
    }

    #[test]
    fn test_deformation_blur() -> Result<()> {
        let mut registry = Registry::new();
        registry.insert(&Host::new("|ball", sphere(1.0)), &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        registry.insert(&Host::new("|ball", sphere(2.0)), &Insertion::new(ObjectType::ImplicitSphere, 1))?;

        let (_, out) = emit(&mut registry, &settings(true))?;
        let motion = out.find("MotionBegin").expect("motion block");
        let first = out.find("Sphere 1 ").expect("sample 0");
        let second = out.find("Sphere 2 ").expect("sample 1");
        assert!(motion < first && first < second);
        assert!(!out.contains("ObjectBegin"));
        assert_eq!(out.matches("ConcatTransform").count(), 1);
        Ok(())
    }

    #[test]
    fn test_still_object_ignores_motion() -> Result<()> {
        let mut registry = Registry::new();
        let host = Host::new("|ball", sphere(1.0));
        registry.insert(&host, &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        registry.insert(&host, &Insertion::new(ObjectType::ImplicitSphere, 1))?;

        let (_, out) = emit(&mut registry, &settings(true))?;
        assert!(!out.contains("MotionBegin"));
        assert!(out.contains("ObjectInstance 1"));
        Ok(())
    }

    #[test]
    fn test_shadow_pass_visibility() -> Result<()> {
        let mut registry = Registry::new();
        let caster = sphere(1.0);
        let no_cast = sphere(1.0).with("castsShadows", false);
        registry.insert(&Host::new("|a", caster), &Insertion::new(ObjectType::ImplicitSphere, 0))?;
        registry.insert(&Host::new("|b", no_cast), &Insertion::new(ObjectType::ImplicitSphere, 0))?;

        let shadow = RenderSettings { pass: RenderPass::Shadow, ..settings(false) };
        let (stats, out) = emit(&mut registry, &shadow)?;
        assert_eq!(stats.objects, 1);
        assert_eq!(stats.skipped, 1);
        assert!(out.contains("\"|a\""));
        assert!(!out.contains("\"|b\""));
        Ok(())
    }

    #[test]
    fn test_coordinate_system_and_links() -> Result<()> {
        let mut registry = Registry::new();
        registry.insert(&Host::new("|ref|refShape", AttributeMap::new()), &Insertion::new(ObjectType::Coord, 0))?;
        let light = AttributeMap::new().with("lightType", "point");
        registry.insert(&Host::new("|key", light), &Insertion::new(ObjectType::Light, 0))?;
        let mut ball = Host::new("|ball", sphere(1.0));
        ball.node = AttributeMap::new().with("liqLinkedLights", vec!["|key"]);
        registry.insert(&ball, &Insertion::new(ObjectType::ImplicitSphere, 0))?;

        let (stats, out) = emit(&mut registry, &settings(false))?;
        assert_eq!(stats.coordinate_systems, 1);
        assert!(out.contains("TransformBegin\nConcatTransform"));
        assert!(out.contains("CoordinateSystem \"refShape\""));
        assert!(out.contains("Illuminate 1 0\n"));
        Ok(())
    }
}
