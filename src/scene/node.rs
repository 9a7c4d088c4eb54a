//! Scene nodes: one DAG path (and instance string) with its motion samples.
//!
//! A node holds up to [`MAX_MOTION_SAMPLES`] shared object wrappers, optional
//! per-sample matrix overrides used by particle instancing, the render
//! attributes read from the host transform, and the animation
//! classification computed across its samples.

use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::trace;

use crate::core::{AnimType, AttributeSource, ObjectType, RenderPass, MAX_MOTION_SAMPLES};
use crate::rib::{RibEncoder, RibParam};
use crate::token::{list, DetailType, ParameterList};
use crate::util::{matrices_equal, DMat4, Result, Vec3};

use super::object::{ObjectWrapper, SharedObject};

/// Index of a node inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// How a surface is seen by transmission rays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transmission {
    #[default]
    Transparent,
    Opaque,
    /// Opacity from `Os`.
    Os,
    Shader,
}

impl Transmission {
    fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Opaque,
            2 => Self::Os,
            3 => Self::Shader,
            _ => Self::Transparent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Opaque => "opaque",
            Self::Os => "Os",
            Self::Shader => "shader",
        }
    }
}

/// What a ray hit evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitMode {
    Primitive,
    Shader,
}

impl HitMode {
    fn from_code(code: i32, default: Self) -> Self {
        match code {
            1 => Self::Primitive,
            2 => Self::Shader,
            _ => default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Shader => "shader",
        }
    }
}

/// Irradiance cache file access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl FileMode {
    fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::ReadWrite,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Read => "r",
            Self::Write => "w",
            Self::ReadWrite => "rw",
        }
    }
}

/// Photon shading model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadingModel {
    #[default]
    Matte,
    Glass,
    Water,
    Chrome,
    Transparent,
    Dielectric,
}

impl ShadingModel {
    fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Glass,
            2 => Self::Water,
            3 => Self::Chrome,
            4 => Self::Transparent,
            5 => Self::Dielectric,
            _ => Self::Matte,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matte => "matte",
            Self::Glass => "glass",
            Self::Water => "water",
            Self::Chrome => "chrome",
            Self::Transparent => "transparent",
            Self::Dielectric => "dielectric",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadingAttributes {
    /// Written when positive.
    pub shading_rate: f32,
    pub dice_raster_orient: bool,
    pub color: Option<Vec3>,
    pub opacity: Option<Vec3>,
    pub matte: bool,
    pub double_shaded: bool,
    pub double_sided: bool,
    pub reversed_normals: bool,
}

impl Default for ShadingAttributes {
    fn default() -> Self {
        Self {
            shading_rate: -1.0,
            dice_raster_orient: true,
            color: None,
            opacity: None,
            matte: false,
            double_shaded: false,
            double_sided: true,
            reversed_normals: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceAttributes {
    pub sample_motion: bool,
    pub displacements: bool,
    pub bias: f32,
    pub max_diffuse_depth: i32,
    pub max_specular_depth: i32,
}

impl Default for TraceAttributes {
    fn default() -> Self {
        Self {
            sample_motion: false,
            displacements: false,
            bias: 0.01,
            max_diffuse_depth: 1,
            max_specular_depth: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityAttributes {
    pub camera: bool,
    pub trace: bool,
    pub transmission: Transmission,
    pub diffuse: bool,
    pub specular: bool,
    pub new_transmission: bool,
    pub photon: bool,
}

impl Default for VisibilityAttributes {
    fn default() -> Self {
        Self {
            camera: true,
            trace: false,
            transmission: Transmission::Transparent,
            diffuse: false,
            specular: false,
            new_transmission: false,
            photon: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitModeAttributes {
    pub camera: HitMode,
    pub diffuse: HitMode,
    pub specular: HitMode,
    pub transmission: HitMode,
}

impl Default for HitModeAttributes {
    fn default() -> Self {
        Self {
            camera: HitMode::Shader,
            diffuse: HitMode::Primitive,
            specular: HitMode::Shader,
            transmission: HitMode::Shader,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrradianceAttributes {
    pub shading_rate: f32,
    pub n_samples: i32,
    pub max_error: f32,
    pub max_pixel_dist: f32,
    pub handle: String,
    pub file_mode: FileMode,
}

impl Default for IrradianceAttributes {
    fn default() -> Self {
        Self {
            shading_rate: 1.0,
            n_samples: 64,
            max_error: 0.5,
            max_pixel_dist: 30.0,
            handle: String::new(),
            file_mode: FileMode::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotonAttributes {
    pub global_map: String,
    pub caustic_map: String,
    pub shading_model: ShadingModel,
    pub estimator: i32,
}

impl Default for PhotonAttributes {
    fn default() -> Self {
        Self {
            global_map: String::new(),
            caustic_map: String::new(),
            shading_model: ShadingModel::Matte,
            estimator: 100,
        }
    }
}

/// Per-node motion overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionAttributes {
    pub transformation_blur: bool,
    pub deformation_blur: bool,
    pub samples: usize,
    pub factor: f32,
}

impl Default for MotionAttributes {
    fn default() -> Self {
        Self { transformation_blur: true, deformation_blur: true, samples: 2, factor: 1.0 }
    }
}

/// RIB fragments attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct RibBoxes {
    /// Text copied into the stream as is.
    pub rib_box: Option<String>,
    pub read_archive: Option<String>,
    pub delayed_read_archive: Option<String>,
    /// `xmin xmax ymin ymax zmin zmax`.
    pub delayed_bound: [f32; 6],
}

impl Default for RibBoxes {
    fn default() -> Self {
        Self {
            rib_box: None,
            read_archive: None,
            delayed_read_archive: None,
            delayed_bound: [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0],
        }
    }
}

/// Render attributes of one node, read from `liq*` host attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeAttributes {
    pub shading: ShadingAttributes,
    pub trace: TraceAttributes,
    pub visibility: VisibilityAttributes,
    pub hit_modes: HitModeAttributes,
    pub irradiance: IrradianceAttributes,
    pub photon: PhotonAttributes,
    pub motion: MotionAttributes,
    pub rib: RibBoxes,
    pub grouping_membership: Option<String>,
    /// Paths of lights this node is linked to.
    pub linked_lights: Vec<String>,
    pub invisible: bool,
    /// Write the attribute block but no geometry.
    pub ignore_shapes: bool,
    /// `rman*` attributes written as `Attribute "user"`.
    pub user: ParameterList,
}

fn non_empty(attrs: &dyn AttributeSource, name: &str) -> Option<String> {
    attrs.get_string(name).filter(|s| !s.is_empty() && s != "-")
}

impl NodeAttributes {
    pub fn from_attributes(attrs: &dyn AttributeSource) -> Self {
        let b = |name: &str, default: bool| attrs.get_bool(name).unwrap_or(default);
        let f = |name: &str, default: f32| attrs.get_float(name).unwrap_or(default);
        let i = |name: &str, default: i32| attrs.get_int(name).unwrap_or(default);

        let shading = ShadingAttributes {
            shading_rate: f("liqShadingRate", -1.0),
            dice_raster_orient: b("liqDiceRasterOrient", true),
            color: attrs.get_vec3("liqColor").filter(|c| c.min_element() >= 0.0),
            opacity: attrs.get_vec3("liqOpacity").filter(|c| c.min_element() >= 0.0),
            matte: b("liqMatte", false),
            double_shaded: b("liqDoubleShaded", false),
            double_sided: b("doubleSided", true),
            reversed_normals: b("opposite", false),
        };
        let trace = TraceAttributes {
            sample_motion: b("liqTraceSampleMotion", false),
            displacements: b("liqTraceDisplacements", false),
            bias: f("liqTraceBias", 0.01),
            max_diffuse_depth: i("liqMaxDiffuseDepth", 1),
            max_specular_depth: i("liqMaxSpecularDepth", 2),
        };
        let visibility = VisibilityAttributes {
            camera: b("liqVisibilityCamera", true),
            trace: b("liqVisibilityTrace", false),
            transmission: Transmission::from_code(i("liqVisibilityTransmission", 0)),
            diffuse: b("liqVisibilityDiffuse", false),
            specular: b("liqVisibilitySpecular", false),
            new_transmission: b("liqVisibilityNewTransmission", false),
            photon: b("liqVisibilityPhoton", false),
        };
        let hit_modes = HitModeAttributes {
            camera: HitMode::from_code(i("liqHitModeCamera", 0), HitMode::Shader),
            diffuse: HitMode::from_code(i("liqHitModeDiffuse", 0), HitMode::Primitive),
            specular: HitMode::from_code(i("liqHitModeSpecular", 0), HitMode::Shader),
            transmission: HitMode::from_code(i("liqHitModeTransmission", 0), HitMode::Shader),
        };
        let irradiance = IrradianceAttributes {
            shading_rate: f("liqIrradianceShadingRate", 1.0),
            n_samples: i("liqIrradianceNSamples", 64),
            max_error: f("liqIrradianceMaxError", 0.5),
            max_pixel_dist: f("liqIrradianceMaxPixelDist", 30.0),
            handle: attrs.get_string("liqIrradianceHandle").unwrap_or_default(),
            file_mode: FileMode::from_code(i("liqIrradianceFileMode", 0)),
        };
        let photon = PhotonAttributes {
            global_map: attrs.get_string("liqPhotonGlobalMap").unwrap_or_default(),
            caustic_map: attrs.get_string("liqPhotonCausticMap").unwrap_or_default(),
            shading_model: ShadingModel::from_code(i("liqPhotonShadingModel", 0)),
            estimator: i("liqPhotonEstimator", 100),
        };
        let motion = MotionAttributes {
            transformation_blur: b("liqTransformationBlur", true),
            deformation_blur: b("liqDeformationBlur", true),
            samples: usize::try_from(i("liqMotionSamples", 2)).unwrap_or(2).clamp(1, MAX_MOTION_SAMPLES),
            factor: f("liqMotionFactor", 1.0),
        };

        let mut delayed_bound = RibBoxes::default().delayed_bound;
        if let Some(bound) = attrs.get_float_array("liqRIBDelayedReadArchiveBound") {
            if bound.len() == 6 {
                delayed_bound.copy_from_slice(&bound);
            }
        }
        let rib = RibBoxes {
            rib_box: non_empty(attrs, "liqRIBBox"),
            read_archive: non_empty(attrs, "liqRIBReadArchive"),
            delayed_read_archive: non_empty(attrs, "liqRIBDelayedReadArchive"),
            delayed_bound,
        };

        let mut user = list::extra_surface_parameters(attrs, ObjectType::Locator, None);
        for rec in &mut user {
            rec.set_detail_type(DetailType::Undefined);
        }
        list::sort_by_detailed_name(&mut user);

        Self {
            shading,
            trace,
            visibility,
            hit_modes,
            irradiance,
            photon,
            motion,
            rib,
            grouping_membership: non_empty(attrs, "liqGroupingMembership"),
            linked_lights: attrs.get_string_array("liqLinkedLights").unwrap_or_default(),
            invisible: b("liqInvisible", false),
            ignore_shapes: b("liqIgnoreShapes", false),
            user,
        }
    }

    /// Write the shading state and every render attribute that differs
    /// from its default. Ray-tracing and photon attributes are left out of
    /// shadow passes.
    pub fn write(&self, enc: &mut RibEncoder, pass: RenderPass) -> Result<()> {
        let shading = &self.shading;
        if shading.shading_rate > 0.0 {
            enc.shading_rate(shading.shading_rate)?;
        }
        if !shading.double_sided {
            enc.sides(1)?;
        }
        if shading.reversed_normals {
            enc.reverse_orientation()?;
        }
        if !shading.dice_raster_orient {
            enc.attribute("dice", &[RibParam::int("int rasterorient", 0)])?;
        }
        if pass.is_shadow() {
            return Ok(());
        }
        if let Some(c) = shading.color {
            enc.color(c)?;
        }
        if let Some(o) = shading.opacity {
            enc.opacity(o)?;
        }
        if shading.matte {
            enc.matte(true)?;
        }
        if shading.double_shaded {
            enc.attribute("sides", &[RibParam::int("int doubleshaded", 1)])?;
        }
        self.write_trace(enc)?;
        self.write_irradiance(enc)?;
        self.write_photon(enc)
    }

    fn write_trace(&self, enc: &mut RibEncoder) -> Result<()> {
        let t = &self.trace;
        let d = TraceAttributes::default();
        if t.sample_motion {
            enc.attribute("trace", &[RibParam::int("int samplemotion", 1)])?;
        }
        if t.displacements {
            enc.attribute("trace", &[RibParam::int("int displacements", 1)])?;
        }
        if t.bias != d.bias {
            enc.attribute("trace", &[RibParam::float("float bias", t.bias)])?;
        }
        if t.max_diffuse_depth != d.max_diffuse_depth {
            enc.attribute("trace", &[RibParam::int("int maxdiffusedepth", t.max_diffuse_depth)])?;
        }
        if t.max_specular_depth != d.max_specular_depth {
            enc.attribute("trace", &[RibParam::int("int maxspeculardepth", t.max_specular_depth)])?;
        }

        let v = &self.visibility;
        if !v.camera {
            enc.attribute("visibility", &[RibParam::int("int camera", 0)])?;
        }
        if v.trace {
            enc.attribute("visibility", &[RibParam::int("int trace", 1)])?;
        }
        if v.transmission != Transmission::Transparent {
            enc.attribute("visibility", &[RibParam::string("string transmission", v.transmission.as_str())])?;
        }
        if v.diffuse {
            enc.attribute("visibility", &[RibParam::int("int diffuse", 1)])?;
        }
        if v.specular {
            enc.attribute("visibility", &[RibParam::int("int specular", 1)])?;
        }
        if v.new_transmission {
            enc.attribute("visibility", &[RibParam::int("int transmission", 1)])?;
        }

        let h = &self.hit_modes;
        let dh = HitModeAttributes::default();
        let modes = [
            ("string camerahitmode", h.camera, dh.camera),
            ("string diffusehitmode", h.diffuse, dh.diffuse),
            ("string specularhitmode", h.specular, dh.specular),
            ("string transmissionhitmode", h.transmission, dh.transmission),
        ];
        for (token, mode, default) in modes {
            if mode != default {
                enc.attribute("shade", &[RibParam::string(token, mode.as_str())])?;
            }
        }
        Ok(())
    }

    fn write_irradiance(&self, enc: &mut RibEncoder) -> Result<()> {
        let irr = &self.irradiance;
        let d = IrradianceAttributes::default();
        if irr.shading_rate != d.shading_rate {
            enc.attribute("irradiance", &[RibParam::float("float shadingrate", irr.shading_rate)])?;
        }
        if irr.n_samples != d.n_samples {
            enc.attribute("irradiance", &[RibParam::int("int nsamples", irr.n_samples)])?;
        }
        if irr.max_error != d.max_error {
            enc.attribute("irradiance", &[RibParam::float("float maxerror", irr.max_error)])?;
        }
        if irr.max_pixel_dist != d.max_pixel_dist {
            enc.attribute("irradiance", &[RibParam::float("float maxpixeldist", irr.max_pixel_dist)])?;
        }
        if !irr.handle.is_empty() {
            enc.attribute("irradiance", &[RibParam::string("string handle", &irr.handle)])?;
        }
        if irr.file_mode != FileMode::None {
            enc.attribute("irradiance", &[RibParam::string("string filemode", irr.file_mode.as_str())])?;
        }
        Ok(())
    }

    fn write_photon(&self, enc: &mut RibEncoder) -> Result<()> {
        let p = &self.photon;
        if self.visibility.photon {
            enc.attribute("visibility", &[RibParam::int("int photon", 1)])?;
        }
        if !p.global_map.is_empty() {
            enc.attribute("photon", &[RibParam::string("string globalmap", &p.global_map)])?;
        }
        if !p.caustic_map.is_empty() {
            enc.attribute("photon", &[RibParam::string("string causticmap", &p.caustic_map)])?;
        }
        if p.shading_model != ShadingModel::Matte {
            enc.attribute("photon", &[RibParam::string("string shadingmodel", p.shading_model.as_str())])?;
        }
        if p.estimator != PhotonAttributes::default().estimator {
            enc.attribute("photon", &[RibParam::int("int estimator", p.estimator)])?;
        }
        Ok(())
    }

    /// `Attribute "user"` with the node's `rman*` extras, then the shape's
    /// shadow-receiving flag.
    pub fn write_user(&self, enc: &mut RibEncoder, receive_shadows: bool) -> Result<()> {
        if !self.user.is_empty() {
            enc.attribute_records("user", &self.user)?;
        }
        enc.attribute("user", &[RibParam::int("int receivesShadows", i32::from(receive_shadows))])
    }
}

/// One entry of the registry.
#[derive(Debug)]
pub struct SceneNode {
    name: String,
    path: String,
    object_id: String,
    object_type: ObjectType,
    instance_str: String,
    instance_number: usize,
    particle_id: Option<i32>,
    pub(crate) next: Option<NodeId>,
    pub(crate) instance_of: Option<NodeId>,
    mat_anim: AnimType,
    body_anim: AnimType,
    objects: Vec<Option<SharedObject>>,
    overrides: Vec<Option<DMat4>>,
    attributes: NodeAttributes,
}

impl SceneNode {
    pub fn new(name: &str, path: &str, object_id: &str, object_type: ObjectType, instance_str: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            object_id: object_id.to_string(),
            object_type,
            instance_str: instance_str.to_string(),
            instance_number: 0,
            particle_id: None,
            next: None,
            instance_of: None,
            mat_anim: AnimType::Const,
            body_anim: AnimType::Const,
            objects: vec![None; MAX_MOTION_SAMPLES],
            overrides: vec![None; MAX_MOTION_SAMPLES],
            attributes: NodeAttributes::default(),
        }
    }

    /// Registry key: the path, suffixed for RibGen nodes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Identity of the underlying shape shared by its instances.
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Particle-instancing qualifier; empty for ordinary nodes.
    pub fn instance_str(&self) -> &str {
        &self.instance_str
    }

    pub fn instance_number(&self) -> usize {
        self.instance_number
    }

    pub(crate) fn set_instance_number(&mut self, n: usize) {
        self.instance_number = n;
    }

    pub fn particle_id(&self) -> Option<i32> {
        self.particle_id
    }

    pub(crate) fn set_particle_id(&mut self, id: Option<i32>) {
        self.particle_id = id;
    }

    /// Next node in the same registry chain.
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Node whose geometry this one shares.
    pub fn instance_of(&self) -> Option<NodeId> {
        self.instance_of
    }

    pub fn mat_anim(&self) -> AnimType {
        self.mat_anim
    }

    pub fn body_anim(&self) -> AnimType {
        self.body_anim
    }

    pub fn attributes(&self) -> &NodeAttributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: NodeAttributes) {
        self.attributes = attributes;
    }

    pub fn object(&self, sample: usize) -> Option<&SharedObject> {
        self.objects.get(sample).and_then(Option::as_ref)
    }

    /// Lock the wrapper of `sample`.
    pub fn lock(&self, sample: usize) -> Option<MutexGuard<'_, ObjectWrapper>> {
        self.object(sample).map(|o| o.lock())
    }

    /// True when samples `0..n` are all present.
    pub fn has_samples(&self, n: usize) -> bool {
        n <= MAX_MOTION_SAMPLES && self.objects[..n].iter().all(Option::is_some)
    }

    /// Number of leading samples present.
    pub fn sample_count(&self) -> usize {
        self.objects.iter().take_while(|o| o.is_some()).count()
    }

    /// Store `object` at `sample`, releasing what was there. The caller has
    /// already retained `object`.
    pub(crate) fn set_object(&mut self, sample: usize, object: SharedObject) {
        if let Some(old) = self.objects[sample].replace(object) {
            old.lock().release();
        }
    }

    pub(crate) fn set_override(&mut self, sample: usize, m: Option<DMat4>) {
        self.overrides[sample] = m;
    }

    /// Matrix of `sample`: the instancing override if set, else the world
    /// matrix of this node's instance.
    pub fn matrix(&self, sample: usize) -> DMat4 {
        if let Some(m) = self.overrides.get(sample).copied().flatten() {
            return m;
        }
        self.lock(sample)
            .and_then(|w| w.matrix(self.instance_number))
            .unwrap_or(DMat4::IDENTITY)
    }

    /// Release every sample.
    pub(crate) fn clear(&mut self) {
        for slot in &mut self.objects {
            if let Some(old) = slot.take() {
                old.lock().release();
            }
        }
        self.overrides.iter_mut().for_each(|m| *m = None);
    }

    /// Classify transform and geometry change of samples `1..samples`
    /// against sample 0.
    pub fn update_anim(&mut self, samples: usize) {
        let samples = samples.min(self.sample_count());
        let mut mat = AnimType::Const;
        let mut body = AnimType::Const;
        if let Some(first) = self.object(0) {
            let m0 = self.matrix(0);
            for s in 1..samples {
                if !matrices_equal(&m0, &self.matrix(s)) {
                    mat = AnimType::Animated;
                }
                let Some(other) = self.object(s) else {
                    continue;
                };
                if Arc::ptr_eq(first, other) {
                    continue;
                }
                match first.lock().compare_body(&other.lock()) {
                    AnimType::Const => {}
                    AnimType::Animated if body == AnimType::Const => body = AnimType::Animated,
                    AnimType::Animated => {}
                    AnimType::Incompatible => body = AnimType::Incompatible,
                }
            }
        }
        trace!(node = %self.name, ?mat, ?body, "animation");
        self.mat_anim = mat;
        self.body_anim = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::data::DataObject;
    use crate::rib::EncoderConfig;
    use crate::scene::object::{ObjectWrapper, ShapeVisibility};
    use crate::util::DVec3;

    fn text(enc: RibEncoder) -> String {
        String::from_utf8(enc.into_bytes().expect("bytes")).expect("utf8")
    }

    fn sphere(radius: f32, m: DMat4) -> SharedObject {
        let attrs = AttributeMap::new().with("radius", radius);
        let data = DataObject::from_attributes(ObjectType::ImplicitSphere, "|s", &attrs).expect("sphere");
        let obj = ObjectWrapper::shared(data, vec![m], ShapeVisibility::default());
        obj.lock().retain();
        obj
    }

    #[test]
    fn test_defaults_write_nothing() -> Result<()> {
        let attrs = NodeAttributes::from_attributes(&AttributeMap::new());
        assert_eq!(attrs, NodeAttributes::default());
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        attrs.write(&mut enc, RenderPass::Final)?;
        assert!(text(enc).is_empty());
        Ok(())
    }

    #[test]
    fn test_non_default_attributes() -> Result<()> {
        let host = AttributeMap::new()
            .with("liqShadingRate", 2.0f32)
            .with("liqDiceRasterOrient", false)
            .with("liqMatte", true)
            .with("liqVisibilityCamera", false)
            .with("liqVisibilityTransmission", 1)
            .with("liqHitModeDiffuse", 2)
            .with("liqMaxSpecularDepth", 4)
            .with("liqIrradianceFileMode", 3)
            .with("liqPhotonShadingModel", 1);
        let attrs = NodeAttributes::from_attributes(&host);
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        attrs.write(&mut enc, RenderPass::Final)?;
        let out = text(enc);
        assert!(out.contains("ShadingRate 2\n"));
        assert!(out.contains("Attribute \"dice\" \"int rasterorient\" [0]"));
        assert!(out.contains("Matte 1"));
        assert!(out.contains("Attribute \"visibility\" \"int camera\" [0]"));
        assert!(out.contains("\"string transmission\" [\"opaque\"]"));
        assert!(out.contains("\"string diffusehitmode\" [\"shader\"]"));
        assert!(out.contains("\"int maxspeculardepth\" [4]"));
        assert!(out.contains("\"string filemode\" [\"rw\"]"));
        assert!(out.contains("\"string shadingmodel\" [\"glass\"]"));
        Ok(())
    }

    #[test]
    fn test_shadow_pass_skips_render_attributes() -> Result<()> {
        let host = AttributeMap::new().with("liqMatte", true).with("liqVisibilityTrace", true);
        let attrs = NodeAttributes::from_attributes(&host);
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        attrs.write(&mut enc, RenderPass::Shadow)?;
        assert!(text(enc).is_empty());
        Ok(())
    }

    #[test]
    fn test_user_attributes() -> Result<()> {
        let host = AttributeMap::new().with("rmanFsize", 2.5f32).with("rmanSgroup", "hero");
        let attrs = NodeAttributes::from_attributes(&host);
        assert_eq!(attrs.user.len(), 2);
        assert!(attrs.user.iter().all(|r| r.detail_type() == DetailType::Undefined));

        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii().with_declarations(crate::rib::DeclarationMode::Inline));
        attrs.write_user(&mut enc, false)?;
        let out = text(enc);
        assert!(out.contains("\"float size\" [2.5]"));
        assert!(out.contains("\"string group\" [\"hero\"]"));
        assert!(out.contains("Attribute \"user\" \"int receivesShadows\" [0]"));
        Ok(())
    }

    #[test]
    fn test_samples_and_anim() {
        let moved = DMat4::from_translation(DVec3::new(0.0, 1.0, 0.0));
        let mut node = SceneNode::new("|s", "|s", "|s", ObjectType::ImplicitSphere, "");
        node.set_object(0, sphere(1.0, DMat4::IDENTITY));
        node.set_object(1, sphere(1.0, moved));
        assert_eq!(node.sample_count(), 2);
        assert!(node.has_samples(2));
        assert!(!node.has_samples(3));

        node.update_anim(2);
        assert_eq!(node.mat_anim(), AnimType::Animated);
        assert_eq!(node.body_anim(), AnimType::Const);

        node.set_object(1, sphere(3.0, DMat4::IDENTITY));
        node.update_anim(2);
        assert_eq!(node.mat_anim(), AnimType::Const);
        assert_eq!(node.body_anim(), AnimType::Animated);

        node.set_override(1, Some(moved));
        assert_eq!(node.matrix(1), moved);
        node.update_anim(2);
        assert_eq!(node.mat_anim(), AnimType::Animated);
    }

    #[test]
    fn test_replace_releases_previous() {
        let mut node = SceneNode::new("|s", "|s", "|s", ObjectType::ImplicitSphere, "");
        let first = sphere(1.0, DMat4::IDENTITY);
        node.set_object(0, first.clone());
        node.set_object(0, sphere(2.0, DMat4::IDENTITY));
        assert!(first.lock().data().is_none());
        node.clear();
        assert_eq!(node.sample_count(), 0);
    }
}
