//! Geometry and light data objects.
//!
//! Every primitive kind the emitter knows is a variant of [`RibData`]. Each
//! variant is built from host attributes, writes itself through a
//! [`RibEncoder`] one grain at a time, and compares itself against another
//! sample to decide whether motion blocks are needed.
//!
//! - [`mesh`], [`subdiv`]: polygon meshes and subdivision surfaces
//! - [`nurbs`]: NURBS patches with trim loops
//! - [`curves`]: single NURBS curves and curve groups
//! - [`particles`]: particle systems in all render kinds
//! - [`pfx`]: paint-effects strokes and hair
//! - [`simple`]: implicit spheres, locators, coordinate systems, clip planes
//! - [`light`]: light sources
//! - [`plugin`]: external RibGen generators and host custom geometry
//! - [`grain`]: the per-object grain cursor

pub mod curves;
pub mod grain;
pub mod light;
pub mod mesh;
pub mod nurbs;
pub mod particles;
pub mod pfx;
pub mod plugin;
pub mod simple;
pub mod subdiv;

pub use curves::{CurveGroupData, NuCurveData};
pub use grain::{DataObject, GrainCursor};
pub use light::LightData;
pub use mesh::MeshData;
pub use nurbs::NurbsData;
pub use particles::{ParticleData, ParticleKind};
pub use pfx::{PfxData, PfxHairData};
pub use plugin::{CustomData, CustomGeometry, RibGenData, RibGenRegistry, RibGenerator, RibStatus};
pub use simple::{ClipPlaneData, CoordData, ImplicitSphereData, LocatorData};
pub use subdiv::{SubdivFlavor, SubdivTag, SubdivisionData};

use crate::core::{AttributeSource, ObjectType};
use crate::rib::{LightHandle, RibEncoder};
use crate::token::{DetailType, ParameterRecord, ParameterType};
use crate::util::{Error, Result, Vec3};

/// Capability every data object kind provides.
pub trait RibPrimitive {
    /// Kind tag used for dispatch and registry keys.
    fn object_type(&self) -> ObjectType;

    /// Number of grains the object is written in. Zero writes nothing.
    fn granularity(&self) -> u32 {
        1
    }

    /// Emit grain `grain` (`0..granularity()`).
    fn write_grain(&mut self, grain: u32, enc: &mut RibEncoder) -> Result<()>;

    /// True when `other` is congruent with `self`, i.e. not animated.
    fn compare(&self, other: &RibData) -> bool;

    /// Whether grain `grain` may be motion blurred.
    fn is_grain_animated(&self, _grain: u32) -> bool {
        true
    }

    /// Primitive variables bound to the main primitive call.
    fn parameters(&self) -> &[ParameterRecord] {
        &[]
    }
}

/// Closed set of data object kinds.
#[derive(Debug)]
pub enum RibData {
    Mesh(MeshData),
    Subdivision(SubdivisionData),
    Nurbs(NurbsData),
    NuCurve(NuCurveData),
    Curves(CurveGroupData),
    Particles(ParticleData),
    Pfx(PfxData),
    PfxHair(PfxHairData),
    ImplicitSphere(ImplicitSphereData),
    Locator(LocatorData),
    Coord(CoordData),
    ClipPlane(ClipPlaneData),
    Light(LightData),
    RibGen(RibGenData),
    Custom(CustomData),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            RibData::Mesh($d) => $body,
            RibData::Subdivision($d) => $body,
            RibData::Nurbs($d) => $body,
            RibData::NuCurve($d) => $body,
            RibData::Curves($d) => $body,
            RibData::Particles($d) => $body,
            RibData::Pfx($d) => $body,
            RibData::PfxHair($d) => $body,
            RibData::ImplicitSphere($d) => $body,
            RibData::Locator($d) => $body,
            RibData::Coord($d) => $body,
            RibData::ClipPlane($d) => $body,
            RibData::Light($d) => $body,
            RibData::RibGen($d) => $body,
            RibData::Custom($d) => $body,
        }
    };
}

impl RibData {
    /// Build the data object for a host shape of kind `object_type`.
    ///
    /// Meshes flagged with `liqSubdiv` become subdivision surfaces.
    /// RibGen and custom objects need a plugin and are built through
    /// [`RibGenRegistry`] / [`CustomData`] instead.
    pub fn from_attributes(
        object_type: ObjectType,
        name: &str,
        attrs: &dyn AttributeSource,
    ) -> Result<Self> {
        let data = match object_type {
            ObjectType::Mesh if attrs.get_bool("liqSubdiv").unwrap_or(false) => {
                Self::Subdivision(SubdivisionData::from_attributes(name, attrs)?)
            }
            ObjectType::Mesh => Self::Mesh(MeshData::from_attributes(name, attrs)?),
            ObjectType::Subdivision => Self::Subdivision(SubdivisionData::from_attributes(name, attrs)?),
            ObjectType::MayaSubdivision => {
                Self::Subdivision(SubdivisionData::build(name, attrs, SubdivFlavor::Maya)?)
            }
            ObjectType::Nurbs => Self::Nurbs(NurbsData::from_attributes(name, attrs)?),
            ObjectType::NuCurve => Self::NuCurve(NuCurveData::from_attributes(name, attrs)?),
            ObjectType::Curves => Self::Curves(CurveGroupData::from_attributes(name, attrs)?),
            ObjectType::Particles => Self::Particles(ParticleData::from_attributes(name, attrs)?),
            ObjectType::PfxToon | ObjectType::PfxTube | ObjectType::PfxLeaf | ObjectType::PfxPetal => {
                Self::Pfx(PfxData::from_attributes(name, attrs, object_type)?)
            }
            ObjectType::PfxHair => Self::PfxHair(PfxHairData::from_attributes(name, attrs)?),
            ObjectType::ImplicitSphere => Self::ImplicitSphere(ImplicitSphereData::from_attributes(attrs)),
            ObjectType::Locator => Self::Locator(LocatorData),
            ObjectType::Coord => Self::Coord(CoordData::new(short_name(name))),
            ObjectType::ClipPlane => Self::ClipPlane(ClipPlaneData::new(short_name(name))),
            ObjectType::Light => Self::Light(LightData::from_attributes(name, attrs)?),
            other => {
                return Err(Error::other(format!(
                    "{name}: no attribute-driven data object for kind '{other}'"
                )))
            }
        };
        Ok(data)
    }

    /// Light handle assigned on the last write, for lights.
    pub fn light_handle(&self) -> Option<LightHandle> {
        match self {
            Self::Light(light) => light.handle(),
            _ => None,
        }
    }
}

impl RibPrimitive for RibData {
    fn object_type(&self) -> ObjectType {
        dispatch!(self, d => d.object_type())
    }

    fn granularity(&self) -> u32 {
        dispatch!(self, d => d.granularity())
    }

    fn write_grain(&mut self, grain: u32, enc: &mut RibEncoder) -> Result<()> {
        dispatch!(self, d => d.write_grain(grain, enc))
    }

    fn compare(&self, other: &RibData) -> bool {
        dispatch!(self, d => d.compare(other))
    }

    fn is_grain_animated(&self, grain: u32) -> bool {
        dispatch!(self, d => d.is_grain_animated(grain))
    }

    fn parameters(&self) -> &[ParameterRecord] {
        dispatch!(self, d => d.parameters())
    }
}

/// Last component of a `|`-separated DAG path.
pub fn short_name(path: &str) -> &str {
    path.rsplit('|').next().unwrap_or(path)
}

pub(crate) fn missing(object: &str, attribute: &str) -> Error {
    Error::MissingAttribute { object: object.to_string(), attribute: attribute.to_string() }
}

pub(crate) fn topology(object: &str, reason: impl Into<String>) -> Error {
    Error::Topology { path: object.to_string(), reason: reason.into() }
}

/// Array record of 3-float elements.
pub(crate) fn vec3_record(
    name: &str,
    param_type: ParameterType,
    detail: DetailType,
    values: &[Vec3],
) -> ParameterRecord {
    let mut rec = ParameterRecord::array(name, param_type, values.len() as u32).with_detail(detail);
    rec.set_token_points(values);
    rec
}

/// Array record of plain floats.
pub(crate) fn float_record(name: &str, detail: DetailType, values: &[f32]) -> ParameterRecord {
    let mut rec = ParameterRecord::array(name, ParameterType::Float, values.len() as u32).with_detail(detail);
    rec.set_token_floats(values);
    rec
}

/// Single constant float.
pub(crate) fn constant_float(name: &str, value: f32) -> ParameterRecord {
    let mut rec = ParameterRecord::scalar(name, ParameterType::Float).with_detail(DetailType::Constant);
    rec.set_token_float(0, value);
    rec
}

/// Element `i` of each array record as a one-element record.
///
/// Constant and scalar records are passed through whole.
pub(crate) fn ith_parameters(params: &[ParameterRecord], i: usize) -> Vec<ParameterRecord> {
    params
        .iter()
        .filter(|rec| !rec.name().is_empty())
        .map(|rec| {
            if !rec.is_array() || rec.detail_type() == DetailType::Constant {
                return rec.clone();
            }
            let mut one = if rec.is_u_array() {
                ParameterRecord::u_array(rec.name(), rec.param_type(), 1, rec.u_array_size())
            } else {
                ParameterRecord::array(rec.name(), rec.param_type(), 1)
            };
            one.set_detail_type(rec.detail_type());
            match rec.get_ith_rt_pointer(i) {
                crate::token::ParamValue::Floats(f) => one.set_token_floats(f),
                crate::token::ParamValue::Strings(s) => {
                    if let Some(v) = s.first() {
                        one.set_token_string(0, v.clone());
                    }
                }
            }
            one
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("|grp|sphereShape"), "sphereShape");
        assert_eq!(short_name("camera"), "camera");
    }

    #[test]
    fn test_mesh_flagged_as_subdiv() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("P", vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with("nverts", vec![3])
            .with("verts", vec![0, 1, 2])
            .with("liqSubdiv", true);
        let data = RibData::from_attributes(ObjectType::Mesh, "|tri", &attrs)?;
        assert_eq!(data.object_type(), ObjectType::Subdivision);
        Ok(())
    }

    #[test]
    fn test_plugin_kinds_need_registry() {
        let attrs = AttributeMap::new();
        assert!(RibData::from_attributes(ObjectType::RibGen, "|gen", &attrs).is_err());
    }

    #[test]
    fn test_ith_parameters() {
        let p = vec3_record("P", ParameterType::Point, DetailType::Vertex, &[Vec3::X, Vec3::Y]);
        let w = constant_float("constantwidth", 0.5);
        let one = ith_parameters(&[p, w], 1);
        assert_eq!(one[0].floats(), Some(&[0.0, 1.0, 0.0][..]));
        assert_eq!(one[0].array_size(), 1);
        assert_eq!(one[1].floats(), Some(&[0.5][..]));
    }
}
