//! Subdivision surfaces.
//!
//! Built from the same attributes as a polygon mesh plus:
//!
//! - `subdivScheme` (default `catmull-clark`)
//! - `interpolateBoundary` (bool, default true)
//! - `uvInterpolation` (0 none, 1 facevarying, 2 facevertex; default 1)
//! - `creaseEdges` (vertex pairs) and `creaseValues`
//! - `corners` and `cornerValues`
//! - `holes` (face indices)
//! - `stitchIds`, `stitchCounts`, `stitchVerts`
//! - `liqHierarchicalSubdiv` selects `HierarchicalSubdivisionMesh`

use super::mesh::MeshData;
use super::{topology, RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::{RibEncoder, SubdivArgs};
use crate::token::{DetailType, ParameterRecord};
use crate::util::{equiv_slice, Result};

/// Output request and winding convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubdivFlavor {
    /// `SubdivisionMesh` with reversed winding.
    #[default]
    Standard,
    /// `HierarchicalSubdivisionMesh` with reversed winding.
    Hierarchical,
    /// Native host subdivision surface; winding is kept.
    Maya,
}

/// One subdivision tag with its arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubdivTag {
    pub name: String,
    pub int_args: Vec<i32>,
    pub float_args: Vec<f32>,
    pub string_args: Vec<String>,
}

impl SubdivTag {
    fn new(name: &str, int_args: Vec<i32>, float_args: Vec<f32>) -> Self {
        Self { name: name.to_string(), int_args, float_args, string_args: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub struct SubdivisionData {
    mesh: MeshData,
    flavor: SubdivFlavor,
    scheme: String,
    interpolate_boundary: bool,
    uv_interpolation: i32,
    tags: Vec<SubdivTag>,
}

impl SubdivisionData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let flavor = if attrs.get_bool("liqHierarchicalSubdiv").unwrap_or(false) {
            SubdivFlavor::Hierarchical
        } else {
            SubdivFlavor::Standard
        };
        Self::build(name, attrs, flavor)
    }

    pub fn build(name: &str, attrs: &dyn AttributeSource, flavor: SubdivFlavor) -> Result<Self> {
        let uv_interpolation = attrs.get_int("uvInterpolation").unwrap_or(1);
        let st_detail = if uv_interpolation == 2 { DetailType::FaceVertex } else { DetailType::FaceVarying };
        let mesh = MeshData::build(
            name,
            attrs,
            flavor != SubdivFlavor::Maya,
            st_detail,
            ObjectType::Subdivision,
        )?;
        let interpolate_boundary = attrs.get_bool("interpolateBoundary").unwrap_or(true);

        let mut tags = Vec::new();
        if interpolate_boundary && flavor != SubdivFlavor::Hierarchical {
            tags.push(SubdivTag::new("interpolateboundary", Vec::new(), Vec::new()));
        }
        if uv_interpolation == 0 {
            tags.push(SubdivTag::new("facevaryinginterpolateboundary", vec![0], Vec::new()));
        }

        if let Some(edges) = attrs.get_int_array("creaseEdges") {
            let values = attrs.get_float_array("creaseValues").unwrap_or_default();
            if edges.len() % 2 != 0 || edges.len() / 2 != values.len() {
                return Err(topology(name, "creaseEdges must hold one vertex pair per creaseValues entry"));
            }
            for (pair, value) in edges.chunks_exact(2).zip(&values) {
                tags.push(SubdivTag::new("crease", pair.to_vec(), vec![*value]));
            }
        }
        if let Some(corners) = attrs.get_int_array("corners") {
            let values = attrs.get_float_array("cornerValues").unwrap_or_default();
            if corners.len() != values.len() {
                return Err(topology(name, "corners and cornerValues differ in length"));
            }
            if !corners.is_empty() {
                tags.push(SubdivTag::new("corner", corners, values));
            }
        }
        if let Some(holes) = attrs.get_int_array("holes").filter(|h| !h.is_empty()) {
            tags.push(SubdivTag::new("hole", holes, Vec::new()));
        }
        if let (Some(ids), Some(counts), Some(verts)) = (
            attrs.get_int_array("stitchIds"),
            attrs.get_int_array("stitchCounts"),
            attrs.get_int_array("stitchVerts"),
        ) {
            let total: i64 = counts.iter().map(|c| i64::from(*c)).sum();
            if ids.len() != counts.len() || counts.iter().any(|c| *c < 0) || total != verts.len() as i64 {
                return Err(topology(name, "stitch ids, counts and vertices disagree"));
            }
            let mut start = 0;
            for (id, count) in ids.iter().zip(&counts) {
                let count = *count as usize;
                let mut args = Vec::with_capacity(count + 1);
                args.push(*id);
                args.extend_from_slice(&verts[start..start + count]);
                start += count;
                tags.push(SubdivTag::new("stitch", args, Vec::new()));
            }
        }

        if flavor == SubdivFlavor::Hierarchical {
            tags.push(SubdivTag {
                name: "creasemethod".to_string(),
                string_args: vec!["chaikin".to_string()],
                ..SubdivTag::default()
            });
            tags.push(SubdivTag::new("facevaryingpropagatecorners", vec![1], Vec::new()));
            if interpolate_boundary {
                tags.push(SubdivTag::new("interpolateboundary", vec![1], Vec::new()));
            }
        }

        Ok(Self {
            mesh,
            flavor,
            scheme: attrs.get_string("subdivScheme").unwrap_or_else(|| "catmull-clark".to_string()),
            interpolate_boundary,
            uv_interpolation,
            tags,
        })
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn flavor(&self) -> SubdivFlavor {
        self.flavor
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn tags(&self) -> &[SubdivTag] {
        &self.tags
    }

    pub fn interpolates_boundary(&self) -> bool {
        self.interpolate_boundary
    }

    pub fn uv_interpolation(&self) -> i32 {
        self.uv_interpolation
    }

    fn flat_tags(&self, with_strings: bool) -> FlatTags<'_> {
        let mut flat = FlatTags::default();
        for tag in &self.tags {
            flat.names.push(tag.name.as_str());
            flat.nargs.push(tag.int_args.len() as i32);
            flat.nargs.push(tag.float_args.len() as i32);
            if with_strings {
                flat.nargs.push(tag.string_args.len() as i32);
            }
            flat.intargs.extend_from_slice(&tag.int_args);
            flat.floatargs.extend_from_slice(&tag.float_args);
            flat.stringargs.extend(tag.string_args.iter().map(String::as_str));
        }
        flat
    }
}

#[derive(Default)]
struct FlatTags<'a> {
    names: Vec<&'a str>,
    nargs: Vec<i32>,
    intargs: Vec<i32>,
    floatargs: Vec<f32>,
    stringargs: Vec<&'a str>,
}

impl RibPrimitive for SubdivisionData {
    fn object_type(&self) -> ObjectType {
        match self.flavor {
            SubdivFlavor::Maya => ObjectType::MayaSubdivision,
            _ => ObjectType::Subdivision,
        }
    }

    fn granularity(&self) -> u32 {
        u32::from(!self.mesh.points().is_empty())
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let hierarchical = self.flavor == SubdivFlavor::Hierarchical;
        let flat = self.flat_tags(hierarchical);
        let args = SubdivArgs {
            scheme: &self.scheme,
            nverts: self.mesh.nverts(),
            verts: self.mesh.verts(),
            tags: &flat.names,
            nargs: &flat.nargs,
            intargs: &flat.intargs,
            floatargs: &flat.floatargs,
            stringargs: &flat.stringargs,
        };
        if hierarchical {
            enc.hierarchical_subdivision_mesh(&args, self.mesh.params())
        } else {
            enc.subdivision_mesh(&args, self.mesh.params())
        }
    }

    fn compare(&self, other: &RibData) -> bool {
        let RibData::Subdivision(other) = other else {
            return false;
        };
        self.scheme == other.scheme
            && self.tags.len() == other.tags.len()
            && self.tags.iter().zip(&other.tags).all(|(a, b)| {
                a.name == b.name && a.int_args == b.int_args && equiv_slice(&a.float_args, &b.float_args)
            })
            && self.mesh.compare_mesh(&other.mesh)
    }

    fn parameters(&self) -> &[ParameterRecord] {
        self.mesh.params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::rib::EncoderConfig;
    use crate::util::{Error, Vec3};

    fn cage() -> AttributeMap {
        AttributeMap::new()
            .with("P", vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y])
            .with("nverts", vec![4])
            .with("verts", vec![0, 1, 2, 3])
    }

    fn text(sub: &mut SubdivisionData) -> Result<String> {
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        sub.write_grain(0, &mut enc)?;
        Ok(String::from_utf8(enc.into_bytes()?).expect("utf8"))
    }

    #[test]
    fn test_default_tags() -> Result<()> {
        let mut sub = SubdivisionData::from_attributes("|cage", &cage())?;
        assert_eq!(sub.scheme(), "catmull-clark");
        assert_eq!(sub.tags().len(), 1);
        let out = text(&mut sub)?;
        assert!(out.contains(
            "SubdivisionMesh \"catmull-clark\" [4] [3 2 1 0] [\"interpolateboundary\"] [0 0] [] []"
        ));
        Ok(())
    }

    #[test]
    fn test_crease_and_corner_tags() -> Result<()> {
        let attrs = cage()
            .with("creaseEdges", vec![0, 1, 1, 2])
            .with("creaseValues", vec![2.0f32, 3.0])
            .with("corners", vec![3])
            .with("cornerValues", vec![5.0f32]);
        let sub = SubdivisionData::from_attributes("|cage", &attrs)?;
        let names: Vec<&str> = sub.tags().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["interpolateboundary", "crease", "crease", "corner"]);
        assert_eq!(sub.tags()[2].int_args, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_mismatched_crease() {
        let attrs = cage().with("creaseEdges", vec![0, 1]).with("creaseValues", vec![1.0f32, 2.0]);
        assert!(SubdivisionData::from_attributes("|cage", &attrs).is_err());
    }

    #[test]
    fn test_stitch_tag() -> Result<()> {
        let attrs = cage()
            .with("stitchIds", vec![7])
            .with("stitchCounts", vec![2])
            .with("stitchVerts", vec![0, 3]);
        let sub = SubdivisionData::from_attributes("|cage", &attrs)?;
        let stitch = sub.tags().iter().find(|t| t.name == "stitch").expect("stitch");
        assert_eq!(stitch.int_args, vec![7, 0, 3]);
        Ok(())
    }

    #[test]
    fn test_stitch_negative_count() {
        let attrs = cage()
            .with("stitchIds", vec![7, 8])
            .with("stitchCounts", vec![-1, 2])
            .with("stitchVerts", vec![0]);
        let err = SubdivisionData::from_attributes("|cage", &attrs).unwrap_err();
        assert!(matches!(err, Error::Topology { .. }));
    }

    #[test]
    fn test_hierarchical() -> Result<()> {
        let attrs = cage().with("liqHierarchicalSubdiv", true);
        let mut sub = SubdivisionData::from_attributes("|cage", &attrs)?;
        let out = text(&mut sub)?;
        assert!(out.starts_with("HierarchicalSubdivisionMesh") || out.contains("\nHierarchicalSubdivisionMesh"));
        assert!(out.contains("[\"chaikin\"]"));
        assert!(out.contains("[0 0 1 1 0 0 1 0 0]"));
        Ok(())
    }

    #[test]
    fn test_maya_flavor_keeps_winding() -> Result<()> {
        let sub = SubdivisionData::build("|cage", &cage(), SubdivFlavor::Maya)?;
        assert_eq!(sub.mesh().verts(), &[0, 1, 2, 3]);
        assert_eq!(sub.object_type(), ObjectType::MayaSubdivision);
        Ok(())
    }

    #[test]
    fn test_facevertex_uvs() -> Result<()> {
        let attrs = cage().with("uvInterpolation", 2).with("uv", vec![0.0f32; 8]);
        let sub = SubdivisionData::from_attributes("|cage", &attrs)?;
        let st = crate::token::list::find(sub.parameters(), "st").expect("st");
        assert_eq!(st.detail_type(), DetailType::FaceVertex);
        Ok(())
    }
}
