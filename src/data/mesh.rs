//! Polygon meshes.
//!
//! Host attributes:
//!
//! | name | kind | meaning |
//! |------|------|---------|
//! | `P` | vector array | point positions |
//! | `nverts` | int array | vertex count per face |
//! | `verts` | int array | face-vertex point indices |
//! | `N` | vector array | per point or per face-vertex normals (optional) |
//! | `uv` | float array | two floats per face-vertex (optional) |
//! | `uvSets` | string array | extra uv sets, each read from `uv:<set>` |
//!
//! The host winds faces opposite to RenderMan, so every face's vertex list is
//! reversed and face-varying data follows the same order.

use tracing::warn;

use super::{missing, topology, vec3_record, RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::RibEncoder;
use crate::token::{list, DetailType, ParameterList, ParameterRecord, ParameterType};
use crate::util::{equiv_points, Result, Vec3};

/// A polygon mesh ready for `PointsGeneralPolygons`.
#[derive(Debug, Clone)]
pub struct MeshData {
    points: Vec<Vec3>,
    nverts: Vec<i32>,
    verts: Vec<i32>,
    params: ParameterList,
}

impl MeshData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        Self::build(name, attrs, true, DetailType::FaceVarying, ObjectType::Mesh)
    }

    /// Shared by meshes and subdivision surfaces.
    ///
    /// `reverse` flips each face's winding. `st_detail` is the class given
    /// to uv records.
    pub(crate) fn build(
        name: &str,
        attrs: &dyn AttributeSource,
        reverse: bool,
        st_detail: DetailType,
        object_type: ObjectType,
    ) -> Result<Self> {
        let points = attrs.get_vec3_array("P").ok_or_else(|| missing(name, "P"))?;
        let nverts = attrs.get_int_array("nverts").ok_or_else(|| missing(name, "nverts"))?;
        let host_verts = attrs.get_int_array("verts").ok_or_else(|| missing(name, "verts"))?;

        let total: i64 = nverts.iter().map(|n| i64::from(*n)).sum();
        if nverts.iter().any(|n| *n < 0) || total != host_verts.len() as i64 {
            return Err(topology(
                name,
                format!("face sizes sum to {total} but {} face-vertices given", host_verts.len()),
            ));
        }
        if let Some(bad) = host_verts.iter().find(|v| **v < 0 || **v as usize >= points.len()) {
            return Err(topology(name, format!("vertex index {bad} out of range for {} points", points.len())));
        }

        let order = face_vertex_order(&nverts, reverse);
        let verts: Vec<i32> = order.iter().map(|i| host_verts[*i]).collect();
        let fv = verts.len();

        let mut params = ParameterList::new();
        if points.is_empty() {
            return Ok(Self { points, nverts, verts, params });
        }
        params.push(vec3_record("P", ParameterType::Point, DetailType::Vertex, &points));

        if let Some(normals) = attrs.get_vec3_array("N") {
            if normals.len() == points.len() {
                params.push(vec3_record("N", ParameterType::Normal, DetailType::Vertex, &normals));
            } else if normals.len() == fv {
                let reordered: Vec<Vec3> = order.iter().map(|i| normals[*i]).collect();
                params.push(vec3_record("N", ParameterType::Normal, DetailType::FaceVarying, &reordered));
            } else {
                warn!(object = name, count = normals.len(), "normal count matches neither points nor face-vertices; skipped");
            }
        }

        if let Some(rec) = st_record(name, attrs, "uv", "st", &order, st_detail) {
            params.push(rec);
        }
        for set in attrs.get_string_array("uvSets").unwrap_or_default() {
            let token = format!("{set}_st");
            if let Some(rec) = st_record(name, attrs, &format!("uv:{set}"), &token, &order, st_detail) {
                params.push(rec);
            }
        }

        for mut rec in list::extra_surface_parameters(attrs, object_type, Some(fv)) {
            if rec.detail_type() == DetailType::FaceVarying {
                reorder_elements(&mut rec, &order);
            }
            params.push(rec);
        }

        Ok(Self { points, nverts, verts, params })
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn nverts(&self) -> &[i32] {
        &self.nverts
    }

    /// Face-vertex indices in output winding.
    pub fn verts(&self) -> &[i32] {
        &self.verts
    }

    pub fn num_faces(&self) -> usize {
        self.nverts.len()
    }

    pub fn num_face_vertices(&self) -> usize {
        self.verts.len()
    }

    pub(crate) fn params(&self) -> &[ParameterRecord] {
        &self.params
    }

    /// Same topology and points within tolerance.
    pub fn compare_mesh(&self, other: &MeshData) -> bool {
        self.nverts == other.nverts
            && self.verts == other.verts
            && equiv_points(&self.points, &other.points)
    }
}

impl RibPrimitive for MeshData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Mesh
    }

    fn granularity(&self) -> u32 {
        u32::from(!self.points.is_empty())
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let nloops = vec![1; self.nverts.len()];
        enc.points_general_polygons(&nloops, &self.nverts, &self.verts, &self.params)
    }

    fn compare(&self, other: &RibData) -> bool {
        match other {
            RibData::Mesh(other) => self.compare_mesh(other),
            _ => false,
        }
    }

    fn parameters(&self) -> &[ParameterRecord] {
        &self.params
    }
}

/// Host face-vertex index for each output face-vertex.
fn face_vertex_order(nverts: &[i32], reverse: bool) -> Vec<usize> {
    let mut order = Vec::with_capacity(nverts.iter().map(|n| *n as usize).sum());
    let mut start = 0usize;
    for n in nverts {
        let n = *n as usize;
        if reverse {
            order.extend((start..start + n).rev());
        } else {
            order.extend(start..start + n);
        }
        start += n;
    }
    order
}

/// `st` pairs from a flat uv array, with `t = 1 - v`.
fn st_record(
    object: &str,
    attrs: &dyn AttributeSource,
    attr: &str,
    token: &str,
    order: &[usize],
    detail: DetailType,
) -> Option<ParameterRecord> {
    let uv = attrs.get_float_array(attr)?;
    if uv.len() != order.len() * 2 || order.is_empty() {
        warn!(object, attr, count = uv.len(), "uv count does not match face-vertices; skipped");
        return None;
    }
    let mut rec = ParameterRecord::u_array(token, ParameterType::Float, order.len() as u32, 2).with_detail(detail);
    for (j, src) in order.iter().enumerate() {
        rec.set_token_float_u(j, 0, uv[src * 2]);
        rec.set_token_float_u(j, 1, 1.0 - uv[src * 2 + 1]);
    }
    Some(rec)
}

/// Permute the elements of an array record.
fn reorder_elements(rec: &mut ParameterRecord, order: &[usize]) {
    let stride = rec.param_type().element_size() * rec.u_array_size().max(1) as usize;
    let Some(values) = rec.floats() else {
        return;
    };
    if values.len() != order.len() * stride {
        return;
    }
    let reordered: Vec<f32> = order
        .iter()
        .flat_map(|i| values[i * stride..(i + 1) * stride].iter().copied())
        .collect();
    rec.set_token_floats(&reordered);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::rib::EncoderConfig;

    fn quad() -> AttributeMap {
        AttributeMap::new()
            .with("P", vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y])
            .with("nverts", vec![4])
            .with("verts", vec![0, 1, 2, 3])
    }

    #[test]
    fn test_winding_reversed() -> Result<()> {
        let mesh = MeshData::from_attributes("|quad", &quad())?;
        assert_eq!(mesh.verts(), &[3, 2, 1, 0]);
        assert_eq!(mesh.num_faces(), 1);
        Ok(())
    }

    #[test]
    fn test_st_flipped_and_reordered() -> Result<()> {
        let attrs = quad().with("uv", vec![0.0f32, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        let mesh = MeshData::from_attributes("|quad", &attrs)?;
        let st = list::find(mesh.parameters(), "st").expect("st");
        assert_eq!(st.detail_type(), DetailType::FaceVarying);
        assert_eq!(st.floats(), Some(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0][..]));
        Ok(())
    }

    #[test]
    fn test_extra_uv_set() -> Result<()> {
        let attrs = quad()
            .with("uvSets", vec!["decal"])
            .with("uv:decal", vec![0.5f32; 8]);
        let mesh = MeshData::from_attributes("|quad", &attrs)?;
        assert!(list::find(mesh.parameters(), "decal_st").is_some());
        Ok(())
    }

    #[test]
    fn test_normals_detail() -> Result<()> {
        let mesh = MeshData::from_attributes("|quad", &quad().with("N", vec![Vec3::Z; 4]))?;
        assert_eq!(list::find(mesh.parameters(), "N").map(|n| n.detail_type()), Some(DetailType::Vertex));
        Ok(())
    }

    #[test]
    fn test_bad_topology() {
        let attrs = quad().with("verts", vec![0, 1, 2]);
        assert!(matches!(
            MeshData::from_attributes("|quad", &attrs),
            Err(crate::util::Error::Topology { .. })
        ));
        let attrs = quad().with("verts", vec![0, 1, 2, 9]);
        assert!(MeshData::from_attributes("|quad", &attrs).is_err());
    }

    #[test]
    fn test_compare_tolerance() -> Result<()> {
        let a = MeshData::from_attributes("|quad", &quad())?;
        let moved = quad().with(
            "P",
            vec![Vec3::new(0.00001, 0.0, 0.0), Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
        );
        let b = MeshData::from_attributes("|quad", &moved)?;
        assert!(a.compare(&RibData::Mesh(b)));
        let far = quad().with("P", vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 1.0, 0.0), Vec3::Y]);
        let c = MeshData::from_attributes("|quad", &far)?;
        assert!(!a.compare(&RibData::Mesh(c)));
        Ok(())
    }

    #[test]
    fn test_write() -> Result<()> {
        let mut mesh = MeshData::from_attributes("|quad", &quad())?;
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        mesh.write_grain(0, &mut enc)?;
        let text = String::from_utf8(enc.into_bytes()?).expect("utf8");
        assert!(text.contains("PointsGeneralPolygons [1] [4] [3 2 1 0] \"P\""));
        Ok(())
    }
}
