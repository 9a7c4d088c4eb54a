//! Helpers over whole parameter lists.

use crate::core::{AttrValue, AttributeSource, ObjectType};

use super::record::{DetailType, ParameterRecord, ParameterType};

/// Ordered parameter list bound to one primitive call.
pub type ParameterList = Vec<ParameterRecord>;

/// Attribute prefixes recognised as extra primitive variables, with their type.
const EXTRA_PREFIXES: [(&str, ParameterType); 6] = [
    ("rmanF", ParameterType::Float),
    ("rmanP", ParameterType::Point),
    ("rmanV", ParameterType::Vector),
    ("rmanN", ParameterType::Normal),
    ("rmanC", ParameterType::Color),
    ("rmanS", ParameterType::String),
];

/// Sort records by their detailed token name.
pub fn sort_by_detailed_name(list: &mut ParameterList) {
    list.sort_by_cached_key(ParameterRecord::get_detailed_token_name);
}

/// Find a record by token name.
pub fn find<'a>(list: &'a [ParameterRecord], name: &str) -> Option<&'a ParameterRecord> {
    list.iter().find(|r| r.name() == name)
}

/// Build records for every `rmanF*`/`rmanP*`/`rmanV*`/`rmanN*`/`rmanC*`/`rmanS*`
/// attribute of a shape.
///
/// The 5-character prefix is stripped from the token name. Array values
/// become vertex data (face-varying when their length matches
/// `face_varying_count` on meshes and subdivision surfaces, varying for a
/// curve `width`); scalar values become constant. NURBS point arrays are
/// written as homogeneous points.
pub fn extra_surface_parameters(
    attrs: &dyn AttributeSource,
    object_type: ObjectType,
    face_varying_count: Option<usize>,
) -> ParameterList {
    let mut list = ParameterList::new();
    let is_polygonal = matches!(object_type, ObjectType::Mesh | ObjectType::Subdivision);
    let is_nurbs = matches!(object_type, ObjectType::Nurbs | ObjectType::NuCurve);

    for (prefix, param_type) in EXTRA_PREFIXES {
        let mut names: Vec<String> = attrs
            .attribute_names()
            .into_iter()
            .filter(|n| n.len() > prefix.len() && n.starts_with(prefix))
            .collect();
        names.sort();

        for attr in names {
            let token = &attr[prefix.len()..];
            let Some(value) = attrs.value(&attr) else {
                continue;
            };

            if param_type == ParameterType::String {
                if let Some(s) = attrs.get_string(&attr) {
                    let mut rec = ParameterRecord::scalar(token, ParameterType::String)
                        .with_detail(DetailType::Constant);
                    rec.set_token_string(0, s);
                    list.push(rec);
                }
                continue;
            }

            let is_array_value = match param_type {
                ParameterType::Float => value.array_len().is_some(),
                _ => matches!(&*value, AttrValue::VectorArray(_)),
            };

            if !is_array_value {
                let rec = if param_type == ParameterType::Float {
                    attrs.get_float(&attr).map(|v| {
                        let mut rec = ParameterRecord::scalar(token, param_type);
                        rec.set_token_float(0, v);
                        rec
                    })
                } else {
                    attrs.get_vec3(&attr).map(|v| {
                        let mut rec = ParameterRecord::scalar(token, param_type);
                        rec.set_token_vec3(0, v);
                        rec
                    })
                };
                if let Some(rec) = rec {
                    list.push(rec.with_detail(DetailType::Constant));
                }
                continue;
            }

            let rec = if param_type == ParameterType::Float {
                let Some(values) = attrs.get_float_array(&attr) else {
                    continue;
                };
                let mut rec = ParameterRecord::array(token, param_type, values.len() as u32);
                rec.set_token_floats(&values);
                let detail = if object_type == ObjectType::NuCurve && token == "width" {
                    DetailType::Varying
                } else if is_polygonal && face_varying_count == Some(values.len()) {
                    DetailType::FaceVarying
                } else {
                    DetailType::Vertex
                };
                rec.with_detail(detail)
            } else {
                let Some(points) = attrs.get_vec3_array(&attr) else {
                    continue;
                };
                let n = points.len() as u32;
                let mut rec = if is_nurbs && param_type == ParameterType::Point {
                    let mut rec = ParameterRecord::array(token, ParameterType::Hpoint, n);
                    for (i, p) in points.iter().enumerate() {
                        rec.set_token_float4(i, p.x, p.y, p.z, 1.0);
                    }
                    rec
                } else {
                    let mut rec = ParameterRecord::array(token, param_type, n);
                    rec.set_token_points(&points);
                    rec
                };
                let detail = if is_polygonal
                    && param_type != ParameterType::Point
                    && face_varying_count == Some(points.len())
                {
                    DetailType::FaceVarying
                } else {
                    DetailType::Vertex
                };
                rec.set_detail_type(detail);
                rec
            };
            list.push(rec);
        }
    }
    list
}
