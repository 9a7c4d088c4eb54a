//! Paint-effects strokes and hair.
//!
//! A stroke has up to three features (main tubes, leaves, petals). For each
//! feature `<f>` in `tube`, `leaf`, `petal` the host supplies:
//!
//! - `<f>LineCounts`: CVs per line; `<f>Lines`: the CVs
//! - per-CV `<f>Twist`, `<f>Width`, `<f>Flatness`, `<f>Color`,
//!   `<f>Incandescence`, `<f>Transparency`
//! - flags `<f>CameraFacing`, `<f>UniformWidth`, `<f>HasShader`
//!
//! Each present feature is one grain written as a cubic curve set.

use glam::Quat;

use super::{float_record, missing, topology, vec3_record, RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::RibEncoder;
use crate::token::{DetailType, ParameterList, ParameterRecord, ParameterType};
use crate::util::{equiv_points, Result, Vec3};

/// Widths from the host are diameters of the stroke tube.
const WIDTH_SCALE: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PfxFeature {
    Tube,
    Leaf,
    Petal,
}

impl PfxFeature {
    pub const ALL: [Self; 3] = [Self::Tube, Self::Leaf, Self::Petal];

    fn prefix(self) -> &'static str {
        match self {
            Self::Tube => "tube",
            Self::Leaf => "leaf",
            Self::Petal => "petal",
        }
    }

    /// Value of the constant `pfxelement` token.
    fn element(self) -> f32 {
        match self {
            Self::Tube => 0.0,
            Self::Leaf => 1.0,
            Self::Petal => 2.0,
        }
    }

    fn from_object_type(t: ObjectType) -> Option<Self> {
        match t {
            ObjectType::PfxTube => Some(Self::Tube),
            ObjectType::PfxLeaf => Some(Self::Leaf),
            ObjectType::PfxPetal => Some(Self::Petal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct FeatureCurves {
    feature: PfxFeature,
    counts: Vec<i32>,
    lines: Vec<Vec3>,
    nverts: Vec<i32>,
    params: ParameterList,
}

#[derive(Debug, Clone)]
pub struct PfxData {
    object_type: ObjectType,
    features: Vec<FeatureCurves>,
}

impl PfxData {
    /// `object_type` selects one feature (`PfxTube`, `PfxLeaf`, `PfxPetal`)
    /// or all of them (`PfxToon`).
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource, object_type: ObjectType) -> Result<Self> {
        let wanted: Vec<PfxFeature> = match PfxFeature::from_object_type(object_type) {
            Some(one) => vec![one],
            None => PfxFeature::ALL.to_vec(),
        };
        let mut features = Vec::new();
        for feature in wanted {
            if let Some(curves) = feature_curves(name, attrs, feature)? {
                features.push(curves);
            }
        }
        Ok(Self { object_type, features })
    }

    pub fn features(&self) -> Vec<PfxFeature> {
        self.features.iter().map(|f| f.feature).collect()
    }
}

impl RibPrimitive for PfxData {
    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn granularity(&self) -> u32 {
        self.features.len() as u32
    }

    fn write_grain(&mut self, grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let Some(f) = self.features.get(grain as usize) else {
            return Ok(());
        };
        enc.curves("cubic", &f.nverts, "nonperiodic", &f.params)
    }

    fn compare(&self, other: &RibData) -> bool {
        let RibData::Pfx(other) = other else {
            return false;
        };
        self.features.len() == other.features.len()
            && self.features.iter().zip(&other.features).all(|(a, b)| {
                a.feature == b.feature && a.counts == b.counts && equiv_points(&a.lines, &b.lines)
            })
    }

    fn parameters(&self) -> &[ParameterRecord] {
        self.features.first().map_or(&[], |f| f.params.as_slice())
    }
}

fn feature_curves(name: &str, attrs: &dyn AttributeSource, feature: PfxFeature) -> Result<Option<FeatureCurves>> {
    let key = |suffix: &str| format!("{}{suffix}", feature.prefix());
    let Some(counts) = attrs.get_int_array(&key("LineCounts")).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let lines = attrs.get_vec3_array(&key("Lines")).ok_or_else(|| missing(name, &key("Lines")))?;
    check_counts(name, &counts, lines.len())?;
    let n = lines.len();

    let per_cv = |suffix: &str| -> Result<Option<Vec<f32>>> {
        match attrs.get_float_array(&key(suffix)) {
            Some(v) if v.len() != n => Err(topology(name, format!("{} has {} entries for {n} cvs", key(suffix), v.len()))),
            other => Ok(other),
        }
    };
    let per_cv3 = |suffix: &str| -> Result<Option<Vec<Vec3>>> {
        match attrs.get_vec3_array(&key(suffix)) {
            Some(v) if v.len() != n => Err(topology(name, format!("{} has {} entries for {n} cvs", key(suffix), v.len()))),
            other => Ok(other),
        }
    };
    let flag = |suffix: &str| attrs.get_bool(&key(suffix)).unwrap_or(false);

    let capped = feature == PfxFeature::Leaf;
    let mut points = Vec::with_capacity(n + 2 * counts.len());
    let mut nverts = Vec::with_capacity(counts.len());
    for line in split(&lines, &counts) {
        let padded = pad_ends(line, capped);
        nverts.push(padded.len() as i32);
        points.extend(padded);
    }

    let mut params = ParameterList::new();
    params.push(vec3_record("P", ParameterType::Point, DetailType::Vertex, &points));

    let twist = per_cv("Twist")?.unwrap_or_else(|| vec![0.0; n]);
    if !flag("CameraFacing") {
        let normals = twisted_normals(&lines, &counts, &twist);
        params.push(vec3_record("N", ParameterType::Normal, DetailType::Varying, &normals));
    }

    if let Some(width) = per_cv("Width")? {
        if flag("UniformWidth") {
            let firsts: Vec<f32> = split(&width, &counts).map(|w| w[0] * WIDTH_SCALE).collect();
            params.push(float_record("width", DetailType::Uniform, &firsts));
        } else {
            let scaled: Vec<f32> = width.iter().map(|w| w * WIDTH_SCALE).collect();
            params.push(float_record("width", DetailType::Varying, &scaled));
        }
    }

    if !flag("HasShader") {
        if let Some(color) = per_cv3("Color")? {
            params.push(vec3_record("Cs", ParameterType::Color, DetailType::Varying, &color));
        }
        if let Some(transparency) = per_cv3("Transparency")? {
            let opacity: Vec<Vec3> = transparency.iter().map(|t| Vec3::ONE - *t).collect();
            params.push(vec3_record("Os", ParameterType::Color, DetailType::Varying, &opacity));
        }
        if let Some(flatness) = per_cv("Flatness")? {
            params.push(float_record("pfxflatness", DetailType::Varying, &flatness));
        }
        if let Some(incandescence) = per_cv3("Incandescence")? {
            params.push(vec3_record("pfxincandescence", ParameterType::Color, DetailType::Varying, &incandescence));
        }
    }
    params.push(super::constant_float("pfxelement", feature.element()));

    Ok(Some(FeatureCurves { feature, counts, lines, nverts, params }))
}

/// Paint-effects hair: one cubic curve per hair.
///
/// Host attributes: `curveCounts`, `cvs`, and per-CV `twist`, `width`,
/// `color` and `transparency`.
#[derive(Debug, Clone)]
pub struct PfxHairData {
    counts: Vec<i32>,
    cvs: Vec<Vec3>,
    nverts: Vec<i32>,
    params: ParameterList,
}

impl PfxHairData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let counts = attrs.get_int_array("curveCounts").unwrap_or_default();
        let cvs = attrs.get_vec3_array("cvs").unwrap_or_default();
        check_counts(name, &counts, cvs.len())?;
        let n = cvs.len();
        let mut hair = Self { counts, cvs, nverts: Vec::new(), params: ParameterList::new() };
        if n == 0 {
            return Ok(hair);
        }

        let sized = |attr: &str| -> Result<Option<Vec<f32>>> {
            match attrs.get_float_array(attr) {
                Some(v) if v.len() != n => Err(topology(name, format!("{attr} has {} entries for {n} cvs", v.len()))),
                other => Ok(other),
            }
        };
        let sized3 = |attr: &str| -> Result<Option<Vec<Vec3>>> {
            match attrs.get_vec3_array(attr) {
                Some(v) if v.len() != n => Err(topology(name, format!("{attr} has {} entries for {n} cvs", v.len()))),
                other => Ok(other),
            }
        };

        let mut points = Vec::with_capacity(n + 2 * hair.counts.len());
        for line in split(&hair.cvs, &hair.counts) {
            let padded = pad_ends(line, true);
            hair.nverts.push(padded.len() as i32);
            points.extend(padded);
        }
        hair.params.push(vec3_record("P", ParameterType::Point, DetailType::Vertex, &points));

        let twist = sized("twist")?.unwrap_or_else(|| vec![0.0; n]);
        let normals = twisted_normals(&hair.cvs, &hair.counts, &twist);
        hair.params.push(vec3_record("N", ParameterType::Normal, DetailType::Varying, &normals));
        if let Some(width) = sized("width")? {
            hair.params.push(float_record("width", DetailType::Varying, &width));
        }
        if let Some(color) = sized3("color")? {
            let padded: Vec<Vec3> = split(&color, &hair.counts).flat_map(|c| pad_ends(c, true)).collect();
            hair.params.push(vec3_record("Cs", ParameterType::Color, DetailType::Vertex, &padded));
        }
        if let Some(transparency) = sized3("transparency")? {
            let opacity: Vec<Vec3> = split(&transparency, &hair.counts)
                .flat_map(|t| pad_ends(t, true))
                .map(|t| Vec3::ONE - t)
                .collect();
            hair.params.push(vec3_record("Os", ParameterType::Color, DetailType::Vertex, &opacity));
        }
        Ok(hair)
    }

    pub fn ncurves(&self) -> usize {
        self.nverts.len()
    }
}

impl RibPrimitive for PfxHairData {
    fn object_type(&self) -> ObjectType {
        ObjectType::PfxHair
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        if self.nverts.is_empty() {
            return enc.identity();
        }
        enc.curves("cubic", &self.nverts, "nonperiodic", &self.params)
    }

    fn compare(&self, other: &RibData) -> bool {
        match other {
            RibData::PfxHair(other) => self.counts == other.counts,
            _ => false,
        }
    }

    fn parameters(&self) -> &[ParameterRecord] {
        &self.params
    }
}

fn check_counts(name: &str, counts: &[i32], available: usize) -> Result<()> {
    let total: i64 = counts.iter().map(|c| i64::from(*c)).sum();
    if counts.iter().any(|c| *c < 2) || total != available as i64 {
        return Err(topology(name, format!("line counts sum to {total} for {available} cvs (each line needs 2+)")));
    }
    Ok(())
}

/// Consecutive slices of `values`, `counts[i]` long each.
fn split<'a, T>(values: &'a [T], counts: &'a [i32]) -> impl Iterator<Item = &'a [T]> + 'a {
    let mut start = 0usize;
    counts.iter().map(move |c| {
        let slice = &values[start..start + *c as usize];
        start += *c as usize;
        slice
    })
}

/// One extra vertex at each end, either repeated (`capped`) or
/// extrapolated along the end segment.
fn pad_ends<T>(line: &[T], capped: bool) -> Vec<T>
where
    T: Copy + std::ops::Sub<Output = T> + std::ops::Add<Output = T>,
{
    let n = line.len();
    if n == 0 {
        return Vec::new();
    }
    let (head, tail) = if capped || n < 2 {
        (line[0], line[n - 1])
    } else {
        (line[0] + (line[0] - line[1]), line[n - 1] + (line[n - 1] - line[n - 2]))
    };
    let mut out = Vec::with_capacity(n + 2);
    out.push(head);
    out.extend_from_slice(line);
    out.push(tail);
    out
}

/// Per-CV normals perpendicular to the line, rotated by `twist` degrees.
fn twisted_normals(lines: &[Vec3], counts: &[i32], twist: &[f32]) -> Vec<Vec3> {
    let mut normals = Vec::with_capacity(lines.len());
    let mut offset = 0usize;
    for line in split(lines, counts) {
        let n = line.len();
        for i in 0..n {
            let prev = line[i.saturating_sub(1)];
            let next = line[(i + 1).min(n - 1)];
            let tangent = (next - prev).normalize_or_zero();
            let reference = if tangent.cross(Vec3::Y).length_squared() > 1e-6 { Vec3::Y } else { Vec3::X };
            let base = tangent.cross(reference).normalize_or_zero();
            let rotated = if tangent == Vec3::ZERO {
                base
            } else {
                Quat::from_axis_angle(tangent, twist[offset + i].to_radians()) * base
            };
            normals.push(rotated);
        }
        offset += n;
    }
    normals
}
