//! Cubic curves: single NURBS curves and curve groups.
//!
//! Both are written as `Curves "cubic" ... "nonperiodic"` under a B-spline
//! basis. The end CVs of each curve are tripled so the curve reaches its
//! end points.

use super::{constant_float, float_record, missing, topology, vec3_record, RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::RibEncoder;
use crate::token::{list, DetailType, ParameterList, ParameterRecord, ParameterType};
use crate::util::{equiv_points, Result, Vec3};

const DEFAULT_WIDTH: f32 = 0.1;

/// Single NURBS curve.
///
/// Host attributes: `cvs` (positions), `baseWidth` and `tipWidth`.
#[derive(Debug, Clone)]
pub struct NuCurveData {
    cvs: Vec<Vec3>,
    nverts: i32,
    params: ParameterList,
}

impl NuCurveData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let cvs = attrs.get_vec3_array("cvs").ok_or_else(|| missing(name, "cvs"))?;
        let mut curve = Self { nverts: 0, cvs, params: ParameterList::new() };
        if curve.cvs.len() < 2 {
            return Ok(curve);
        }

        let points = triple_ends(&curve.cvs);
        curve.nverts = points.len() as i32;
        curve.params.push(vec3_record("P", ParameterType::Point, DetailType::Vertex, &points));

        let extras = list::extra_surface_parameters(attrs, ObjectType::NuCurve, None);
        if list::find(&extras, "width").is_none() {
            let base = attrs.get_float("baseWidth").unwrap_or(DEFAULT_WIDTH);
            let tip = attrs.get_float("tipWidth").unwrap_or(DEFAULT_WIDTH);
            if base == tip {
                curve.params.push(constant_float("constantwidth", base));
            } else {
                curve.params.push(float_record("width", DetailType::Varying, &width_profile(base, tip, curve.nverts)));
            }
        }
        curve.params.extend(extras);
        Ok(curve)
    }

    /// Output vertex count, including the tripled ends.
    pub fn nverts(&self) -> i32 {
        self.nverts
    }
}

impl RibPrimitive for NuCurveData {
    fn object_type(&self) -> ObjectType {
        ObjectType::NuCurve
    }

    fn granularity(&self) -> u32 {
        u32::from(self.nverts > 0)
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        enc.curves("cubic", &[self.nverts], "nonperiodic", &self.params)
    }

    fn compare(&self, other: &RibData) -> bool {
        match other {
            RibData::NuCurve(other) => equiv_points(&self.cvs, &other.cvs),
            _ => false,
        }
    }

    fn parameters(&self) -> &[ParameterRecord] {
        &self.params
    }
}

/// Group of cubic curves sharing one `Curves` call.
///
/// Host attributes: `curveCounts` (CVs per curve), `cvs`, per-curve
/// `baseWidths`/`tipWidths` or a single `width`, and `renderAllCurves`
/// (default true; false writes nothing).
#[derive(Debug, Clone)]
pub struct CurveGroupData {
    counts: Vec<i32>,
    cvs: Vec<Vec3>,
    nverts: Vec<i32>,
    params: ParameterList,
}

impl CurveGroupData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let counts = attrs.get_int_array("curveCounts").ok_or_else(|| missing(name, "curveCounts"))?;
        let cvs = attrs.get_vec3_array("cvs").ok_or_else(|| missing(name, "cvs"))?;
        let mut group = Self { counts, cvs, nverts: Vec::new(), params: ParameterList::new() };
        if !attrs.get_bool("renderAllCurves").unwrap_or(true) {
            return Ok(group);
        }

        let total: i64 = group.counts.iter().map(|c| i64::from(*c)).sum();
        if group.counts.iter().any(|c| *c < 2) || total != group.cvs.len() as i64 {
            return Err(topology(
                name,
                format!("curve counts sum to {total} for {} cvs (each curve needs 2+)", group.cvs.len()),
            ));
        }
        let ncurves = group.counts.len();
        let widths = |attr: &str| -> Result<Option<Vec<f32>>> {
            match attrs.get_float_array(attr) {
                Some(w) if w.len() == ncurves => Ok(Some(w)),
                Some(w) => Err(topology(name, format!("{attr} has {} entries for {ncurves} curves", w.len()))),
                None => Ok(None),
            }
        };
        let scalar = attrs.get_float("width").unwrap_or(DEFAULT_WIDTH);
        let base = widths("baseWidths")?.unwrap_or_else(|| vec![scalar; ncurves]);
        let tip = widths("tipWidths")?.unwrap_or_else(|| base.clone());

        let mut points = Vec::with_capacity(group.cvs.len() + 4 * ncurves);
        let mut start = 0usize;
        for count in &group.counts {
            let curve = &group.cvs[start..start + *count as usize];
            start += *count as usize;
            let tripled = triple_ends(curve);
            group.nverts.push(tripled.len() as i32);
            points.extend(tripled);
        }
        group.params.push(vec3_record("P", ParameterType::Point, DetailType::Vertex, &points));

        let first = base.first().copied().unwrap_or(scalar);
        let uniform = base.iter().chain(&tip).all(|w| *w == first);
        if uniform {
            group.params.push(constant_float("constantwidth", first));
        } else {
            let profile: Vec<f32> = group
                .nverts
                .iter()
                .zip(base.iter().zip(&tip))
                .flat_map(|(n, (b, t))| width_profile(*b, *t, *n))
                .collect();
            group.params.push(float_record("width", DetailType::Varying, &profile));
        }
        group.params.extend(list::extra_surface_parameters(attrs, ObjectType::Curves, None));
        Ok(group)
    }

    pub fn ncurves(&self) -> usize {
        self.nverts.len()
    }

    pub fn nverts(&self) -> &[i32] {
        &self.nverts
    }
}

impl RibPrimitive for CurveGroupData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Curves
    }

    fn granularity(&self) -> u32 {
        u32::from(!self.nverts.is_empty())
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        enc.curves("cubic", &self.nverts, "nonperiodic", &self.params)
    }

    fn compare(&self, other: &RibData) -> bool {
        match other {
            RibData::Curves(other) => self.counts == other.counts && equiv_points(&self.cvs, &other.cvs),
            _ => false,
        }
    }

    fn parameters(&self) -> &[ParameterRecord] {
        &self.params
    }
}

/// CVs with the first and last each repeated twice more.
fn triple_ends(cvs: &[Vec3]) -> Vec<Vec3> {
    let (Some(first), Some(last)) = (cvs.first(), cvs.last()) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(cvs.len() + 4);
    out.extend([*first, *first]);
    out.extend_from_slice(cvs);
    out.extend([*last, *last]);
    out
}

/// Varying widths along a cubic curve of `nverts` vertices, tapering from
/// `base` to `tip`. Holds `nverts - 2` values.
fn width_profile(base: f32, tip: f32, nverts: i32) -> Vec<f32> {
    let n = (nverts - 2).max(0) as usize;
    let mut widths = Vec::with_capacity(n);
    if n < 4 {
        widths.resize(n, base);
        return widths;
    }
    widths.extend([base, base]);
    let steps = (nverts - 5) as f32;
    for i in 3..nverts - 3 {
        widths.push(base + (i - 2) as f32 * (tip - base) / steps);
    }
    widths.extend([tip, tip]);
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::rib::EncoderConfig;

    fn line(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_width_profile() {
        assert_eq!(width_profile(1.0, 0.0, 6), vec![1.0, 1.0, 0.0, 0.0]);
        let w = width_profile(1.0, 0.0, 9);
        assert_eq!(w.len(), 7);
        assert_eq!(&w[..2], &[1.0, 1.0]);
        assert_eq!(&w[5..], &[0.0, 0.0]);
        assert!(w[2] > w[3] && w[3] > w[4]);
    }

    #[test]
    fn test_nucurve_constant_width() -> Result<()> {
        let attrs = AttributeMap::new().with("cvs", line(4));
        let mut curve = NuCurveData::from_attributes("|crv", &attrs)?;
        assert_eq!(curve.nverts(), 8);
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        curve.write_grain(0, &mut enc)?;
        let out = String::from_utf8(enc.into_bytes()?).expect("utf8");
        assert!(out.contains("Curves \"cubic\" [8] \"nonperiodic\" \"P\""));
        assert!(out.contains("\"constantwidth\" [0.1]"));
        Ok(())
    }

    #[test]
    fn test_nucurve_tapered() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("cvs", line(5))
            .with("baseWidth", 0.5f32)
            .with("tipWidth", 0.1f32);
        let curve = NuCurveData::from_attributes("|crv", &attrs)?;
        let width = list::find(curve.parameters(), "width").expect("width");
        assert_eq!(width.detail_type(), DetailType::Varying);
        assert_eq!(width.array_size(), 7);
        Ok(())
    }

    #[test]
    fn test_nucurve_slight_taper_keeps_width() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("cvs", line(5))
            .with("baseWidth", 0.1f32)
            .with("tipWidth", 0.10005f32);
        let curve = NuCurveData::from_attributes("|crv", &attrs)?;
        assert!(list::find(curve.parameters(), "constantwidth").is_none());
        let width = list::find(curve.parameters(), "width").expect("width");
        assert_eq!(width.detail_type(), DetailType::Varying);
        Ok(())
    }

    #[test]
    fn test_short_curve_writes_nothing() -> Result<()> {
        let curve = NuCurveData::from_attributes("|crv", &AttributeMap::new().with("cvs", line(1)))?;
        assert_eq!(curve.granularity(), 0);
        Ok(())
    }

    #[test]
    fn test_group_uniform_width() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("curveCounts", vec![2, 3])
            .with("cvs", line(5))
            .with("width", 0.25f32);
        let group = CurveGroupData::from_attributes("|hair", &attrs)?;
        assert_eq!(group.nverts(), &[6, 7]);
        let w = list::find(group.parameters(), "constantwidth").expect("constantwidth");
        assert_eq!(w.floats(), Some(&[0.25][..]));
        Ok(())
    }

    #[test]
    fn test_group_varying_width() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("curveCounts", vec![2, 3])
            .with("cvs", line(5))
            .with("baseWidths", vec![0.2f32, 0.4])
            .with("tipWidths", vec![0.1f32, 0.1]);
        let group = CurveGroupData::from_attributes("|hair", &attrs)?;
        let w = list::find(group.parameters(), "width").expect("width");
        assert_eq!(w.array_size(), 4 + 5);
        Ok(())
    }

    #[test]
    fn test_group_slight_taper_keeps_width() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("curveCounts", vec![2, 3])
            .with("cvs", line(5))
            .with("baseWidths", vec![0.1f32, 0.1])
            .with("tipWidths", vec![0.1f32, 0.10005]);
        let group = CurveGroupData::from_attributes("|hair", &attrs)?;
        assert!(list::find(group.parameters(), "constantwidth").is_none());
        assert!(list::find(group.parameters(), "width").is_some());
        Ok(())
    }

    #[test]
    fn test_group_disabled() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("curveCounts", vec![2])
            .with("cvs", line(2))
            .with("renderAllCurves", false);
        let group = CurveGroupData::from_attributes("|hair", &attrs)?;
        assert_eq!(group.ncurves(), 0);
        assert_eq!(group.granularity(), 0);
        Ok(())
    }

    #[test]
    fn test_group_bad_counts() {
        let attrs = AttributeMap::new().with("curveCounts", vec![3]).with("cvs", line(2));
        assert!(CurveGroupData::from_attributes("|hair", &attrs).is_err());
    }
}
