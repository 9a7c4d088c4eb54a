//! NURBS patches with optional trim loops.
//!
//! Host attributes: `uorder`, `vorder`, `nu`, `nv`, `uknots`, `vknots`,
//! optional `umin`/`umax`/`vmin`/`vmax`, `cvs` (x y z w per CV, u fastest)
//! and `noNormalizeNurbs`. Host knot vectors omit the two end knots the
//! renderer expects; they are restored by duplicating the first and last.
//!
//! Trim loops come from `trimNcurves`, `trimOrder`, `trimKnots`, `trimMin`,
//! `trimMax`, `trimN`, `trimU`, `trimV` and `trimW`. A trimmed surface is
//! written in two grains: the `TrimCurve`, which is never blurred, then the
//! patch.

use super::{missing, topology, RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::{NuPatchArgs, RibEncoder, TrimCurveArgs};
use crate::token::{list, DetailType, ParameterList, ParameterRecord, ParameterType};
use crate::util::{equiv, equiv_slice, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrimLoops {
    pub ncurves: Vec<i32>,
    pub order: Vec<i32>,
    pub knot: Vec<f32>,
    pub min: Vec<f32>,
    pub max: Vec<f32>,
    pub n: Vec<i32>,
    pub u: Vec<f32>,
    pub v: Vec<f32>,
    pub w: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Direction {
    n: i32,
    order: i32,
    min: f32,
    max: f32,
}

#[derive(Debug, Clone)]
pub struct NurbsData {
    u: Direction,
    v: Direction,
    uknots: Vec<f32>,
    vknots: Vec<f32>,
    /// Homogeneous control points, `x*w y*w z*w w`.
    cvs: Vec<f32>,
    trims: Option<TrimLoops>,
    params: ParameterList,
}

impl NurbsData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let cvs = attrs.get_float_array("cvs").ok_or_else(|| missing(name, "cvs"))?;
        if cvs.is_empty() {
            return Ok(Self {
                u: Direction::default(),
                v: Direction::default(),
                uknots: Vec::new(),
                vknots: Vec::new(),
                cvs,
                trims: None,
                params: ParameterList::new(),
            });
        }

        let int = |attr: &str| attrs.get_int(attr).ok_or_else(|| missing(name, attr));
        let (uorder, vorder, nu, nv) = (int("uorder")?, int("vorder")?, int("nu")?, int("nv")?);
        if nu < 1 || nv < 1 || uorder < 2 || vorder < 2 {
            return Err(topology(name, format!("bad patch size {nu}x{nv} order {uorder}x{vorder}")));
        }
        if cvs.len() != (nu * nv * 4) as usize {
            return Err(topology(name, format!("{} cv floats for a {nu}x{nv} patch", cvs.len())));
        }

        let normalize = !attrs.get_bool("noNormalizeNurbs").unwrap_or(false);
        let (uknots, umin, umax) = knots(name, attrs, "u", nu, uorder, normalize)?;
        let (vknots, vmin, vmax) = knots(name, attrs, "v", nv, vorder, normalize)?;

        let homogeneous: Vec<f32> = cvs
            .chunks_exact(4)
            .flat_map(|c| [c[0] * c[3], c[1] * c[3], c[2] * c[3], c[3]])
            .collect();

        let mut params = ParameterList::new();
        let mut pw = ParameterRecord::array("Pw", ParameterType::Hpoint, (nu * nv) as u32)
            .with_detail(DetailType::Vertex);
        pw.set_token_floats(&homogeneous);
        params.push(pw);
        params.extend(list::extra_surface_parameters(attrs, ObjectType::Nurbs, None));

        Ok(Self {
            u: Direction { n: nu, order: uorder, min: umin, max: umax },
            v: Direction { n: nv, order: vorder, min: vmin, max: vmax },
            uknots,
            vknots,
            cvs: homogeneous,
            trims: trim_loops(name, attrs)?,
            params,
        })
    }

    pub fn uknots(&self) -> &[f32] {
        &self.uknots
    }

    pub fn vknots(&self) -> &[f32] {
        &self.vknots
    }

    pub fn trims(&self) -> Option<&TrimLoops> {
        self.trims.as_ref()
    }

    /// `(umin, umax, vmin, vmax)`.
    pub fn range(&self) -> (f32, f32, f32, f32) {
        (self.u.min, self.u.max, self.v.min, self.v.max)
    }

    fn write_patch(&self, enc: &mut RibEncoder) -> Result<()> {
        let args = NuPatchArgs {
            nu: self.u.n,
            uorder: self.u.order,
            uknot: &self.uknots,
            umin: self.u.min,
            umax: self.u.max,
            nv: self.v.n,
            vorder: self.v.order,
            vknot: &self.vknots,
            vmin: self.v.min,
            vmax: self.v.max,
        };
        enc.nu_patch(&args, &self.params)
    }
}

impl RibPrimitive for NurbsData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Nurbs
    }

    fn granularity(&self) -> u32 {
        match (self.cvs.is_empty(), self.trims.is_some()) {
            (true, _) => 0,
            (false, true) => 2,
            (false, false) => 1,
        }
    }

    fn write_grain(&mut self, grain: u32, enc: &mut RibEncoder) -> Result<()> {
        match (&self.trims, grain) {
            (Some(t), 0) => enc.trim_curve(&TrimCurveArgs {
                ncurves: &t.ncurves,
                order: &t.order,
                knot: &t.knot,
                min: &t.min,
                max: &t.max,
                n: &t.n,
                u: &t.u,
                v: &t.v,
                w: &t.w,
            }),
            _ => self.write_patch(enc),
        }
    }

    fn is_grain_animated(&self, grain: u32) -> bool {
        !(self.trims.is_some() && grain == 0)
    }

    fn compare(&self, other: &RibData) -> bool {
        let RibData::Nurbs(other) = other else {
            return false;
        };
        self.u.n == other.u.n
            && self.v.n == other.v.n
            && self.u.order == other.u.order
            && self.v.order == other.v.order
            && equiv(self.u.min, other.u.min)
            && equiv(self.u.max, other.u.max)
            && equiv(self.v.min, other.v.min)
            && equiv(self.v.max, other.v.max)
            && equiv_slice(&self.uknots, &other.uknots)
            && equiv_slice(&self.vknots, &other.vknots)
            && equiv_slice(&self.cvs, &other.cvs)
    }

    fn parameters(&self) -> &[ParameterRecord] {
        &self.params
    }
}

/// Full knot vector plus parameter range for one direction.
fn knots(
    name: &str,
    attrs: &dyn AttributeSource,
    dir: &str,
    n: i32,
    order: i32,
    normalize: bool,
) -> Result<(Vec<f32>, f32, f32)> {
    let attr = format!("{dir}knots");
    let host = attrs.get_float_array(&attr).ok_or_else(|| missing(name, &attr))?;
    let full = (n + order) as usize;
    let mut knots = if host.len() + 2 == full {
        let (Some(first), Some(last)) = (host.first(), host.last()) else {
            return Err(topology(name, format!("empty {attr}")));
        };
        let mut k = Vec::with_capacity(full);
        k.push(*first);
        k.extend_from_slice(&host);
        k.push(*last);
        k
    } else if host.len() == full {
        host
    } else {
        return Err(topology(name, format!("{attr} has {} entries, expected {}", host.len(), full - 2)));
    };

    let lo = knots[0];
    let hi = knots[knots.len() - 1];
    let mut min = attrs.get_float(&format!("{dir}min")).unwrap_or(knots[(order - 1) as usize]);
    let mut max = attrs.get_float(&format!("{dir}max")).unwrap_or(knots[n as usize]);
    if normalize && hi > lo {
        let span = hi - lo;
        for k in &mut knots {
            *k = (*k - lo) / span;
        }
        min = (min - lo) / span;
        max = (max - lo) / span;
    }
    Ok((knots, min, max))
}

fn trim_loops(name: &str, attrs: &dyn AttributeSource) -> Result<Option<TrimLoops>> {
    let Some(ncurves) = attrs.get_int_array("trimNcurves").filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let ints = |attr: &str| attrs.get_int_array(attr).ok_or_else(|| missing(name, attr));
    let floats = |attr: &str| attrs.get_float_array(attr).ok_or_else(|| missing(name, attr));
    let loops = TrimLoops {
        ncurves,
        order: ints("trimOrder")?,
        knot: floats("trimKnots")?,
        min: floats("trimMin")?,
        max: floats("trimMax")?,
        n: ints("trimN")?,
        u: floats("trimU")?,
        v: floats("trimV")?,
        w: floats("trimW")?,
    };

    if [&loops.ncurves, &loops.order, &loops.n].iter().any(|a| a.iter().any(|c| *c < 0)) {
        return Err(topology(name, "trim curve counts and orders must not be negative"));
    }
    let curves: usize = loops.ncurves.iter().map(|c| *c as usize).sum();
    let points: usize = loops.n.iter().map(|c| *c as usize).sum();
    let knot_count: usize = loops.n.iter().zip(&loops.order).map(|(n, o)| (*n + *o) as usize).sum();
    let consistent = [loops.order.len(), loops.n.len(), loops.min.len(), loops.max.len()]
        .iter()
        .all(|len| *len == curves)
        && loops.knot.len() == knot_count
        && [loops.u.len(), loops.v.len(), loops.w.len()].iter().all(|len| *len == points);
    if !consistent {
        return Err(topology(name, "trim curve arrays disagree in length"));
    }
    Ok(Some(loops))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::rib::EncoderConfig;

    /// Bilinear 2x2 patch with host knots spanning 0..2.
    fn plane() -> AttributeMap {
        AttributeMap::new()
            .with("uorder", 2)
            .with("vorder", 2)
            .with("nu", 2)
            .with("nv", 2)
            .with("uknots", vec![0.0f32, 2.0])
            .with("vknots", vec![0.0f32, 2.0])
            .with(
                "cvs",
                vec![0.0f32, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 2.0, 1.0, 1.0, 0.0, 1.0],
            )
    }

    fn square_trim(attrs: AttributeMap) -> AttributeMap {
        attrs
            .with("trimNcurves", vec![1])
            .with("trimOrder", vec![2])
            .with("trimKnots", vec![0.0f32, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0])
            .with("trimMin", vec![0.0f32])
            .with("trimMax", vec![4.0f32])
            .with("trimN", vec![5])
            .with("trimU", vec![0.2f32, 0.8, 0.8, 0.2, 0.2])
            .with("trimV", vec![0.2f32, 0.2, 0.8, 0.8, 0.2])
            .with("trimW", vec![1.0f32; 5])
    }

    #[test]
    fn test_knots_restored_and_normalized() -> Result<()> {
        let nurbs = NurbsData::from_attributes("|plane", &plane())?;
        assert_eq!(nurbs.uknots(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(nurbs.range(), (0.0, 1.0, 0.0, 1.0));
        Ok(())
    }

    #[test]
    fn test_unnormalized() -> Result<()> {
        let nurbs = NurbsData::from_attributes("|plane", &plane().with("noNormalizeNurbs", true))?;
        assert_eq!(nurbs.vknots(), &[0.0, 0.0, 2.0, 2.0]);
        assert_eq!(nurbs.range().1, 2.0);
        Ok(())
    }

    #[test]
    fn test_homogeneous_points() -> Result<()> {
        let nurbs = NurbsData::from_attributes("|plane", &plane())?;
        let pw = list::find(nurbs.parameters(), "Pw").expect("Pw");
        assert_eq!(&pw.floats().expect("floats")[8..12], &[0.0, 2.0, 0.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_trimmed_grains() -> Result<()> {
        let mut nurbs = NurbsData::from_attributes("|plane", &square_trim(plane()))?;
        assert_eq!(nurbs.granularity(), 2);
        assert!(!nurbs.is_grain_animated(0));
        assert!(nurbs.is_grain_animated(1));

        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        nurbs.write_grain(0, &mut enc)?;
        nurbs.write_grain(1, &mut enc)?;
        let out = String::from_utf8(enc.into_bytes()?).expect("utf8");
        let trim = out.find("TrimCurve [1] [2]").expect("trim");
        let patch = out.find("NuPatch 2 2 [0 0 1 1] 0 1 2 2").expect("patch");
        assert!(trim < patch);
        Ok(())
    }

    #[test]
    fn test_bad_trim_lengths() {
        let attrs = square_trim(plane()).with("trimW", vec![1.0f32; 4]);
        assert!(NurbsData::from_attributes("|plane", &attrs).is_err());
    }

    #[test]
    fn test_negative_trim_counts() {
        let attrs = square_trim(plane()).with("trimN", vec![-5]);
        let err = NurbsData::from_attributes("|plane", &attrs).unwrap_err();
        assert!(matches!(err, crate::util::Error::Topology { .. }));
    }

    #[test]
    fn test_compare() -> Result<()> {
        let a = NurbsData::from_attributes("|plane", &plane())?;
        let b = NurbsData::from_attributes("|plane", &plane())?;
        assert!(a.compare(&RibData::Nurbs(b)));
        let moved = plane().with("cvs", vec![0.5f32; 16]);
        let c = NurbsData::from_attributes("|plane", &moved)?;
        assert!(!a.compare(&RibData::Nurbs(c)));
        Ok(())
    }
}
