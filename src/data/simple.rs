//! Implicit spheres, locators, coordinate systems and clipping planes.

use super::{RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::RibEncoder;
use crate::util::{equiv, Result, Vec3};

/// Implicit sphere of the given radius, read from `radius` (default 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImplicitSphereData {
    radius: f32,
}

impl ImplicitSphereData {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    pub fn from_attributes(attrs: &dyn AttributeSource) -> Self {
        Self::new(attrs.get_float("radius").unwrap_or(1.0))
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl RibPrimitive for ImplicitSphereData {
    fn object_type(&self) -> ObjectType {
        ObjectType::ImplicitSphere
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let r = self.radius;
        enc.sphere(r, -r, r, 360.0, &[])
    }

    fn compare(&self, other: &RibData) -> bool {
        matches!(other, RibData::ImplicitSphere(o) if equiv(o.radius, self.radius))
    }
}

/// Locators carry only their transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocatorData;

impl RibPrimitive for LocatorData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Locator
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        enc.translate(0.0, 0.0, 0.0)
    }

    fn compare(&self, other: &RibData) -> bool {
        matches!(other, RibData::Locator(_))
    }
}

/// Named coordinate system at the node's transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordData {
    name: String,
}

impl CoordData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RibPrimitive for CoordData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Coord
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        enc.coordinate_system(&self.name)
    }

    fn compare(&self, other: &RibData) -> bool {
        matches!(other, RibData::Coord(_))
    }
}

/// Clipping plane through the local origin, keeping the local -Z side.
///
/// A coordinate system of the same name is declared alongside so shaders
/// can find the plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPlaneData {
    name: String,
}

impl ClipPlaneData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RibPrimitive for ClipPlaneData {
    fn object_type(&self) -> ObjectType {
        ObjectType::ClipPlane
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        enc.coordinate_system(&self.name)?;
        enc.clipping_plane(Vec3::ZERO, Vec3::NEG_Z)
    }

    fn compare(&self, other: &RibData) -> bool {
        matches!(other, RibData::ClipPlane(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::rib::EncoderConfig;

    fn render(data: &mut dyn RibPrimitive) -> Result<String> {
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        data.write_grain(0, &mut enc)?;
        Ok(String::from_utf8(enc.into_bytes()?).expect("utf8"))
    }

    #[test]
    fn test_sphere() -> Result<()> {
        let mut s = ImplicitSphereData::from_attributes(&AttributeMap::new().with("radius", 3.0f32));
        assert_eq!(render(&mut s)?, "Sphere 3 -3 3 360\n");
        assert!(s.compare(&RibData::ImplicitSphere(ImplicitSphereData::new(3.0))));
        assert!(!s.compare(&RibData::ImplicitSphere(ImplicitSphereData::new(1.0))));
        Ok(())
    }

    #[test]
    fn test_locator_and_coord() -> Result<()> {
        assert_eq!(render(&mut LocatorData)?, "Translate 0 0 0\n");
        assert_eq!(render(&mut CoordData::new("refFrame"))?, "CoordinateSystem \"refFrame\"\n");
        assert!(LocatorData.compare(&RibData::Locator(LocatorData)));
        assert!(!LocatorData.compare(&RibData::Coord(CoordData::new("x"))));
        Ok(())
    }

    #[test]
    fn test_clip_plane() -> Result<()> {
        let out = render(&mut ClipPlaneData::new("cut"))?;
        assert!(out.starts_with("CoordinateSystem \"cut\"\n"));
        assert!(out.contains("ClippingPlane 0 0 0 0 0 -1"));
        Ok(())
    }
}
