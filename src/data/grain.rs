//! Grain-by-grain emission of a data object.
//!
//! Most objects are one grain. Particle spheres and sprites are one grain
//! per particle, NURBS with trims are two. The emitter interleaves grains of
//! several motion samples inside per-grain motion blocks, so each
//! [`DataObject`] keeps a cursor over its own grains.

use tracing::trace;

use super::{RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::{LightHandle, RibEncoder};
use crate::util::{Error, Result};

/// Position of the grain cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrainCursor {
    #[default]
    NotStarted,
    /// Index of the next grain to write.
    Emitting(u32),
    Done,
}

/// A named data object with its grain cursor.
#[derive(Debug)]
pub struct DataObject {
    name: String,
    data: RibData,
    cursor: GrainCursor,
}

impl DataObject {
    pub fn new(name: impl Into<String>, data: RibData) -> Self {
        Self { name: name.into(), data, cursor: GrainCursor::NotStarted }
    }

    /// Build from host attributes; see [`RibData::from_attributes`].
    pub fn from_attributes(
        object_type: ObjectType,
        name: &str,
        attrs: &dyn AttributeSource,
    ) -> Result<Self> {
        Ok(Self::new(name, RibData::from_attributes(object_type, name, attrs)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &RibData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut RibData {
        &mut self.data
    }

    pub fn object_type(&self) -> ObjectType {
        self.data.object_type()
    }

    pub fn granularity(&self) -> u32 {
        self.data.granularity()
    }

    pub fn cursor(&self) -> GrainCursor {
        self.cursor
    }

    /// Write every grain in order. The cursor is left alone.
    pub fn write(&mut self, enc: &mut RibEncoder) -> Result<()> {
        let n = self.data.granularity();
        trace!(object = %self.name, grains = n, "write");
        for grain in 0..n {
            self.data.write_grain(grain, enc)?;
        }
        Ok(())
    }

    /// Write the grain under the cursor and advance.
    ///
    /// Returns true while more grains remain. A zero-grain object writes
    /// nothing and returns false; calling again after the last grain is an
    /// error.
    pub fn write_next_grain(&mut self, enc: &mut RibEncoder) -> Result<bool> {
        let n = self.data.granularity();
        let grain = match self.cursor {
            GrainCursor::Done => {
                return Err(Error::GrainsExhausted { object: self.name.clone(), granularity: n });
            }
            GrainCursor::NotStarted => 0,
            GrainCursor::Emitting(g) => g,
        };
        if grain >= n {
            self.cursor = GrainCursor::Done;
            return Ok(false);
        }

        trace!(object = %self.name, grain, "write grain");
        self.data.write_grain(grain, enc)?;

        if grain + 1 < n {
            self.cursor = GrainCursor::Emitting(grain + 1);
            Ok(true)
        } else {
            self.cursor = GrainCursor::Done;
            Ok(false)
        }
    }

    /// Whether the grain under the cursor may be blurred.
    pub fn is_next_grain_animated(&self) -> bool {
        match self.cursor {
            GrainCursor::NotStarted => self.data.is_grain_animated(0),
            GrainCursor::Emitting(g) => self.data.is_grain_animated(g),
            GrainCursor::Done => false,
        }
    }

    /// Reset the cursor to the first grain.
    pub fn rewind(&mut self) {
        self.cursor = GrainCursor::NotStarted;
    }

    /// True when both samples are congruent.
    pub fn compare(&self, other: &DataObject) -> bool {
        self.data.compare(&other.data)
    }

    pub fn light_handle(&self) -> Option<LightHandle> {
        self.data.light_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::data::{ImplicitSphereData, NurbsData};
    use crate::rib::EncoderConfig;

    fn sphere() -> DataObject {
        DataObject::new("|ball", RibData::ImplicitSphere(ImplicitSphereData::new(2.0)))
    }

    #[test]
    fn test_single_grain_cursor() -> Result<()> {
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        let mut obj = sphere();
        assert_eq!(obj.cursor(), GrainCursor::NotStarted);
        assert!(!obj.write_next_grain(&mut enc)?);
        assert_eq!(obj.cursor(), GrainCursor::Done);
        assert!(matches!(
            obj.write_next_grain(&mut enc),
            Err(Error::GrainsExhausted { granularity: 1, .. })
        ));
        obj.rewind();
        assert!(!obj.write_next_grain(&mut enc)?);
        Ok(())
    }

    #[test]
    fn test_write_leaves_cursor() -> Result<()> {
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        let mut obj = sphere();
        obj.write(&mut enc)?;
        obj.write(&mut enc)?;
        assert_eq!(obj.cursor(), GrainCursor::NotStarted);
        let text = String::from_utf8(enc.into_bytes()?).expect("utf8");
        assert_eq!(text.matches("Sphere 2 -2 2 360").count(), 2);
        Ok(())
    }

    #[test]
    fn test_zero_grains() -> Result<()> {
        let attrs = AttributeMap::new()
            .with("uorder", 4)
            .with("vorder", 4)
            .with("nu", 0)
            .with("nv", 0)
            .with("uknots", Vec::<f32>::new())
            .with("vknots", Vec::<f32>::new())
            .with("cvs", Vec::<f32>::new());
        let mut obj = DataObject::new("|empty", RibData::Nurbs(NurbsData::from_attributes("|empty", &attrs)?));
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        assert_eq!(obj.granularity(), 0);
        assert!(!obj.write_next_grain(&mut enc)?);
        assert_eq!(obj.cursor(), GrainCursor::Done);
        assert!(enc.into_bytes()?.is_empty());
        Ok(())
    }
}
