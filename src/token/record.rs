//! Named, typed, detail-classed parameter records.
//!
//! A [`ParameterRecord`] is one `"token" [values]` pair of a RIB parameter
//! list. Numeric types own a float buffer that may be shared with the caller
//! (clone shares, writes copy on demand); string and shader types own a list
//! of strings instead. Exactly one of the two is populated at any time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result, Vec3};

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    Float,
    Point,
    Vector,
    Normal,
    Color,
    String,
    Hpoint,
    Matrix,
    Shader,
}

impl ParameterType {
    /// Number of floats per element (0 for string-like types).
    #[inline]
    pub fn element_size(self) -> usize {
        match self {
            Self::Float => 1,
            Self::Point | Self::Vector | Self::Normal | Self::Color => 3,
            Self::Hpoint => 4,
            Self::Matrix => 16,
            Self::String | Self::Shader => 0,
        }
    }

    /// String and shader records carry strings, not floats.
    #[inline]
    pub fn is_string_like(self) -> bool {
        matches!(self, Self::String | Self::Shader)
    }

    /// RIB type keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Point => "point",
            Self::Vector => "vector",
            Self::Normal => "normal",
            Self::Color => "color",
            Self::String => "string",
            Self::Hpoint => "hpoint",
            Self::Matrix => "matrix",
            Self::Shader => "shader",
        }
    }
}

/// Interpolation class of a parameter across a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailType {
    #[default]
    Undefined,
    Uniform,
    Varying,
    Vertex,
    Constant,
    FaceVarying,
    FaceVertex,
}

impl DetailType {
    /// RIB class keyword, `None` when undefined.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Undefined => None,
            Self::Uniform => Some("uniform"),
            Self::Varying => Some("varying"),
            Self::Vertex => Some("vertex"),
            Self::Constant => Some("constant"),
            Self::FaceVarying => Some("facevarying"),
            Self::FaceVertex => Some("facevertex"),
        }
    }

    /// Parse a RIB class keyword.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uniform" => Some(Self::Uniform),
            "varying" => Some(Self::Varying),
            "vertex" => Some(Self::Vertex),
            "constant" => Some(Self::Constant),
            "facevarying" => Some(Self::FaceVarying),
            "facevertex" => Some(Self::FaceVertex),
            _ => None,
        }
    }
}

/// Array shape requested from [`ParameterRecord::try_set_shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayShape {
    /// One element.
    Scalar,
    /// `n` elements.
    Array(u32),
    /// `n` elements each holding a fixed-size sub-array of `u` values.
    UArray(u32, u32),
}

/// Borrowed view of the values a record binds to its token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue<'a> {
    Floats(&'a [f32]),
    Strings(&'a [String]),
}

impl ParamValue<'_> {
    /// Number of scalar values (floats or strings).
    pub fn len(&self) -> usize {
        match self {
            Self::Floats(f) => f.len(),
            Self::Strings(s) => s.len(),
        }
    }

    /// True when no values are bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named parameter ready for the wire.
#[derive(Clone, Default, PartialEq)]
pub struct ParameterRecord {
    name: String,
    param_type: ParameterType,
    detail: DetailType,
    array_size: u32,
    u_array_size: u32,
    floats: Option<Arc<Vec<f32>>>,
    strings: Vec<String>,
}

impl ParameterRecord {
    /// Create an empty record (no name, no buffer).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-element record. An empty name yields an empty record.
    pub fn scalar(name: &str, param_type: ParameterType) -> Self {
        let mut rec = Self::new();
        rec.set(name, param_type);
        rec
    }

    /// Create an array record of `size` elements.
    pub fn array(name: &str, param_type: ParameterType, size: u32) -> Self {
        let mut rec = Self::new();
        rec.set_array(name, param_type, size);
        rec
    }

    /// Create a u-array record of `size` elements with `u_size` values each.
    pub fn u_array(name: &str, param_type: ParameterType, size: u32, u_size: u32) -> Self {
        let mut rec = Self::new();
        rec.set_u_array(name, param_type, size, u_size);
        rec
    }

    /// Builder-style detail assignment.
    pub fn with_detail(mut self, detail: DetailType) -> Self {
        self.detail = detail;
        self
    }

    /// Declare a single-element parameter. Returns false if `name` is empty.
    pub fn set(&mut self, name: &str, param_type: ParameterType) -> bool {
        self.try_set_shape(name, param_type, ArrayShape::Scalar).is_ok()
    }

    /// Declare an array parameter. Returns false on an empty name or zero size.
    pub fn set_array(&mut self, name: &str, param_type: ParameterType, size: u32) -> bool {
        self.try_set_shape(name, param_type, ArrayShape::Array(size)).is_ok()
    }

    /// Declare a u-array parameter. Returns false on an empty name or a zero size.
    pub fn set_u_array(
        &mut self,
        name: &str,
        param_type: ParameterType,
        size: u32,
        u_size: u32,
    ) -> bool {
        self.try_set_shape(name, param_type, ArrayShape::UArray(size, u_size)).is_ok()
    }

    /// Declare the record's shape and reinitialize its buffers.
    ///
    /// On error the record is left untouched. The previous float buffer is
    /// released, which only frees it if no other owner still holds it.
    pub fn try_set_shape(
        &mut self,
        name: &str,
        param_type: ParameterType,
        shape: ArrayShape,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::parameter(name, "empty token name"));
        }
        let (array_size, u_array_size) = match shape {
            ArrayShape::Scalar => (0, 0),
            ArrayShape::Array(0) | ArrayShape::UArray(0, _) => {
                return Err(Error::parameter(name, "zero array size"));
            }
            ArrayShape::UArray(_, 0) => {
                return Err(Error::parameter(name, "zero u-array size"));
            }
            ArrayShape::Array(n) => (n, 0),
            ArrayShape::UArray(n, u) => (n, u),
        };

        self.name = name.to_string();
        self.param_type = param_type;
        self.array_size = array_size;
        self.u_array_size = u_array_size;

        if param_type.is_string_like() {
            self.floats = None;
            self.strings = vec![String::new(); array_size.max(1) as usize];
        } else {
            self.strings.clear();
            self.floats = Some(Arc::new(vec![0.0; self.needed_floats()]));
        }
        Ok(())
    }

    /// Release every buffer and forget the declaration.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn needed_floats(&self) -> usize {
        let elt = self.param_type.element_size();
        if self.is_array() {
            self.array_size as usize * elt * (self.u_array_size.max(1) as usize)
        } else {
            elt
        }
    }

    fn floats_mut(&mut self) -> &mut Vec<f32> {
        let needed = self.needed_floats();
        let buf = self.floats.get_or_insert_with(|| Arc::new(vec![0.0; needed]));
        Arc::make_mut(buf)
    }

    /// Grow the float buffer to hold at least `size` floats.
    pub fn reserve(&mut self, size: usize) {
        if self.param_type.is_string_like() {
            return;
        }
        let buf = self.floats_mut();
        if buf.len() < size {
            buf.resize(size, 0.0);
        }
    }

    // ---- Value setters ----

    fn put(&mut self, offset: usize, values: &[f32]) {
        debug_assert!(
            !self.param_type.is_string_like(),
            "float write into string record '{}'",
            self.name
        );
        let buf = self.floats_mut();
        debug_assert!(offset + values.len() <= buf.len(), "token write out of bounds");
        if offset + values.len() > buf.len() {
            buf.resize(offset + values.len(), 0.0);
        }
        buf[offset..offset + values.len()].copy_from_slice(values);
    }

    /// Write a scalar float at element `index`.
    pub fn set_token_float(&mut self, index: usize, v: f32) {
        self.put(index, &[v]);
    }

    /// Write float `u` of element `index` in a u-array record.
    pub fn set_token_float_u(&mut self, index: usize, u: usize, v: f32) {
        let stride = self.u_array_size.max(1) as usize;
        self.put(index * stride + u, &[v]);
    }

    /// Write a 3-float element (point, vector, normal, color).
    pub fn set_token_float3(&mut self, index: usize, x: f32, y: f32, z: f32) {
        self.put(index * 3, &[x, y, z]);
    }

    /// Write a [`Vec3`] element.
    pub fn set_token_vec3(&mut self, index: usize, v: Vec3) {
        self.set_token_float3(index, v.x, v.y, v.z);
    }

    /// Write a homogeneous point element.
    pub fn set_token_float4(&mut self, index: usize, x: f32, y: f32, z: f32, w: f32) {
        self.put(index * 4, &[x, y, z, w]);
    }

    /// Write a matrix element.
    pub fn set_token_matrix(&mut self, index: usize, m: &[f32; 16]) {
        self.put(index * 16, m);
    }

    /// Copy `values` into the record's own buffer.
    pub fn set_token_floats(&mut self, values: &[f32]) {
        let buf = self.floats_mut();
        buf.clear();
        buf.extend_from_slice(values);
    }

    /// Take ownership of an externally built buffer.
    ///
    /// The record and any other holder of `buffer` share it; the record copies
    /// before its first mutation.
    pub fn set_token_floats_shared(&mut self, buffer: Arc<Vec<f32>>) {
        self.floats = Some(buffer);
    }

    /// Copy a point array in, three floats per point.
    pub fn set_token_points(&mut self, points: &[Vec3]) {
        self.set_token_floats(bytemuck::cast_slice(points));
    }

    /// Write string `index`.
    pub fn set_token_string(&mut self, index: usize, value: impl Into<String>) {
        debug_assert!(self.param_type.is_string_like(), "string write into float record");
        if index >= self.strings.len() {
            self.strings.resize(index + 1, String::new());
        }
        self.strings[index] = value.into();
    }

    /// Set the interpolation class.
    pub fn set_detail_type(&mut self, detail: DetailType) {
        self.detail = detail;
    }

    // ---- Queries ----

    /// Token name without declaration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value type.
    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    /// Interpolation class.
    pub fn detail_type(&self) -> DetailType {
        self.detail
    }

    /// Number of elements (0 for scalar records).
    pub fn array_size(&self) -> u32 {
        self.array_size
    }

    /// Per-element sub-array size (0 when not a u-array).
    pub fn u_array_size(&self) -> u32 {
        self.u_array_size
    }

    /// True when declared with a non-zero element count.
    pub fn is_array(&self) -> bool {
        self.array_size != 0
    }

    /// True when each element holds a fixed-size sub-array.
    pub fn is_u_array(&self) -> bool {
        self.u_array_size != 0
    }

    /// Float buffer, if numeric.
    pub fn floats(&self) -> Option<&[f32]> {
        self.floats.as_deref().map(Vec::as_slice)
    }

    /// Shared handle on the float buffer.
    pub fn shared_floats(&self) -> Option<Arc<Vec<f32>>> {
        self.floats.clone()
    }

    /// String values, if string-like.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// True when no float buffer is held.
    pub fn empty(&self) -> bool {
        self.floats.is_none()
    }

    /// The conventional `st` pair that callers special-case.
    pub fn is_basic_st(&self) -> bool {
        self.name == "st"
            && !matches!(self.detail, DetailType::FaceVarying | DetailType::FaceVertex)
    }

    /// Type declaration string, e.g. `"facevarying float[2]"`.
    pub fn get_ri_declare(&self) -> String {
        let mut decl = String::new();
        if let Some(class) = self.detail.as_str() {
            decl.push_str(class);
            decl.push(' ');
        }
        decl.push_str(self.param_type.as_str());
        if self.param_type.is_string_like() {
            if self.is_array() {
                decl.push_str(&format!("[{}]", self.array_size));
            }
        } else if self.is_u_array() {
            decl.push_str(&format!("[{}]", self.u_array_size));
        }
        decl
    }

    /// Declaration followed by the name, usable as an inline token.
    pub fn get_detailed_token_name(&self) -> String {
        format!("{} {}", self.get_ri_declare(), self.name)
    }

    /// All values bound to the token.
    pub fn get_rt_pointer(&self) -> ParamValue<'_> {
        if self.param_type.is_string_like() {
            ParamValue::Strings(&self.strings)
        } else {
            ParamValue::Floats(self.floats().unwrap_or(&[]))
        }
    }

    /// Values of element `i` only; the whole data when the record is scalar.
    pub fn get_ith_rt_pointer(&self, i: usize) -> ParamValue<'_> {
        if !self.is_array() {
            return self.get_rt_pointer();
        }
        if self.param_type.is_string_like() {
            let end = (i + 1).min(self.strings.len());
            return ParamValue::Strings(&self.strings[i.min(end)..end]);
        }
        let stride = self.param_type.element_size() * self.u_array_size.max(1) as usize;
        let floats = self.floats().unwrap_or(&[]);
        let start = (i * stride).min(floats.len());
        let end = (start + stride).min(floats.len());
        ParamValue::Floats(&floats[start..end])
    }
}

impl fmt::Debug for ParameterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterRecord(\"{}\"", self.get_detailed_token_name())?;
        match self.get_rt_pointer() {
            ParamValue::Floats(v) => write!(f, ", {} floats)", v.len()),
            ParamValue::Strings(s) => write!(f, ", {:?})", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sizes() {
        let p = ParameterRecord::array("P", ParameterType::Point, 4);
        assert_eq!(p.floats().map(<[f32]>::len), Some(12));

        let st = ParameterRecord::u_array("st", ParameterType::Float, 6, 2);
        assert_eq!(st.floats().map(<[f32]>::len), Some(12));

        let m = ParameterRecord::scalar("xform", ParameterType::Matrix);
        assert_eq!(m.floats().map(<[f32]>::len), Some(16));

        let s = ParameterRecord::array("names", ParameterType::String, 3);
        assert!(s.empty());
        assert_eq!(s.strings().len(), 3);
    }

    #[test]
    fn test_malformed_set_keeps_prior_state() {
        let mut rec = ParameterRecord::array("width", ParameterType::Float, 2);
        assert!(!rec.set("", ParameterType::Point));
        assert!(!rec.set_array("width", ParameterType::Float, 0));
        assert!(!rec.set_u_array("st", ParameterType::Float, 3, 0));
        assert_eq!(rec.name(), "width");
        assert_eq!(rec.array_size(), 2);
        assert!(matches!(
            rec.try_set_shape("", ParameterType::Float, ArrayShape::Scalar),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_declarations() {
        let p = ParameterRecord::array("P", ParameterType::Point, 8).with_detail(DetailType::Vertex);
        assert_eq!(p.get_ri_declare(), "vertex point");
        assert_eq!(p.get_detailed_token_name(), "vertex point P");

        let st = ParameterRecord::u_array("st", ParameterType::Float, 4, 2)
            .with_detail(DetailType::FaceVarying);
        assert_eq!(st.get_ri_declare(), "facevarying float[2]");
        assert!(!st.is_basic_st());

        let names = ParameterRecord::array("maps", ParameterType::String, 3);
        assert_eq!(names.get_ri_declare(), "string[3]");

        let plain = ParameterRecord::scalar("intensity", ParameterType::Float);
        assert_eq!(plain.get_detailed_token_name(), "float intensity");
    }

    #[test]
    fn test_indexed_writes() {
        let mut st = ParameterRecord::u_array("st", ParameterType::Float, 2, 2);
        st.set_token_float_u(1, 0, 0.25);
        st.set_token_float_u(1, 1, 0.75);
        assert_eq!(st.floats(), Some(&[0.0, 0.0, 0.25, 0.75][..]));
        assert_eq!(st.get_ith_rt_pointer(1), ParamValue::Floats(&[0.25, 0.75]));

        let mut p = ParameterRecord::array("P", ParameterType::Point, 2);
        p.set_token_vec3(1, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.get_ith_rt_pointer(1), ParamValue::Floats(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_shared_buffer_transfer_vs_copy() {
        let shared = Arc::new(vec![1.0_f32, 2.0, 3.0]);
        let mut rec = ParameterRecord::scalar("Cs", ParameterType::Color);
        rec.set_token_floats_shared(Arc::clone(&shared));
        assert_eq!(Arc::strong_count(&shared), 2);

        // Mutation detaches the record from the caller's buffer.
        rec.set_token_float(0, 9.0);
        assert_eq!(shared[0], 1.0);
        assert_eq!(rec.floats(), Some(&[9.0, 2.0, 3.0][..]));
        assert_eq!(Arc::strong_count(&shared), 1);

        let mut copy = ParameterRecord::scalar("Os", ParameterType::Color);
        let local = [0.5_f32, 0.5, 0.5];
        copy.set_token_floats(&local);
        assert_eq!(copy.floats(), Some(&local[..]));
    }

    #[test]
    fn test_reset_releases_buffer() {
        let mut rec = ParameterRecord::array("P", ParameterType::Point, 3);
        let shared = rec.shared_floats().expect("buffer");
        rec.reset();
        assert!(rec.empty());
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn test_strings() {
        let mut s = ParameterRecord::scalar("shadowname", ParameterType::String);
        s.set_token_string(0, "raytrace");
        assert_eq!(s.get_rt_pointer(), ParamValue::Strings(&["raytrace".to_string()]));
    }
}
