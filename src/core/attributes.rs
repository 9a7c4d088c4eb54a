//! Host attribute access.
//!
//! Data objects pull their state from the host application through
//! [`AttributeSource`]: a named-attribute getter that returns a typed value
//! or nothing. [`AttributeMap`] is an in-memory implementation used by the
//! CLI scene description and by tests.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::util::Vec3;

/// A single attribute value as handed over by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    VectorArray(Vec<[f64; 3]>),
    StringArray(Vec<String>),
}

impl AttrValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Bool(v) => Some(f64::from(u8::from(*v))),
            _ => None,
        }
    }

    fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::FloatArray(v) => Some(v.clone()),
            Self::IntArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Self::VectorArray(v) => Some(v.iter().flatten().copied().collect()),
            _ => None,
        }
    }

    /// Number of elements for array values, `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Self::IntArray(v) => Some(v.len()),
            Self::FloatArray(v) => Some(v.len()),
            Self::VectorArray(v) => Some(v.len()),
            Self::StringArray(v) => Some(v.len()),
            _ => None,
        }
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec3> for AttrValue {
    fn from(v: Vec3) -> Self {
        Self::FloatArray(vec![f64::from(v.x), f64::from(v.y), f64::from(v.z)])
    }
}

impl From<Vec<f32>> for AttrValue {
    fn from(v: Vec<f32>) -> Self {
        Self::FloatArray(v.into_iter().map(f64::from).collect())
    }
}

impl From<Vec<i32>> for AttrValue {
    fn from(v: Vec<i32>) -> Self {
        Self::IntArray(v.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<Vec3>> for AttrValue {
    fn from(v: Vec<Vec3>) -> Self {
        Self::VectorArray(
            v.into_iter()
                .map(|p| [f64::from(p.x), f64::from(p.y), f64::from(p.z)])
                .collect(),
        )
    }
}

impl From<Vec<&str>> for AttrValue {
    fn from(v: Vec<&str>) -> Self {
        Self::StringArray(v.into_iter().map(str::to_string).collect())
    }
}

/// Named-attribute getter supplied by the host application.
///
/// Only [`value`](Self::value) and [`attribute_names`](Self::attribute_names)
/// are required; the typed getters coerce between compatible shapes
/// (ints read as floats, flat float arrays read as vectors, ...).
pub trait AttributeSource {
    /// Raw value of `name`, if present.
    fn value(&self, name: &str) -> Option<Cow<'_, AttrValue>>;

    /// Names of every attribute, used to discover `rman*` extras.
    fn attribute_names(&self) -> Vec<String>;

    /// True when `name` exists.
    fn has(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    fn get_float(&self, name: &str) -> Option<f32> {
        self.value(name)?.as_f64().map(|v| v as f32)
    }

    fn get_int(&self, name: &str) -> Option<i32> {
        match &*self.value(name)? {
            AttrValue::Int(v) => i32::try_from(*v).ok(),
            AttrValue::Bool(v) => Some(i32::from(*v)),
            AttrValue::Float(v) => Some(*v as i32),
            _ => None,
        }
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        match &*self.value(name)? {
            AttrValue::Bool(v) => Some(*v),
            AttrValue::Int(v) => Some(*v != 0),
            AttrValue::Float(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    fn get_string(&self, name: &str) -> Option<String> {
        match &*self.value(name)? {
            AttrValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn get_vec3(&self, name: &str) -> Option<Vec3> {
        let v = self.value(name)?.as_f64_vec()?;
        (v.len() == 3).then(|| Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32))
    }

    fn get_float_array(&self, name: &str) -> Option<Vec<f32>> {
        let v = self.value(name)?.as_f64_vec()?;
        Some(v.into_iter().map(|x| x as f32).collect())
    }

    fn get_int_array(&self, name: &str) -> Option<Vec<i32>> {
        match &*self.value(name)? {
            AttrValue::IntArray(v) => v.iter().map(|x| i32::try_from(*x).ok()).collect(),
            _ => None,
        }
    }

    fn get_vec3_array(&self, name: &str) -> Option<Vec<Vec3>> {
        match &*self.value(name)? {
            AttrValue::VectorArray(v) => Some(
                v.iter()
                    .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32))
                    .collect(),
            ),
            other => {
                let flat = other.as_f64_vec()?;
                if flat.len() % 3 != 0 {
                    return None;
                }
                Some(
                    flat.chunks_exact(3)
                        .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
                        .collect(),
                )
            }
        }
    }

    fn get_string_array(&self, name: &str) -> Option<Vec<String>> {
        match &*self.value(name)? {
            AttrValue::StringArray(v) => Some(v.clone()),
            AttrValue::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

/// In-memory attribute set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap {
    values: BTreeMap<String, AttrValue>,
}

impl AttributeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        self.values.remove(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AttributeSource for AttributeMap {
    fn value(&self, name: &str) -> Option<Cow<'_, AttrValue>> {
        self.values.get(name).map(Cow::Borrowed)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters_coerce() {
        let attrs = AttributeMap::new()
            .with("radius", 2)
            .with("visible", true)
            .with("color", Vec3::new(1.0, 0.5, 0.25))
            .with("counts", vec![3, 4])
            .with("P", vec![Vec3::ZERO, Vec3::ONE]);

        assert_eq!(attrs.get_float("radius"), Some(2.0));
        assert_eq!(attrs.get_int("visible"), Some(1));
        assert_eq!(attrs.get_vec3("color"), Some(Vec3::new(1.0, 0.5, 0.25)));
        assert_eq!(attrs.get_int_array("counts"), Some(vec![3, 4]));
        assert_eq!(attrs.get_float_array("counts"), Some(vec![3.0, 4.0]));
        assert_eq!(attrs.get_vec3_array("P").map(|p| p.len()), Some(2));
        assert_eq!(attrs.get_float("missing"), None);
    }

    #[test]
    fn test_json_roundtrip_shapes() -> crate::util::Result<()> {
        let json = r#"{ "radius": 1.5, "nverts": [3, 3], "P": [[0,0,0],[1,0,0]], "name": "ball" }"#;
        let attrs: AttributeMap = serde_json::from_str(json)?;
        assert_eq!(attrs.get_float("radius"), Some(1.5));
        assert_eq!(attrs.get_int_array("nverts"), Some(vec![3, 3]));
        assert_eq!(attrs.get_vec3_array("P"), Some(vec![Vec3::ZERO, Vec3::X]));
        assert_eq!(attrs.get_string("name").as_deref(), Some("ball"));
        Ok(())
    }
}
