//! Variant value type stored in blackboard slots and task parameters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────────────────
// Variant
// ─────────────────────────────────────────────────────────────────────────────

/// Dynamically typed value held by a blackboard variable
///
/// Covers the primitive types game AI tasks trade in, plus a 3-component
/// vector for positions and directions, and compound arrays/objects for
/// everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Variant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// 3-component vector (x, y, z)
    Vec3([f64; 3]),
    Array(Vec<Variant>),
    Object(HashMap<String, Variant>),
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Null
    }
}

impl Variant {
    /// Name of the stored type, used in mismatch diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Null => "null",
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::Float(_) => "float",
            Variant::String(_) => "string",
            Variant::Vec3(_) => "vec3",
            Variant::Array(_) => "array",
            Variant::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 (also converts from float if lossless)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            Variant::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Get as f64 (also converts from int)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f64; 3]> {
        match self {
            Variant::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Variant]> {
        match self {
            Variant::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Variant>> {
        match self {
            Variant::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Loose truthiness, used when a condition checks a bare variable
    pub fn is_truthy(&self) -> bool {
        match self {
            Variant::Null => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::String(s) => !s.is_empty(),
            Variant::Vec3(_) => true,
            Variant::Array(items) => !items.is_empty(),
            Variant::Object(fields) => !fields.is_empty(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<()> for Variant {
    fn from(_: ()) -> Self {
        Variant::Null
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v as i64)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v as f64)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Float(v)
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<[f64; 3]> for Variant {
    fn from(v: [f64; 3]) -> Self {
        Variant::Vec3(v)
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(v: Vec<T>) -> Self {
        Variant::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Variant::Null,
        }
    }
}

impl From<HashMap<String, Variant>> for Variant {
    fn from(fields: HashMap<String, Variant>) -> Self {
        Variant::Object(fields)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VariantKind
// ─────────────────────────────────────────────────────────────────────────────

/// Native types that map to and from a [`Variant`]
///
/// Implemented for the primitives the blackboard reads and writes in typed
/// form. `Variant` itself implements it with a pass-through, so generic code
/// can fall back to the dynamic representation.
pub trait VariantKind: Sized {
    /// Name of the requested type, used in mismatch diagnostics
    const KIND: &'static str;

    fn from_variant(v: &Variant) -> Option<Self>;
    fn into_variant(self) -> Variant;
}

impl VariantKind for bool {
    const KIND: &'static str = "bool";

    fn from_variant(v: &Variant) -> Option<Self> {
        v.as_bool()
    }

    fn into_variant(self) -> Variant {
        Variant::Bool(self)
    }
}

impl VariantKind for i64 {
    const KIND: &'static str = "int";

    fn from_variant(v: &Variant) -> Option<Self> {
        v.as_int()
    }

    fn into_variant(self) -> Variant {
        Variant::Int(self)
    }
}

impl VariantKind for f64 {
    const KIND: &'static str = "float";

    fn from_variant(v: &Variant) -> Option<Self> {
        v.as_float()
    }

    fn into_variant(self) -> Variant {
        Variant::Float(self)
    }
}

impl VariantKind for String {
    const KIND: &'static str = "string";

    fn from_variant(v: &Variant) -> Option<Self> {
        v.as_str().map(str::to_string)
    }

    fn into_variant(self) -> Variant {
        Variant::String(self)
    }
}

impl VariantKind for [f64; 3] {
    const KIND: &'static str = "vec3";

    fn from_variant(v: &Variant) -> Option<Self> {
        v.as_vec3()
    }

    fn into_variant(self) -> Variant {
        Variant::Vec3(self)
    }
}

impl VariantKind for Variant {
    const KIND: &'static str = "any";

    fn from_variant(v: &Variant) -> Option<Self> {
        Some(v.clone())
    }

    fn into_variant(self) -> Variant {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_conversions() {
        assert_eq!(Variant::from(42).as_int(), Some(42));
        assert_eq!(Variant::from(2.5).as_float(), Some(2.5));
        assert_eq!(Variant::from(true).as_bool(), Some(true));
        assert_eq!(Variant::from("hello").as_str(), Some("hello"));
        assert_eq!(Variant::from([1.0, 2.0, 3.0]).as_vec3(), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_int_widening() {
        assert_eq!(Variant::from(42).as_float(), Some(42.0));
        assert_eq!(Variant::from(42.0).as_int(), Some(42));
        assert_eq!(Variant::from(42.5).as_int(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Variant::Null.is_truthy());
        assert!(!Variant::from(0).is_truthy());
        assert!(Variant::from(1).is_truthy());
        assert!(!Variant::from("").is_truthy());
        assert!(Variant::from("x").is_truthy());
    }

    #[test]
    fn test_variant_kind_roundtrip() {
        assert_eq!(f64::from_variant(&5.0f64.into_variant()), Some(5.0));
        assert_eq!(String::from_variant(&Variant::from("abc")), Some("abc".to_string()));
        assert_eq!(bool::from_variant(&Variant::from(3.0)), None);
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_string(&Variant::from(1.5)).unwrap();
        assert_eq!(json, r#"{"kind":"float","value":1.5}"#);
        let back: Variant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Variant::Float(1.5));
    }
}
