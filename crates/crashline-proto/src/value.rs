//! In-memory value tree for the tagged binary object format.
//!
//! [`WireValue`] has one variant per type tag, so encoding and decoding are
//! exhaustive matches. [`WireObject`] keeps fields in insertion order with
//! unique names, which is what makes `decode(encode(v)) == v` hold exactly.

use bytes::Bytes;

use crate::TypeTag;

/// A single tagged wire value.
///
/// Numeric width is part of the value: `Short(5)` and `Int(5)` encode with
/// different tags and do not compare equal.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Tag 0x00
    Null,
    /// Tag 0x01
    Bool(bool),
    /// Tag 0x02
    Byte(u8),
    /// Tag 0x03
    Short(i16),
    /// Tag 0x04
    Int(i32),
    /// Tag 0x05
    Long(i64),
    /// Tag 0x06
    Float(f32),
    /// Tag 0x07
    Double(f64),
    /// Tag 0x08
    String(String),
    /// Tag 0x09
    BoolArray(Vec<bool>),
    /// Tag 0x0A
    ByteArray(Bytes),
    /// Tag 0x0B
    ShortArray(Vec<i16>),
    /// Tag 0x0C
    IntArray(Vec<i32>),
    /// Tag 0x0D
    LongArray(Vec<i64>),
    /// Tag 0x0E
    FloatArray(Vec<f32>),
    /// Tag 0x0F
    DoubleArray(Vec<f64>),
    /// Tag 0x10
    StringArray(Vec<String>),
    /// Tag 0x11, each element carries its own tag
    Array(Vec<WireValue>),
    /// Tag 0x12
    Object(WireObject),
}

impl WireValue {
    /// Type tag this value encodes with.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Null,
            Self::Bool(_) => TypeTag::Bool,
            Self::Byte(_) => TypeTag::Byte,
            Self::Short(_) => TypeTag::Short,
            Self::Int(_) => TypeTag::Int,
            Self::Long(_) => TypeTag::Long,
            Self::Float(_) => TypeTag::Float,
            Self::Double(_) => TypeTag::Double,
            Self::String(_) => TypeTag::String,
            Self::BoolArray(_) => TypeTag::BoolArray,
            Self::ByteArray(_) => TypeTag::ByteArray,
            Self::ShortArray(_) => TypeTag::ShortArray,
            Self::IntArray(_) => TypeTag::IntArray,
            Self::LongArray(_) => TypeTag::LongArray,
            Self::FloatArray(_) => TypeTag::FloatArray,
            Self::DoubleArray(_) => TypeTag::DoubleArray,
            Self::StringArray(_) => TypeTag::StringArray,
            Self::Array(_) => TypeTag::Array,
            Self::Object(_) => TypeTag::Object,
        }
    }

    /// Integer view over any integral width.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Byte(v) => Some(i64::from(v)),
            Self::Short(v) => Some(i64::from(v)),
            Self::Int(v) => Some(i64::from(v)),
            Self::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Floating view over any numeric width.
    ///
    /// Clients send amounts with whatever tag their runtime picked, so
    /// handlers read money through this accessor.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Bool view.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Nested object view.
    pub fn as_object(&self) -> Option<&WireObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Heterogeneous array view.
    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for WireValue {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<i16> for WireValue {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for WireValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<String>> for WireValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringArray(v)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(v: Vec<WireValue>) -> Self {
        Self::Array(v)
    }
}

impl From<WireObject> for WireValue {
    fn from(v: WireObject) -> Self {
        Self::Object(v)
    }
}

/// Ordered mapping of field name to value with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireObject {
    fields: Vec<(String, WireValue)>,
}

impl WireObject {
    /// Empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`WireObject::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<WireValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field. An existing field keeps its position and has its value
    /// replaced; the previous value is returned.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<WireValue>) -> Option<WireValue> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            },
        }
    }

    /// Field by name.
    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Integral field by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(WireValue::as_i64)
    }

    /// Numeric field by name.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(WireValue::as_f64)
    }

    /// String field by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(WireValue::as_str)
    }

    /// Bool field by name.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(WireValue::as_bool)
    }

    /// Nested object field by name.
    pub fn get_object(&self, name: &str) -> Option<&WireObject> {
        self.get(name).and_then(WireValue::as_object)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WireValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

impl<N: Into<String>> FromIterator<(N, WireValue)> for WireObject {
    fn from_iter<T: IntoIterator<Item = (N, WireValue)>>(iter: T) -> Self {
        let mut object = Self::new();
        for (name, value) in iter {
            object.insert(name, value);
        }
        object
    }
}
