//! Dynamic values exchanged across the rendering boundary.

use smallvec::SmallVec;

/// Wire type of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// Unsigned 8-bit scalar.
    U8,
    /// Unsigned 16-bit scalar, little-endian.
    U16,
    /// Unsigned 32-bit scalar, little-endian.
    U32,
    /// Unsigned 64-bit scalar, little-endian.
    U64,
    /// IEEE-754 single float, little-endian.
    F32,
    /// Variable-length byte content; requires a paired length field.
    Bytes,
}

impl FieldType {
    /// Fixed on-wire width, `None` for variable-length fields.
    pub fn width(self) -> Option<usize> {
        match self {
            FieldType::U8 => Some(1),
            FieldType::U16 => Some(2),
            FieldType::U32 => Some(4),
            FieldType::U64 => Some(8),
            FieldType::F32 => Some(4),
            FieldType::Bytes => None,
        }
    }

    /// True for the unsigned scalar types that can carry a derived length.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            FieldType::U8 | FieldType::U16 | FieldType::U32 | FieldType::U64
        )
    }
}

/// A single field value, either in domain form or wire-representable form.
///
/// `Str` is domain-only: a pack transform must lower it to `Bytes` before it
/// reaches the wire. `Null` is the designated absent sentinel for optional
/// fields.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent optional field.
    Null,
    /// Unsigned 8-bit scalar.
    U8(u8),
    /// Unsigned 16-bit scalar.
    U16(u16),
    /// Unsigned 32-bit scalar.
    U32(u32),
    /// Unsigned 64-bit scalar.
    U64(u64),
    /// Single-precision float.
    F32(f32),
    /// Raw byte content.
    Bytes(Vec<u8>),
    /// Domain string; not directly representable on the wire.
    Str(String),
}

impl Value {
    /// True when this is the absent sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widens any unsigned scalar to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrows byte content.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrows string content.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short variant name used in error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "str",
        }
    }
}

/// Ordered name/value collection handed to `pack` and returned by `unpack`.
///
/// Lookups are linear; boundary structs have a handful of fields and the
/// table lives inline for the common sizes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructValue {
    fields: SmallVec<[(String, Value); 8]>,
}

impl StructValue {
    /// Creates an empty value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any existing entry of the same name.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Inserts or replaces a field.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Removes a field, returning its value. Used by reduce hooks to drop
    /// transient layout fields.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut value = StructValue::new();
        value.set("row", Value::U16(3));
        value.set("col", Value::U16(7));
        value.set("row", Value::U16(9));
        assert_eq!(value.len(), 2);
        assert_eq!(value.get("row"), Some(&Value::U16(9)));
        let order: Vec<&str> = value.iter().map(|(n, _)| n).collect();
        assert_eq!(order, ["row", "col"]);
    }

    #[test]
    fn remove_returns_value() {
        let mut value = StructValue::new().with("pad", Value::U16(0));
        assert_eq!(value.remove("pad"), Some(Value::U16(0)));
        assert!(value.remove("pad").is_none());
        assert!(value.is_empty());
    }

    #[test]
    fn scalar_widening() {
        assert_eq!(Value::U8(5).as_u64(), Some(5));
        assert_eq!(Value::U64(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::F32(1.0).as_u64(), None);
        assert_eq!(Value::Null.as_u64(), None);
    }
}
