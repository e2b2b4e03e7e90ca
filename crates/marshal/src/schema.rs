//! Schema compilation for boundary structs and enums.
//!
//! A schema is compiled once, validated eagerly, and then shared immutably by
//! any number of marshallers. Layout order is declaration order and must
//! match the native side's expectation exactly; nothing here re-derives
//! layout at pack time.

use std::sync::Arc;

use crate::error::{MarshalError, MarshalResult, SchemaError};
use crate::value::{FieldType, StructValue, Value};

/// Pure conversion between a domain value and its wire-representable form.
pub type Transform = Arc<dyn Fn(Value) -> MarshalResult<Value> + Send + Sync>;

/// Hook applied to a fully unpacked value before it is returned.
pub type ReduceFn = Arc<dyn Fn(StructValue) -> StructValue + Send + Sync>;

/// Pack/unpack transform pair attached to one field. The two functions are
/// expected to be exact inverses; the layer adds no other lossy step.
#[derive(Clone)]
pub struct TransformPair {
    /// Domain value to wire-representable value.
    pub pack: Transform,
    /// Wire-representable value back to domain value.
    pub unpack: Transform,
}

/// Declaration of one field within a struct schema.
#[derive(Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) optional: bool,
    pub(crate) default: Option<Value>,
    pub(crate) length_of: Option<String>,
    pub(crate) transform: Option<TransformPair>,
}

impl FieldSpec {
    /// Declares a field with the given name and wire type.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            length_of: None,
            transform: None,
        }
    }

    /// Marks the field optional; absent values pack as the null sentinel.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Supplies a value used when the caller omits the field.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Declares this field as the derived length of a sibling
    /// variable-length field. Its value is always recomputed at pack time;
    /// caller-supplied values are ignored.
    pub fn length_of(mut self, target: impl Into<String>) -> Self {
        self.length_of = Some(target.into());
        self
    }

    /// Attaches a pack/unpack transform pair.
    pub fn with_transform<P, U>(mut self, pack: P, unpack: U) -> Self
    where
        P: Fn(Value) -> MarshalResult<Value> + Send + Sync + 'static,
        U: Fn(Value) -> MarshalResult<Value> + Send + Sync + 'static,
    {
        self.transform = Some(TransformPair {
            pack: Arc::new(pack),
            unpack: Arc::new(unpack),
        });
        self
    }
}

pub(crate) struct CompiledField {
    pub(crate) spec: FieldSpec,
    /// For length fields: index of the variable-length field they mirror.
    pub(crate) length_target: Option<usize>,
}

/// Immutable, validated layout descriptor for one boundary struct.
pub struct StructSchema {
    fields: Vec<CompiledField>,
    min_size: usize,
    reduce: Option<ReduceFn>,
}

impl StructSchema {
    /// Compiles and validates a field list.
    ///
    /// Deterministic: the same declaration always yields the same layout.
    /// All contract violations surface here, at definition time, never at
    /// pack/unpack time.
    pub fn define(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        for (idx, field) in fields.iter().enumerate() {
            if fields[..idx].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        let mut compiled: Vec<CompiledField> = Vec::with_capacity(fields.len());
        let mut min_size = 0usize;

        for (idx, field) in fields.iter().enumerate() {
            let mut length_target = None;
            if let Some(target_name) = &field.length_of {
                let target = fields.iter().position(|f| &f.name == target_name).ok_or(
                    SchemaError::DanglingLengthRef {
                        field: field.name.clone(),
                        target: target_name.clone(),
                    },
                )?;
                if fields[target].ty != FieldType::Bytes {
                    return Err(SchemaError::LengthTargetNotBytes {
                        field: field.name.clone(),
                        target: target_name.clone(),
                    });
                }
                if !field.ty.is_unsigned() {
                    return Err(SchemaError::BadLengthFieldType {
                        field: field.name.clone(),
                        ty: field.ty,
                    });
                }
                if target < idx {
                    return Err(SchemaError::LengthFieldAfterTarget {
                        field: field.name.clone(),
                        target: target_name.clone(),
                    });
                }
                length_target = Some(target);
            }
            min_size += field.ty.width().unwrap_or(0);
            compiled.push(CompiledField {
                spec: field.clone(),
                length_target,
            });
        }

        // Every variable-length field needs exactly one paired length field.
        for (idx, field) in compiled.iter().enumerate() {
            if field.spec.ty != FieldType::Bytes {
                continue;
            }
            let mut sources = compiled
                .iter()
                .filter(|f| f.length_target == Some(idx))
                .map(|f| f.spec.name.clone());
            match (sources.next(), sources.next()) {
                (None, _) => {
                    return Err(SchemaError::MissingLengthField(field.spec.name.clone()));
                }
                (Some(first), Some(second)) => {
                    return Err(SchemaError::DuplicateLengthField {
                        target: field.spec.name.clone(),
                        first,
                        second,
                    });
                }
                (Some(_), None) => {}
            }
        }

        log::trace!(
            "compiled struct schema: {} fields, minimum layout {} bytes",
            compiled.len(),
            min_size
        );

        Ok(Self {
            fields: compiled,
            min_size,
            reduce: None,
        })
    }

    /// Attaches a pure hook applied to unpacked values before they are
    /// returned, typically to drop transient padding fields.
    pub fn with_reduce<F>(mut self, reduce: F) -> Self
    where
        F: Fn(StructValue) -> StructValue + Send + Sync + 'static,
    {
        self.reduce = Some(Arc::new(reduce));
        self
    }

    /// Number of declared fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Layout size with every variable-length field empty.
    pub fn min_layout_size(&self) -> usize {
        self.min_size
    }

    pub(crate) fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub(crate) fn reduce(&self) -> Option<&ReduceFn> {
        self.reduce.as_ref()
    }
}

/// Discriminant width of an enum schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumWidth {
    /// One byte.
    U8,
    /// Two bytes, little-endian.
    U16,
    /// Four bytes, little-endian.
    U32,
}

impl EnumWidth {
    /// On-wire size in bytes.
    pub fn bytes(self) -> usize {
        match self {
            EnumWidth::U8 => 1,
            EnumWidth::U16 => 2,
            EnumWidth::U32 => 4,
        }
    }

    fn max_code(self) -> u64 {
        match self {
            EnumWidth::U8 => u64::from(u8::MAX),
            EnumWidth::U16 => u64::from(u16::MAX),
            EnumWidth::U32 => u64::from(u32::MAX),
        }
    }
}

/// Bijective name/code mapping with a fixed discriminant width.
#[derive(Clone)]
pub struct EnumSchema {
    variants: Vec<(String, u64)>,
    width: EnumWidth,
}

impl EnumSchema {
    /// Compiles and validates a variant table.
    pub fn define(variants: &[(&str, u64)], width: EnumWidth) -> Result<Self, SchemaError> {
        for (idx, (name, code)) in variants.iter().enumerate() {
            if let Some((dup, _)) = variants[..idx].iter().find(|(n, _)| n == name) {
                return Err(SchemaError::DuplicateVariantName((*dup).to_string()));
            }
            if let Some((first, _)) = variants[..idx].iter().find(|(_, c)| c == code) {
                return Err(SchemaError::DuplicateVariantCode {
                    code: *code,
                    first: (*first).to_string(),
                    second: (*name).to_string(),
                });
            }
            if *code > width.max_code() {
                return Err(SchemaError::CodeOutOfRange {
                    name: (*name).to_string(),
                    code: *code,
                    width: width.bytes(),
                });
            }
        }

        Ok(Self {
            variants: variants
                .iter()
                .map(|(n, c)| ((*n).to_string(), *c))
                .collect(),
            width,
        })
    }

    /// Declared discriminant width.
    pub fn width(&self) -> EnumWidth {
        self.width
    }

    /// Maps a variant name to its code.
    pub fn pack(&self, name: &str) -> MarshalResult<u64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| *c)
            .ok_or_else(|| MarshalError::UnknownVariant(name.to_string()))
    }

    /// Maps a code back to its variant name.
    pub fn unpack(&self, code: u64) -> MarshalResult<&str> {
        self.variants
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(n, _)| n.as_str())
            .ok_or(MarshalError::UnknownCode(code))
    }

    /// Appends the wire form of `name` to `out` at the declared width.
    pub fn encode_to(&self, name: &str, out: &mut Vec<u8>) -> MarshalResult<()> {
        let code = self.pack(name)?;
        out.extend_from_slice(&code.to_le_bytes()[..self.width.bytes()]);
        Ok(())
    }

    /// Reads one discriminant from the front of `raw`.
    pub fn decode_from(&self, raw: &[u8]) -> MarshalResult<&str> {
        let needed = self.width.bytes();
        if raw.len() < needed {
            return Err(MarshalError::TruncatedInput {
                field: "enum discriminant".to_string(),
                needed,
                available: raw.len(),
            });
        }
        let mut buf = [0u8; 8];
        buf[..needed].copy_from_slice(&raw[..needed]);
        self.unpack(u64::from_le_bytes(buf))
    }
}
