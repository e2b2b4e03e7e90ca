//! Pack/unpack runtime driven by a compiled schema.
//!
//! Scalars are written little-endian at their natural width; variable-length
//! content is written inline at its layout position with its exact byte
//! count mirrored into the paired length field. The unpack path walks the
//! same layout in a single forward pass.

use std::sync::Arc;

use crate::error::{MarshalError, MarshalResult};
use crate::schema::{CompiledField, StructSchema};
use crate::value::{FieldType, StructValue, Value};

/// Pack/unpack runtime for one struct schema.
///
/// Holds no state beyond the shared immutable schema; concurrent calls with
/// independent values need no locking.
#[derive(Clone)]
pub struct Marshaller {
    schema: Arc<StructSchema>,
}

impl Marshaller {
    /// Builds a marshaller over a compiled schema.
    pub fn new(schema: Arc<StructSchema>) -> Self {
        Self { schema }
    }

    /// The schema this marshaller was built from.
    pub fn schema(&self) -> &StructSchema {
        &self.schema
    }

    /// Packs a struct value into its wire layout.
    ///
    /// Fields are resolved in declared order: explicit value, else default,
    /// else the null sentinel for optional fields, else
    /// [`MarshalError::MissingField`]. Length fields are always recomputed
    /// from their paired content; whatever the caller supplied for them is
    /// discarded.
    pub fn pack(&self, value: &StructValue) -> MarshalResult<Vec<u8>> {
        let fields = self.schema.fields();

        let mut resolved: Vec<Value> = Vec::with_capacity(fields.len());
        for field in fields {
            let mut v = match value.get(&field.spec.name) {
                Some(v) => v.clone(),
                None => match &field.spec.default {
                    Some(default) => default.clone(),
                    // Length fields are recomputed below; they never need a
                    // caller-supplied value.
                    None if field.spec.optional || field.length_target.is_some() => Value::Null,
                    None => {
                        return Err(MarshalError::MissingField(field.spec.name.clone()));
                    }
                },
            };
            if v.is_null() && !field.spec.optional && field.length_target.is_none() {
                return Err(MarshalError::MissingField(field.spec.name.clone()));
            }
            if let Some(transform) = &field.spec.transform {
                if !v.is_null() {
                    v = (transform.pack)(v)?;
                }
            }
            resolved.push(v);
        }

        // Derived lengths overwrite whatever resolution produced above.
        for idx in 0..fields.len() {
            let Some(target) = fields[idx].length_target else {
                continue;
            };
            let len = match &resolved[target] {
                Value::Null => 0,
                Value::Bytes(content) => content.len(),
                other => {
                    return Err(type_mismatch(&fields[target], other));
                }
            };
            resolved[idx] = derived_length(&fields[idx], len)?;
        }

        let mut out = Vec::with_capacity(self.schema.min_layout_size());
        for (idx, field) in fields.iter().enumerate() {
            write_field(&mut out, field, &resolved[idx])?;
        }
        Ok(out)
    }

    /// Unpacks a wire buffer back into a struct value.
    ///
    /// Fails with [`MarshalError::TruncatedInput`] as soon as the buffer
    /// ends before the layout does, given the on-wire lengths read so far.
    pub fn unpack(&self, raw: &[u8]) -> MarshalResult<StructValue> {
        let fields = self.schema.fields();
        let mut lengths: Vec<Option<usize>> = vec![None; fields.len()];
        let mut out = StructValue::new();
        let mut cursor = 0usize;

        for (idx, field) in fields.iter().enumerate() {
            let mut v = match field.spec.ty {
                FieldType::Bytes => {
                    // Validated at definition time: the paired length field
                    // precedes this one and has already been read.
                    let len = lengths[idx].unwrap_or(0);
                    let content = take(raw, &mut cursor, len, &field.spec.name)?;
                    if field.spec.optional && content.is_empty() {
                        Value::Null
                    } else {
                        Value::Bytes(content.to_vec())
                    }
                }
                ty => {
                    let width = ty.width().unwrap_or(0);
                    let bytes = take(raw, &mut cursor, width, &field.spec.name)?;
                    read_scalar(ty, bytes)
                }
            };

            if let Some(target) = field.length_target {
                let len = v.as_u64().unwrap_or(0);
                lengths[target] = Some(len as usize);
            }

            if let Some(transform) = &field.spec.transform {
                if !v.is_null() {
                    v = (transform.unpack)(v)?;
                }
            }
            out.set(field.spec.name.clone(), v);
        }

        if let Some(reduce) = self.schema.reduce() {
            out = reduce(out);
        }
        Ok(out)
    }
}

fn take<'a>(raw: &'a [u8], cursor: &mut usize, n: usize, field: &str) -> MarshalResult<&'a [u8]> {
    let available = raw.len().saturating_sub(*cursor);
    if available < n {
        return Err(MarshalError::TruncatedInput {
            field: field.to_string(),
            needed: n,
            available,
        });
    }
    let slice = &raw[*cursor..*cursor + n];
    *cursor += n;
    Ok(slice)
}

fn read_scalar(ty: FieldType, bytes: &[u8]) -> Value {
    match ty {
        FieldType::U8 => Value::U8(bytes[0]),
        FieldType::U16 => Value::U16(u16::from_le_bytes([bytes[0], bytes[1]])),
        FieldType::U32 => Value::U32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        FieldType::U64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            Value::U64(u64::from_le_bytes(buf))
        }
        FieldType::F32 => Value::F32(f32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])),
        FieldType::Bytes => unreachable!("bytes fields are read by length"),
    }
}

fn derived_length(field: &CompiledField, len: usize) -> MarshalResult<Value> {
    let overflow = || MarshalError::LengthOverflow {
        field: field.spec.name.clone(),
        len,
        width: field.spec.ty,
    };
    match field.spec.ty {
        FieldType::U8 => u8::try_from(len).map(Value::U8).map_err(|_| overflow()),
        FieldType::U16 => u16::try_from(len).map(Value::U16).map_err(|_| overflow()),
        FieldType::U32 => u32::try_from(len).map(Value::U32).map_err(|_| overflow()),
        FieldType::U64 => Ok(Value::U64(len as u64)),
        // Excluded at definition time.
        FieldType::F32 | FieldType::Bytes => unreachable!("length fields are unsigned scalars"),
    }
}

fn write_field(out: &mut Vec<u8>, field: &CompiledField, value: &Value) -> MarshalResult<()> {
    match (field.spec.ty, value) {
        (FieldType::Bytes, Value::Bytes(content)) => out.extend_from_slice(content),
        (FieldType::Bytes, Value::Null) => {}
        (FieldType::U8, Value::U8(v)) => out.push(*v),
        (FieldType::U16, Value::U16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldType::U32, Value::U32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldType::U64, Value::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldType::F32, Value::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ty, Value::Null) => {
            // Absent optional scalar: zeroed word, the flat analogue of a
            // null reference on the native side.
            out.extend(std::iter::repeat(0u8).take(ty.width().unwrap_or(0)));
        }
        (_, other) => return Err(type_mismatch(field, other)),
    }
    Ok(())
}

fn type_mismatch(field: &CompiledField, value: &Value) -> MarshalError {
    MarshalError::TypeMismatch {
        field: field.spec.name.clone(),
        expected: field.spec.ty,
        actual: value.kind(),
    }
}
