//! Error surface for schema definition and pack/unpack calls.
//!
//! Definition-time failures ([`SchemaError`]) are fatal: a schema that does
//! not validate is never produced. Runtime failures ([`MarshalError`]) each
//! flag one malformed pack/unpack call; the caller decides whether to retry
//! with corrected input. Nothing in this layer recovers implicitly.

use thiserror::Error;

use crate::value::FieldType;

/// Convenience result alias for pack/unpack operations.
pub type MarshalResult<T, E = MarshalError> = Result<T, E>;

/// Errors raised while compiling a struct or enum schema.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Two fields share the same name.
    #[error("duplicate field `{0}`")]
    DuplicateField(String),

    /// A `length_of` reference names a field that does not exist.
    #[error("field `{field}` declares length_of unknown field `{target}`")]
    DanglingLengthRef {
        /// The length field carrying the reference.
        field: String,
        /// The missing target name.
        target: String,
    },

    /// A `length_of` reference points at a fixed-width field.
    #[error("length_of target `{target}` of field `{field}` is not variable-length")]
    LengthTargetNotBytes {
        /// The length field carrying the reference.
        field: String,
        /// The referenced fixed-width field.
        target: String,
    },

    /// A variable-length field has no paired length field.
    #[error("variable-length field `{0}` has no paired length field")]
    MissingLengthField(String),

    /// A variable-length field is referenced by more than one length field.
    #[error("variable-length field `{target}` is referenced by both `{first}` and `{second}`")]
    DuplicateLengthField {
        /// The doubly-referenced variable-length field.
        target: String,
        /// First referencing length field in layout order.
        first: String,
        /// Second referencing length field in layout order.
        second: String,
    },

    /// A length field is laid out after the field whose length it mirrors.
    #[error("length field `{field}` must precede `{target}` in layout order")]
    LengthFieldAfterTarget {
        /// The offending length field.
        field: String,
        /// Its variable-length target.
        target: String,
    },

    /// A length field is not an unsigned scalar.
    #[error("length field `{field}` must be an unsigned scalar, is {ty:?}")]
    BadLengthFieldType {
        /// The offending length field.
        field: String,
        /// Its declared type.
        ty: FieldType,
    },

    /// Two enum variants share the same name.
    #[error("duplicate enum variant `{0}`")]
    DuplicateVariantName(String),

    /// Two enum variants share the same code.
    #[error("enum code {code} declared for both `{first}` and `{second}`")]
    DuplicateVariantCode {
        /// The shared code.
        code: u64,
        /// First variant declared with the code.
        first: String,
        /// Second variant declared with the code.
        second: String,
    },

    /// An enum code does not fit the declared discriminant width.
    #[error("enum code {code} for `{name}` does not fit in {width} byte(s)")]
    CodeOutOfRange {
        /// The offending variant name.
        name: String,
        /// Its declared code.
        code: u64,
        /// Discriminant width in bytes.
        width: usize,
    },
}

/// Errors raised by a single pack or unpack call.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MarshalError {
    /// A required field was neither supplied nor defaulted.
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// The input buffer ended before the layout did.
    #[error("input truncated while reading `{field}`: need {needed} bytes, {available} remain")]
    TruncatedInput {
        /// Field being read when the buffer ran out.
        field: String,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Enum pack was handed a name outside the declared mapping.
    #[error("no variant named `{0}`")]
    UnknownVariant(String),

    /// Enum unpack was handed a code outside the declared mapping.
    #[error("no variant with code {0}")]
    UnknownCode(u64),

    /// A supplied value's shape does not match the declared field type.
    #[error("field `{field}` expects {expected:?}, got {actual}")]
    TypeMismatch {
        /// The field being packed or unpacked.
        field: String,
        /// The declared wire type.
        expected: FieldType,
        /// Short description of the supplied value.
        actual: &'static str,
    },

    /// Variable-length content is too long for its paired length field.
    #[error("content of `{field}` is {len} bytes, exceeding its {width:?} length field")]
    LengthOverflow {
        /// The variable-length field.
        field: String,
        /// Actual content length.
        len: usize,
        /// Type of the paired length field.
        width: FieldType,
    },
}
