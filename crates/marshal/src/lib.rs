//! Declarative binary layouts for the rendering boundary.
//!
//! The high-level rendering library and the native measurement/rendering
//! engine agree on struct and enum layouts bit for bit. This crate compiles
//! runtime-described field lists into immutable layout descriptors and
//! drives pack/unpack against them:
//!
//! * [`StructSchema`] / [`EnumSchema`] – eagerly validated layout compilers.
//! * [`Marshaller`] – pack/unpack runtime with field transforms and derived
//!   length fields.
//! * [`SchemaError`] / [`MarshalError`] – definition-time versus per-call
//!   failure tiers.

mod error;
mod marshaller;
mod schema;
mod value;

pub use error::{MarshalError, MarshalResult, SchemaError};
pub use marshaller::Marshaller;
pub use schema::{EnumSchema, EnumWidth, FieldSpec, ReduceFn, StructSchema, Transform, TransformPair};
pub use value::{FieldType, StructValue, Value};
