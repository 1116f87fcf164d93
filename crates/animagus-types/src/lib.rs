//! Value model, chain primitives and canonical codec shared by every
//! `animagus-*` crate.

pub mod codec;
pub mod error;
pub mod hash;
pub mod json;
pub mod value;

pub use error::{CodecError, CodecResult};
pub use value::{NamedExpr, Primitive, Root, Value, ValueType};
