//! Wire encoding for a stream filter's published value.
//!
//! `animagus_types::codec::serialize_to_core` only dispatches `Script`,
//! `Header` and `Transaction` — the three types the expression language's
//! own `serialize_to_core` opcode supports. A stream filter is free to
//! publish anything, though: the deposits-stream seed scenario publishes a
//! bare `cell.out_point`. This module is the indexer-local superset that
//! also handles `OutPoint`, `CellInput`, `CellDep`, `Cell` (core fields
//! only) and the primitive types, falling back to the canonical codec for
//! the three types it already covers.

use animagus_types::codec;
use animagus_types::{Primitive, Value, ValueType};
use thiserror::Error;

/// Raised when a stream filter's result has no defined wire encoding. The
/// verifier does not statically exclude a stream expression that ultimately
/// produces one of these shapes (e.g. a bare `list`), so this is a possible
/// evaluation-time outcome on otherwise-valid bundle input, not a bug.
#[derive(Error, Debug)]
#[error("stream filters cannot produce a bare {0:?} value")]
pub struct StreamEncodeError(pub ValueType);

/// Encode a stream's published value for transmission over its channel.
pub fn encode(value: &Value) -> Result<Vec<u8>, StreamEncodeError> {
    match value.ty {
        ValueType::Script | ValueType::Header | ValueType::Transaction => {
            Ok(codec::serialize_to_core(value).expect("well-formed evaluator output"))
        }
        ValueType::OutPoint => {
            Ok(codec::serialize_out_point(value).expect("well-formed evaluator output"))
        }
        ValueType::CellInput => {
            Ok(codec::serialize_cell_input(value).expect("well-formed evaluator output"))
        }
        ValueType::CellDep => {
            Ok(codec::serialize_cell_dep(value).expect("well-formed evaluator output"))
        }
        ValueType::Cell => Ok(codec::serialize_cell_core(value).expect("well-formed evaluator output")),
        ValueType::Nil => Ok(Vec::new()),
        ValueType::Bool | ValueType::Uint64 | ValueType::Bytes => Ok(encode_primitive(&value.primitive)),
        other => Err(StreamEncodeError(other)),
    }
}

fn encode_primitive(primitive: &Primitive) -> Vec<u8> {
    match primitive {
        Primitive::None => Vec::new(),
        Primitive::Bool(b) => vec![*b as u8],
        Primitive::Uint64(u) => u.to_le_bytes().to_vec(),
        Primitive::Bytes(b) => b.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_out_point_via_canonical_codec() {
        let out_point = Value::out_point(Value::bytes(vec![1u8; 32]), Value::uint64(3));
        let encoded = encode(&out_point).unwrap();
        assert_eq!(codec::restore_out_point(&encoded).unwrap(), out_point);
    }

    #[test]
    fn encodes_primitives() {
        assert_eq!(encode(&Value::nil()).unwrap(), Vec::<u8>::new());
        assert_eq!(encode(&Value::bool(true)).unwrap(), vec![1u8]);
        assert_eq!(encode(&Value::uint64(7)).unwrap(), 7u64.to_le_bytes().to_vec());
        assert_eq!(encode(&Value::bytes(vec![9, 9])).unwrap(), vec![9, 9]);
    }

    #[test]
    fn rejects_bare_list_value() {
        let err = encode(&Value::list(vec![])).unwrap_err();
        assert!(matches!(err, StreamEncodeError(ValueType::List)));
    }
}
