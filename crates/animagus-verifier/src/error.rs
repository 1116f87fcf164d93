//! Error types for bundle verification.

use animagus_types::ValueType;
use thiserror::Error;

/// Why a node in the loaded bundle was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("{ty:?} expects {expected} children, found {found}")]
    Arity { ty: ValueType, expected: String, found: usize },

    #[error("{ty:?} requires a primitive payload")]
    MissingPrimitive { ty: ValueType },

    #[error("{ty:?} must not carry children")]
    UnexpectedChildren { ty: ValueType },

    #[error("argument index {index} out of range for a {arity}-argument function")]
    ArgOutOfRange { index: u64, arity: usize },

    #[error("expected a function argument at position 0, found {found:?}")]
    NotAFunction { found: ValueType },

    #[error("expected a list-producing expression, found {found:?}")]
    NotAList { found: ValueType },

    #[error("cannot {op:?} a value of type {target:?}")]
    UnsupportedSerializeTarget { op: ValueType, target: ValueType },

    #[error("GET_OUT_POINT requires a cell carrying its out_point/header pair")]
    CellMissingOutPoint,

    #[error("GET_HEADER requires a cell carrying its out_point/header pair")]
    CellMissingHeader,

    #[error("TAIL_RECURSION requires at least one argument to keep recursion going")]
    EmptyTailRecursion,

    #[error("error occurred for child {index} of {ty:?}: {source}")]
    Nested { ty: ValueType, index: usize, source: Box<VerifyError> },
}

pub type VerifyResult<T> = Result<T, VerifyError>;
