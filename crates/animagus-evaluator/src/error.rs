//! Error types produced while evaluating a `Value` tree.

use animagus_types::ValueType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("no binding for arg({0})")]
    UnboundArg(u64),

    #[error("no binding for param({0})")]
    UnboundParam(u64),

    #[error("param({index}) is already bound to a different value")]
    ParamAlreadyBound { index: u64 },

    #[error("index_param is not available in this environment")]
    IndexParamRefused,

    #[error("query_cell is not available in this environment")]
    QueryCellRefused,

    #[error("type mismatch: expected {expected}, found {found:?}")]
    TypeMismatch { expected: &'static str, found: ValueType },

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: u64, len: usize },

    #[error("slice start {start} exceeds source length {len}")]
    SliceStartOutOfRange { start: u64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("apply's first argument must evaluate to an applicable function body")]
    NotApplicable,

    #[error("malformed value while constructing {ty:?}: {reason}")]
    MalformedValue { ty: ValueType, reason: String },

    #[error("{0}")]
    Codec(#[from] animagus_types::CodecError),

    #[error("unsupported operation {0:?}")]
    Unsupported(ValueType),
}

pub type EvalResult<T> = Result<T, EvalError>;
