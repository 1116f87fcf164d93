//! Error types for `ValueContext` construction and index-key derivation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    #[error("query ordinal {0} does not exist in this context")]
    UnknownQuery(usize),

    #[error("param({0}) is required by this query but was not supplied")]
    MissingParam(u64),

    #[error("param({index}) must encode to n/o/x (uint64/bool/bytes), found a {found:?}")]
    UnencodableParam { index: u64, found: animagus_types::ValueType },
}

pub type ContextResult<T> = Result<T, ContextError>;
