//! Error types for the value model and codec.

use thiserror::Error;

/// Errors raised while encoding or decoding canonical chain bytes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("cannot serialize type {0:?} to core bytes")]
    UnsupportedType(crate::value::ValueType),

    #[error("buffer too short: need at least {need} bytes, got {got}")]
    BufferTooShort { need: usize, got: usize },

    #[error("table total_size field ({declared}) does not match buffer length ({actual})")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("malformed table offsets")]
    MalformedOffsets,

    #[error("invalid hash_type byte {0}")]
    InvalidHashType(u8),

    #[error("invalid dep_type byte {0}")]
    InvalidDepType(u8),

    #[error("malformed value: {0}")]
    Malformed(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
