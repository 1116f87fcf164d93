//! Error types for the `Store` abstraction.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open { path: String, source: rocksdb::Error },

    #[error("read failed: {0}")]
    Read(#[source] rocksdb::Error),

    #[error("write failed: {0}")]
    Write(#[source] rocksdb::Error),

    #[error("no such pub/sub channel: {0}")]
    UnknownChannel(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
