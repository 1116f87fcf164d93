//! Errors raised by the indexer loop.
//!
//! Distinguishes `Fatal` (process must abort — AST hash mismatch,
//! revert-below-zero, corrupt revert log) from `Transient` (an RPC error
//! encountered while indexing, retried with bounded backoff before it is
//! promoted to fatal), so `main` can decide exit code vs. retry without
//! string-matching error messages.

use crate::stream_codec::StreamEncodeError;
use animagus_context::ContextError;
use animagus_evaluator::EvalError;
use animagus_rpc::RpcError;
use animagus_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Transient(#[from] TransientError),
}

#[derive(Error, Debug)]
pub enum FatalError {
    #[error("bundle content hash {bundle_hash} does not match stored AST_HASH {stored_hash}; this store was built from a different bundle")]
    AstHashMismatch { bundle_hash: String, stored_hash: String },

    #[error("cannot revert below genesis")]
    RevertBelowZero,

    #[error("corrupt revert log for block {height}: {reason}")]
    CorruptRevertLog { height: u64, reason: String },

    #[error("malformed LAST_BLOCK value: {0}")]
    MalformedLastBlock(String),

    #[error("malformed cell: {0}")]
    MalformedCell(String),

    #[error("filter evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("index context error: {0}")]
    Context(#[from] ContextError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("stream encode error: {0}")]
    StreamEncode(#[from] StreamEncodeError),
}

#[derive(Error, Debug)]
pub enum TransientError {
    #[error("chain RPC error: {0}")]
    Rpc(#[from] RpcError),
}

pub type IndexerResult<T> = Result<T, IndexerError>;
