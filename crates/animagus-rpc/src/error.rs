//! Errors produced by the chain RPC client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error calling {method}: {source}")]
    Transport { method: &'static str, source: reqwest::Error },

    #[error("node returned JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("could not decode node response for {method}: {reason}")]
    Decode { method: &'static str, reason: String },

    #[error("referenced transaction {0} was not found")]
    TransactionNotFound(String),

    #[error("referenced transaction {0} has no known containing block")]
    TransactionNotCommitted(String),
}

pub type RpcResult<T> = Result<T, RpcError>;
