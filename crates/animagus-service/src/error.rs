//! Errors produced by the Call/Stream HTTP binding, mapped to status codes
//! per the external-interface error kinds: `not_found` and `bad_param` are
//! client mistakes (404/400), `evaluation_error` is also a 400 since a
//! filter/expression that rejects its inputs is a caller problem, and
//! `index_store_error`/`rpc_error` are server-side (500/502 — 502 for
//! `rpc_error` since it reflects an upstream node failure, not this
//! service's own state).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no such call or stream: {0}")]
    NotFound(String),

    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error(transparent)]
    Evaluation(#[from] animagus_evaluator::EvalError),

    #[error(transparent)]
    Context(#[from] animagus_context::ContextError),

    #[error(transparent)]
    IndexStore(#[from] animagus_store::StoreError),

    #[error(transparent)]
    Rpc(#[from] animagus_rpc::RpcError),

    #[error("stored index member is not a well-formed out_point: {0}")]
    Codec(#[from] animagus_types::CodecError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::BadParam(_) => "bad_param",
            ServiceError::Evaluation(_) => "evaluation_error",
            ServiceError::Context(_) => "evaluation_error",
            ServiceError::IndexStore(_) => "index_store_error",
            ServiceError::Codec(_) => "index_store_error",
            ServiceError::Rpc(_) => "rpc_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadParam(_) | ServiceError::Evaluation(_) | ServiceError::Context(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::IndexStore(_) | ServiceError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Rpc(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "error": self.kind(), "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
