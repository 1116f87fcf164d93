//! The Call/Stream HTTP binding: axum routes over the pure evaluator, the
//! reorg-safe index, and the chain RPC client, following
//! `causality-api::server::Server`'s thin `{config}` wrapper — unlike the
//! teacher's stub `start()`, this one actually serves.

pub mod config;
pub mod environment;
pub mod error;
pub mod value_json;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};

use animagus_context::ValueContext;
use animagus_evaluator::eval;
use animagus_indexer::keys::stream_channel;
use animagus_rpc::{resolve_out_points, ChainRpc};
use animagus_store::Store;
use animagus_types::{codec, Root, Value};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use environment::ServiceEnvironment;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Everything a handler needs: the loaded bundle, each call's precomputed
/// [`ValueContext`], and the store/RPC collaborators the indexer also runs
/// on top of.
pub struct ServiceState {
    root: Root,
    contexts: BTreeMap<String, ValueContext>,
    store: Arc<dyn Store>,
    rpc: Arc<dyn ChainRpc>,
}

impl ServiceState {
    pub fn new(root: Root, store: Arc<dyn Store>, rpc: Arc<dyn ChainRpc>) -> Self {
        let contexts = root
            .calls
            .iter()
            .map(|call| (call.name.clone(), ValueContext::new(call.name.clone(), &call.expr)))
            .collect();
        Self { root, contexts, store, rpc }
    }
}

pub fn router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route("/call/:name", post(call_handler))
        .route("/stream/:name", get(stream_handler))
        .with_state(state)
}

/// Thin wrapper around a listen address and the shared [`ServiceState`],
/// mirroring `causality-api::server::Server`'s `{config}` shape.
pub struct Server {
    config: ServiceConfig,
    state: Arc<ServiceState>,
}

impl Server {
    pub fn new(config: ServiceConfig, state: Arc<ServiceState>) -> Self {
        Self { config, state }
    }

    pub async fn start(self) -> std::io::Result<()> {
        let addr = self.config.socket_addr();
        tracing::info!(%addr, "starting call/stream service");
        axum::Server::bind(&addr).serve(router(self.state).into_make_service()).await.map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, e)
        })
    }
}

#[derive(serde::Deserialize)]
struct CallRequest {
    #[serde(default)]
    params: Vec<serde_json::Value>,
}

async fn call_handler(
    State(state): State<Arc<ServiceState>>,
    Path(name): Path<String>,
    Json(request): Json<CallRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expr = state.root.find_call(&name).ok_or_else(|| ServiceError::NotFound(name.clone()))?;
    let context = state
        .contexts
        .get(&name)
        .expect("every root.calls entry has a precomputed context");

    let params = request
        .params
        .iter()
        .map(value_json::parse_param)
        .collect::<ServiceResult<Vec<Value>>>()?;
    let param_values: BTreeMap<u64, Value> =
        params.iter().enumerate().map(|(i, v)| (i as u64, v.clone())).collect();

    let mut resolved = Vec::with_capacity(context.queries.len());
    for ordinal in 0..context.queries.len() {
        let key = context.index_key(ordinal, &param_values)?;
        let members = state.store.smembers(key.as_bytes())?;
        let out_points = members
            .iter()
            .map(|m| codec::restore_out_point(m))
            .collect::<Result<Vec<Value>, _>>()?;
        let cells = resolve_out_points(state.rpc.as_ref(), &out_points).await?;
        resolved.push(cells);
    }

    let mut env = ServiceEnvironment::new(context, &params, resolved);
    let result = eval(expr, &mut env)?;
    Ok(Json(value_json::render_value(&result)?))
}

async fn stream_handler(
    State(state): State<Arc<ServiceState>>,
    Path(name): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    if state.root.find_stream(&name).is_none() {
        return Err(ServiceError::NotFound(name));
    }
    let channel = stream_channel(&name);
    let subscription = state.store.subscribe(&channel);
    let events = subscription.map(|payload| Ok(Event::default().data(hex::encode(payload))));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_rpc::MockChainRpc;
    use animagus_store::MemoryStore;
    use animagus_types::value::helpers;
    use animagus_types::NamedExpr;

    fn sum_call() -> Value {
        // reduce(add(arg(0), get_capacity(arg(1))), 0, query_cells(equal(get_capacity(arg(0)), param(0))))
        helpers::reduce(
            Value::op(
                animagus_types::ValueType::Add,
                vec![Value::arg(0), Value::op(animagus_types::ValueType::GetCapacity, vec![Value::arg(1)])],
            ),
            Value::uint64(0),
            Value::query_cells(helpers::equal(
                Value::op(animagus_types::ValueType::GetCapacity, vec![Value::arg(0)]),
                Value::param(0),
            )),
        )
    }

    fn test_root() -> Root {
        Root { calls: vec![NamedExpr { name: "sum".to_string(), expr: sum_call() }], streams: vec![] }
    }

    fn test_state() -> Arc<ServiceState> {
        Arc::new(ServiceState::new(test_root(), Arc::new(MemoryStore::new()), Arc::new(MockChainRpc::new())))
    }

    #[tokio::test]
    async fn unknown_call_is_not_found() {
        let err = call_handler(
            State(test_state()),
            Path("nonexistent".to_string()),
            Json(CallRequest { params: vec![] }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_stream_is_not_found() {
        let err = stream_handler(State(test_state()), Path("nope".to_string())).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn sum_call_with_no_indexed_cells_returns_zero() {
        let request = CallRequest { params: vec![serde_json::json!("0x2a")] };
        let Json(result) =
            call_handler(State(test_state()), Path("sum".to_string()), Json(request)).await.unwrap();
        assert_eq!(result, serde_json::json!(0));
    }

    #[test]
    fn router_builds_without_panicking() {
        let _ = router(test_state());
    }
}
