//! End-to-end exercise of the Call/Stream HTTP binding: a small bundle is
//! indexed against an in-memory store and a mock chain RPC, then queried
//! and streamed through the real `axum` router — covering the balance
//! query and insert/revert deposit-stream scenarios end to end.

use animagus_indexer::Indexer;
use animagus_rpc::{augment_cell, Block, BlockTransaction, MockChainRpc};
use animagus_service::{router, ServiceState};
use animagus_store::{MemoryStore, Store};
use animagus_types::value::helpers;
use animagus_types::{NamedExpr, Root, Value, ValueType};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

fn header(number: u64, parent_hash: Vec<u8>) -> Value {
    Value::header([
        Value::uint64(0),
        Value::uint64(1_600_000_000 + number),
        Value::uint64(number),
        Value::uint64(0),
        Value::bytes(parent_hash),
        Value::bytes(vec![0u8; 32]),
        Value::bytes(vec![0u8; 32]),
        Value::bytes(vec![0u8; 32]),
        Value::bytes(vec![0u8; 32]),
        Value::bytes(vec![0u8; 12]),
    ])
}

fn lock_script(args: Vec<u8>) -> Value {
    Value::script(Value::bytes(vec![0xAAu8; 32]), Value::uint64(1), Value::bytes(args))
}

fn core_cell(capacity: u64, lock_args: Vec<u8>) -> Value {
    Value::cell(Value::uint64(capacity), lock_script(lock_args), Value::nil(), Value::bytes(vec![]), vec![])
}

/// `balance(param0: bytes) = reduce(add, 0u, map(cell -> cell.capacity,
/// query_cells(cell -> cell.lock.args == param0)))` (the lock's
/// `code_hash`/`hash_type` are fixed by construction here rather than
/// re-checked in the filter).
fn balance_call() -> NamedExpr {
    let filter = helpers::equal(
        helpers::get(ValueType::GetArgs, helpers::get(ValueType::GetLock, Value::arg(0))),
        Value::param(0),
    );
    let query = Value::query_cells(filter);
    let map_capacity = Value::op(ValueType::GetCapacity, vec![Value::arg(0)]);
    let sum = Value::op(ValueType::Add, vec![Value::arg(0), Value::op(ValueType::GetCapacity, vec![Value::arg(1)])]);
    let expr = helpers::reduce(sum, Value::uint64(0), helpers::map(map_capacity, query));
    NamedExpr { name: "balance".into(), expr }
}

/// `deposits = cond(direction == "insert" && role == "index", cell.out_point, nil)`.
fn deposits_stream() -> NamedExpr {
    let is_insert_index = helpers::and(vec![
        helpers::equal(Value::arg(1), Value::bytes(b"insert".to_vec())),
        helpers::equal(Value::arg(2), Value::bytes(b"index".to_vec())),
    ]);
    let expr = Value::op(
        ValueType::Cond,
        vec![is_insert_index, helpers::get(ValueType::GetOutPoint, Value::arg(0)), Value::nil()],
    );
    NamedExpr { name: "deposits".into(), expr }
}

fn sample_block(number: u64, parent_hash: Vec<u8>, cells: Vec<(u64, Vec<u8>)>) -> Block {
    let header = header(number, parent_hash);
    let header_hash = vec![number as u8 + 1; 32];
    let tx_hash = vec![number as u8 + 50; 32];
    let outputs = cells
        .into_iter()
        .enumerate()
        .map(|(index, (capacity, args))| {
            let out_point = Value::out_point(Value::bytes(tx_hash.clone()), Value::uint64(index as u64));
            augment_cell(&core_cell(capacity, args), out_point, header.clone())
        })
        .collect();
    Block {
        header,
        header_hash,
        transactions: vec![BlockTransaction { hash: tx_hash, inputs: vec![], outputs, deps: vec![] }],
    }
}

async fn call_json(state: &Arc<ServiceState>, name: &str, params: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/call/{name}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "params": params }).to_string()))
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn balance_sums_capacities_of_matching_cells() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let rpc_impl = MockChainRpc::new();
    let block = sample_block(0, vec![0u8; 32], vec![(100, vec![0xAA]), (200, vec![0xAA]), (300, vec![0xAA])]);
    rpc_impl.push_block(0, block);
    let rpc: Arc<dyn animagus_rpc::ChainRpc> = Arc::new(rpc_impl);

    let root = Root { calls: vec![balance_call()], streams: vec![deposits_stream()] };
    let indexer = Indexer::new(b"bundle-bytes", root.clone(), store.clone(), rpc.clone()).unwrap();
    indexer.step().await.unwrap();

    let state = Arc::new(ServiceState::new(root, store, rpc));

    let (status, body) = call_json(&state, "balance", serde_json::json!(["0xAA"])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(600));
}

#[tokio::test]
async fn balance_is_zero_when_no_cell_matches() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let rpc_impl = MockChainRpc::new();
    let block = sample_block(0, vec![0u8; 32], vec![(100, vec![0xAA])]);
    rpc_impl.push_block(0, block);
    let rpc: Arc<dyn animagus_rpc::ChainRpc> = Arc::new(rpc_impl);

    let root = Root { calls: vec![balance_call()], streams: vec![deposits_stream()] };
    let indexer = Indexer::new(b"bundle-bytes", root.clone(), store.clone(), rpc.clone()).unwrap();
    indexer.step().await.unwrap();

    let state = Arc::new(ServiceState::new(root, store, rpc));

    let (status, body) = call_json(&state, "balance", serde_json::json!(["0xBB"])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(0));
}

#[tokio::test]
async fn unknown_call_returns_404() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let rpc: Arc<dyn animagus_rpc::ChainRpc> = Arc::new(MockChainRpc::new());
    let root = Root { calls: vec![balance_call()], streams: vec![deposits_stream()] };
    let state = Arc::new(ServiceState::new(root, store, rpc));

    let (status, _) = call_json(&state, "nonexistent", serde_json::json!([])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inserting_a_cell_publishes_exactly_one_deposit_and_reverting_publishes_the_compensating_one() {
    use tokio_stream::StreamExt;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let rpc_impl = MockChainRpc::new();
    let block = sample_block(0, vec![0u8; 32], vec![(500, vec![0xCC])]);
    rpc_impl.push_block(0, block);
    let rpc: Arc<dyn animagus_rpc::ChainRpc> = Arc::new(rpc_impl);

    let root = Root { calls: vec![balance_call()], streams: vec![deposits_stream()] };
    let indexer = Indexer::new(b"bundle-bytes", root, store.clone(), rpc).unwrap();

    let mut subscription = store.subscribe("STREAM:deposits");

    indexer.step().await.unwrap();
    let inserted = subscription.next().await;
    assert!(inserted.is_some());

    indexer.revert_block(0).unwrap();
    let reverted = subscription.next().await;
    assert!(reverted.is_some());
    assert_eq!(inserted, reverted, "revert replays the same out_point payload the insert published");
}
