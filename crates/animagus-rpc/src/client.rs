//! `ChainRpc`: the node collaborator this engine consumes but does not own
//! Reliability, transport, and JSON shape belong to the node; this
//! crate only defines the narrow surface the indexer and service binding
//! need and one concrete `reqwest`-based implementation of it, following
//! `causality-api::client::ChainClient`'s "thin wrapper around a JSON-RPC
//! POST" shape.

use crate::error::RpcResult;
use animagus_types::Value;
use async_trait::async_trait;

/// One fetched block: its header plus every transaction's inputs/outputs
/// (already augmented with `out_point`/`header` on every output cell, since
/// both are known the moment the block is fetched).
#[derive(Debug, Clone)]
pub struct Block {
    pub header: Value,
    pub header_hash: Vec<u8>,
    pub transactions: Vec<BlockTransaction>,
}

#[derive(Debug, Clone)]
pub struct BlockTransaction {
    pub hash: Vec<u8>,
    /// The `cell_input`s this transaction consumes (not yet resolved to
    /// full cells — that requires a further `get_transaction`/`get_header`
    /// round trip, done lazily by the indexer only for transactions it
    /// actually needs to index).
    pub inputs: Vec<Value>,
    /// Output cells, each already carrying its `out_point` and the block's
    /// `header` (the "indexed/fetched" cell shape).
    pub outputs: Vec<Value>,
    pub deps: Vec<Value>,
}

/// A transaction fetched by hash, with the status CKB reports alongside it.
/// `outputs` are core (un-augmented) cells — `out_point`/`header` are only
/// known once the caller decides which output it wants and resolves the
/// containing block, so augmentation happens in [`resolve_input_cell`].
#[derive(Debug, Clone)]
pub struct TransactionWithStatus {
    pub hash: Vec<u8>,
    pub outputs: Vec<Value>,
    /// The hash of the block this transaction was committed in, if any.
    pub block_hash: Option<Vec<u8>>,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_block_by_number(&self, number: u64) -> RpcResult<Option<Block>>;
    async fn get_transaction(&self, hash: &[u8]) -> RpcResult<Option<TransactionWithStatus>>;
    async fn get_header(&self, hash: &[u8]) -> RpcResult<Option<Value>>;
    async fn get_tip_block_number(&self) -> RpcResult<u64>;
}

/// Attach the evaluation-time `out_point`/`header` pair to a core (4-field)
/// cell, producing the 6-field shape `get_out_point`/`get_header` expect.
pub fn augment_cell(core: &Value, out_point: Value, header: Value) -> Value {
    let mut children = core.children.clone();
    children.push(out_point);
    children.push(header);
    Value::op(core.ty, children)
}

/// Resolve one consumed `cell_input` to the full cell it used to be,
/// fetching the originating transaction and its containing block's header.
/// Used by the indexer when it needs to evaluate a filter against a
/// removed cell.
pub async fn resolve_input_cell(rpc: &dyn ChainRpc, input: &Value) -> RpcResult<Value> {
    resolve_out_point(rpc, &input.children[0]).await
}

/// Resolve a bare `out_point` to the full cell it references, fetching the
/// originating transaction and its containing block's header. Used by the
/// service binding when a `query_cells` hit (stored as just an out_point)
/// needs to be turned back into a cell `Value`.
pub async fn resolve_out_point(rpc: &dyn ChainRpc, out_point: &Value) -> RpcResult<Value> {
    let tx_hash = out_point.children[0].as_bytes().expect("out_point tx_hash is bytes").to_vec();
    let index = out_point.children[1].as_uint64().expect("out_point index is uint64") as usize;

    let with_status = rpc
        .get_transaction(&tx_hash)
        .await?
        .ok_or_else(|| crate::error::RpcError::TransactionNotFound(hex::encode(&tx_hash)))?;
    let core = with_status
        .outputs
        .get(index)
        .cloned()
        .ok_or_else(|| crate::error::RpcError::TransactionNotFound(format!("{}#{}", hex::encode(&tx_hash), index)))?;
    let block_hash = with_status
        .block_hash
        .ok_or_else(|| crate::error::RpcError::TransactionNotCommitted(hex::encode(&tx_hash)))?;
    let header = rpc
        .get_header(&block_hash)
        .await?
        .ok_or_else(|| crate::error::RpcError::TransactionNotCommitted(hex::encode(&tx_hash)))?;
    Ok(augment_cell(&core, out_point.clone(), header))
}

/// Resolve many out_points concurrently (fixed fan-out width, order
/// preserved), de-duplicating the underlying transaction/header fetches
/// by hash so a batch of out_points sharing a transaction or a block only
/// fetches each once. A failure anywhere aborts the whole batch.
pub async fn resolve_out_points(rpc: &dyn ChainRpc, out_points: &[Value]) -> RpcResult<Vec<Value>> {
    use futures::stream::{self, StreamExt, TryStreamExt};

    const BATCH_WIDTH: usize = 50;
    let cache = ResolveCache::default();

    stream::iter(out_points.iter())
        .map(|out_point| resolve_out_point_cached(rpc, out_point, &cache))
        .buffered(BATCH_WIDTH)
        .try_collect()
        .await
}

#[derive(Default)]
struct ResolveCache {
    transactions: tokio::sync::Mutex<std::collections::HashMap<Vec<u8>, TransactionWithStatus>>,
    headers: tokio::sync::Mutex<std::collections::HashMap<Vec<u8>, Value>>,
}

impl ResolveCache {
    async fn transaction(&self, rpc: &dyn ChainRpc, hash: &[u8]) -> RpcResult<TransactionWithStatus> {
        if let Some(cached) = self.transactions.lock().await.get(hash) {
            return Ok(cached.clone());
        }
        let fetched = rpc
            .get_transaction(hash)
            .await?
            .ok_or_else(|| crate::error::RpcError::TransactionNotFound(hex::encode(hash)))?;
        self.transactions.lock().await.insert(hash.to_vec(), fetched.clone());
        Ok(fetched)
    }

    async fn header(&self, rpc: &dyn ChainRpc, hash: &[u8], tx_hash: &[u8]) -> RpcResult<Value> {
        if let Some(cached) = self.headers.lock().await.get(hash) {
            return Ok(cached.clone());
        }
        let fetched = rpc
            .get_header(hash)
            .await?
            .ok_or_else(|| crate::error::RpcError::TransactionNotCommitted(hex::encode(tx_hash)))?;
        self.headers.lock().await.insert(hash.to_vec(), fetched.clone());
        Ok(fetched)
    }
}

async fn resolve_out_point_cached(rpc: &dyn ChainRpc, out_point: &Value, cache: &ResolveCache) -> RpcResult<Value> {
    let tx_hash = out_point.children[0].as_bytes().expect("out_point tx_hash is bytes").to_vec();
    let index = out_point.children[1].as_uint64().expect("out_point index is uint64") as usize;

    let with_status = cache.transaction(rpc, &tx_hash).await?;
    let core = with_status
        .outputs
        .get(index)
        .cloned()
        .ok_or_else(|| crate::error::RpcError::TransactionNotFound(format!("{}#{}", hex::encode(&tx_hash), index)))?;
    let block_hash = with_status
        .block_hash
        .clone()
        .ok_or_else(|| crate::error::RpcError::TransactionNotCommitted(hex::encode(&tx_hash)))?;
    let header = cache.header(rpc, &block_hash, &tx_hash).await?;
    Ok(augment_cell(&core, out_point.clone(), header))
}

pub mod http;
pub mod mock;
