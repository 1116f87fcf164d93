//! An in-memory [`ChainRpc`] for indexer/service tests, avoiding a live node.

use super::{Block, ChainRpc, TransactionWithStatus};
use crate::error::RpcResult;
use animagus_types::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockChainRpc {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    blocks_by_number: HashMap<u64, Block>,
    headers_by_hash: HashMap<Vec<u8>, Value>,
    transactions_by_hash: HashMap<Vec<u8>, TransactionWithStatus>,
    tip: u64,
}

impl MockChainRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a block as the new tip, indexing its header and every contained
    /// transaction so `get_header`/`get_transaction` can resolve them.
    pub fn push_block(&self, number: u64, block: Block) {
        let mut inner = self.inner.lock().expect("mock rpc mutex poisoned");
        inner.headers_by_hash.insert(block.header_hash.clone(), block.header.clone());
        for tx in &block.transactions {
            inner.transactions_by_hash.insert(
                tx.hash.clone(),
                TransactionWithStatus {
                    hash: tx.hash.clone(),
                    outputs: tx.outputs.clone(),
                    block_hash: Some(block.header_hash.clone()),
                },
            );
        }
        inner.tip = inner.tip.max(number);
        inner.blocks_by_number.insert(number, block);
    }

    /// Register a transaction that exists but has not (yet) landed in a
    /// block, mirroring a mempool entry or a transaction fed in purely to
    /// satisfy a `resolve_input_cell` lookup.
    pub fn register_pending_transaction(&self, tx: TransactionWithStatus) {
        self.inner.lock().expect("mock rpc mutex poisoned").transactions_by_hash.insert(tx.hash.clone(), tx);
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn get_block_by_number(&self, number: u64) -> RpcResult<Option<Block>> {
        Ok(self.inner.lock().expect("mock rpc mutex poisoned").blocks_by_number.get(&number).cloned())
    }

    async fn get_transaction(&self, hash: &[u8]) -> RpcResult<Option<TransactionWithStatus>> {
        Ok(self.inner.lock().expect("mock rpc mutex poisoned").transactions_by_hash.get(hash).cloned())
    }

    async fn get_header(&self, hash: &[u8]) -> RpcResult<Option<Value>> {
        Ok(self.inner.lock().expect("mock rpc mutex poisoned").headers_by_hash.get(hash).cloned())
    }

    async fn get_tip_block_number(&self) -> RpcResult<u64> {
        Ok(self.inner.lock().expect("mock rpc mutex poisoned").tip)
    }
}
