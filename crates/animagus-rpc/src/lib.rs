//! Chain RPC client trait and JSON-RPC HTTP implementation.
//!
//! The engine never owns node operation; this crate only defines the
//! narrow [`ChainRpc`] surface the indexer and service binding need, plus
//! one concrete `reqwest`-based implementation and an in-memory mock for
//! tests.

pub mod client;
pub mod error;
pub mod value_json;

pub use client::{
    augment_cell, http::HttpChainRpc, mock::MockChainRpc, resolve_input_cell, resolve_out_point,
    resolve_out_points, Block, BlockTransaction, ChainRpc, TransactionWithStatus,
};
pub use error::{RpcError, RpcResult};

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_types::Value;

    fn sample_header(number: u64) -> Value {
        Value::header([
            Value::uint64(0),
            Value::uint64(0),
            Value::uint64(number),
            Value::uint64(0),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 12]),
        ])
    }

    fn sample_core_cell(capacity: u64) -> Value {
        Value::cell(
            Value::uint64(capacity),
            Value::script(Value::bytes(vec![1u8; 32]), Value::uint64(0), Value::bytes(vec![])),
            Value::nil(),
            Value::bytes(vec![]),
            vec![],
        )
    }

    #[tokio::test]
    async fn resolve_input_cell_augments_with_out_point_and_header() {
        let rpc = MockChainRpc::new();
        let header = sample_header(7);
        let header_hash = vec![9u8; 32];
        let tx_hash = vec![1u8; 32];
        let block = Block {
            header: header.clone(),
            header_hash: header_hash.clone(),
            transactions: vec![BlockTransaction {
                hash: tx_hash.clone(),
                inputs: vec![],
                outputs: vec![augment_cell(
                    &sample_core_cell(1000),
                    Value::out_point(Value::bytes(tx_hash.clone()), Value::uint64(0)),
                    header.clone(),
                )],
                deps: vec![],
            }],
        };
        rpc.push_block(7, block);

        let input = Value::cell_input(Value::out_point(Value::bytes(tx_hash), Value::uint64(0)), Value::uint64(0));
        let resolved = resolve_input_cell(&rpc, &input).await.expect("resolves");
        assert_eq!(resolved.children.len(), 6);
        assert_eq!(resolved.children[4].children[1].as_uint64(), Some(0));
        assert_eq!(resolved.children[5], header);
    }

    #[tokio::test]
    async fn resolve_input_cell_fails_when_transaction_not_committed() {
        let rpc = MockChainRpc::new();
        let tx_hash = vec![2u8; 32];
        rpc.register_pending_transaction(TransactionWithStatus {
            hash: tx_hash.clone(),
            outputs: vec![sample_core_cell(500)],
            block_hash: None,
        });

        let input = Value::cell_input(Value::out_point(Value::bytes(tx_hash), Value::uint64(0)), Value::uint64(0));
        let err = resolve_input_cell(&rpc, &input).await.unwrap_err();
        assert!(matches!(err, RpcError::TransactionNotCommitted(_)));
    }

    #[tokio::test]
    async fn resolve_input_cell_fails_when_transaction_missing() {
        let rpc = MockChainRpc::new();
        let input = Value::cell_input(
            Value::out_point(Value::bytes(vec![3u8; 32]), Value::uint64(0)),
            Value::uint64(0),
        );
        let err = resolve_input_cell(&rpc, &input).await.unwrap_err();
        assert!(matches!(err, RpcError::TransactionNotFound(_)));
    }
}
