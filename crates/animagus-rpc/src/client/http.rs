//! JSON-RPC 2.0 HTTP implementation of [`ChainRpc`], following
//! `causality-api::client::ChainClient::rpc_call`'s approach to outbound
//! chain connectivity.

use super::{Block, BlockTransaction, ChainRpc, TransactionWithStatus};
use crate::error::{RpcError, RpcResult};
use crate::value_json;
use animagus_types::Value;
use async_trait::async_trait;
use serde_json::{json, Value as Json};
use std::time::Duration;

pub struct HttpChainRpc {
    url: String,
    http: reqwest::Client,
}

impl HttpChainRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is always valid");
        Self { url: url.into(), http }
    }

    async fn call(&self, method: &'static str, params: Json) -> RpcResult<Json> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|source| RpcError::Transport { method, source })?;
        let response: Json =
            response.json().await.map_err(|source| RpcError::Transport { method, source })?;
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Json::as_i64).unwrap_or(-1);
            let message = error.get("message").and_then(Json::as_str).unwrap_or("unknown error").to_string();
            return Err(RpcError::JsonRpc { code, message });
        }
        Ok(response.get("result").cloned().unwrap_or(Json::Null))
    }

    fn build_block_transaction(
        method: &'static str,
        header: &Value,
        header_hash: &[u8],
        tx_json: &Json,
    ) -> RpcResult<BlockTransaction> {
        let parsed = value_json::parse_transaction(method, tx_json)?;
        let outputs = parsed
            .outputs
            .iter()
            .enumerate()
            .map(|(index, core)| {
                let out_point =
                    Value::out_point(Value::bytes(parsed.hash.clone()), Value::uint64(index as u64));
                super::augment_cell(core, out_point, header.clone())
            })
            .collect();
        tracing::trace!(header_hash = %hex::encode(header_hash), "decoded block transaction");
        Ok(BlockTransaction {
            hash: parsed.hash,
            inputs: parsed.inputs,
            outputs,
            deps: parsed.deps,
        })
    }
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn get_block_by_number(&self, number: u64) -> RpcResult<Option<Block>> {
        const METHOD: &str = "get_block_by_number";
        let result = self.call(METHOD, json!([format!("0x{:x}", number)])).await?;
        if result.is_null() {
            return Ok(None);
        }
        let header_json =
            result.get("header").ok_or_else(|| RpcError::Decode { method: METHOD, reason: "missing header".into() })?;
        let header = value_json::parse_header(METHOD, header_json)?;
        let header_hash = value_json::header_hash_field(METHOD, header_json)?;
        let transactions = result
            .get("transactions")
            .and_then(Json::as_array)
            .ok_or_else(|| RpcError::Decode { method: METHOD, reason: "missing transactions".into() })?
            .iter()
            .map(|tx| Self::build_block_transaction(METHOD, &header, &header_hash, tx))
            .collect::<RpcResult<Vec<_>>>()?;
        Ok(Some(Block { header, header_hash, transactions }))
    }

    async fn get_transaction(&self, hash: &[u8]) -> RpcResult<Option<TransactionWithStatus>> {
        const METHOD: &str = "get_transaction";
        let result = self.call(METHOD, json!([format!("0x{}", hex::encode(hash))])).await?;
        if result.is_null() {
            return Ok(None);
        }
        let tx_json = result
            .get("transaction")
            .ok_or_else(|| RpcError::Decode { method: METHOD, reason: "missing transaction".into() })?;
        let parsed = value_json::parse_transaction(METHOD, tx_json)?;
        let block_hash = result
            .get("tx_status")
            .and_then(|s| s.get("block_hash"))
            .filter(|h| !h.is_null())
            .map(|h| value_json::header_hash_field(METHOD, &json!({ "hash": h })))
            .transpose()?;
        Ok(Some(TransactionWithStatus { hash: parsed.hash, outputs: parsed.outputs, block_hash }))
    }

    async fn get_header(&self, hash: &[u8]) -> RpcResult<Option<Value>> {
        const METHOD: &str = "get_header";
        let result = self.call(METHOD, json!([format!("0x{}", hex::encode(hash))])).await?;
        if result.is_null() {
            return Ok(None);
        }
        value_json::parse_header(METHOD, &result).map(Some)
    }

    async fn get_tip_block_number(&self) -> RpcResult<u64> {
        const METHOD: &str = "get_tip_header";
        let result = self.call(METHOD, json!([])).await?;
        let number_json = value_json::field(METHOD, &result, "number")?;
        value_json::hex_u64(METHOD, "number", number_json)
    }
}
