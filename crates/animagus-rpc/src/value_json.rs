//! Parses the node's JSON-RPC response shape (hex-string hashes/args,
//! `"data"`/`"type"` hash-type strings, `"code"`/`"dep_group"` dep-type
//! strings — the same conventions `animagus_types::json` renders on the
//! way out) back into codec-verified `Value`s on the way in.

use crate::error::{RpcError, RpcResult};
use animagus_types::Value;
use serde_json::Value as Json;

fn method_err(method: &'static str, reason: impl Into<String>) -> RpcError {
    RpcError::Decode { method, reason: reason.into() }
}

fn hex_bytes(method: &'static str, field: &str, j: &Json) -> RpcResult<Vec<u8>> {
    let s = j.as_str().ok_or_else(|| method_err(method, format!("{field} is not a string")))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| method_err(method, format!("{field} is not valid hex: {e}")))
}

pub(crate) fn hex_u64(method: &'static str, field: &str, j: &Json) -> RpcResult<u64> {
    let s = j.as_str().ok_or_else(|| method_err(method, format!("{field} is not a string")))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| method_err(method, format!("{field} is not valid hex u64: {e}")))
}

pub(crate) fn field<'a>(method: &'static str, j: &'a Json, name: &str) -> RpcResult<&'a Json> {
    j.get(name).ok_or_else(|| method_err(method, format!("missing field {name}")))
}

pub fn parse_script(method: &'static str, j: &Json) -> RpcResult<Value> {
    let code_hash = hex_bytes(method, "code_hash", field(method, j, "code_hash")?)?;
    let hash_type = match field(method, j, "hash_type")?.as_str() {
        Some("data") => 0u64,
        Some("type") => 1u64,
        Some("data1") => 0u64,
        Some(other) => return Err(method_err(method, format!("unknown hash_type {other}"))),
        None => return Err(method_err(method, "hash_type is not a string")),
    };
    let args = hex_bytes(method, "args", field(method, j, "args")?)?;
    Ok(Value::script(Value::bytes(code_hash), Value::uint64(hash_type), Value::bytes(args)))
}

fn parse_out_point(method: &'static str, j: &Json) -> RpcResult<Value> {
    let tx_hash = hex_bytes(method, "tx_hash", field(method, j, "tx_hash")?)?;
    let index = hex_u64(method, "index", field(method, j, "index")?)?;
    Ok(Value::out_point(Value::bytes(tx_hash), Value::uint64(index)))
}

fn parse_cell_input(method: &'static str, j: &Json) -> RpcResult<Value> {
    let since = hex_u64(method, "since", field(method, j, "since")?)?;
    let previous_output = parse_out_point(method, field(method, j, "previous_output")?)?;
    Ok(Value::cell_input(previous_output, Value::uint64(since)))
}

fn parse_cell_dep(method: &'static str, j: &Json) -> RpcResult<Value> {
    let out_point = parse_out_point(method, field(method, j, "out_point")?)?;
    let dep_type = match field(method, j, "dep_type")?.as_str() {
        Some("code") => 0u64,
        Some("dep_group") => 1u64,
        Some(other) => return Err(method_err(method, format!("unknown dep_type {other}"))),
        None => return Err(method_err(method, "dep_type is not a string")),
    };
    Ok(Value::cell_dep(out_point, Value::uint64(dep_type)))
}

/// Build a core (4-field) cell from an `outputs[i]` entry plus the matching
/// `outputs_data[i]` hex string; the out_point/header augmentation happens
/// later once the cell's originating transaction/block is known.
fn parse_cell_core(method: &'static str, output: &Json, data: &Json) -> RpcResult<Value> {
    let capacity = hex_u64(method, "capacity", field(method, output, "capacity")?)?;
    let lock = parse_script(method, field(method, output, "lock")?)?;
    let type_ = match output.get("type") {
        Some(Json::Null) | None => Value::nil(),
        Some(t) => parse_script(method, t)?,
    };
    let data = hex_bytes(method, "data", data)?;
    Ok(Value::cell(Value::uint64(capacity), lock, type_, Value::bytes(data), vec![]))
}

/// The shape of one transaction: its hash plus un-augmented input/output/dep
/// `Value`s, kept separate so the caller can attach out_point/header to each
/// output once it knows which block (if any) the transaction landed in.
pub struct ParsedTransaction {
    pub hash: Vec<u8>,
    pub inputs: Vec<Value>,
    pub outputs: Vec<Value>,
    pub deps: Vec<Value>,
}

pub fn parse_transaction(method: &'static str, j: &Json) -> RpcResult<ParsedTransaction> {
    let hash = hex_bytes(method, "hash", field(method, j, "hash")?)?;
    let inputs = field(method, j, "inputs")?
        .as_array()
        .ok_or_else(|| method_err(method, "inputs is not an array"))?
        .iter()
        .map(|i| parse_cell_input(method, i))
        .collect::<RpcResult<Vec<_>>>()?;
    let outputs_json = field(method, j, "outputs")?
        .as_array()
        .ok_or_else(|| method_err(method, "outputs is not an array"))?;
    let outputs_data = field(method, j, "outputs_data")?
        .as_array()
        .ok_or_else(|| method_err(method, "outputs_data is not an array"))?;
    if outputs_json.len() != outputs_data.len() {
        return Err(method_err(method, "outputs/outputs_data length mismatch"));
    }
    let outputs = outputs_json
        .iter()
        .zip(outputs_data.iter())
        .map(|(o, d)| parse_cell_core(method, o, d))
        .collect::<RpcResult<Vec<_>>>()?;
    let deps = field(method, j, "cell_deps")?
        .as_array()
        .ok_or_else(|| method_err(method, "cell_deps is not an array"))?
        .iter()
        .map(|d| parse_cell_dep(method, d))
        .collect::<RpcResult<Vec<_>>>()?;
    Ok(ParsedTransaction { hash, inputs, outputs, deps })
}

pub fn parse_header(method: &'static str, j: &Json) -> RpcResult<Value> {
    let u = |name: &str| -> RpcResult<u64> { hex_u64(method, name, field(method, j, name)?) };
    let b = |name: &str| -> RpcResult<Vec<u8>> { hex_bytes(method, name, field(method, j, name)?) };
    Ok(Value::header([
        Value::uint64(u("compact_target")?),
        Value::uint64(u("timestamp")?),
        Value::uint64(u("number")?),
        Value::uint64(u("epoch")?),
        Value::bytes(b("parent_hash")?),
        Value::bytes(b("transactions_root")?),
        Value::bytes(b("proposals_hash")?),
        Value::bytes(b("uncles_hash")?),
        Value::bytes(b("dao")?),
        Value::bytes(b("nonce")?),
    ]))
}

pub fn header_hash_field(method: &'static str, j: &Json) -> RpcResult<Vec<u8>> {
    hex_bytes(method, "hash", field(method, j, "hash")?)
}
