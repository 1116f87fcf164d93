//! Canonical JSON rendering, mirroring the hex/string conventions CKB's own
//! RPC uses (`0x`-prefixed hashes and byte strings, `"type"`/`"data"` for
//! `hash_type`, decimal numbers as quoted hex where the chain does the
//! same for 64/128-bit fields).

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueType};
use serde_json::{json, Value as Json};

pub fn serialize_to_json(v: &Value) -> CodecResult<Json> {
    match v.ty {
        ValueType::Script => script_json(v),
        ValueType::Header => header_json(v),
        ValueType::Transaction => transaction_json(v),
        other => Err(CodecError::UnsupportedType(other)),
    }
}

fn hex0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn hex_u64(u: u64) -> String {
    format!("0x{:x}", u)
}

fn script_json(v: &Value) -> CodecResult<Json> {
    if v.ty != ValueType::Script || v.children.len() != 3 {
        return Err(CodecError::Malformed("expected a 3-field script".into()));
    }
    let code_hash = v.children[0]
        .as_bytes()
        .ok_or_else(|| CodecError::Malformed("script code_hash must be bytes".into()))?;
    let hash_type = v.children[1]
        .as_uint64()
        .ok_or_else(|| CodecError::Malformed("script hash_type must be uint64".into()))?;
    let args = v.children[2]
        .as_bytes()
        .ok_or_else(|| CodecError::Malformed("script args must be bytes".into()))?;
    let hash_type = match hash_type {
        0 => "data",
        1 => "type",
        other => return Err(CodecError::InvalidHashType(other as u8)),
    };
    Ok(json!({
        "code_hash": hex0x(code_hash),
        "hash_type": hash_type,
        "args": hex0x(args),
    }))
}

fn header_json(v: &Value) -> CodecResult<Json> {
    if v.ty != ValueType::Header || v.children.len() != 10 {
        return Err(CodecError::Malformed("expected a 10-field header".into()));
    }
    let u = |i: usize| -> CodecResult<u64> {
        v.children[i]
            .as_uint64()
            .ok_or_else(|| CodecError::Malformed("header numeric field must be uint64".into()))
    };
    let b = |i: usize| -> CodecResult<&[u8]> {
        v.children[i]
            .as_bytes()
            .ok_or_else(|| CodecError::Malformed("header hash field must be bytes".into()))
    };
    Ok(json!({
        "compact_target": hex_u64(u(0)?),
        "timestamp": hex_u64(u(1)?),
        "number": hex_u64(u(2)?),
        "epoch": hex_u64(u(3)?),
        "parent_hash": hex0x(b(4)?),
        "transactions_root": hex0x(b(5)?),
        "proposals_hash": hex0x(b(6)?),
        "uncles_hash": hex0x(b(7)?),
        "dao": hex0x(b(8)?),
        "nonce": hex0x(b(9)?),
    }))
}

fn transaction_json(v: &Value) -> CodecResult<Json> {
    if v.ty != ValueType::Transaction || v.children.len() != 3 {
        return Err(CodecError::Malformed("expected a 3-field transaction".into()));
    }
    let inputs = &v.children[0].children;
    let outputs = &v.children[1].children;
    let deps = &v.children[2].children;

    let inputs_json: Vec<Json> = inputs
        .iter()
        .map(|i| -> CodecResult<Json> {
            let out_point = &i.children[0];
            let since = i.children[1]
                .as_uint64()
                .ok_or_else(|| CodecError::Malformed("cell_input since must be uint64".into()))?;
            Ok(json!({
                "since": hex_u64(since),
                "previous_output": out_point_json(out_point)?,
            }))
        })
        .collect::<CodecResult<_>>()?;

    let outputs_json: Vec<Json> = outputs
        .iter()
        .map(|o| -> CodecResult<Json> {
            let capacity = o.children[0]
                .as_uint64()
                .ok_or_else(|| CodecError::Malformed("cell capacity must be uint64".into()))?;
            let lock = script_json(&o.children[1])?;
            let type_ = if o.children[2].is_nil() {
                Json::Null
            } else {
                script_json(&o.children[2])?
            };
            Ok(json!({
                "capacity": hex_u64(capacity),
                "lock": lock,
                "type": type_,
            }))
        })
        .collect::<CodecResult<_>>()?;

    let outputs_data_json: Vec<Json> = outputs
        .iter()
        .map(|o| -> CodecResult<Json> {
            let data = o.children[3]
                .as_bytes()
                .ok_or_else(|| CodecError::Malformed("cell data must be bytes".into()))?;
            Ok(Json::String(hex0x(data)))
        })
        .collect::<CodecResult<_>>()?;

    let deps_json: Vec<Json> = deps
        .iter()
        .map(|d| -> CodecResult<Json> {
            let out_point = &d.children[0];
            let dep_type = d.children[1]
                .as_uint64()
                .ok_or_else(|| CodecError::Malformed("cell_dep dep_type must be uint64".into()))?;
            let dep_type = match dep_type {
                0 => "code",
                1 => "dep_group",
                other => return Err(CodecError::InvalidDepType(other as u8)),
            };
            Ok(json!({
                "out_point": out_point_json(out_point)?,
                "dep_type": dep_type,
            }))
        })
        .collect::<CodecResult<_>>()?;

    Ok(json!({
        "inputs": inputs_json,
        "outputs": outputs_json,
        "outputs_data": outputs_data_json,
        "cell_deps": deps_json,
    }))
}

fn out_point_json(v: &Value) -> CodecResult<Json> {
    let tx_hash = v.children[0]
        .as_bytes()
        .ok_or_else(|| CodecError::Malformed("out_point tx_hash must be bytes".into()))?;
    let index = v.children[1]
        .as_uint64()
        .ok_or_else(|| CodecError::Malformed("out_point index must be uint64".into()))?;
    Ok(json!({
        "tx_hash": hex0x(tx_hash),
        "index": hex_u64(index),
    }))
}
