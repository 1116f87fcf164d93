//! Canonical binary codec for chain primitives.
//!
//! A little-endian, fixed-and-dynamic-vector encoding in the style of the
//! source chain's molecule schema: fixed-size types are concatenated
//! in-place ("struct"), variable-length sequences are prefixed with a
//! 4-byte element count ("fixvec"), and heterogeneous/variable-size
//! aggregates are encoded as `total_size || [offsets] || payloads`
//! ("table"/"dynvec" — the same shape, since a dynvec is just a table
//! whose fields happen to share one semantic type).
//!
//! Only `script`, `header`, and `transaction` are directly
//! `serialize_to_core`-able per the expression language; `cell` and
//! `out_point`/`cell_input`/`cell_dep` encodings exist because they nest
//! inside a transaction's canonical bytes.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueType};

// ---------------------------------------------------------------------
// Generic vector encodings
// ---------------------------------------------------------------------

/// `fixvec` of raw bytes: a 4-byte little-endian length prefix followed by
/// the bytes themselves.
pub fn encode_fixvec_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

pub fn decode_fixvec_bytes(buf: &[u8]) -> CodecResult<Vec<u8>> {
    if buf.len() < 4 {
        return Err(CodecError::BufferTooShort { need: 4, got: buf.len() });
    }
    let len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if buf.len() != 4 + len {
        return Err(CodecError::SizeMismatch { declared: 4 + len, actual: buf.len() });
    }
    Ok(buf[4..].to_vec())
}

/// `fixvec` of fixed-size items: a 4-byte element count followed by the
/// items concatenated in place.
pub fn encode_fixvec_items(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

pub fn decode_fixvec_items(buf: &[u8], item_size: usize) -> CodecResult<Vec<Vec<u8>>> {
    if buf.len() < 4 {
        return Err(CodecError::BufferTooShort { need: 4, got: buf.len() });
    }
    let count = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if buf.len() != 4 + count * item_size {
        return Err(CodecError::SizeMismatch {
            declared: 4 + count * item_size,
            actual: buf.len(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let start = 4 + i * item_size;
        out.push(buf[start..start + item_size].to_vec());
    }
    Ok(out)
}

/// `table`/`dynvec`: `total_size(u32) || offsets(u32 each) || payloads`.
/// An empty table is just the 4-byte `total_size` (equal to 4).
pub fn encode_table(fields: &[Vec<u8>]) -> Vec<u8> {
    let header_len = 4 + 4 * fields.len();
    let mut body = Vec::new();
    let mut offsets = Vec::with_capacity(fields.len());
    for field in fields {
        offsets.push(header_len + body.len());
        body.extend_from_slice(field);
    }
    let total = header_len + body.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
    }
    out.extend_from_slice(&body);
    out
}

pub fn decode_table(buf: &[u8]) -> CodecResult<Vec<Vec<u8>>> {
    if buf.len() < 4 {
        return Err(CodecError::BufferTooShort { need: 4, got: buf.len() });
    }
    let total = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if total != buf.len() {
        return Err(CodecError::SizeMismatch { declared: total, actual: buf.len() });
    }
    if total == 4 {
        return Ok(vec![]);
    }
    if total < 8 {
        return Err(CodecError::MalformedOffsets);
    }
    let first_offset = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;
    if first_offset % 4 != 0 || first_offset < 8 {
        return Err(CodecError::MalformedOffsets);
    }
    let field_count = first_offset / 4 - 1;
    let mut offsets = Vec::with_capacity(field_count + 1);
    for i in 0..field_count {
        let start = 4 + i * 4;
        if start + 4 > buf.len() {
            return Err(CodecError::MalformedOffsets);
        }
        offsets.push(u32::from_le_bytes(buf[start..start + 4].try_into().unwrap()) as usize);
    }
    offsets.push(total);
    let mut fields = Vec::with_capacity(field_count);
    for i in 0..field_count {
        if offsets[i] > offsets[i + 1] || offsets[i + 1] > buf.len() {
            return Err(CodecError::MalformedOffsets);
        }
        fields.push(buf[offsets[i]..offsets[i + 1]].to_vec());
    }
    Ok(fields)
}

// ---------------------------------------------------------------------
// Chain primitive sizes
// ---------------------------------------------------------------------

pub const HASH_SIZE: usize = 32;
pub const OUT_POINT_SIZE: usize = 36;
pub const CELL_INPUT_SIZE: usize = 44;
pub const CELL_DEP_SIZE: usize = 37;
pub const HEADER_SIZE: usize = 204;

// ---------------------------------------------------------------------
// out_point := [bytes tx_hash(32), uint64 index<2^32]
// ---------------------------------------------------------------------

pub fn serialize_out_point(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::OutPoint)?;
    require_children(v, 2)?;
    let tx_hash = require_hash(&v.children[0])?;
    let index = require_u32(&v.children[1])?;
    let mut out = Vec::with_capacity(OUT_POINT_SIZE);
    out.extend_from_slice(&tx_hash);
    out.extend_from_slice(&index.to_le_bytes());
    Ok(out)
}

pub fn restore_out_point(buf: &[u8]) -> CodecResult<Value> {
    if buf.len() != OUT_POINT_SIZE {
        return Err(CodecError::SizeMismatch { declared: OUT_POINT_SIZE, actual: buf.len() });
    }
    let tx_hash = buf[0..32].to_vec();
    let index = u32::from_le_bytes(buf[32..36].try_into().unwrap());
    Ok(Value::out_point(Value::bytes(tx_hash), Value::uint64(index as u64)))
}

// ---------------------------------------------------------------------
// cell_input := [out_point, uint64 since]
// wire order is since||out_point, matching the source chain's struct layout
// ---------------------------------------------------------------------

pub fn serialize_cell_input(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::CellInput)?;
    require_children(v, 2)?;
    let since = require_u64(&v.children[1])?;
    let out_point = serialize_out_point(&v.children[0])?;
    let mut out = Vec::with_capacity(CELL_INPUT_SIZE);
    out.extend_from_slice(&since.to_le_bytes());
    out.extend_from_slice(&out_point);
    Ok(out)
}

pub fn restore_cell_input(buf: &[u8]) -> CodecResult<Value> {
    if buf.len() != CELL_INPUT_SIZE {
        return Err(CodecError::SizeMismatch { declared: CELL_INPUT_SIZE, actual: buf.len() });
    }
    let since = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let out_point = restore_out_point(&buf[8..44])?;
    Ok(Value::cell_input(out_point, Value::uint64(since)))
}

// ---------------------------------------------------------------------
// cell_dep := [out_point, uint64 dep_type∈{0,1}]
// ---------------------------------------------------------------------

pub fn serialize_cell_dep(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::CellDep)?;
    require_children(v, 2)?;
    let dep_type = require_u64(&v.children[1])?;
    if dep_type > 1 {
        return Err(CodecError::InvalidDepType(dep_type as u8));
    }
    let out_point = serialize_out_point(&v.children[0])?;
    let mut out = Vec::with_capacity(CELL_DEP_SIZE);
    out.extend_from_slice(&out_point);
    out.push(dep_type as u8);
    Ok(out)
}

pub fn restore_cell_dep(buf: &[u8]) -> CodecResult<Value> {
    if buf.len() != CELL_DEP_SIZE {
        return Err(CodecError::SizeMismatch { declared: CELL_DEP_SIZE, actual: buf.len() });
    }
    let out_point = restore_out_point(&buf[0..36])?;
    let dep_type = buf[36];
    if dep_type > 1 {
        return Err(CodecError::InvalidDepType(dep_type));
    }
    Ok(Value::cell_dep(out_point, Value::uint64(dep_type as u64)))
}

// ---------------------------------------------------------------------
// script := [bytes code_hash(32), uint64 hash_type∈{0,1}, bytes args]
// ---------------------------------------------------------------------

pub fn serialize_script(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::Script)?;
    require_children(v, 3)?;
    let code_hash = require_hash(&v.children[0])?;
    let hash_type = require_u64(&v.children[1])?;
    if hash_type > 1 {
        return Err(CodecError::InvalidHashType(hash_type as u8));
    }
    let args = require_bytes(&v.children[2])?;
    Ok(encode_table(&[
        code_hash.to_vec(),
        vec![hash_type as u8],
        encode_fixvec_bytes(args),
    ]))
}

pub fn restore_script(buf: &[u8]) -> CodecResult<Value> {
    let fields = decode_table(buf)?;
    if fields.len() != 3 {
        return Err(CodecError::Malformed("script table must have 3 fields".into()));
    }
    if fields[0].len() != HASH_SIZE {
        return Err(CodecError::SizeMismatch { declared: HASH_SIZE, actual: fields[0].len() });
    }
    if fields[1].len() != 1 {
        return Err(CodecError::Malformed("hash_type must be 1 byte".into()));
    }
    let hash_type = fields[1][0];
    if hash_type > 1 {
        return Err(CodecError::InvalidHashType(hash_type));
    }
    let args = decode_fixvec_bytes(&fields[2])?;
    Ok(Value::script(
        Value::bytes(fields[0].clone()),
        Value::uint64(hash_type as u64),
        Value::bytes(args),
    ))
}

// ---------------------------------------------------------------------
// cell := [capacity, lock, type?, data, out_point?, header?]
// only the first four fields are part of the canonical wire encoding;
// out_point/header are evaluation-time augmentations, not core bytes.
// ---------------------------------------------------------------------

pub fn serialize_cell_core(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::Cell)?;
    if v.children.len() != 4 && v.children.len() != 6 {
        return Err(CodecError::Malformed(format!(
            "cell must have 4 or 6 children, got {}",
            v.children.len()
        )));
    }
    let capacity = require_u64(&v.children[0])?;
    let lock = serialize_script(&v.children[1])?;
    let type_bytes = if v.children[2].is_nil() {
        Vec::new()
    } else {
        serialize_script(&v.children[2])?
    };
    let data = require_bytes(&v.children[3])?;
    Ok(encode_table(&[
        capacity.to_le_bytes().to_vec(),
        lock,
        type_bytes,
        encode_fixvec_bytes(data),
    ]))
}

pub fn restore_cell_core(buf: &[u8]) -> CodecResult<Value> {
    let fields = decode_table(buf)?;
    if fields.len() != 4 {
        return Err(CodecError::Malformed("cell table must have 4 fields".into()));
    }
    if fields[0].len() != 8 {
        return Err(CodecError::Malformed("capacity must be 8 bytes".into()));
    }
    let capacity = u64::from_le_bytes(fields[0].clone().try_into().unwrap());
    let lock = restore_script(&fields[1])?;
    let type_ = if fields[2].is_empty() {
        Value::nil()
    } else {
        restore_script(&fields[2])?
    };
    let data = decode_fixvec_bytes(&fields[3])?;
    Ok(Value::cell(Value::uint64(capacity), lock, type_, Value::bytes(data), vec![]))
}

// ---------------------------------------------------------------------
// transaction := [list cell_input, list cell, list cell_dep]
// ---------------------------------------------------------------------

pub fn serialize_transaction(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::Transaction)?;
    require_children(v, 3)?;
    let inputs = require_list(&v.children[0])?;
    let outputs = require_list(&v.children[1])?;
    let deps = require_list(&v.children[2])?;

    let input_items: Vec<Vec<u8>> =
        inputs.iter().map(serialize_cell_input).collect::<CodecResult<_>>()?;
    let output_items: Vec<Vec<u8>> =
        outputs.iter().map(serialize_cell_core).collect::<CodecResult<_>>()?;
    let dep_items: Vec<Vec<u8>> =
        deps.iter().map(serialize_cell_dep).collect::<CodecResult<_>>()?;

    Ok(encode_table(&[
        encode_fixvec_items(&input_items),
        encode_table(&output_items),
        encode_fixvec_items(&dep_items),
    ]))
}

pub fn restore_transaction(buf: &[u8]) -> CodecResult<Value> {
    let fields = decode_table(buf)?;
    if fields.len() != 3 {
        return Err(CodecError::Malformed("transaction table must have 3 fields".into()));
    }
    let inputs = decode_fixvec_items(&fields[0], CELL_INPUT_SIZE)?
        .iter()
        .map(|b| restore_cell_input(b))
        .collect::<CodecResult<Vec<_>>>()?;
    let outputs = decode_table(&fields[1])?
        .iter()
        .map(|b| restore_cell_core(b))
        .collect::<CodecResult<Vec<_>>>()?;
    let deps = decode_fixvec_items(&fields[2], CELL_DEP_SIZE)?
        .iter()
        .map(|b| restore_cell_dep(b))
        .collect::<CodecResult<Vec<_>>>()?;
    Ok(Value::transaction(Value::list(inputs), Value::list(outputs), Value::list(deps)))
}

// ---------------------------------------------------------------------
// header := 10 fixed fields, fixed-size struct (no table header needed)
// ---------------------------------------------------------------------

pub fn serialize_header(v: &Value) -> CodecResult<Vec<u8>> {
    require_type(v, ValueType::Header)?;
    require_children(v, 10)?;
    let compact_target = require_u32(&v.children[0])?;
    let timestamp = require_u64(&v.children[1])?;
    let number = require_u64(&v.children[2])?;
    let epoch = require_u64(&v.children[3])?;
    let parent_hash = require_hash(&v.children[4])?;
    let transactions_root = require_hash(&v.children[5])?;
    let proposals_hash = require_hash(&v.children[6])?;
    let uncles_hash = require_hash(&v.children[7])?;
    let dao = require_hash(&v.children[8])?;
    let nonce = require_u128(&v.children[9])?;

    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(&compact_target.to_le_bytes());
    out.extend_from_slice(&timestamp.to_le_bytes());
    out.extend_from_slice(&number.to_le_bytes());
    out.extend_from_slice(&epoch.to_le_bytes());
    out.extend_from_slice(&parent_hash);
    out.extend_from_slice(&transactions_root);
    out.extend_from_slice(&proposals_hash);
    out.extend_from_slice(&uncles_hash);
    out.extend_from_slice(&dao);
    out.extend_from_slice(&nonce.to_le_bytes());
    Ok(out)
}

pub fn restore_header(buf: &[u8]) -> CodecResult<Value> {
    if buf.len() != HEADER_SIZE {
        return Err(CodecError::SizeMismatch { declared: HEADER_SIZE, actual: buf.len() });
    }
    let compact_target = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let timestamp = u64::from_le_bytes(buf[4..12].try_into().unwrap());
    let number = u64::from_le_bytes(buf[12..20].try_into().unwrap());
    let epoch = u64::from_le_bytes(buf[20..28].try_into().unwrap());
    let parent_hash = buf[28..60].to_vec();
    let transactions_root = buf[60..92].to_vec();
    let proposals_hash = buf[92..124].to_vec();
    let uncles_hash = buf[124..156].to_vec();
    let dao = buf[156..188].to_vec();
    let nonce = u128::from_le_bytes(buf[188..204].try_into().unwrap());

    Ok(Value::header([
        Value::uint64(compact_target as u64),
        Value::uint64(timestamp),
        Value::uint64(number),
        Value::uint64(epoch),
        Value::bytes(parent_hash),
        Value::bytes(transactions_root),
        Value::bytes(proposals_hash),
        Value::bytes(uncles_hash),
        Value::bytes(dao),
        // nonce only needs its low/high 64 bits to round-trip; represented
        // here as its little-endian byte string so it fits the `bytes`
        // primitive like every other 32/16-byte field.
        Value::bytes(nonce.to_le_bytes().to_vec()),
    ]))
}

// ---------------------------------------------------------------------
// dispatch + restore helpers used by hash()/serialize_to_core()
// ---------------------------------------------------------------------

pub fn serialize_to_core(v: &Value) -> CodecResult<Vec<u8>> {
    match v.ty {
        ValueType::Script => serialize_script(v),
        ValueType::Header => serialize_header(v),
        ValueType::Transaction => serialize_transaction(v),
        other => Err(CodecError::UnsupportedType(other)),
    }
}

// ---------------------------------------------------------------------
// shared field accessors
// ---------------------------------------------------------------------

fn require_type(v: &Value, ty: ValueType) -> CodecResult<()> {
    if v.ty != ty {
        return Err(CodecError::Malformed(format!("expected {:?}, got {:?}", ty, v.ty)));
    }
    Ok(())
}

fn require_children(v: &Value, n: usize) -> CodecResult<()> {
    if v.children.len() != n {
        return Err(CodecError::Malformed(format!(
            "{:?} expects {} children, got {}",
            v.ty,
            n,
            v.children.len()
        )));
    }
    Ok(())
}

fn require_hash(v: &Value) -> CodecResult<[u8; HASH_SIZE]> {
    let bytes = require_bytes(v)?;
    bytes
        .try_into()
        .map_err(|_| CodecError::Malformed("expected a 32-byte hash".into()))
}

fn require_bytes(v: &Value) -> CodecResult<&[u8]> {
    v.as_bytes().ok_or_else(|| CodecError::Malformed("expected bytes payload".into()))
}

fn require_u64(v: &Value) -> CodecResult<u64> {
    v.as_uint64().ok_or_else(|| CodecError::Malformed("expected uint64 payload".into()))
}

fn require_u32(v: &Value) -> CodecResult<u32> {
    let u = require_u64(v)?;
    u32::try_from(u).map_err(|_| CodecError::Malformed("index exceeds u32 range".into()))
}

fn require_u128(v: &Value) -> CodecResult<u128> {
    // nonce is carried as little-endian bytes once restored, or as a plain
    // uint64 when constructed by a test/builder.
    if let Some(bytes) = v.as_bytes() {
        let mut buf = [0u8; 16];
        if bytes.len() > 16 {
            return Err(CodecError::Malformed("nonce exceeds 128 bits".into()));
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(u128::from_le_bytes(buf))
    } else {
        Ok(require_u64(v)? as u128)
    }
}

fn require_list(v: &Value) -> CodecResult<&[Value]> {
    if v.ty != ValueType::List {
        return Err(CodecError::Malformed(format!("expected list, got {:?}", v.ty)));
    }
    Ok(&v.children)
}
