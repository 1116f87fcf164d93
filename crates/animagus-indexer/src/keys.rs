//! Well-known store keys.

pub const AST_HASH: &[u8] = b"AST_HASH";
pub const LAST_BLOCK: &[u8] = b"LAST_BLOCK";

pub fn block_hash_key(height: u64) -> Vec<u8> {
    format!("BLOCK:{height}:HASH").into_bytes()
}

pub fn revert_commands_key(height: u64) -> Vec<u8> {
    format!("BLOCK:{height}:REVERT_COMMANDS").into_bytes()
}

pub fn stream_channel(name: &str) -> String {
    format!("STREAM:{name}")
}

/// Encode the `LAST_BLOCK` value: `u64 little-endian || 32-byte block hash`.
pub fn encode_last_block(height: u64, header_hash: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + header_hash.len());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(header_hash);
    out
}

/// Decode a `LAST_BLOCK` value back into `(height, header_hash)`.
pub fn decode_last_block(raw: &[u8]) -> Option<(u64, Vec<u8>)> {
    if raw.len() < 8 {
        return None;
    }
    let (height_bytes, hash) = raw.split_at(8);
    let height = u64::from_le_bytes(height_bytes.try_into().ok()?);
    Some((height, hash.to_vec()))
}
