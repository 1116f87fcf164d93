//! The per-block revert log: gzip-compressed JSON of the entries needed to
//! undo a block's indexing and replay its streams' compensating publishes.
//!
//! `Command` alone cannot carry a stream revert-publish (it has no channel
//! to send on), so the log is a list of [`RevertEntry`], not bare
//! `Command`s. Mirrors `causality-engine`'s `log::performance::compression`
//! module (`GzEncoder`/`GzDecoder` over serialized bytes), using JSON
//! rather than `bincode` since the on-disk entries are meant to stay
//! human-inspectable.

use crate::error::{FatalError, IndexerResult};
use animagus_store::Command;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// One step of undoing a block: either a store mutation, or a stream
/// publish that must be re-emitted (with the direction/role already
/// reversed at evaluation time) to tell subscribers the original event
/// no longer holds.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RevertEntry {
    Store(Command),
    Publish { channel: String, payload: Vec<u8> },
}

pub fn compress(entries: &[RevertEntry]) -> Vec<u8> {
    let json = serde_json::to_vec(entries).expect("RevertEntry is always JSON-serializable");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).expect("in-memory gzip write cannot fail");
    encoder.finish().expect("in-memory gzip finish cannot fail")
}

pub fn decompress(height: u64, compressed: &[u8]) -> IndexerResult<Vec<RevertEntry>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json).map_err(|e| FatalError::CorruptRevertLog {
        height,
        reason: format!("gzip decode failed: {e}"),
    })?;
    serde_json::from_slice(&json).map_err(|e| {
        FatalError::CorruptRevertLog { height, reason: format!("json decode failed: {e}") }.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_compression() {
        let entries = vec![
            RevertEntry::Store(Command::Set { key: b"a".to_vec(), value: b"1".to_vec() }),
            RevertEntry::Store(Command::SAdd { key: b"idx".to_vec(), member: b"o1".to_vec() }),
            RevertEntry::Publish { channel: "STREAM:deposits".into(), payload: b"payload".to_vec() },
        ];
        let compressed = compress(&entries);
        let restored = decompress(0, &compressed).unwrap();
        assert_eq!(restored, entries);
    }

    #[test]
    fn rejects_corrupt_bytes() {
        let err = decompress(3, b"not gzip").unwrap_err();
        assert!(matches!(
            err,
            crate::error::IndexerError::Fatal(FatalError::CorruptRevertLog { height: 3, .. })
        ));
    }
}
