//! The persistence seam the indexer and service binding run on top of:
//! plain key/value storage, unordered string sets (used for index
//! membership), and publish/subscribe (used for streaming).
//!
//! Two implementations are provided — an in-memory one for tests and a
//! RocksDB-backed one for production — mirroring the `causality-storage`
//! crate's `Database` trait split into `MemoryDb`/`RocksDb`.

pub mod error;
pub mod memory;
pub mod pubsub;
pub mod rocks;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pubsub::Subscription;
pub use rocks::RocksStore;

/// One mutation in an atomic batch. The indexer commits a whole block's
/// worth of these (forward index mutations plus head-pointer updates) as a
/// single unit; a revert replays the inverse batch. Derives
/// `Serialize`/`Deserialize` so the indexer's gzip-compressed JSON revert
/// log can carry these directly.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Command {
    Set { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
    SAdd { key: Vec<u8>, member: Vec<u8> },
    SRem { key: Vec<u8>, member: Vec<u8> },
}

pub trait Store: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;
    fn del(&self, key: &[u8]) -> StoreResult<()>;

    fn sadd(&self, key: &[u8], member: &[u8]) -> StoreResult<()>;
    fn srem(&self, key: &[u8], member: &[u8]) -> StoreResult<()>;
    fn smembers(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>>;

    /// Apply every command in `commands` as a single atomic unit.
    fn commit(&self, commands: &[Command]) -> StoreResult<()>;

    fn publish(&self, channel: &str, payload: &[u8]);
    fn subscribe(&self, channel: &str) -> Subscription;
}
