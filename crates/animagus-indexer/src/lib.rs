//! The reorg-safe chain indexer.
//!
//! Walks the chain tip-following: fetch the next block, compare its parent
//! hash against the last indexed header, and either index it (parent
//! matches), revert the last one (it doesn't — a fork), or wait (there is
//! no next block yet). Every block's forward mutations and their exact
//! inverse are committed as one atomic `Store::commit`, so a crash between
//! blocks never leaves the index half-applied.

pub mod environment;
pub mod error;
pub mod keys;
pub mod revert;
pub mod stream_codec;

pub use environment::{Direction, IndexingEnvironment, Role, StreamEnvironment};
pub use error::{FatalError, IndexerError, IndexerResult, TransientError};
pub use revert::RevertEntry;

use animagus_context::ValueContext;
use animagus_evaluator::eval;
use animagus_rpc::{resolve_input_cell, Block, ChainRpc};
use animagus_store::{Command, Store};
use animagus_types::{Root, Value};
use std::sync::Arc;
use std::time::Duration;

/// How long to sleep after observing that the chain tip has not advanced
/// past the last indexed block.
const ABSENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded backoff applied to a transient RPC error before it is promoted
/// to fatal: three retries, waiting longer each time.
const RPC_BACKOFF_MS: [u64; 3] = [100, 400, 1600];

/// A fixed tag mixed into the bundle hash so a bundle format change (not
/// just a content change) also invalidates an existing store.
const BUNDLE_HASH_VERSION_TAG: &[u8] = b"animagus-bundle-v1";

/// The content hash an indexer's `AST_HASH` startup check compares
/// against: Blake2b of the bundle's bytes, with a version tag mixed in so
/// a wire-format change also invalidates a store built under the old one.
pub fn bundle_hash(bundle_bytes: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(bundle_bytes.len() + BUNDLE_HASH_VERSION_TAG.len());
    buf.extend_from_slice(bundle_bytes);
    buf.extend_from_slice(BUNDLE_HASH_VERSION_TAG);
    animagus_types::hash::blake2b_256(&buf)
}

fn ensure_integrity(store: &dyn Store, bundle_bytes: &[u8]) -> IndexerResult<()> {
    let computed = bundle_hash(bundle_bytes);
    match store.get(keys::AST_HASH).map_err(FatalError::Store)? {
        None => {
            store.set(keys::AST_HASH, &computed).map_err(FatalError::Store)?;
            Ok(())
        }
        Some(stored) if stored == computed => Ok(()),
        Some(stored) => Err(FatalError::AstHashMismatch {
            bundle_hash: hex::encode(computed),
            stored_hash: hex::encode(stored),
        }
        .into()),
    }
}

/// One outcome of polling the chain for the next block.
enum Poll {
    /// The node has no block past our last indexed one yet.
    Absent,
    /// The fetched block's parent matches our last indexed header.
    Match(Block),
    /// The fetched block's parent does not match — the tip we last indexed
    /// was forked out. `u64` is the height to revert.
    Fork(u64),
}

pub struct Indexer {
    store: Arc<dyn Store>,
    rpc: Arc<dyn ChainRpc>,
    root: Root,
    call_contexts: Vec<ValueContext>,
}

impl Indexer {
    /// Build an indexer over `root` (already verified by the caller),
    /// checking `bundle_bytes`' content hash against the store's recorded
    /// `AST_HASH` — binding a fresh store to this bundle on first run, and
    /// refusing to run a different bundle against an existing store.
    pub fn new(
        bundle_bytes: &[u8],
        root: Root,
        store: Arc<dyn Store>,
        rpc: Arc<dyn ChainRpc>,
    ) -> IndexerResult<Self> {
        ensure_integrity(store.as_ref(), bundle_bytes)?;
        let call_contexts =
            root.calls.iter().map(|call| ValueContext::new(call.name.clone(), &call.expr)).collect();
        Ok(Self { store, rpc, root, call_contexts })
    }

    /// Run the indexer forever, stepping the state machine until a fatal
    /// error surfaces. Transient RPC errors are already retried with
    /// bounded backoff inside `step`; one reaching here has exhausted that
    /// backoff and is promoted to fatal by the caller's convention.
    pub async fn run(&self) -> IndexerResult<()> {
        loop {
            self.step().await?;
        }
    }

    /// Advance the state machine by one step: poll, then index, revert, or
    /// sleep depending on what came back.
    pub async fn step(&self) -> IndexerResult<()> {
        let last = self.read_last_block()?;
        let next_height = last.as_ref().map(|(h, _)| h + 1).unwrap_or(0);

        match self.poll(next_height, last.as_ref()).await? {
            Poll::Absent => {
                tracing::debug!(height = next_height, "chain tip not yet advanced, sleeping");
                tokio::time::sleep(ABSENT_POLL_INTERVAL).await;
                Ok(())
            }
            Poll::Match(block) => {
                tracing::info!(height = next_height, "indexing block");
                self.index_block(next_height, &block).await
            }
            Poll::Fork(revert_height) => {
                tracing::warn!(height = revert_height, "fork detected, reverting");
                self.revert_block(revert_height)
            }
        }
    }

    async fn poll(&self, next_height: u64, last: Option<&(u64, Vec<u8>)>) -> IndexerResult<Poll> {
        let fetched = self.fetch_with_retry(next_height).await?;
        let Some(block) = fetched else {
            return Ok(Poll::Absent);
        };
        match last {
            None => Ok(Poll::Match(block)),
            Some((last_height, last_hash)) => {
                // `ValueType::HEADER_FIELDS` fixes `parent_hash` at index 4.
                let parent_hash =
                    block.header.children[4].as_bytes().expect("header parent_hash is bytes").to_vec();
                if &parent_hash == last_hash {
                    Ok(Poll::Match(block))
                } else {
                    Ok(Poll::Fork(*last_height))
                }
            }
        }
    }

    async fn fetch_with_retry(&self, height: u64) -> IndexerResult<Option<Block>> {
        let mut attempt = 0usize;
        loop {
            match self.rpc.get_block_by_number(height).await {
                Ok(block) => return Ok(block),
                Err(rpc_err) if attempt < RPC_BACKOFF_MS.len() => {
                    tracing::warn!(
                        attempt,
                        height,
                        error = %rpc_err,
                        "transient rpc error fetching block, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(RPC_BACKOFF_MS[attempt])).await;
                    attempt += 1;
                }
                Err(rpc_err) => return Err(TransientError::Rpc(rpc_err).into()),
            }
        }
    }

    fn read_last_block(&self) -> IndexerResult<Option<(u64, Vec<u8>)>> {
        match self.store.get(keys::LAST_BLOCK).map_err(FatalError::Store)? {
            None => Ok(None),
            Some(raw) => keys::decode_last_block(&raw)
                .map(Some)
                .ok_or_else(|| FatalError::MalformedLastBlock(hex::encode(&raw)).into()),
        }
    }

    /// Index one block: evaluate every call's indexed queries and every
    /// stream's filter against each touched cell (consumed inputs, then
    /// produced outputs, in transaction order), commit the forward
    /// mutations and head pointer atomically, then publish the stream
    /// results that came out non-nil.
    async fn index_block(&self, height: u64, block: &Block) -> IndexerResult<()> {
        let mut forward = Vec::new();
        let mut revert_entries = Vec::new();
        let mut publishes: Vec<(String, Vec<u8>)> = Vec::new();
        let mut stream_reverts: Vec<(String, Vec<u8>)> = Vec::new();

        for tx in &block.transactions {
            for input in &tx.inputs {
                let cell = resolve_input_cell(self.rpc.as_ref(), input)
                    .await
                    .map_err(TransientError::Rpc)?;
                self.process_cell(
                    &cell,
                    Direction::Remove,
                    &mut forward,
                    &mut revert_entries,
                    &mut publishes,
                    &mut stream_reverts,
                )?;
            }
            for cell in &tx.outputs {
                self.process_cell(
                    cell,
                    Direction::Insert,
                    &mut forward,
                    &mut revert_entries,
                    &mut publishes,
                    &mut stream_reverts,
                )?;
            }
        }

        let previous = self.read_last_block()?;
        forward.push(Command::Set {
            key: keys::block_hash_key(height),
            value: block.header_hash.clone(),
        });
        forward.push(Command::Set {
            key: keys::LAST_BLOCK.to_vec(),
            value: keys::encode_last_block(height, &block.header_hash),
        });
        revert_entries.push(RevertEntry::Store(Command::Del { key: keys::block_hash_key(height) }));
        revert_entries.push(RevertEntry::Store(match previous {
            Some((prev_height, prev_hash)) => {
                Command::Set { key: keys::LAST_BLOCK.to_vec(), value: keys::encode_last_block(prev_height, &prev_hash) }
            }
            None => Command::Del { key: keys::LAST_BLOCK.to_vec() },
        }));

        // The store inverses were accumulated in forward emission order
        // (per-cell mutations, then the head-pointer update); applying
        // forward commands then revert commands must be the identity even
        // when two forward commands touch the same index key (insert then
        // later remove within one block), so the revert must replay in the
        // exact reverse of emission order.
        revert_entries.reverse();

        // The stream-revert publishes are appended in reverse emission
        // order, so replaying the log front-to-back unwinds the block's
        // streamed events in the opposite order they were emitted.
        stream_reverts.reverse();
        revert_entries
            .extend(stream_reverts.into_iter().map(|(channel, payload)| RevertEntry::Publish { channel, payload }));

        let compressed = revert::compress(&revert_entries);
        forward.push(Command::Set { key: keys::revert_commands_key(height), value: compressed });

        self.store.commit(&forward).map_err(FatalError::Store)?;

        for (channel, payload) in publishes {
            self.store.publish(&channel, &payload);
        }
        Ok(())
    }

    /// Evaluate every index query and every stream filter for a single
    /// cell crossing the chain (inserted or removed), pushing the forward
    /// mutations, their inverse, and any stream publishes into the
    /// caller's accumulators.
    fn process_cell(
        &self,
        cell: &Value,
        direction: Direction,
        forward: &mut Vec<Command>,
        revert_entries: &mut Vec<RevertEntry>,
        publishes: &mut Vec<(String, Vec<u8>)>,
        stream_reverts: &mut Vec<(String, Vec<u8>)>,
    ) -> IndexerResult<()> {
        let member = cell_member(cell)?;

        for context in &self.call_contexts {
            for (ordinal, entry) in context.queries.iter().enumerate() {
                let filter = &entry.query.children[0];
                let mut env = IndexingEnvironment::new(cell.clone());
                let matched = eval(filter, &mut env).map_err(FatalError::Evaluation)?;
                if matched.as_bool() != Some(true) {
                    continue;
                }
                let key = context.index_key(ordinal, &env.into_bound()).map_err(FatalError::Context)?;
                let key_bytes = key.into_bytes();
                match direction {
                    Direction::Insert => {
                        forward.push(Command::SAdd { key: key_bytes.clone(), member: member.clone() });
                        revert_entries.push(RevertEntry::Store(Command::SRem { key: key_bytes, member: member.clone() }));
                    }
                    Direction::Remove => {
                        forward.push(Command::SRem { key: key_bytes.clone(), member: member.clone() });
                        revert_entries.push(RevertEntry::Store(Command::SAdd { key: key_bytes, member: member.clone() }));
                    }
                }
            }
        }

        for stream in &self.root.streams {
            let channel = keys::stream_channel(&stream.name);

            let mut forward_env = StreamEnvironment::new(cell.clone(), direction, Role::Index);
            let forward_value = eval(&stream.expr, &mut forward_env).map_err(FatalError::Evaluation)?;
            if !forward_value.is_nil() {
                publishes.push((channel.clone(), stream_codec::encode(&forward_value).map_err(FatalError::StreamEncode)?));
            }

            let mut revert_env = StreamEnvironment::new(cell.clone(), direction.reverse(), Role::Revert);
            let revert_value = eval(&stream.expr, &mut revert_env).map_err(FatalError::Evaluation)?;
            if !revert_value.is_nil() {
                stream_reverts.push((channel, stream_codec::encode(&revert_value).map_err(FatalError::StreamEncode)?));
            }
        }

        Ok(())
    }

    /// Undo the last indexed block: apply its recorded inverse commands
    /// (restoring both the index state and the head pointer) in one atomic
    /// batch, then replay its stream-revert publishes.
    fn revert_block(&self, height: u64) -> IndexerResult<()> {
        let raw = self
            .store
            .get(&keys::revert_commands_key(height))
            .map_err(FatalError::Store)?
            .ok_or_else(|| FatalError::CorruptRevertLog { height, reason: "missing revert log".into() })?;
        let entries = revert::decompress(height, &raw)?;

        let mut commands = Vec::with_capacity(entries.len() + 1);
        let mut publishes = Vec::new();
        for entry in entries {
            match entry {
                RevertEntry::Store(command) => commands.push(command),
                RevertEntry::Publish { channel, payload } => publishes.push((channel, payload)),
            }
        }
        commands.push(Command::Del { key: keys::revert_commands_key(height) });

        self.store.commit(&commands).map_err(FatalError::Store)?;

        for (channel, payload) in publishes {
            self.store.publish(&channel, &payload);
        }
        Ok(())
    }
}

/// Extract a cell's `out_point` and serialize it as the set-membership
/// token recorded against an index key. Every cell the indexer ever
/// processes (block outputs, resolved inputs) carries the augmented
/// 6-field shape.
fn cell_member(cell: &Value) -> IndexerResult<Vec<u8>> {
    let out_point = cell
        .children
        .get(4)
        .ok_or_else(|| FatalError::MalformedCell("cell missing out_point".into()))?;
    animagus_types::codec::serialize_out_point(out_point)
        .map_err(|e| FatalError::MalformedCell(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_rpc::{augment_cell, BlockTransaction, MockChainRpc};
    use animagus_store::MemoryStore;
    use animagus_types::value::helpers;
    use animagus_types::{NamedExpr, ValueType};

    fn header(number: u64, parent_hash: Vec<u8>) -> Value {
        Value::header([
            Value::uint64(0),
            Value::uint64(1_600_000_000 + number),
            Value::uint64(number),
            Value::uint64(0),
            Value::bytes(parent_hash),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 32]),
            Value::bytes(vec![0u8; 12]),
        ])
    }

    fn lock_script(args: Vec<u8>) -> Value {
        Value::script(Value::bytes(vec![0xAAu8; 32]), Value::uint64(1), Value::bytes(args))
    }

    fn core_cell(capacity: u64, lock_args: Vec<u8>) -> Value {
        Value::cell(Value::uint64(capacity), lock_script(lock_args), Value::nil(), Value::bytes(vec![]), vec![])
    }

    /// `get_cell`: `query_cells(equal(get_lock(get_args(arg(0))), param(0)))`.
    fn get_cell_call() -> NamedExpr {
        let filter = helpers::equal(
            helpers::get(ValueType::GetArgs, helpers::get(ValueType::GetLock, Value::arg(0))),
            Value::param(0),
        );
        NamedExpr { name: "get_cell".into(), expr: Value::query_cells(filter) }
    }

    /// `deposits`: publish `cell.out_point` on insert-side indexing only.
    fn deposits_stream() -> NamedExpr {
        let is_insert_index = helpers::and(vec![
            helpers::equal(Value::arg(1), Value::bytes(b"insert".to_vec())),
            helpers::equal(Value::arg(2), Value::bytes(b"index".to_vec())),
        ]);
        let expr = Value::op(
            ValueType::Cond,
            vec![is_insert_index, helpers::get(ValueType::GetOutPoint, Value::arg(0)), Value::nil()],
        );
        NamedExpr { name: "deposits".into(), expr }
    }

    fn root_with(call: NamedExpr, stream: NamedExpr) -> Root {
        Root { calls: vec![call], streams: vec![stream] }
    }

    fn sample_block(number: u64, parent_hash: Vec<u8>, lock_args: Vec<u8>) -> (Block, Vec<u8>) {
        let header = header(number, parent_hash);
        let header_hash = vec![number as u8 + 1; 32];
        let tx_hash = vec![number as u8 + 50; 32];
        let out_point = Value::out_point(Value::bytes(tx_hash.clone()), Value::uint64(0));
        let output = augment_cell(&core_cell(1000, lock_args), out_point, header.clone());
        let block = Block {
            header,
            header_hash: header_hash.clone(),
            transactions: vec![BlockTransaction {
                hash: tx_hash,
                inputs: vec![],
                outputs: vec![output],
                deps: vec![],
            }],
        };
        (block, header_hash)
    }

    #[tokio::test]
    async fn indexes_genesis_block_and_records_head() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let rpc_impl = MockChainRpc::new();
        let (block, header_hash) = sample_block(0, vec![0u8; 32], vec![1, 2, 3]);
        rpc_impl.push_block(0, block);
        let rpc: Arc<dyn ChainRpc> = Arc::new(rpc_impl);

        let root = root_with(get_cell_call(), deposits_stream());
        let bundle_bytes = b"bundle-bytes".to_vec();
        let indexer = Indexer::new(&bundle_bytes, root, store.clone(), rpc).unwrap();

        indexer.step().await.unwrap();

        let last = store.get(keys::LAST_BLOCK).unwrap().unwrap();
        let (height, hash) = keys::decode_last_block(&last).unwrap();
        assert_eq!(height, 0);
        assert_eq!(hash, header_hash);

        let ctx = ValueContext::new("get_cell", &root_with(get_cell_call(), deposits_stream()).calls[0].expr);
        let mut params = std::collections::BTreeMap::new();
        params.insert(0, Value::bytes(vec![1, 2, 3]));
        let key = ctx.index_key(0, &params).unwrap();
        let members = store.smembers(key.as_bytes()).unwrap();
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn sleeps_when_chain_tip_has_not_advanced() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let rpc: Arc<dyn ChainRpc> = Arc::new(MockChainRpc::new());
        let root = root_with(get_cell_call(), deposits_stream());
        let indexer = Indexer::new(b"bundle", root, store.clone(), rpc).unwrap();

        let started = tokio::time::Instant::now();
        tokio::time::pause();
        indexer.step().await.unwrap();
        assert!(tokio::time::Instant::now() >= started + ABSENT_POLL_INTERVAL);
        assert!(store.get(keys::LAST_BLOCK).unwrap().is_none());
    }

    #[tokio::test]
    async fn fork_reverts_the_previously_indexed_block() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let rpc_impl = MockChainRpc::new();
        let (genesis, genesis_hash) = sample_block(0, vec![0u8; 32], vec![9]);
        rpc_impl.push_block(0, genesis);
        let rpc: Arc<dyn ChainRpc> = Arc::new(rpc_impl);

        let root = root_with(get_cell_call(), deposits_stream());
        let bundle_bytes = b"bundle".to_vec();
        let indexer = Indexer::new(&bundle_bytes, root, store.clone(), rpc).unwrap();
        indexer.step().await.unwrap();
        assert!(store.get(keys::LAST_BLOCK).unwrap().is_some());

        // Force a fork: the state machine reverts block 0 directly.
        indexer.revert_block(0).unwrap();
        assert!(store.get(keys::LAST_BLOCK).unwrap().is_none());
        assert!(store.get(&keys::block_hash_key(0)).unwrap().is_none());
        let _ = genesis_hash;
    }

    #[test]
    fn bundle_hash_is_deterministic_and_content_sensitive() {
        let a = bundle_hash(b"bundle-a");
        let b = bundle_hash(b"bundle-a");
        let c = bundle_hash(b"bundle-b");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn integrity_check_binds_fresh_store_then_rejects_mismatch() {
        let store = MemoryStore::new();
        ensure_integrity(&store, b"bundle-a").unwrap();
        assert!(ensure_integrity(&store, b"bundle-a").is_ok());
        let err = ensure_integrity(&store, b"bundle-b").unwrap_err();
        assert!(matches!(err, IndexerError::Fatal(FatalError::AstHashMismatch { .. })));
    }
}
