//! RocksDB-backed `Store`.
//!
//! RocksDB itself only has plain key/value and a native `WriteBatch`; the
//! set-membership and pub/sub operations the `Store` trait needs are built
//! on top of it, mirroring `causality-db::rocks::RocksDb`'s
//! "wrap `rocksdb::DB`, translate errors" shape. Set membership is encoded
//! as individual keys `SET_MEMBER_PREFIX || key || 0x00 || member` with an
//! empty value, so `smembers` is a prefix scan rather than a second column
//! family — the simplest representation that still makes every member
//! independently add/removable via a plain `WriteBatch` entry.

use crate::pubsub::PubSubRegistry;
use crate::{Command, Store, StoreError, StoreResult, Subscription};
use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;

const SET_MEMBER_PREFIX: &[u8] = b"\x01";
const SEP: u8 = 0x00;

pub struct RocksStore {
    db: DB,
    pubsub: PubSubRegistry,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path.as_ref()).map_err(|source| StoreError::Open {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Ok(Self { db, pubsub: PubSubRegistry::new() })
    }

    fn member_key(key: &[u8], member: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(SET_MEMBER_PREFIX.len() + key.len() + 1 + member.len());
        out.extend_from_slice(SET_MEMBER_PREFIX);
        out.extend_from_slice(key);
        out.push(SEP);
        out.extend_from_slice(member);
        out
    }

    fn member_prefix(key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(SET_MEMBER_PREFIX.len() + key.len() + 1);
        out.extend_from_slice(SET_MEMBER_PREFIX);
        out.extend_from_slice(key);
        out.push(SEP);
        out
    }
}

impl Store for RocksStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.db.get(key).map_err(StoreError::Read)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.db.put(key, value).map_err(StoreError::Write)
    }

    fn del(&self, key: &[u8]) -> StoreResult<()> {
        self.db.delete(key).map_err(StoreError::Write)
    }

    fn sadd(&self, key: &[u8], member: &[u8]) -> StoreResult<()> {
        self.db.put(Self::member_key(key, member), []).map_err(StoreError::Write)
    }

    fn srem(&self, key: &[u8], member: &[u8]) -> StoreResult<()> {
        self.db.delete(Self::member_key(key, member)).map_err(StoreError::Write)
    }

    fn smembers(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        let prefix = Self::member_prefix(key);
        let mut out = Vec::new();
        let iter = self.db.prefix_iterator(&prefix);
        for item in iter {
            let (found_key, _) = item.map_err(StoreError::Read)?;
            if !found_key.starts_with(&prefix) {
                break;
            }
            out.push(found_key[prefix.len()..].to_vec());
        }
        Ok(out)
    }

    fn commit(&self, commands: &[Command]) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for command in commands {
            match command {
                Command::Set { key, value } => batch.put(key, value),
                Command::Del { key } => batch.delete(key),
                Command::SAdd { key, member } => batch.put(Self::member_key(key, member), []),
                Command::SRem { key, member } => batch.delete(Self::member_key(key, member)),
            }
        }
        self.db.write(batch).map_err(StoreError::Write)
    }

    fn publish(&self, channel: &str, payload: &[u8]) {
        self.pubsub.publish(channel, payload);
    }

    fn subscribe(&self, channel: &str) -> Subscription {
        self.pubsub.subscribe(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.sadd(b"k", b"a").unwrap();
        store.sadd(b"k", b"b").unwrap();
        let mut members = store.smembers(b"k").unwrap();
        members.sort();
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);

        store.srem(b"k", b"a").unwrap();
        assert_eq!(store.smembers(b"k").unwrap(), vec![b"b".to_vec()]);
    }

    #[test]
    fn commit_is_atomic_across_kv_and_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store
            .commit(&[
                Command::Set { key: b"a".to_vec(), value: b"1".to_vec() },
                Command::SAdd { key: b"idx".to_vec(), member: b"o1".to_vec() },
            ])
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.smembers(b"idx").unwrap(), vec![b"o1".to_vec()]);
    }

    #[test]
    fn distinct_keys_do_not_bleed_into_each_others_prefix_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.sadd(b"k", b"a").unwrap();
        store.sadd(b"k2", b"b").unwrap();
        assert_eq!(store.smembers(b"k").unwrap(), vec![b"a".to_vec()]);
    }
}
