//! An in-memory `Store`, used in tests and for indexer development without
//! a RocksDB volume mounted.

use crate::pubsub::PubSubRegistry;
use crate::{Command, Store, StoreResult, Subscription};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    kv: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    sets: RwLock<HashMap<Vec<u8>, HashSet<Vec<u8>>>>,
    pubsub: PubSubRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.kv.read().expect("kv lock poisoned").get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.kv.write().expect("kv lock poisoned").insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn del(&self, key: &[u8]) -> StoreResult<()> {
        self.kv.write().expect("kv lock poisoned").remove(key);
        Ok(())
    }

    fn sadd(&self, key: &[u8], member: &[u8]) -> StoreResult<()> {
        self.sets
            .write()
            .expect("set lock poisoned")
            .entry(key.to_vec())
            .or_default()
            .insert(member.to_vec());
        Ok(())
    }

    fn srem(&self, key: &[u8], member: &[u8]) -> StoreResult<()> {
        if let Some(set) = self.sets.write().expect("set lock poisoned").get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    fn smembers(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .sets
            .read()
            .expect("set lock poisoned")
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, commands: &[Command]) -> StoreResult<()> {
        let mut kv = self.kv.write().expect("kv lock poisoned");
        let mut sets = self.sets.write().expect("set lock poisoned");
        for command in commands {
            match command {
                Command::Set { key, value } => {
                    kv.insert(key.clone(), value.clone());
                }
                Command::Del { key } => {
                    kv.remove(key);
                }
                Command::SAdd { key, member } => {
                    sets.entry(key.clone()).or_default().insert(member.clone());
                }
                Command::SRem { key, member } => {
                    if let Some(set) = sets.get_mut(key) {
                        set.remove(member);
                    }
                }
            }
        }
        Ok(())
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
        let store = MemoryStore::new();
        store.sadd(b"k", b"a").unwrap();
        store.sadd(b"k", b"b").unwrap();
        let mut members = store.smembers(b"k").unwrap();
        members.sort();
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);

        store.srem(b"k", b"a").unwrap();
        assert_eq!(store.smembers(b"k").unwrap(), vec![b"b".to_vec()]);
    }

    #[test]
    fn commit_applies_all_commands_together() {
        let store = MemoryStore::new();
        store
            .commit(&[
                Command::Set { key: b"a".to_vec(), value: b"1".to_vec() },
                Command::SAdd { key: b"idx".to_vec(), member: b"o1".to_vec() },
            ])
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.smembers(b"idx").unwrap(), vec![b"o1".to_vec()]);
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        use tokio_stream::StreamExt;
        let store = MemoryStore::new();
        let mut sub = store.subscribe("STREAM:foo");
        store.publish("STREAM:foo", b"hello");
        let received = sub.next().await;
        assert_eq!(received, Some(b"hello".to_vec()));
    }
}
