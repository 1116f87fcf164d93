//! `Store` trait conformance suite, run against both implementations,
//! following `causality-storage`'s pattern of one shared test body
//! parameterized over `impl Database`.

use animagus_store::{Command, MemoryStore, RocksStore, Store};

fn get_set_del(store: &dyn Store) {
    assert_eq!(store.get(b"k").unwrap(), None);
    store.set(b"k", b"v1").unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v1".to_vec()));
    store.set(b"k", b"v2").unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));
    store.del(b"k").unwrap();
    assert_eq!(store.get(b"k").unwrap(), None);
}

fn set_membership(store: &dyn Store) {
    assert_eq!(store.smembers(b"idx").unwrap(), Vec::<Vec<u8>>::new());
    store.sadd(b"idx", b"a").unwrap();
    store.sadd(b"idx", b"b").unwrap();
    store.sadd(b"idx", b"a").unwrap(); // idempotent
    let mut members = store.smembers(b"idx").unwrap();
    members.sort();
    assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);

    store.srem(b"idx", b"a").unwrap();
    assert_eq!(store.smembers(b"idx").unwrap(), vec![b"b".to_vec()]);

    // Removing a member that was never added is a silent no-op.
    store.srem(b"idx", b"never-there").unwrap();
}

fn commit_applies_every_command_together(store: &dyn Store) {
    store
        .commit(&[
            Command::Set { key: b"a".to_vec(), value: b"1".to_vec() },
            Command::SAdd { key: b"idx2".to_vec(), member: b"o1".to_vec() },
            Command::SAdd { key: b"idx2".to_vec(), member: b"o2".to_vec() },
        ])
        .unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    let mut members = store.smembers(b"idx2").unwrap();
    members.sort();
    assert_eq!(members, vec![b"o1".to_vec(), b"o2".to_vec()]);
}

fn forward_then_inverse_commit_is_identity(store: &dyn Store) {
    let forward = vec![
        Command::Set { key: b"head".to_vec(), value: b"block-1".to_vec() },
        Command::SAdd { key: b"idx3".to_vec(), member: b"cell-1".to_vec() },
    ];
    let inverse = vec![
        Command::Del { key: b"head".to_vec() },
        Command::SRem { key: b"idx3".to_vec(), member: b"cell-1".to_vec() },
    ];

    store.commit(&forward).unwrap();
    assert_eq!(store.get(b"head").unwrap(), Some(b"block-1".to_vec()));
    assert_eq!(store.smembers(b"idx3").unwrap(), vec![b"cell-1".to_vec()]);

    store.commit(&inverse).unwrap();
    assert_eq!(store.get(b"head").unwrap(), None);
    assert_eq!(store.smembers(b"idx3").unwrap(), Vec::<Vec<u8>>::new());
}

#[test]
fn memory_store_conforms() {
    let store = MemoryStore::new();
    get_set_del(&store);
    set_membership(&store);
    commit_applies_every_command_together(&store);
    forward_then_inverse_commit_is_identity(&store);
}

#[test]
fn rocks_store_conforms() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    get_set_del(&store);
    set_membership(&store);
    commit_applies_every_command_together(&store);
    forward_then_inverse_commit_is_identity(&store);
}

#[tokio::test]
async fn pubsub_conforms_across_implementations() {
    use tokio_stream::StreamExt;

    let memory = MemoryStore::new();
    let mut sub = memory.subscribe("STREAM:deposits");
    memory.publish("STREAM:deposits", b"payload-1");
    assert_eq!(sub.next().await, Some(b"payload-1".to_vec()));

    let dir = tempfile::tempdir().unwrap();
    let rocks = RocksStore::open(dir.path()).unwrap();
    let mut sub = rocks.subscribe("STREAM:deposits");
    rocks.publish("STREAM:deposits", b"payload-2");
    assert_eq!(sub.next().await, Some(b"payload-2".to_vec()));
}
