//! Serialization Tests
//!
//! Tests verify:
//! - Config and key type survive a bincode round trip
//! - Record metadata and write options read back unchanged
//! - Stats and main-key answers taken from a live store read back unchanged

use multikv::store::ShardStats;
use multikv::{
    Config, DeleteMark, KeyType, MainKeyState, MultiHashMap, RecordMeta, SetOptions, StoreStats,
};
use serde::{de::DeserializeOwned, Serialize};

fn round_trip<T: Serialize + DeserializeOwned>(value: &T) -> T {
    let encoded = bincode::serialize(value).unwrap();
    bincode::deserialize(&encoded).unwrap()
}

fn open() -> MultiHashMap {
    let config = Config::builder()
        .shard_count(2)
        .total_size(64 * 1024)
        .data_size(32)
        .build();
    MultiHashMap::open(config).unwrap()
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_round_trip() {
    let config = Config::builder()
        .shard_count(6)
        .total_size(8 * 1024 * 1024)
        .main_key_size(24)
        .data_size(96)
        .lock_id(0xfeed)
        .key_type(KeyType::Hash)
        .auto_erase(true)
        .read_only(true)
        .build();

    let decoded = round_trip(&config);
    assert_eq!(decoded, config);
    assert!(decoded.validate().is_ok());
    assert_eq!(round_trip(&KeyType::SortedSet), KeyType::SortedSet);
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_record_meta_from_store_round_trip() {
    let store = open();
    let opts = SetOptions::new()
        .expire_at(5000)
        .dirty(false)
        .delete_mark(DeleteMark::Set { at: 1200 });
    store.set(b"team", b"a", b"v", &opts).unwrap();
    store.set_sync_time(b"team", b"a", 1300).unwrap();

    let meta = store.get_all(b"team").unwrap()[0].meta;
    assert!(meta.deleted);
    assert_eq!(meta.deleted_at, 1200);

    let decoded: RecordMeta = round_trip(&meta);
    assert_eq!(decoded, meta);
    assert_eq!(decoded.sync_time, 1300);
}

#[test]
fn test_set_options_round_trip() {
    let opts = SetOptions::new()
        .expire_at(77)
        .version(9)
        .delete_mark(DeleteMark::Set { at: 42 })
        .dirty(false)
        .insert_at_head(false)
        .update_in_order(true)
        .max_data_count(3, true);

    let decoded = round_trip(&opts);
    assert_eq!(decoded, opts);
    assert_eq!(decoded.delete_mark, DeleteMark::Set { at: 42 });
    assert_eq!(round_trip(&DeleteMark::Keep), DeleteMark::Keep);
}

// =============================================================================
// Stats Tests
// =============================================================================

#[test]
fn test_store_stats_round_trip() {
    let store = open();
    store.set_only_key(b"placeholder").unwrap();
    for uk in ["a", "b", "c"] {
        store.set(b"team", uk.as_bytes(), b"v", &SetOptions::new()).unwrap();
    }
    store.set_clean(b"team", b"b").unwrap();

    let stats = store.stats();
    let decoded: StoreStats = round_trip(&stats);
    assert_eq!(decoded, stats);
    assert_eq!(decoded.records(), 3);
    assert_eq!(decoded.dirty(), 2);
    assert_eq!(decoded.groups(), 2);

    let shard: ShardStats = round_trip(&stats.shards[0]);
    assert_eq!(shard, stats.shards[0]);
}

#[test]
fn test_main_key_state_round_trip() {
    let store = open();
    store.set_only_key(b"placeholder").unwrap();
    store.set(b"team", b"a", b"v", &SetOptions::new()).unwrap();

    for main_key in [&b"placeholder"[..], b"team"] {
        let state = store.check_main_key(main_key).unwrap();
        assert_eq!(round_trip(&state), state);
    }
    assert_eq!(
        round_trip(&MainKeyState::Data { records: 12 }),
        MainKeyState::Data { records: 12 }
    );
}
