//! Concurrency Tests
//!
//! Tests verify:
//! - Writers on disjoint main keys never lose records
//! - Version-fenced read-modify-write is linearizable per record
//! - Aggregates stay consistent with concurrent writers
//! - No write commits once read-only mode is switched on

use std::sync::Arc;
use std::thread;

use multikv::{Config, MultiHashMap, MultiKvError, SetOptions};

fn open() -> MultiHashMap {
    let config = Config::builder()
        .shard_count(8)
        .total_size(4 * 1024 * 1024)
        .data_size(32)
        .build();
    MultiHashMap::open(config).unwrap()
}

#[test]
fn test_disjoint_writers() {
    const THREADS: usize = 8;
    const RECORDS: usize = 200;

    let store = Arc::new(open());
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let main_key = format!("writer-{}", t);
                for r in 0..RECORDS {
                    store
                        .set(
                            main_key.as_bytes(),
                            r.to_string().as_bytes(),
                            b"payload",
                            &SetOptions::new(),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.total_element_count(), THREADS * RECORDS);
    assert_eq!(store.dirty_count(), THREADS * RECORDS);
    for t in 0..THREADS {
        assert_eq!(store.count(format!("writer-{}", t).as_bytes()), RECORDS);
    }
}

#[test]
fn test_versioned_counter_has_no_lost_updates() {
    const THREADS: usize = 4;
    const INCREMENTS: usize = 50;

    let store = open();
    store.set(b"counter", b"n", b"0", &SetOptions::new()).unwrap();

    crossbeam::thread::scope(|s| {
        for _ in 0..THREADS {
            let store = &store;
            s.spawn(move |_| {
                let mut done = 0;
                while done < INCREMENTS {
                    let view = store.get_record(b"counter", b"n").unwrap();
                    let current: usize = std::str::from_utf8(&view.value).unwrap().parse().unwrap();
                    let next = (current + 1).to_string();
                    let opts = SetOptions::new().version(view.meta.version);
                    match store.set(b"counter", b"n", next.as_bytes(), &opts) {
                        Ok(()) => done += 1,
                        Err(MultiKvError::VersionMismatch { .. }) => continue,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            });
        }
    })
    .unwrap();

    let view = store.get_record(b"counter", b"n").unwrap();
    assert_eq!(view.value.as_ref(), (THREADS * INCREMENTS).to_string().as_bytes());
    assert_eq!(view.meta.version as usize, 2 + THREADS * INCREMENTS);
}

#[test]
fn test_readers_alongside_writers() {
    const ROUNDS: usize = 500;

    let store = open();
    store.set(b"shared", b"value", b"start", &SetOptions::new()).unwrap();

    crossbeam::thread::scope(|s| {
        let writer = &store;
        s.spawn(move |_| {
            for round in 0..ROUNDS {
                let key = format!("k{}", round % 16);
                writer
                    .set(b"shared", key.as_bytes(), b"x", &SetOptions::new())
                    .unwrap();
                writer.set_clean(b"shared", key.as_bytes()).unwrap();
            }
        });

        for _ in 0..3 {
            let reader = &store;
            s.spawn(move |_| {
                for _ in 0..ROUNDS {
                    assert_eq!(reader.get(b"shared", b"value").unwrap().as_ref(), b"start");
                    assert!(reader.count(b"shared") <= 17);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(store.count(b"shared"), 17);
    // Only the untouched "value" record is still dirty
    assert_eq!(store.dirty_count(), 1);
}

#[test]
fn test_clear_with_concurrent_writers() {
    let store = open();

    crossbeam::thread::scope(|s| {
        for t in 0..4 {
            let store = &store;
            s.spawn(move |_| {
                for r in 0..100 {
                    let main_key = format!("t{}-{}", t, r % 10);
                    store
                        .set(main_key.as_bytes(), b"uk", b"v", &SetOptions::new())
                        .unwrap();
                }
            });
        }
        let store = &store;
        s.spawn(move |_| {
            for _ in 0..10 {
                store.clear().unwrap();
            }
        });
    })
    .unwrap();

    // Counters and index agree no matter how the clears interleaved
    let stats = store.stats();
    assert_eq!(stats.records(), store.total_element_count());
    assert_eq!(stats.dirty(), store.dirty_count());
    assert_eq!(stats.records(), stats.dirty());
    assert!(stats.groups() <= 40);
}

#[test]
fn test_read_only_switch_stops_in_flight_writers() {
    // Every writer shares one main key, so all records land in one shard
    const RECORDS: usize = 500;
    let store = open();

    let frozen = crossbeam::thread::scope(|s| {
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let store = &store;
                s.spawn(move |_| {
                    let mut committed = 0;
                    for r in 0..RECORDS {
                        let unique_key = format!("{}-{}", t, r);
                        match store.set(b"w", unique_key.as_bytes(), b"v", &SetOptions::new()) {
                            Ok(()) => committed += 1,
                            Err(MultiKvError::ReadOnly) => break,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                    committed
                })
            })
            .collect();

        while store.total_element_count() < 100 {
            thread::yield_now();
        }
        store.set_read_only(true);
        let frozen = store.total_element_count();

        let committed: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(committed, frozen);
        frozen
    })
    .unwrap();

    assert_eq!(store.total_element_count(), frozen);
    assert_eq!(store.count(b"w"), frozen);
}
