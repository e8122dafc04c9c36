//! Shard Lock Set Tests
//!
//! Tests verify:
//! - Shard selection from a hash
//! - Mutual exclusion per shard
//! - Independence of different shards
//! - Whole-set locking and visiting

use std::sync::Arc;
use std::thread;

use multikv::lock::ShardLockSet;

// =============================================================================
// Selection Tests
// =============================================================================

#[test]
fn test_shard_for_is_modulo() {
    let set = ShardLockSet::new(7, vec![0u32; 5]);
    assert_eq!(set.len(), 5);
    assert!(!set.is_empty());
    assert_eq!(set.shared_id(), 7);

    assert_eq!(set.shard_for(0), 0);
    assert_eq!(set.shard_for(4), 4);
    assert_eq!(set.shard_for(5), 0);
    assert_eq!(set.shard_for(u32::MAX), (u32::MAX % 5) as usize);
}

// =============================================================================
// Exclusion Tests
// =============================================================================

#[test]
fn test_held_shard_cannot_be_taken() {
    let set = ShardLockSet::new(0, vec![(); 3]);

    let guard = set.lock(1);
    assert!(set.try_lock(1).is_none());
    // Other shards are unaffected
    assert!(set.try_lock(0).is_some());
    assert!(set.try_lock(2).is_some());
    drop(guard);

    assert!(set.try_lock(1).is_some());
}

#[test]
fn test_try_lock_out_of_range() {
    let set = ShardLockSet::new(0, vec![(); 2]);
    assert!(set.try_lock(2).is_none());
}

#[test]
fn test_lock_all_blocks_every_shard() {
    let set = ShardLockSet::new(0, vec![0u8; 4]);
    let guards = set.lock_all();
    assert_eq!(guards.len(), 4);
    for index in 0..4 {
        assert!(set.try_lock(index).is_none());
    }
    drop(guards);
    assert!(set.try_lock(3).is_some());
}

#[test]
fn test_concurrent_increments_are_serialised() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 1000;

    let set = Arc::new(ShardLockSet::new(0, vec![0usize; 2]));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    *set.lock(t % 2) += 1;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*set.lock(0), THREADS / 2 * ROUNDS);
    assert_eq!(*set.lock(1), THREADS / 2 * ROUNDS);
}

// =============================================================================
// Visiting Tests
// =============================================================================

#[test]
fn test_for_each_visits_in_order() {
    let set = ShardLockSet::new(0, vec![10, 20, 30]);
    let mut seen = Vec::new();
    set.for_each(|index, value| {
        seen.push((index, *value));
        *value += 1;
    });

    assert_eq!(seen, vec![(0, 10), (1, 20), (2, 30)]);
    assert_eq!(*set.lock(2), 31);
}
