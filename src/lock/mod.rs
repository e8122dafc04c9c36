//! Shard Lock Set
//!
//! One mutex per shard, selected from the main-key hash, so every operation
//! on a given main key contends on the same lock and operations on keys in
//! different shards never touch each other's lock.
//!
//! ## Concurrency
//! - Each shard's state lives *inside* its mutex: it cannot be reached
//!   without holding the lock
//! - Locks are cache-line padded to keep neighbouring shards from sharing a line
//! - Whole-store operations take every lock in ascending index order, which
//!   is the only multi-lock order in the crate (no deadlock)

use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

/// A set of per-shard mutexes guarding shard state `T`
pub struct ShardLockSet<T> {
    /// Identifier shared by every attachment of the same store
    shared_id: u64,

    /// One lock per shard
    shards: Vec<CachePadded<Mutex<T>>>,
}

impl<T> ShardLockSet<T> {
    /// Build a lock set from already-initialised shard states
    pub fn new(shared_id: u64, shards: Vec<T>) -> Self {
        Self {
            shared_id,
            shards: shards
                .into_iter()
                .map(|state| CachePadded::new(Mutex::new(state)))
                .collect(),
        }
    }

    /// Identifier this lock set was created for
    pub fn shared_id(&self) -> u64 {
        self.shared_id
    }

    /// Number of shards
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Shard index for a main-key hash
    pub fn shard_for(&self, hash: u32) -> usize {
        hash as usize % self.shards.len().max(1)
    }

    /// Block until shard `index` is locked
    ///
    /// Panics if `index` is out of range; callers derive it from `shard_for`.
    pub fn lock(&self, index: usize) -> MutexGuard<'_, T> {
        self.shards[index].lock()
    }

    /// Lock shard `index` if no one else holds it
    pub fn try_lock(&self, index: usize) -> Option<MutexGuard<'_, T>> {
        self.shards.get(index).and_then(|shard| shard.try_lock())
    }

    /// Lock every shard, in ascending order
    pub fn lock_all(&self) -> Vec<MutexGuard<'_, T>> {
        self.shards.iter().map(|shard| shard.lock()).collect()
    }

    /// Visit each shard in turn, holding only one lock at a time
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &mut T),
    {
        for (index, shard) in self.shards.iter().enumerate() {
            let mut guard = shard.lock();
            visit(index, &mut guard);
        }
    }
}
