//! Store Module
//!
//! The operation surface of the record store.
//!
//! ## Responsibilities
//! - Hash the main key once, pick its shard, lock it, delegate to the shard
//! - Gate mutating operations behind the read-only switch
//! - Aggregate counters and snapshots across shards
//!
//! ## Concurrency Model: one lock per shard
//!
//! - Operations on the same main key always hit the same shard lock, which
//!   makes each operation atomic and linearizable per main key
//! - Operations on main keys in different shards never contend
//! - Hashing happens before the lock is taken; the lock is held for exactly
//!   one shard call
//! - The read-only flag is checked under the shard lock
//! - Aggregates (`dirty_count`, `total_element_count`, ...) visit shards one
//!   at a time; `clear` takes every lock at once

mod options;
mod shard;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::error::{MultiKvError, Result};
use crate::hash::{Hashers, MainKeyHash, RecordHash};
use crate::lock::ShardLockSet;
use crate::record::{DirtyRecord, RecordView, VERSION_ANY};

pub use options::{MainKeyState, SetOptions, ShardStats, StoreStats};
pub use shard::{MainKeyRef, RecordKeyRef, Shard};

/// Sharded two-level hash map: main key -> records keyed by unique key
///
/// One handle is built at startup and shared (`Arc<MultiHashMap>`) with every
/// collaborator; all methods take `&self`.
pub struct MultiHashMap {
    /// Store configuration
    config: Config,

    /// Per-shard state, each behind its own lock
    shards: ShardLockSet<Shard>,

    /// Main-key and record hash functions
    hashers: Hashers,

    /// Rejects mutations while set
    read_only: AtomicBool,

    /// Reclaim tombstones once their delete is synced
    auto_erase: AtomicBool,
}

impl MultiHashMap {
    /// Open a store with the default CRC32 hash functions
    pub fn open(config: Config) -> Result<Self> {
        Self::with_hashers(config, Hashers::default())
    }

    /// Open a store with caller-supplied hash functions
    pub fn with_hash_functions(
        config: Config,
        main_key: impl MainKeyHash + 'static,
        record: impl RecordHash + 'static,
    ) -> Result<Self> {
        Self::with_hashers(config, Hashers::new(main_key, record))
    }

    /// Open a store with a prepared pair of hash functions
    ///
    /// On startup:
    /// 1. Validate the configuration
    /// 2. Carve each shard's share of the region into arenas and indexes
    /// 3. Wrap the shards in the lock set
    pub fn with_hashers(config: Config, hashers: Hashers) -> Result<Self> {
        config.validate()?;

        let stride = u32::try_from(config.shard_count)
            .map_err(|_| MultiKvError::Config("shard_count exceeds u32".into()))?;
        let shards = (0..config.shard_count)
            .map(|_| Shard::new(&config, stride))
            .collect::<Result<Vec<_>>>()?;

        let store = Self {
            shards: ShardLockSet::new(config.lock_id, shards),
            hashers,
            read_only: AtomicBool::new(config.read_only),
            auto_erase: AtomicBool::new(config.auto_erase),
            config,
        };

        let first = store.shards.lock(0).stats();
        tracing::info!(
            lock_id = store.config.lock_id,
            shards = store.config.shard_count,
            total_size = store.config.total_size,
            key_chunks_per_shard = first.key_chunks_free,
            data_chunks_per_shard = first.data_chunks_free,
            "MultiHashMap opened"
        );
        Ok(store)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or overwrite the record (`main_key`, `unique_key`)
    ///
    /// Steps:
    /// 1. Lock the main key's shard
    /// 2. Reject if read-only
    /// 3. Update in place (version fenced) or insert (per-key limit applied)
    pub fn set(
        &self,
        main_key: &[u8],
        unique_key: &[u8],
        value: &[u8],
        opts: &SetOptions,
    ) -> Result<()> {
        let key = self.record_key(main_key, unique_key);
        self.writable_shard(key.main)?.set(key, value, opts)
    }

    /// Record that `main_key` exists without materialising any data
    pub fn set_only_key(&self, main_key: &[u8]) -> Result<()> {
        let main = self.main_key(main_key);
        self.writable_shard(main)?.set_only_key(main)
    }

    /// Soft-delete a record
    pub fn del_set_bit(&self, main_key: &[u8], unique_key: &[u8], now: u32) -> Result<()> {
        self.del_set_bit_versioned(main_key, unique_key, VERSION_ANY, now)
    }

    /// Soft-delete a record if its version still equals `version`
    pub fn del_set_bit_versioned(
        &self,
        main_key: &[u8],
        unique_key: &[u8],
        version: u8,
        now: u32,
    ) -> Result<()> {
        let key = self.record_key(main_key, unique_key);
        self.writable_shard(key.main)?.del_set_bit(key, version, now)
    }

    /// Physically remove a record
    pub fn del_real(&self, main_key: &[u8], unique_key: &[u8]) -> Result<()> {
        let key = self.record_key(main_key, unique_key);
        self.writable_shard(key.main)?.del_real(key)
    }

    /// Physically remove a main key and every record under it
    ///
    /// Returns the number of records reclaimed.
    pub fn del_main_key(&self, main_key: &[u8]) -> Result<usize> {
        let main = self.main_key(main_key);
        self.writable_shard(main)?.del_main_key(main)
    }

    pub fn set_dirty(&self, main_key: &[u8], unique_key: &[u8]) -> Result<()> {
        let key = self.record_key(main_key, unique_key);
        self.writable_shard(key.main)?.set_dirty(key)
    }

    pub fn set_clean(&self, main_key: &[u8], unique_key: &[u8]) -> Result<()> {
        let key = self.record_key(main_key, unique_key);
        let auto_erase = self.is_auto_erase();
        self.writable_shard(key.main)?.set_clean(key, auto_erase)
    }

    /// Stamp the last write-back reconciliation time of a record
    pub fn set_sync_time(&self, main_key: &[u8], unique_key: &[u8], sync_time: u32) -> Result<()> {
        let key = self.record_key(main_key, unique_key);
        self.writable_shard(key.main)?.set_sync_time(key, sync_time)
    }

    /// Empty every shard back to the freshly opened state
    pub fn clear(&self) -> Result<()> {
        let mut guards = self.shards.lock_all();
        for shard in guards.iter_mut() {
            shard.clear()?;
        }
        tracing::debug!(shards = guards.len(), "store cleared");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value of a live record
    pub fn get(&self, main_key: &[u8], unique_key: &[u8]) -> Result<bytes::Bytes> {
        Ok(self.get_record(main_key, unique_key)?.value)
    }

    /// Value and metadata of a live record
    pub fn get_record(&self, main_key: &[u8], unique_key: &[u8]) -> Result<RecordView> {
        let key = self.record_key(main_key, unique_key);
        self.shard_of(key.main).get(key, None)
    }

    /// Value and metadata, reporting `Expired` when `check_expire` is set and
    /// `now` has reached the record's expiry
    pub fn get_at(
        &self,
        main_key: &[u8],
        unique_key: &[u8],
        check_expire: bool,
        now: u32,
    ) -> Result<RecordView> {
        let key = self.record_key(main_key, unique_key);
        self.shard_of(key.main).get(key, check_expire.then_some(now))
    }

    /// Every record under a main key in chain order, tombstones included
    pub fn get_all(&self, main_key: &[u8]) -> Result<Vec<RecordView>> {
        let main = self.main_key(main_key);
        self.shard_of(main).get_all(main)
    }

    pub fn check_main_key(&self, main_key: &[u8]) -> Result<MainKeyState> {
        let main = self.main_key(main_key);
        self.shard_of(main).check_main_key(main)
    }

    /// Whether a record is pending write-back
    pub fn check_dirty(&self, main_key: &[u8], unique_key: &[u8]) -> Result<bool> {
        let key = self.record_key(main_key, unique_key);
        self.shard_of(key.main).check_dirty(key)
    }

    /// Records under a main key, tombstones included; 0 if unknown
    pub fn count(&self, main_key: &[u8]) -> usize {
        let main = self.main_key(main_key);
        self.shard_of(main).count(main).unwrap_or_else(|e| {
            tracing::error!("count failed: {}", e);
            0
        })
    }

    /// Records across all main keys
    pub fn total_element_count(&self) -> usize {
        let mut total = 0;
        self.shards.for_each(|_, shard| total += shard.record_count());
        total
    }

    /// Dirty records across the store
    pub fn dirty_count(&self) -> usize {
        let mut total = 0;
        self.shards.for_each(|_, shard| total += shard.dirty_count());
        total
    }

    /// Copy of every dirty record, shard by shard
    pub fn dirty_records(&self) -> Result<Vec<DirtyRecord>> {
        let mut out = Vec::new();
        let mut result = Ok(());
        self.shards.for_each(|_, shard| {
            if result.is_ok() {
                result = shard.collect_dirty(&mut out);
            }
        });
        result.map(|()| out)
    }

    pub fn stats(&self) -> StoreStats {
        let mut shards = Vec::with_capacity(self.shards.len());
        self.shards.for_each(|_, shard| shards.push(shard.stats()));
        StoreStats { shards }
    }

    // =========================================================================
    // Switches
    // =========================================================================

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Switch read-only mode
    ///
    /// Writers check the flag with their shard lock held, and switching on
    /// passes through every shard lock, so no write commits after this returns.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
        if read_only {
            drop(self.shards.lock_all());
        }
        tracing::debug!(read_only, "read-only mode changed");
    }

    pub fn is_auto_erase(&self) -> bool {
        self.auto_erase.load(Ordering::Acquire)
    }

    pub fn set_auto_erase(&self, auto_erase: bool) {
        self.auto_erase.store(auto_erase, Ordering::Release);
        tracing::debug!(auto_erase, "auto-erase changed");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Identifier shared by every attachment of this store
    pub fn lock_id(&self) -> u64 {
        self.shards.shared_id()
    }

    /// Shard a main key lives in
    pub fn shard_index(&self, main_key: &[u8]) -> usize {
        self.shards
            .shard_for(self.hashers.main_key.hash_main_key(main_key))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Lock the shard of `main`, then reject the write if read-only
    fn writable_shard(&self, main: MainKeyRef<'_>) -> Result<parking_lot::MutexGuard<'_, Shard>> {
        let guard = self.shard_of(main);
        if self.is_read_only() {
            return Err(MultiKvError::ReadOnly);
        }
        Ok(guard)
    }

    fn main_key<'a>(&self, bytes: &'a [u8]) -> MainKeyRef<'a> {
        MainKeyRef {
            bytes,
            hash: self.hashers.main_key.hash_main_key(bytes),
        }
    }

    fn record_key<'a>(&self, main_key: &'a [u8], unique_key: &'a [u8]) -> RecordKeyRef<'a> {
        RecordKeyRef {
            main: self.main_key(main_key),
            unique_key,
            hash: self.hashers.record.hash_record(main_key, unique_key),
        }
    }

    fn shard_of(&self, main: MainKeyRef<'_>) -> parking_lot::MutexGuard<'_, Shard> {
        self.shards.lock(self.shards.shard_for(main.hash))
    }
}

impl std::fmt::Debug for MultiHashMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiHashMap")
            .field("lock_id", &self.lock_id())
            .field("shards", &self.shards.len())
            .field("read_only", &self.is_read_only())
            .field("auto_erase", &self.is_auto_erase())
            .finish()
    }
}
