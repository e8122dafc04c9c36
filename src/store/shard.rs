//! Shard
//!
//! Everything one shard lock guards: two chunk arenas, the hash index over
//! them, and the shard's dirty counter. Every method runs with the lock held,
//! so each one is a complete, atomic step of a store operation.

use bytes::Bytes;

use crate::chunk::{ChunkArena, ChunkHandle, CHUNK_HEADER_SIZE};
use crate::config::Config;
use crate::error::{MultiKvError, Result};
use crate::index::{GroupId, HashIndex, RecordId, RecordNode};
use crate::record::{DirtyRecord, RecordMeta, RecordView};

use super::options::{MainKeyState, SetOptions, ShardStats};

/// A main key with its precomputed hash
#[derive(Debug, Clone, Copy)]
pub struct MainKeyRef<'a> {
    pub bytes: &'a [u8],
    pub hash: u32,
}

/// A (main key, unique key) pair with both precomputed hashes
#[derive(Debug, Clone, Copy)]
pub struct RecordKeyRef<'a> {
    pub main: MainKeyRef<'a>,
    pub unique_key: &'a [u8],
    pub hash: u32,
}

/// State guarded by one shard lock
#[derive(Debug)]
pub struct Shard {
    /// Main key bytes
    keys: ChunkArena,

    /// Unique keys and values
    data: ChunkArena,

    index: HashIndex,

    /// Records with the dirty flag set
    dirty: usize,
}

impl Shard {
    /// Lay out one shard's share of the region
    ///
    /// The byte budget is split between the key and data arenas in proportion
    /// `key_chunk : data_chunk * hash_ratio`.
    pub fn new(config: &Config, stride: u32) -> Result<Self> {
        let shard_bytes = config.shard_size();
        let key_chunk = (config.main_key_chunk_size() + CHUNK_HEADER_SIZE) as u128;
        let data_chunk = (config.data_size + CHUNK_HEADER_SIZE) as u128;
        let weight = key_chunk + data_chunk * config.hash_ratio as u128;
        let key_bytes = (shard_bytes as u128 * key_chunk / weight) as usize;

        let keys = ChunkArena::new(key_bytes, config.main_key_chunk_size())?;
        let data = ChunkArena::new(shard_bytes - key_bytes, config.data_size)?;

        // A record needs at least two data chunks: unique key and value
        let index = HashIndex::new(
            keys.chunk_count(),
            (data.chunk_count() / 2).max(1),
            keys.chunk_count() / config.hash_ratio,
            data.chunk_count() / config.hash_ratio,
            stride,
        );

        Ok(Self {
            keys,
            data,
            index,
            dirty: 0,
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or overwrite one record
    pub fn set(&mut self, key: RecordKeyRef<'_>, value: &[u8], opts: &SetOptions) -> Result<()> {
        let group = self.find_group(key.main)?;
        if let Some(group) = group {
            if let Some(id) = self
                .index
                .find_record(&self.data, group, key.hash, key.unique_key)?
            {
                return self.update(id, value, opts);
            }
        }
        self.insert(group, key, value, opts)
    }

    /// Create or re-mark a group that holds no records
    pub fn set_only_key(&mut self, main: MainKeyRef<'_>) -> Result<()> {
        match self.find_group(main)? {
            Some(group) => {
                let node = self.index.group_mut(group)?;
                if node.len > 0 {
                    return Err(MultiKvError::AlreadyExists);
                }
                node.only_key = true;
                Ok(())
            }
            None => self.create_group(main, true).map(|_| ()),
        }
    }

    /// Soft delete, fenced by `version` unless it is 0
    pub fn del_set_bit(&mut self, key: RecordKeyRef<'_>, version: u8, now: u32) -> Result<()> {
        let id = self.locate(key)?;
        let node = self.index.record_mut(id)?;
        let was_dirty = node.meta.dirty;
        node.meta.apply_delete(version, now)?;
        let meta = node.meta;
        self.adjust_dirty(was_dirty, meta.dirty);
        tracing::trace!(version = meta.version, "record marked deleted");
        Ok(())
    }

    /// Physically remove one record
    pub fn del_real(&mut self, key: RecordKeyRef<'_>) -> Result<()> {
        let id = self.locate(key)?;
        self.reclaim(id)
    }

    /// Physically remove a group and all its records
    pub fn del_main_key(&mut self, main: MainKeyRef<'_>) -> Result<usize> {
        let group = self.find_group(main)?.ok_or(MultiKvError::NotFound)?;
        let ids = self.index.chain(group, true)?;
        for &id in &ids {
            self.drop_record(id)?;
        }
        self.drop_group(group)?;
        Ok(ids.len())
    }

    pub fn set_dirty(&mut self, key: RecordKeyRef<'_>) -> Result<()> {
        self.set_dirty_flag(key, true)
    }

    /// Clear the dirty flag; with `auto_erase` a synced tombstone is reclaimed
    pub fn set_clean(&mut self, key: RecordKeyRef<'_>, auto_erase: bool) -> Result<()> {
        let id = self.locate(key)?;
        if auto_erase && self.index.record(id)?.meta.deleted {
            return self.reclaim(id);
        }
        self.set_dirty_flag(key, false)
    }

    pub fn set_sync_time(&mut self, key: RecordKeyRef<'_>, sync_time: u32) -> Result<()> {
        let id = self.locate(key)?;
        self.index.record_mut(id)?.meta.sync_time = sync_time;
        Ok(())
    }

    /// Drop every group and record
    pub fn clear(&mut self) -> Result<()> {
        self.index.clear();
        self.keys.reset()?;
        self.data.reset()?;
        self.dirty = 0;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read one record; `now` enables expiry enforcement
    pub fn get(&self, key: RecordKeyRef<'_>, now: Option<u32>) -> Result<RecordView> {
        let node = self.index.record(self.locate(key)?)?;
        node.meta.readable(now)?;
        self.view(node)
    }

    /// Every record of a group in chain order, tombstones included
    pub fn get_all(&self, main: MainKeyRef<'_>) -> Result<Vec<RecordView>> {
        let group = self.find_group(main)?.ok_or(MultiKvError::NotFound)?;
        let node = self.index.group(group)?;
        if node.len == 0 {
            return Err(if node.only_key {
                MultiKvError::OnlyKey
            } else {
                MultiKvError::NotFound
            });
        }

        self.index
            .chain(group, true)?
            .into_iter()
            .map(|id| self.index.record(id).and_then(|node| self.view(node)))
            .collect()
    }

    pub fn check_main_key(&self, main: MainKeyRef<'_>) -> Result<MainKeyState> {
        let group = self.find_group(main)?.ok_or(MultiKvError::NotFound)?;
        let node = self.index.group(group)?;
        Ok(match node.len {
            0 => MainKeyState::OnlyKey,
            records => MainKeyState::Data { records },
        })
    }

    pub fn check_dirty(&self, key: RecordKeyRef<'_>) -> Result<bool> {
        Ok(self.index.record(self.locate(key)?)?.meta.dirty)
    }

    /// Records under a main key; 0 when the key is unknown
    pub fn count(&self, main: MainKeyRef<'_>) -> Result<usize> {
        Ok(match self.find_group(main)? {
            Some(group) => self.index.group(group)?.len,
            None => 0,
        })
    }

    pub fn record_count(&self) -> usize {
        self.index.record_count()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty
    }

    /// Append a copy of every dirty record to `out`
    pub fn collect_dirty(&self, out: &mut Vec<DirtyRecord>) -> Result<()> {
        for (_, node) in self.index.records().filter(|(_, node)| node.meta.dirty) {
            let group = self.index.group(node.group)?;
            out.push(DirtyRecord {
                main_key: Bytes::from(self.keys.read(group.main_key)?),
                unique_key: Bytes::from(self.data.read(node.unique_key)?),
                value: Bytes::from(self.data.read(node.value)?),
                version: node.meta.version,
                deleted: node.meta.deleted,
            });
        }
        Ok(())
    }

    pub fn stats(&self) -> ShardStats {
        ShardStats {
            groups: self.index.group_count(),
            records: self.index.record_count(),
            dirty: self.dirty,
            key_chunks_used: self.keys.used_chunks(),
            key_chunks_free: self.keys.free_chunks(),
            data_chunks_used: self.data.used_chunks(),
            data_chunks_free: self.data.free_chunks(),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn find_group(&self, main: MainKeyRef<'_>) -> Result<Option<GroupId>> {
        self.index.find_group(&self.keys, main.hash, main.bytes)
    }

    fn locate(&self, key: RecordKeyRef<'_>) -> Result<RecordId> {
        let group = self.find_group(key.main)?.ok_or(MultiKvError::NotFound)?;
        self.index
            .find_record(&self.data, group, key.hash, key.unique_key)?
            .ok_or(MultiKvError::NotFound)
    }

    fn update(&mut self, id: RecordId, value: &[u8], opts: &SetOptions) -> Result<()> {
        let (old_value, mut meta) = {
            let node = self.index.record(id)?;
            (node.value, node.meta)
        };

        // Work on a copy so a rejected write leaves the stored meta alone
        meta.apply_set(opts.version, opts.dirty, opts.expire_at, opts.delete_mark)?;
        let new_value = self.replace_value(old_value, value)?;

        let node = self.index.record_mut(id)?;
        let was_dirty = node.meta.dirty;
        node.value = new_value;
        node.meta = meta;
        self.adjust_dirty(was_dirty, meta.dirty);

        if opts.update_in_order {
            self.index.reposition(id, opts.insert_at_head)?;
        }
        tracing::trace!(version = meta.version, dirty = meta.dirty, "record updated");
        Ok(())
    }

    /// Write `value` over `old`, moving it to a new chain if the size class changed
    fn replace_value(&mut self, old: ChunkHandle, value: &[u8]) -> Result<ChunkHandle> {
        let wanted = self.data.chunks_for(value.len()) * self.data.payload_size();
        if self.data.capacity(old)? == wanted {
            self.data.write(old, value)?;
            return Ok(old);
        }
        let new = self.data.store(value)?;
        self.data.free(old)?;
        Ok(new)
    }

    fn insert(
        &mut self,
        group: Option<GroupId>,
        key: RecordKeyRef<'_>,
        value: &[u8],
        opts: &SetOptions,
    ) -> Result<()> {
        // Choose what to evict before allocating anything
        let at_limit = match group {
            Some(g) if opts.max_data_count > 0 => self.index.group(g)?.len >= opts.max_data_count,
            _ => false,
        };
        let victim = match group.filter(|_| at_limit) {
            Some(g) => match self.pick_victim(g, opts)? {
                Some(victim) => Some(victim),
                None => {
                    tracing::warn!(limit = opts.max_data_count, "main key full, insert rejected");
                    return Err(MultiKvError::GroupFull {
                        limit: opts.max_data_count,
                    });
                }
            },
            None => None,
        };

        // Eviction is committed once a victim is chosen: make room first, but
        // only if the new record then fits
        if let Some(victim) = victim {
            self.ensure_fits_after(victim, key.unique_key.len(), value.len())?;
            self.drop_record(victim)?;
            tracing::debug!(limit = opts.max_data_count, "evicted oldest record of full main key");
        }

        let unique_key = self.data.store(key.unique_key).map_err(log_out_of_space)?;
        let value_handle = match self.data.store(value) {
            Ok(handle) => handle,
            Err(e) => {
                self.release(&[unique_key]);
                return Err(log_out_of_space(e));
            }
        };
        let (group, created) = match group {
            Some(g) => (g, false),
            None => match self.create_group(key.main, false) {
                Ok(g) => (g, true),
                Err(e) => {
                    self.release(&[unique_key, value_handle]);
                    return Err(e);
                }
            },
        };

        let meta = RecordMeta::inserted(opts.dirty, opts.expire_at, opts.delete_mark);
        let inserted = self.index.insert_record(
            group,
            key.hash,
            unique_key,
            value_handle,
            meta,
            opts.insert_at_head,
        );
        if let Err(e) = inserted {
            self.release(&[unique_key, value_handle]);
            if created {
                self.drop_group(group)?;
            }
            return Err(log_out_of_space(e));
        }

        if meta.dirty {
            self.dirty += 1;
        }
        tracing::trace!(version = meta.version, dirty = meta.dirty, "record inserted");
        Ok(())
    }

    /// Oldest clean record, or the oldest record at all if dirty ones may go
    fn pick_victim(&self, group: GroupId, opts: &SetOptions) -> Result<Option<RecordId>> {
        // The oldest end is the one opposite to where new records land
        let oldest_first = self.index.chain(group, !opts.insert_at_head)?;
        for &id in &oldest_first {
            if !self.index.record(id)?.meta.dirty {
                return Ok(Some(id));
            }
        }
        Ok(if opts.delete_dirty {
            oldest_first.first().copied()
        } else {
            None
        })
    }

    /// Fail with `OutOfSpace` unless a record of these sizes fits once
    /// `victim` has given back its chunks
    fn ensure_fits_after(&self, victim: RecordId, key_len: usize, value_len: usize) -> Result<()> {
        let node = self.index.record(victim)?;
        let payload = self.data.payload_size();
        let reclaimed =
            (self.data.capacity(node.unique_key)? + self.data.capacity(node.value)?) / payload;
        let needed = self.data.chunks_for(key_len) + self.data.chunks_for(value_len);
        let free = self.data.free_chunks() + reclaimed;
        if needed > free {
            return Err(log_out_of_space(MultiKvError::OutOfSpace {
                requested: key_len + value_len,
                available: free * payload,
            }));
        }
        Ok(())
    }

    fn create_group(&mut self, main: MainKeyRef<'_>, only_key: bool) -> Result<GroupId> {
        let handle = self.keys.store(main.bytes).map_err(log_out_of_space)?;
        match self.index.insert_group(handle, main.hash, only_key) {
            Ok(group) => Ok(group),
            Err(e) => {
                if let Err(free_err) = self.keys.free(handle) {
                    tracing::error!("failed to release main key chunk: {}", free_err);
                }
                Err(log_out_of_space(e))
            }
        }
    }

    /// Remove a record and give back its chunks; its group stays
    fn drop_record(&mut self, id: RecordId) -> Result<RecordNode> {
        let node = self.index.remove_record(id)?;
        self.data.free(node.unique_key)?;
        self.data.free(node.value)?;
        if node.meta.dirty {
            self.dirty -= 1;
        }
        Ok(node)
    }

    fn drop_group(&mut self, group: GroupId) -> Result<()> {
        let node = self.index.remove_group(group)?;
        self.keys.free(node.main_key)?;
        tracing::debug!("main key group removed");
        Ok(())
    }

    /// Remove a record, and its group too once nothing keeps the group alive
    fn reclaim(&mut self, id: RecordId) -> Result<()> {
        let group = self.drop_record(id)?.group;
        let node = self.index.group(group)?;
        if node.len == 0 && !node.only_key {
            self.drop_group(group)?;
        }
        Ok(())
    }

    fn set_dirty_flag(&mut self, key: RecordKeyRef<'_>, dirty: bool) -> Result<()> {
        let id = self.locate(key)?;
        let node = self.index.record_mut(id)?;
        let was_dirty = node.meta.dirty;
        node.meta.dirty = dirty;
        self.adjust_dirty(was_dirty, dirty);
        Ok(())
    }

    fn adjust_dirty(&mut self, before: bool, after: bool) {
        match (before, after) {
            (false, true) => self.dirty += 1,
            (true, false) => self.dirty -= 1,
            _ => {}
        }
    }

    fn view(&self, node: &RecordNode) -> Result<RecordView> {
        Ok(RecordView {
            unique_key: Bytes::from(self.data.read(node.unique_key)?),
            value: Bytes::from(self.data.read(node.value)?),
            meta: node.meta,
        })
    }

    /// Free chunks of a failed insert; a failure here means the arena is corrupt
    fn release(&mut self, handles: &[ChunkHandle]) {
        for &handle in handles {
            if let Err(e) = self.data.free(handle) {
                tracing::error!("failed to release data chunk: {}", e);
            }
        }
    }
}

fn log_out_of_space(e: MultiKvError) -> MultiKvError {
    if let MultiKvError::OutOfSpace {
        requested,
        available,
    } = e
    {
        tracing::warn!(requested, available, "shard out of space");
    }
    e
}
