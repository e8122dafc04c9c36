//! Option and result types of the store surface

use serde::{Deserialize, Serialize};

use crate::record::{DeleteMark, VERSION_ANY};

/// Knobs of a record `set`
///
/// Defaults describe a plain client write: dirty, never expiring, no version
/// fence, inserted at the head, position kept on update, no per-key limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    /// Absolute expiry (seconds); 0 never expires
    pub expire_at: u32,

    /// Expected stored version; 0 disables the fence
    pub version: u8,

    /// What to do with the soft-delete mark
    pub delete_mark: DeleteMark,

    /// Whether the written record is pending write-back
    pub dirty: bool,

    /// New records go to the head (true) or tail (false) of the chain
    pub insert_at_head: bool,

    /// Move an updated record to the insertion end of the chain
    pub update_in_order: bool,

    /// Maximum records under the main key; 0 is unlimited
    pub max_data_count: usize,

    /// Allow evicting dirty records when the limit is reached
    pub delete_dirty: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            expire_at: 0,
            version: VERSION_ANY,
            delete_mark: DeleteMark::Clear,
            dirty: true,
            insert_at_head: true,
            update_in_order: false,
            max_data_count: 0,
            delete_dirty: false,
        }
    }
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expire_at(mut self, at: u32) -> Self {
        self.expire_at = at;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn delete_mark(mut self, mark: DeleteMark) -> Self {
        self.delete_mark = mark;
        self
    }

    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }

    pub fn insert_at_head(mut self, at_head: bool) -> Self {
        self.insert_at_head = at_head;
        self
    }

    pub fn update_in_order(mut self, reorder: bool) -> Self {
        self.update_in_order = reorder;
        self
    }

    /// Cap records under the main key, optionally evicting dirty ones
    pub fn max_data_count(mut self, limit: usize, delete_dirty: bool) -> Self {
        self.max_data_count = limit;
        self.delete_dirty = delete_dirty;
        self
    }
}

/// Result of a main-key existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainKeyState {
    /// The group holds records (tombstones included)
    Data { records: usize },

    /// The group is a placeholder with no records
    OnlyKey,
}

/// Occupancy of one shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub groups: usize,
    pub records: usize,
    pub dirty: usize,
    pub key_chunks_used: usize,
    pub key_chunks_free: usize,
    pub data_chunks_used: usize,
    pub data_chunks_free: usize,
}

/// Occupancy of the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub shards: Vec<ShardStats>,
}

impl StoreStats {
    pub fn groups(&self) -> usize {
        self.shards.iter().map(|s| s.groups).sum()
    }

    pub fn records(&self) -> usize {
        self.shards.iter().map(|s| s.records).sum()
    }

    pub fn dirty(&self) -> usize {
        self.shards.iter().map(|s| s.dirty).sum()
    }
}
