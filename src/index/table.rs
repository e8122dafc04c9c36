//! Two-level hash table
//!
//! Group nodes hang off main-key buckets; record nodes hang off record
//! buckets *and* sit in their group's doubly linked chain.

use crate::chunk::{ChunkArena, ChunkHandle};
use crate::error::{MultiKvError, Result};
use crate::record::RecordMeta;

use super::slab::Slab;

/// Slot id of a group node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

/// Slot id of a record node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u32);

/// All records sharing one main key
#[derive(Debug)]
pub struct GroupNode {
    /// Main key bytes in the key arena
    pub main_key: ChunkHandle,

    /// Main-key hash the node was bucketed with
    pub hash: u32,

    /// First record in chain order
    pub head: Option<RecordId>,

    /// Last record in chain order
    pub tail: Option<RecordId>,

    /// Records in the chain, tombstones included
    pub len: usize,

    /// Placeholder for a main key known to exist without data
    pub only_key: bool,

    bucket_next: Option<GroupId>,
}

/// One record of a group
#[derive(Debug)]
pub struct RecordNode {
    pub group: GroupId,

    /// (main key, unique key) hash the node was bucketed with
    pub hash: u32,

    /// Unique key bytes in the data arena
    pub unique_key: ChunkHandle,

    /// Value bytes in the data arena
    pub value: ChunkHandle,

    pub meta: RecordMeta,

    prev: Option<RecordId>,
    next: Option<RecordId>,
    bucket_next: Option<RecordId>,
}

/// Main-key buckets -> groups -> ordered record chains
///
/// Key bytes are never held here, only handles; lookups take the arena the
/// handles point into.
#[derive(Debug)]
pub struct HashIndex {
    groups: Slab<GroupNode>,
    records: Slab<RecordNode>,
    group_buckets: Vec<Option<GroupId>>,
    record_buckets: Vec<Option<RecordId>>,

    /// Shard count; main-key hashes in one shard are all congruent modulo it
    stride: u32,
}

impl HashIndex {
    pub fn new(
        group_capacity: usize,
        record_capacity: usize,
        group_buckets: usize,
        record_buckets: usize,
        stride: u32,
    ) -> Self {
        Self {
            groups: Slab::new(group_capacity),
            records: Slab::new(record_capacity),
            group_buckets: vec![None; group_buckets.max(1)],
            record_buckets: vec![None; record_buckets.max(1)],
            stride: stride.max(1),
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn group_capacity(&self) -> usize {
        self.groups.capacity()
    }

    pub fn record_capacity(&self) -> usize {
        self.records.capacity()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.records.clear();
        self.group_buckets.iter_mut().for_each(|b| *b = None);
        self.record_buckets.iter_mut().for_each(|b| *b = None);
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Locate the group for `main_key`
    pub fn find_group(
        &self,
        keys: &ChunkArena,
        hash: u32,
        main_key: &[u8],
    ) -> Result<Option<GroupId>> {
        let mut cursor = self.group_buckets[self.group_bucket(hash)];
        while let Some(id) = cursor {
            let node = self.group(id)?;
            if node.hash == hash && keys.matches(node.main_key, main_key)? {
                return Ok(Some(id));
            }
            cursor = node.bucket_next;
        }
        Ok(None)
    }

    /// Add an empty group at the front of its bucket
    pub fn insert_group(
        &mut self,
        main_key: ChunkHandle,
        hash: u32,
        only_key: bool,
    ) -> Result<GroupId> {
        let bucket = self.group_bucket(hash);
        let node = GroupNode {
            main_key,
            hash,
            head: None,
            tail: None,
            len: 0,
            only_key,
            bucket_next: self.group_buckets[bucket],
        };
        let id = self.groups.insert(node).map_err(|_| MultiKvError::OutOfSpace {
            requested: std::mem::size_of::<GroupNode>(),
            available: 0,
        })?;
        self.group_buckets[bucket] = Some(GroupId(id));
        Ok(GroupId(id))
    }

    /// Unlink and drop a group that no longer holds records
    pub fn remove_group(&mut self, id: GroupId) -> Result<GroupNode> {
        let (hash, next, len) = {
            let node = self.group(id)?;
            (node.hash, node.bucket_next, node.len)
        };
        if len != 0 {
            return Err(MultiKvError::InvalidHandle(format!(
                "group {} still holds {} records",
                id.0, len
            )));
        }

        let bucket = self.group_bucket(hash);
        if self.group_buckets[bucket] == Some(id) {
            self.group_buckets[bucket] = next;
        } else {
            let mut cursor = self.group_buckets[bucket];
            while let Some(current) = cursor {
                let node = self.group_mut(current)?;
                if node.bucket_next == Some(id) {
                    node.bucket_next = next;
                    break;
                }
                cursor = node.bucket_next;
            }
        }

        self.groups.remove(id.0).ok_or_else(|| missing("group", id.0))
    }

    pub fn group(&self, id: GroupId) -> Result<&GroupNode> {
        self.groups.get(id.0).ok_or_else(|| missing("group", id.0))
    }

    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut GroupNode> {
        self.groups.get_mut(id.0).ok_or_else(|| missing("group", id.0))
    }

    /// Every group, in slot order
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &GroupNode)> {
        self.groups.iter().map(|(id, node)| (GroupId(id), node))
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Locate the record of `group` whose unique key is `unique_key`
    ///
    /// Linear scan of one record bucket; buckets stay short by sizing.
    pub fn find_record(
        &self,
        data: &ChunkArena,
        group: GroupId,
        hash: u32,
        unique_key: &[u8],
    ) -> Result<Option<RecordId>> {
        let mut cursor = self.record_buckets[self.record_bucket(hash)];
        while let Some(id) = cursor {
            let node = self.record(id)?;
            if node.group == group
                && node.hash == hash
                && data.matches(node.unique_key, unique_key)?
            {
                return Ok(Some(id));
            }
            cursor = node.bucket_next;
        }
        Ok(None)
    }

    /// Add a record to its bucket and to the head or tail of its group chain
    pub fn insert_record(
        &mut self,
        group: GroupId,
        hash: u32,
        unique_key: ChunkHandle,
        value: ChunkHandle,
        meta: RecordMeta,
        at_head: bool,
    ) -> Result<RecordId> {
        // Fail before touching anything if the group is gone
        self.group(group)?;

        let bucket = self.record_bucket(hash);
        let node = RecordNode {
            group,
            hash,
            unique_key,
            value,
            meta,
            prev: None,
            next: None,
            bucket_next: self.record_buckets[bucket],
        };
        let id = self.records.insert(node).map_err(|_| MultiKvError::OutOfSpace {
            requested: std::mem::size_of::<RecordNode>(),
            available: 0,
        })?;
        let id = RecordId(id);
        self.record_buckets[bucket] = Some(id);

        self.link(id, at_head)?;
        let node = self.group_mut(group)?;
        node.len += 1;
        node.only_key = false;
        Ok(id)
    }

    /// Unlink a record from its bucket and group chain and drop it
    pub fn remove_record(&mut self, id: RecordId) -> Result<RecordNode> {
        self.unlink(id)?;

        let (hash, next, group) = {
            let node = self.record(id)?;
            (node.hash, node.bucket_next, node.group)
        };
        let bucket = self.record_bucket(hash);
        if self.record_buckets[bucket] == Some(id) {
            self.record_buckets[bucket] = next;
        } else {
            let mut cursor = self.record_buckets[bucket];
            while let Some(current) = cursor {
                let node = self.record_mut(current)?;
                if node.bucket_next == Some(id) {
                    node.bucket_next = next;
                    break;
                }
                cursor = node.bucket_next;
            }
        }

        let node = self.group_mut(group)?;
        node.len = node.len.saturating_sub(1);
        self.records.remove(id.0).ok_or_else(|| missing("record", id.0))
    }

    /// Move a record to the head or tail of its group chain
    pub fn reposition(&mut self, id: RecordId, at_head: bool) -> Result<()> {
        self.unlink(id)?;
        self.link(id, at_head)
    }

    /// Record ids of a group, head to tail or tail to head
    pub fn chain(&self, group: GroupId, from_head: bool) -> Result<Vec<RecordId>> {
        let node = self.group(group)?;
        let mut ids = Vec::with_capacity(node.len);
        let mut cursor = if from_head { node.head } else { node.tail };
        while let Some(id) = cursor {
            if ids.len() > self.records.len() {
                return Err(MultiKvError::InvalidHandle(format!(
                    "cycle in chain of group {}",
                    group.0
                )));
            }
            ids.push(id);
            let record = self.record(id)?;
            cursor = if from_head { record.next } else { record.prev };
        }
        Ok(ids)
    }

    pub fn record(&self, id: RecordId) -> Result<&RecordNode> {
        self.records.get(id.0).ok_or_else(|| missing("record", id.0))
    }

    pub fn record_mut(&mut self, id: RecordId) -> Result<&mut RecordNode> {
        self.records.get_mut(id.0).ok_or_else(|| missing("record", id.0))
    }

    /// Every record, in slot order
    pub fn records(&self) -> impl Iterator<Item = (RecordId, &RecordNode)> {
        self.records.iter().map(|(id, node)| (RecordId(id), node))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn group_bucket(&self, hash: u32) -> usize {
        (hash / self.stride) as usize % self.group_buckets.len()
    }

    fn record_bucket(&self, hash: u32) -> usize {
        hash as usize % self.record_buckets.len()
    }

    fn link(&mut self, id: RecordId, at_head: bool) -> Result<()> {
        let group = self.record(id)?.group;
        let (head, tail) = {
            let node = self.group(group)?;
            (node.head, node.tail)
        };

        if at_head {
            {
                let record = self.record_mut(id)?;
                record.prev = None;
                record.next = head;
            }
            match head {
                Some(old) => self.record_mut(old)?.prev = Some(id),
                None => self.group_mut(group)?.tail = Some(id),
            }
            self.group_mut(group)?.head = Some(id);
        } else {
            {
                let record = self.record_mut(id)?;
                record.prev = tail;
                record.next = None;
            }
            match tail {
                Some(old) => self.record_mut(old)?.next = Some(id),
                None => self.group_mut(group)?.head = Some(id),
            }
            self.group_mut(group)?.tail = Some(id);
        }
        Ok(())
    }

    fn unlink(&mut self, id: RecordId) -> Result<()> {
        let (group, prev, next) = {
            let record = self.record(id)?;
            (record.group, record.prev, record.next)
        };

        match prev {
            Some(p) => self.record_mut(p)?.next = next,
            None => self.group_mut(group)?.head = next,
        }
        match next {
            Some(n) => self.record_mut(n)?.prev = prev,
            None => self.group_mut(group)?.tail = prev,
        }

        let record = self.record_mut(id)?;
        record.prev = None;
        record.next = None;
        Ok(())
    }
}

fn missing(kind: &str, id: u32) -> MultiKvError {
    MultiKvError::InvalidHandle(format!("{} node {} missing", kind, id))
}
