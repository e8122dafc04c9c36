//! Record Module
//!
//! Per-record metadata and the rules that decide whether a read, write or
//! delete against it succeeds.
//!
//! ## States
//! ```text
//!            set                     delete (version ok)
//!   (new) ────────▶ Live ───────────────────────────────▶ Deleted
//!                    ▲  │ set (version++)                    │
//!                    │  └────────┐                            │
//!                    └───────────┴──── set (resurrect) ◀──────┘
//! ```
//! `Expired` is never stored: an enforced read compares `expire_at` with the
//! caller's clock. `dirty` is an orthogonal flag that only the write paths and
//! `set_dirty` / `set_clean` touch.
//!
//! ## Versions
//! An 8-bit fence. 0 means "caller does not care" and is never stored, so the
//! counter runs 1..=255 and wraps from 255 back to 1.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{MultiKvError, Result};

/// Version value that disables the fence
pub const VERSION_ANY: u8 = 0;

/// Version a record is created with, before its first write is applied
pub const VERSION_INITIAL: u8 = 1;

/// What a `set` does with the soft-delete mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeleteMark {
    /// Leave the mark as it is
    Keep,

    /// Write the value and mark the record deleted at `at` (seconds)
    ///
    /// A record that already carries the mark keeps its original stamp.
    Set { at: u32 },

    /// Write the value and clear the mark (resurrects a deleted record)
    #[default]
    Clear,
}

/// Read-time classification of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Live,
    Deleted,
    Expired,
}

/// Metadata carried by every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Compare-and-swap fence (never 0 once stored)
    pub version: u8,

    /// Pending change not yet written back
    pub dirty: bool,

    /// Soft-delete mark
    pub deleted: bool,

    /// Absolute expiry (seconds); 0 never expires
    pub expire_at: u32,

    /// Last write-back reconciliation (seconds)
    pub sync_time: u32,

    /// When the soft-delete mark was set (seconds); 0 if never
    pub deleted_at: u32,
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self {
            version: VERSION_INITIAL,
            dirty: false,
            deleted: false,
            expire_at: 0,
            sync_time: 0,
            deleted_at: 0,
        }
    }
}

impl RecordMeta {
    /// Metadata of a freshly inserted record, first write already applied
    pub fn inserted(dirty: bool, expire_at: u32, mark: DeleteMark) -> Self {
        let mut meta = Self::default();
        meta.apply_write(dirty, expire_at, mark);
        meta
    }

    /// Fail with `VersionMismatch` unless `expected` is 0 or equals the stored version
    pub fn check_version(&self, expected: u8) -> Result<()> {
        if expected != VERSION_ANY && expected != self.version {
            return Err(MultiKvError::VersionMismatch {
                expected,
                actual: self.version,
            });
        }
        Ok(())
    }

    /// Step the version, wrapping 255 -> 1
    pub fn advance_version(&mut self) {
        self.version = match self.version.wrapping_add(1) {
            VERSION_ANY => VERSION_INITIAL,
            next => next,
        };
    }

    /// Whether the record is past its expiry at `now`
    pub fn is_expired(&self, now: u32) -> bool {
        self.expire_at != 0 && now >= self.expire_at
    }

    /// Classify the record; `now` enables expiry enforcement
    pub fn state(&self, now: Option<u32>) -> RecordState {
        match now {
            Some(now) if self.is_expired(now) => RecordState::Expired,
            _ if self.deleted => RecordState::Deleted,
            _ => RecordState::Live,
        }
    }

    /// `Ok` only when a read may return the record
    pub fn readable(&self, now: Option<u32>) -> Result<()> {
        match self.state(now) {
            RecordState::Live => Ok(()),
            RecordState::Deleted => Err(MultiKvError::Deleted),
            RecordState::Expired => Err(MultiKvError::Expired),
        }
    }

    /// Versioned overwrite of an existing record
    ///
    /// Nothing changes when the fence rejects the write.
    pub fn apply_set(
        &mut self,
        expected_version: u8,
        dirty: bool,
        expire_at: u32,
        mark: DeleteMark,
    ) -> Result<()> {
        self.check_version(expected_version)?;
        self.apply_write(dirty, expire_at, mark);
        Ok(())
    }

    /// Soft delete, optionally fenced by `expected_version`
    ///
    /// A delete has to reach the backing store, so it leaves the record dirty.
    pub fn apply_delete(&mut self, expected_version: u8, now: u32) -> Result<()> {
        if self.deleted {
            return Err(MultiKvError::Deleted);
        }
        self.check_version(expected_version)?;

        self.deleted = true;
        self.deleted_at = now;
        self.dirty = true;
        self.advance_version();
        Ok(())
    }

    fn apply_write(&mut self, dirty: bool, expire_at: u32, mark: DeleteMark) {
        self.advance_version();
        self.dirty = dirty;
        self.expire_at = expire_at;
        match mark {
            DeleteMark::Keep => {}
            DeleteMark::Set { at } => {
                if !self.deleted {
                    self.deleted = true;
                    self.deleted_at = at;
                }
            }
            DeleteMark::Clear => {
                self.deleted = false;
                self.deleted_at = 0;
            }
        }
    }
}

/// A record copied out of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    pub unique_key: Bytes,
    pub value: Bytes,
    pub meta: RecordMeta,
}

/// A dirty record handed to the write-back scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRecord {
    pub main_key: Bytes,
    pub unique_key: Bytes,
    pub value: Bytes,
    pub version: u8,
    pub deleted: bool,
}
