//! # MultiKV
//!
//! The in-memory record store of a cache node:
//! - Main key -> group of records, each record keyed by a unique key
//! - Fixed, pre-sized memory carved into chunks (no growth after open)
//! - One lock per shard, shard chosen from the main-key hash
//! - Per-record version fence, dirty flag, soft delete and expiry
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MultiHashMap                            │
//! │        (read-only gate, hashing, shard selection)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ main-key hash % shards
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   ShardLockSet                               │
//! │              (one Mutex per shard)                           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  HashIndex  │ handles  │ ChunkArena  │
//!   │ (two-level) │────────▶ │ keys / data │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ RecordMeta  │
//!   │ (versions,  │
//!   │ dirty, ttl) │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod hash;

pub mod chunk;
pub mod lock;
pub mod index;
pub mod record;
pub mod store;
pub mod status;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, KeyType};
pub use error::{MultiKvError, Result};
pub use hash::{Crc32Hash, Hashers, MainKeyHash, RecordHash};
pub use record::{DeleteMark, DirtyRecord, RecordMeta, RecordView};
pub use status::Status;
pub use store::{MainKeyState, MultiHashMap, SetOptions, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of MultiKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
