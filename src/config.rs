//! Configuration for MultiKV
//!
//! Centralized configuration with sensible defaults. Everything here is fixed
//! once the store is opened; shard count and chunk geometry cannot be resized.

use serde::{Deserialize, Serialize};

use crate::error::{MultiKvError, Result};

/// Main configuration for a MultiKV store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Region Layout
    // -------------------------------------------------------------------------
    /// Number of independently locked shards the region is split into
    pub shard_count: usize,

    /// Total bytes of the backing region, shared evenly by all shards
    pub total_size: usize,

    /// Average main key size hint (bytes). 0 means "same as `data_size`"
    pub main_key_size: usize,

    /// Average record size hint (bytes); sizes one data chunk
    pub data_size: usize,

    /// Chunks per hash bucket, used to size both bucket arrays
    pub hash_ratio: usize,

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Identifier shared by every attachment of the same store
    pub lock_id: u64,

    /// Layout of the records under a main key
    pub key_type: KeyType,

    // -------------------------------------------------------------------------
    // Runtime Flags (initial values)
    // -------------------------------------------------------------------------
    /// Reclaim soft-deleted records once their delete has been synced
    pub auto_erase: bool,

    /// Start in read-only mode
    pub read_only: bool,
}

/// Record layout under a main key
///
/// Only `Hash` (main key -> many sub-records keyed by unique key) is served by
/// this crate; the other layouts are separate stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyType {
    Hash = 0,
    Set = 1,
    SortedSet = 2,
    List = 3,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: 10,
            total_size: 64 * 1024 * 1024, // 64 MB
            main_key_size: 0,
            data_size: 128,
            hash_ratio: 2,
            lock_id: 0,
            key_type: KeyType::Hash,
            auto_erase: false,
            read_only: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Bytes of region owned by each shard
    pub fn shard_size(&self) -> usize {
        self.total_size / self.shard_count.max(1)
    }

    /// Chunk payload size used for main keys
    pub fn main_key_chunk_size(&self) -> usize {
        if self.main_key_size == 0 {
            self.data_size
        } else {
            self.main_key_size
        }
    }

    /// Check the parameters before any memory is reserved
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(MultiKvError::Config("shard_count must be at least 1".into()));
        }
        if self.data_size == 0 {
            return Err(MultiKvError::Config("data_size must be at least 1".into()));
        }
        if self.hash_ratio == 0 {
            return Err(MultiKvError::Config("hash_ratio must be at least 1".into()));
        }
        if self.key_type != KeyType::Hash {
            return Err(MultiKvError::Config(format!(
                "key type {:?} is not served by this store",
                self.key_type
            )));
        }
        if self.total_size == 0 {
            return Err(MultiKvError::Config("total_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Parse a human size string: "1G", "512M", "64K" or plain bytes
pub fn parse_size(input: &str) -> Result<usize> {
    let trimmed = input.trim();
    let (digits, unit) = match trimmed.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((pos, _)) => trimmed.split_at(pos),
        None => (trimmed, ""),
    };

    let base: usize = digits
        .parse()
        .map_err(|_| MultiKvError::Config(format!("invalid size: {:?}", input)))?;

    let multiplier = match unit.to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => return Err(MultiKvError::Config(format!("invalid size unit: {:?}", input))),
    };

    base.checked_mul(multiplier)
        .ok_or_else(|| MultiKvError::Config(format!("size overflows: {:?}", input)))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of shards
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set the total region size (in bytes)
    pub fn total_size(mut self, size: usize) -> Self {
        self.config.total_size = size;
        self
    }

    /// Set the main key size hint (in bytes)
    pub fn main_key_size(mut self, size: usize) -> Self {
        self.config.main_key_size = size;
        self
    }

    /// Set the record size hint (in bytes)
    pub fn data_size(mut self, size: usize) -> Self {
        self.config.data_size = size;
        self
    }

    /// Set the chunk-to-bucket ratio
    pub fn hash_ratio(mut self, ratio: usize) -> Self {
        self.config.hash_ratio = ratio;
        self
    }

    /// Set the shared lock identifier
    pub fn lock_id(mut self, id: u64) -> Self {
        self.config.lock_id = id;
        self
    }

    /// Set the key type discriminant
    pub fn key_type(mut self, key_type: KeyType) -> Self {
        self.config.key_type = key_type;
        self
    }

    /// Enable or disable automatic reclamation of synced tombstones
    pub fn auto_erase(mut self, enabled: bool) -> Self {
        self.config.auto_erase = enabled;
        self
    }

    /// Open the store in read-only mode
    pub fn read_only(mut self, enabled: bool) -> Self {
        self.config.read_only = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
