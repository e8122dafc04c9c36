//! Hash functions
//!
//! The store hashes twice: once over the main key alone (selects the shard and
//! the main-key bucket) and once over the (main key, unique key) pair (selects
//! the record bucket). Both are capabilities injected at construction, so a
//! serving layer can plug in whatever hash its peers agree on.

use std::sync::Arc;

/// Hash over main key bytes
pub trait MainKeyHash: Send + Sync {
    fn hash_main_key(&self, main_key: &[u8]) -> u32;
}

/// Hash over a (main key, unique key) pair
pub trait RecordHash: Send + Sync {
    fn hash_record(&self, main_key: &[u8], unique_key: &[u8]) -> u32;
}

impl<F> MainKeyHash for F
where
    F: Fn(&[u8]) -> u32 + Send + Sync,
{
    fn hash_main_key(&self, main_key: &[u8]) -> u32 {
        self(main_key)
    }
}

impl<F> RecordHash for F
where
    F: Fn(&[u8], &[u8]) -> u32 + Send + Sync,
{
    fn hash_record(&self, main_key: &[u8], unique_key: &[u8]) -> u32 {
        self(main_key, unique_key)
    }
}

/// Default hash: CRC32 over the key bytes, pair hashed as the concatenation
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Hash;

impl MainKeyHash for Crc32Hash {
    fn hash_main_key(&self, main_key: &[u8]) -> u32 {
        crc32fast::hash(main_key)
    }
}

impl RecordHash for Crc32Hash {
    fn hash_record(&self, main_key: &[u8], unique_key: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(main_key);
        hasher.update(unique_key);
        hasher.finalize()
    }
}

/// The pair of hash functions a store is built with
#[derive(Clone)]
pub struct Hashers {
    pub main_key: Arc<dyn MainKeyHash>,
    pub record: Arc<dyn RecordHash>,
}

impl Hashers {
    pub fn new(main_key: impl MainKeyHash + 'static, record: impl RecordHash + 'static) -> Self {
        Self {
            main_key: Arc::new(main_key),
            record: Arc::new(record),
        }
    }
}

impl Default for Hashers {
    fn default() -> Self {
        Self::new(Crc32Hash, Crc32Hash)
    }
}

impl std::fmt::Debug for Hashers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hashers").finish_non_exhaustive()
    }
}
