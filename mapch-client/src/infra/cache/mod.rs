//! Small key-value persistence for client-side fallbacks.

pub mod disk;
pub mod memory;
pub mod photos;

use async_trait::async_trait;
use thiserror::Error;

pub use disk::{CacheRoot, DiskStore};
pub use memory::MemoryStore;
pub use photos::{PhotoCache, photo_cache_key};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(String),

    #[error("cache entry '{key}' failed integrity check: {message}")]
    Corrupt { key: String, message: String },

    #[error("cache entry '{key}' could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Byte-oriented store keyed by string. Missing keys read as `None`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: &[u8]) -> CacheResult<()>;

    async fn remove(&self, key: &str) -> CacheResult<()>;
}
