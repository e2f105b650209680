use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use super::{CacheError, CacheResult, KeyValueStore};

/// Directory managed by `cacache` (index plus content-addressed blobs).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheRoot(PathBuf);

impl CacheRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for CacheRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheRoot").field(&self.0).finish()
    }
}

/// [`KeyValueStore`] persisted on disk through `cacache`.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: CacheRoot,
}

impl DiskStore {
    pub fn new(root: CacheRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }
}

fn map_cacache(key: &str, err: cacache::Error) -> CacheError {
    match err {
        cacache::Error::IntegrityError(err) => CacheError::Corrupt {
            key: key.to_string(),
            message: err.to_string(),
        },
        cacache::Error::SizeMismatch(wanted, actual) => CacheError::Corrupt {
            key: key.to_string(),
            message: format!("size mismatch: wanted={wanted}, actual={actual}"),
        },
        other => CacheError::Io(other.to_string()),
    }
}

#[async_trait]
impl KeyValueStore for DiskStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match cacache::read(self.root.as_path(), key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(cacache::Error::EntryNotFound(_, _)) => {
                debug!("[DiskStore] miss: {key}");
                Ok(None)
            }
            Err(err) => Err(map_cacache(key, err)),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        cacache::write(self.root.as_path(), key, value)
            .await
            .map(|_| ())
            .map_err(|e| map_cacache(key, e))
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        cacache::index::RemoveOpts::new()
            .remove_fully(true)
            .remove(self.root.as_path(), key)
            .await
            .map_err(|e| map_cacache(key, e))
    }
}
