use std::fmt;
use std::sync::Arc;

use log::warn;

use mapch_model::SpotId;

use super::{CacheError, CacheResult, KeyValueStore};

pub fn photo_cache_key(id: SpotId) -> String {
    format!("photo_cache_spot_v2_{id}")
}

/// Last-known photo path list per spot, stored as a JSON array.
#[derive(Clone)]
pub struct PhotoCache {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for PhotoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoCache").finish_non_exhaustive()
    }
}

impl PhotoCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn try_load(&self, id: SpotId) -> CacheResult<Vec<String>> {
        let key = photo_cache_key(id);
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| CacheError::Decode { key, source }),
            None => Ok(Vec::new()),
        }
    }

    /// Cached paths for `id`; an unreadable entry counts as empty.
    pub async fn load(&self, id: SpotId) -> Vec<String> {
        self.try_load(id).await.unwrap_or_else(|err| {
            warn!("[PhotoCache] ignoring cache entry for spot {id}: {err}");
            Vec::new()
        })
    }

    pub async fn store(&self, id: SpotId, paths: &[String]) {
        let key = photo_cache_key(id);
        let result = match serde_json::to_vec(paths) {
            Ok(bytes) => self.store.put(&key, &bytes).await,
            Err(source) => Err(CacheError::Decode { key, source }),
        };
        if let Err(err) = result {
            warn!("[PhotoCache] failed to persist photos for spot {id}: {err}");
        }
    }

    pub async fn clear(&self, id: SpotId) -> CacheResult<()> {
        self.store.remove(&photo_cache_key(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::cache::MemoryStore;

    #[test]
    fn key_is_versioned_per_spot() {
        assert_eq!(photo_cache_key(SpotId(42)), "photo_cache_spot_v2_42");
    }

    #[tokio::test]
    async fn stored_paths_load_back() {
        let cache = PhotoCache::new(Arc::new(MemoryStore::new()));
        let paths = vec!["photo/a.jpg".to_string(), "photo/b.jpg".to_string()];
        cache.store(SpotId(1), &paths).await;
        assert_eq!(cache.load(SpotId(1)).await, paths);
        assert!(cache.load(SpotId(2)).await.is_empty());
    }

    #[tokio::test]
    async fn garbage_entry_loads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(&photo_cache_key(SpotId(3)), b"not json")
            .await
            .expect("put");
        let cache = PhotoCache::new(store);
        assert!(matches!(
            cache.try_load(SpotId(3)).await,
            Err(CacheError::Decode { .. })
        ));
        assert!(cache.load(SpotId(3)).await.is_empty());
    }
}
