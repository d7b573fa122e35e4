use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use super::keys::PublishedKey;
use crate::cache::{AppCache, AppCacheExt, CacheRegion, Expiration, ObjectCache};
use crate::repository::RepoResult;

/// One published region plus the lifetime its entries are written with.
#[derive(Debug, Clone)]
pub(crate) struct RegionCache {
    region: CacheRegion,
    cache: Arc<ObjectCache>,
    expiration: Expiration,
}

impl RegionCache {
    pub(crate) fn new(region: CacheRegion, cache: Arc<ObjectCache>, expiration: Expiration) -> Self {
        Self {
            region,
            cache,
            expiration,
        }
    }

    /// Read-through lookup of a single value. `Ok(None)` results are not stored.
    pub(crate) fn get_or_set<T, F>(&self, key: &PublishedKey, factory: F) -> RepoResult<Option<T>>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> RepoResult<Option<T>> + Send,
    {
        debug_assert_eq!(key.region(), self.region);
        let cache_key = key.to_cache_key();
        trace!(region = %self.region, cache_key = %cache_key, "Published cache lookup");
        self.cache.get_or_add_typed(&cache_key, self.expiration, factory)
    }

    /// Read-through lookup of an identifier list; empty lists are cached too.
    pub(crate) fn get_or_set_list<T, F>(&self, key: &PublishedKey, factory: F) -> RepoResult<Vec<T>>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> RepoResult<Vec<T>> + Send,
    {
        let list = self.get_or_set(key, || factory().map(Some))?;
        Ok(list.unwrap_or_default())
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }
}
