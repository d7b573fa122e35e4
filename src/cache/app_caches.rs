use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::app_cache::{AppCache, ObjectCache};
use super::isolated::IsolatedCaches;
use super::region::CacheRegion;

/// Process-wide cache registry: the runtime cache, the global isolated caches used by
/// repository policies outside of `Scoped` scopes, and the published-content regions.
#[derive(Debug)]
pub struct AppCaches {
    runtime: Arc<ObjectCache>,
    isolated: Arc<IsolatedCaches>,
    regions: DashMap<CacheRegion, Arc<ObjectCache>>,
}

impl AppCaches {
    pub fn new() -> Self {
        Self {
            runtime: Arc::new(ObjectCache::new("runtime")),
            isolated: Arc::new(IsolatedCaches::new("global")),
            regions: DashMap::new(),
        }
    }

    pub fn runtime_cache(&self) -> &Arc<ObjectCache> {
        &self.runtime
    }

    pub fn isolated_caches(&self) -> &Arc<IsolatedCaches> {
        &self.isolated
    }

    pub fn region(&self, region: CacheRegion) -> Arc<ObjectCache> {
        let entry = self
            .regions
            .entry(region)
            .or_insert_with(|| Arc::new(ObjectCache::new(region.prefix())));
        Arc::clone(&entry)
    }

    pub fn clear_region(&self, region: CacheRegion) {
        let cache = self.regions.get(&region).map(|entry| Arc::clone(&entry));
        if let Some(cache) = cache {
            cache.clear();
        }
    }

    /// Drops everything: runtime entries, every isolated cache and every region.
    pub fn clear_all(&self) {
        self.runtime.clear();
        self.isolated.clear_all();
        for region in CacheRegion::ALL {
            self.clear_region(region);
        }
        info!("Cleared all application caches");
    }
}

impl Default for AppCaches {
    fn default() -> Self {
        Self::new()
    }
}
