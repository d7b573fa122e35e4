//! Per-entity-type isolated caches.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::app_cache::{AppCache, ObjectCache};
use crate::entity::Entity;

struct Isolated {
    type_name: &'static str,
    cache: Arc<ObjectCache>,
}

/// A set of caches keyed by entity type, each created on first use.
///
/// The process owns one set for the global repository cache; every `Scoped` scope owns
/// (or shares with its parent) another.
pub struct IsolatedCaches {
    owner: String,
    caches: DashMap<TypeId, Isolated>,
}

impl IsolatedCaches {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            caches: DashMap::new(),
        }
    }

    pub fn get_or_create<E: Entity>(&self) -> Arc<ObjectCache> {
        let entry = self.caches.entry(TypeId::of::<E>()).or_insert_with(|| {
            debug!(owner = %self.owner, entity = E::TYPE_NAME, "Created isolated cache");
            Isolated {
                type_name: E::TYPE_NAME,
                cache: Arc::new(ObjectCache::new(format!("{}:{}", self.owner, E::TYPE_NAME))),
            }
        });
        Arc::clone(&entry.cache)
    }

    pub fn get<E: Entity>(&self) -> Option<Arc<ObjectCache>> {
        self.caches
            .get(&TypeId::of::<E>())
            .map(|entry| Arc::clone(&entry.cache))
    }

    pub fn clear<E: Entity>(&self) {
        self.clear_type(TypeId::of::<E>());
    }

    /// Clears the cache for a type if one exists; no cache is created.
    pub fn clear_type(&self, type_id: TypeId) {
        let cache = self
            .caches
            .get(&type_id)
            .map(|entry| Arc::clone(&entry.cache));
        if let Some(cache) = cache {
            cache.clear();
        }
    }

    /// Types that have had a cache created in this set.
    pub fn type_ids(&self) -> Vec<TypeId> {
        self.caches.iter().map(|entry| *entry.key()).collect()
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.caches.iter().map(|entry| entry.type_name).collect()
    }

    pub fn clear_all(&self) {
        let caches: Vec<_> = self
            .caches
            .iter()
            .map(|entry| Arc::clone(&entry.cache))
            .collect();
        for cache in caches {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl std::fmt::Debug for IsolatedCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedCaches")
            .field("owner", &self.owner)
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::cache::{AppCacheExt, Expiration};
    use crate::entity::EntityKind;

    #[derive(Clone)]
    struct Apple(i32);

    impl Entity for Apple {
        const TYPE_NAME: &'static str = "Apple";
        const KIND: EntityKind = EntityKind::Other;

        fn id(&self) -> i32 {
            self.0
        }

        fn key(&self) -> Uuid {
            Uuid::nil()
        }
    }

    #[derive(Clone)]
    struct Pear;

    impl Entity for Pear {
        const TYPE_NAME: &'static str = "Pear";
        const KIND: EntityKind = EntityKind::Other;

        fn id(&self) -> i32 {
            1
        }

        fn key(&self) -> Uuid {
            Uuid::nil()
        }
    }

    #[test]
    fn caches_are_created_once_per_type() {
        let caches = IsolatedCaches::new("global");
        let first = caches.get_or_create::<Apple>();
        let second = caches.get_or_create::<Apple>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "global:Apple");
        assert!(caches.get::<Pear>().is_none());
        assert_eq!(caches.len(), 1);
    }

    #[test]
    fn clearing_one_type_keeps_the_others() {
        let caches = IsolatedCaches::new("global");
        caches
            .get_or_create::<Apple>()
            .insert_typed("a", Apple(1), Expiration::Never);
        caches
            .get_or_create::<Pear>()
            .insert_typed("p", Pear, Expiration::Never);

        caches.clear::<Apple>();

        assert!(caches.get_or_create::<Apple>().is_empty());
        assert!(caches.get_or_create::<Pear>().contains_key("p"));
    }
}
