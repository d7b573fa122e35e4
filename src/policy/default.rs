//! Per-item caching.
//!
//! Each entity lives under `uRepo_<Type>_<id>`. A cached "get all" answer is whatever
//! per-item entries sit under the `uRepo_<Type>_` prefix; the bare prefix key itself only
//! ever holds the empty-collection marker, and every write evicts it.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    PolicyKind, RepositoryCachePolicy, RepositoryCachePolicyOptions, ScopedCache,
    entity_cache_key, entity_type_cache_key,
};
use crate::cache::{AppCache, AppCacheExt, AppCaches, Expiration};
use crate::entity::{CacheId, Entity};
use crate::repository::{
    AsyncDeleteFn, AsyncExistsFn, AsyncGetAllFn, AsyncGetFn, AsyncPersistFn, DeleteFn, ExistsFn,
    GetAllFn, GetFn, PersistFn, RepoResult, cancellable,
};
use crate::scoping::Scope;

/// Marker stored under the type key when "get all" legitimately returned nothing.
#[derive(Debug, Clone, Copy)]
struct EmptyCollection;

pub struct DefaultRepositoryCachePolicy<E, I> {
    cache: ScopedCache<E>,
    options: RepositoryCachePolicyOptions,
    expiration: Expiration,
    caches_collections: bool,
    _id: PhantomData<fn() -> I>,
}

impl<E: Entity, I: CacheId> DefaultRepositoryCachePolicy<E, I> {
    pub fn new(
        caches: Arc<AppCaches>,
        options: RepositoryCachePolicyOptions,
        expiration: Expiration,
    ) -> Self {
        Self {
            cache: ScopedCache::new(caches),
            options,
            expiration,
            caches_collections: true,
            _id: PhantomData,
        }
    }

    /// Same behaviour, except "get all" results are never written to the cache.
    pub(crate) fn without_collections(mut self) -> Self {
        self.caches_collections = false;
        self
    }

    pub fn options(&self) -> &RepositoryCachePolicyOptions {
        &self.options
    }

    /// Looks for a cached answer to a "get all" query.
    fn cached_collection(&self, cache: &dyn AppCache, ids: &[I]) -> RepoResult<Option<Vec<E>>> {
        if !ids.is_empty() {
            let found: Vec<E> = ids
                .iter()
                .filter_map(|id| cache.get_typed::<E>(&entity_cache_key::<E, I>(id)))
                .collect();
            return Ok((found.len() == ids.len()).then_some(found));
        }

        let type_key = entity_type_cache_key::<E>();
        let cached: Vec<E> = cache
            .search_by_key_prefix(&type_key)
            .into_iter()
            .filter_map(|value| value.downcast_ref::<E>().cloned())
            .collect();

        if cached.is_empty() {
            let empty = self.options.get_all_allow_zero_count
                && cache.get_typed::<EmptyCollection>(&type_key).is_some();
            return Ok(empty.then(Vec::new));
        }

        if !self.options.get_all_validate_count {
            return Ok(Some(cached));
        }
        match self.options.perform_count.as_ref() {
            Some(count) if count()? == cached.len() => Ok(Some(cached)),
            _ => {
                debug!(
                    entity = E::TYPE_NAME,
                    cached = cached.len(),
                    "Cached collection failed count validation"
                );
                Ok(None)
            }
        }
    }

    fn insert_entities(&self, cache: &dyn AppCache, ids: &[I], entities: &[E]) {
        if !self.caches_collections {
            return;
        }

        if ids.is_empty() && entities.is_empty() {
            if self.options.get_all_allow_zero_count {
                cache.insert_typed(
                    &entity_type_cache_key::<E>(),
                    EmptyCollection,
                    self.expiration,
                );
            }
            return;
        }

        for entity in entities.iter().filter(|entity| entity.has_identity()) {
            cache.insert_typed(
                &entity_cache_key::<E, I>(&I::of(entity)),
                entity.clone(),
                self.expiration,
            );
        }
    }

    /// Applies the outcome of a create or update to the cache.
    fn after_write(
        &self,
        cache: &dyn AppCache,
        key_before: &str,
        result: RepoResult<E>,
    ) -> RepoResult<E> {
        let type_key = entity_type_cache_key::<E>();
        match result {
            Ok(entity) => {
                if entity.has_identity() {
                    cache.insert_typed(
                        &entity_cache_key::<E, I>(&I::of(&entity)),
                        entity.clone(),
                        self.expiration,
                    );
                }
                cache.remove(&type_key);
                Ok(entity)
            }
            Err(err) => {
                cache.remove(key_before);
                cache.remove(&type_key);
                Err(err)
            }
        }
    }

    fn after_delete(&self, cache: &dyn AppCache, entity: &E) {
        cache.remove(&entity_cache_key::<E, I>(&I::of(entity)));
        cache.remove(&entity_type_cache_key::<E>());
    }
}

#[async_trait]
impl<E: Entity, I: CacheId> RepositoryCachePolicy<E, I> for DefaultRepositoryCachePolicy<E, I> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Default
    }

    fn get(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_get: &GetFn<'_, E, I>,
        _perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Option<E>> {
        let cache = self.cache.resolve(scope);
        let mut uncached = None;
        let cached = cache.get_or_add_typed(&entity_cache_key::<E, I>(id), self.expiration, || {
            match perform_get(id)? {
                Some(entity) if entity.has_identity() => Ok(Some(entity)),
                other => {
                    uncached = other;
                    Ok(None)
                }
            }
        })?;
        Ok(cached.or(uncached))
    }

    async fn get_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_get: &AsyncGetFn<'_, E, I>,
        _perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>> {
        let cache = self.cache.resolve(scope);
        let key = entity_cache_key::<E, I>(id);
        let mut uncached = None;
        let cached = {
            let uncached = &mut uncached;
            let fetch = async move {
                let fetched: RepoResult<Option<E>> = perform_get(id.clone()).await;
                fetched.map(|found| match found {
                    Some(entity) if entity.has_identity() => Some(entity),
                    other => {
                        *uncached = other;
                        None
                    }
                })
            };
            cancellable(cancel, cache.get_or_add_typed_async(&key, self.expiration, fetch)).await?
        };
        Ok(cached.or(uncached))
    }

    fn get_cached(&self, scope: Option<&Scope>, id: &I) -> Option<E> {
        self.cache
            .resolve(scope)
            .get_typed::<E>(&entity_cache_key::<E, I>(id))
    }

    fn exists(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_exists: &ExistsFn<'_, I>,
        _perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<bool> {
        if self.get_cached(scope, id).is_some() {
            return Ok(true);
        }
        perform_exists(id)
    }

    async fn exists_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_exists: &AsyncExistsFn<'_, I>,
        _perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<bool> {
        if self.get_cached(scope, id).is_some() {
            return Ok(true);
        }
        cancellable(cancel, perform_exists(id.clone())).await
    }

    fn create(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        let key_before = entity_cache_key::<E, I>(&I::of(&entity));
        let result = persist_new(entity);
        self.after_write(self.cache.resolve(scope).as_ref(), &key_before, result)
    }

    async fn create_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        let key_before = entity_cache_key::<E, I>(&I::of(&entity));
        let result = cancellable(cancel, persist_new(entity)).await;
        self.after_write(self.cache.resolve(scope).as_ref(), &key_before, result)
    }

    fn update(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        let key_before = entity_cache_key::<E, I>(&I::of(&entity));
        let result = persist_updated(entity);
        self.after_write(self.cache.resolve(scope).as_ref(), &key_before, result)
    }

    async fn update_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        let key_before = entity_cache_key::<E, I>(&I::of(&entity));
        let result = cancellable(cancel, persist_updated(entity)).await;
        self.after_write(self.cache.resolve(scope).as_ref(), &key_before, result)
    }

    fn delete(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &DeleteFn<'_, E>,
    ) -> RepoResult<()> {
        let result = persist_deleted(entity);
        self.after_delete(self.cache.resolve(scope).as_ref(), entity);
        result
    }

    async fn delete_async(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &AsyncDeleteFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        let result = cancellable(cancel, persist_deleted(entity.clone())).await;
        self.after_delete(self.cache.resolve(scope).as_ref(), entity);
        result
    }

    fn get_all(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Vec<E>> {
        let cache = self.cache.resolve(scope);
        if let Some(found) = self.cached_collection(cache.as_ref(), ids)? {
            return Ok(found);
        }
        let entities = perform_get_all(ids)?;
        self.insert_entities(cache.as_ref(), ids, &entities);
        Ok(entities)
    }

    async fn get_all_async(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>> {
        if let Some(found) = self.cached_collection(self.cache.resolve(scope).as_ref(), ids)? {
            return Ok(found);
        }
        let entities = cancellable(cancel, perform_get_all(ids.to_vec())).await?;
        self.insert_entities(self.cache.resolve(scope).as_ref(), ids, &entities);
        Ok(entities)
    }

    fn clear_all(&self, scope: Option<&Scope>) {
        self.cache
            .resolve(scope)
            .clear_by_key_prefix(&entity_type_cache_key::<E>());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::policy::testing::{FakeRepository, Template};

    fn policy(options: RepositoryCachePolicyOptions) -> DefaultRepositoryCachePolicy<Template, i32> {
        DefaultRepositoryCachePolicy::new(
            Arc::new(AppCaches::new()),
            options,
            Expiration::Never,
        )
    }

    fn seeded() -> FakeRepository {
        FakeRepository::seeded(&[Template::new(1, "home"), Template::new(2, "blog")])
    }

    #[test]
    fn get_caches_fetched_entity() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());

        for _ in 0..3 {
            let found = policy
                .get(None, &1, &|id| repo.get(id), &|ids| repo.get_all(ids))
                .unwrap();
            assert_eq!(found, Some(Template::new(1, "home")));
        }
        assert_eq!(repo.gets.load(Ordering::SeqCst), 1);
        assert_eq!(policy.get_cached(None, &1), Some(Template::new(1, "home")));
    }

    #[test]
    fn missing_entity_is_not_cached() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());

        assert_eq!(
            policy
                .get(None, &9, &|id| repo.get(id), &|ids| repo.get_all(ids))
                .unwrap(),
            None
        );
        policy
            .get(None, &9, &|id| repo.get(id), &|ids| repo.get_all(ids))
            .unwrap();
        assert_eq!(repo.gets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn entity_without_identity_is_returned_but_not_cached() {
        let policy = policy(RepositoryCachePolicyOptions::default());
        let draft = Template::new(0, "draft");

        let found = policy
            .get(None, &0, &|_| Ok(Some(draft.clone())), &|_| Ok(Vec::new()))
            .unwrap();
        assert_eq!(found, Some(draft));
        assert_eq!(policy.get_cached(None, &0), None);
    }

    #[test]
    fn create_caches_persisted_entity() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions {
            get_all_validate_count: false,
            ..Default::default()
        });
        policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();

        let created = policy
            .create(None, Template::new(0, "news"), &|entity| repo.save(entity))
            .unwrap();

        assert!(created.has_identity());
        assert_eq!(policy.get_cached(None, &created.id), Some(created.clone()));
        let all = policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn failed_update_evicts_entity() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        policy
            .get(None, &1, &|id| repo.get(id), &|ids| repo.get_all(ids))
            .unwrap();

        repo.fail_writes.store(true, Ordering::SeqCst);
        let err = policy
            .update(None, Template::new(1, "renamed"), &|entity| repo.save(entity))
            .unwrap_err();

        assert!(matches!(err, crate::repository::RepoError::Persistence(_)));
        assert_eq!(policy.get_cached(None, &1), None);
    }

    #[test]
    fn delete_evicts_even_when_persistence_fails() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        policy
            .get(None, &2, &|id| repo.get(id), &|ids| repo.get_all(ids))
            .unwrap();
        repo.fail_writes.store(true, Ordering::SeqCst);

        assert!(policy
            .delete(None, &Template::new(2, "blog"), &|entity| repo.delete(entity))
            .is_err());
        assert_eq!(policy.get_cached(None, &2), None);
    }

    #[test]
    fn get_all_by_ids_uses_cache_only_when_complete() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        policy
            .get(None, &1, &|id| repo.get(id), &|ids| repo.get_all(ids))
            .unwrap();

        policy.get_all(None, &[1, 2], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);

        let both = policy.get_all(None, &[1, 2], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_all_validates_count_against_repository() {
        let repo = Arc::new(seeded());
        let counter = Arc::clone(&repo);
        let policy = policy(
            RepositoryCachePolicyOptions::default().with_count(Arc::new(move || counter.count())),
        );

        policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);

        repo.save(Template::new(7, "added elsewhere")).unwrap();
        let all = policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_collection_marker_requires_allow_zero_count() {
        let repo = FakeRepository::default();
        let strict = policy(RepositoryCachePolicyOptions::default());
        strict.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        strict.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 2);

        let repo = FakeRepository::default();
        let lenient = policy(RepositoryCachePolicyOptions {
            get_all_allow_zero_count: true,
            ..Default::default()
        });
        lenient.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        let again = lenient.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert!(again.is_empty());
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exists_prefers_cache() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        policy
            .get(None, &1, &|id| repo.get(id), &|ids| repo.get_all(ids))
            .unwrap();

        assert!(policy
            .exists(None, &1, &|id| repo.exists(id), &|ids| repo.get_all(ids))
            .unwrap());
        assert_eq!(repo.exists_calls.load(Ordering::SeqCst), 0);
        assert!(!policy
            .exists(None, &5, &|id| repo.exists(id), &|ids| repo.get_all(ids))
            .unwrap());
        assert_eq!(repo.exists_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_get_matches_sync_semantics() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let found = policy
                .get_async(
                    None,
                    &2,
                    &|id| repo.get_async(id),
                    &|ids| repo.get_all_async(ids),
                    &cancel,
                )
                .await
                .unwrap();
            assert_eq!(found, Some(Template::new(2, "blog")));
        }
        assert_eq!(repo.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_async_get_stores_nothing() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = policy
            .get_async(
                None,
                &1,
                &|id| repo.get_async(id),
                &|ids| repo.get_all_async(ids),
                &cancel,
            )
            .await;
        assert_eq!(result, Err(crate::repository::RepoError::Cancelled));
        assert_eq!(policy.get_cached(None, &1), None);
    }

    #[test]
    fn clear_all_drops_every_entry_of_the_type() {
        let repo = seeded();
        let policy = policy(RepositoryCachePolicyOptions::default());
        policy.get_all(None, &[1, 2], &|ids| repo.get_all(ids)).unwrap();
        assert!(policy.get_cached(None, &1).is_some());

        policy.clear_all(None);
        assert!(policy.get_cached(None, &1).is_none());
        assert!(policy.get_cached(None, &2).is_none());
    }
}
