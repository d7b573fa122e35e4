//! Whole-collection caching.
//!
//! The entire set of `E` is fetched once and stored as a single entry under
//! `uRepo_<Type>_`. Every read is answered from that entry; every write drops it.
//! Cache-only writes patch the stored set, or park the entity under its own key until
//! the set is next fetched.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{
    PolicyKind, RepositoryCachePolicy, ScopedCache, entity_cache_key, entity_type_cache_key,
};
use crate::cache::{AppCacheExt, AppCaches, CacheValue, Expiration};
use crate::entity::{CacheId, Entity};
use crate::repository::{
    AsyncDeleteFn, AsyncExistsFn, AsyncGetAllFn, AsyncGetFn, AsyncPersistFn, DeleteFn, ExistsFn,
    GetAllFn, GetFn, PersistFn, RepoResult, cancellable,
};
use crate::scoping::Scope;

pub struct FullDataSetRepositoryCachePolicy<E, I> {
    cache: ScopedCache<E>,
    expiration: Expiration,
    _id: PhantomData<fn() -> I>,
}

impl<E: Entity, I: CacheId> FullDataSetRepositoryCachePolicy<E, I> {
    /// `expiration` is usually `Never`; the data set lives until a write clears it.
    pub fn new(caches: Arc<AppCaches>, expiration: Expiration) -> Self {
        Self {
            cache: ScopedCache::new(caches),
            expiration,
            _id: PhantomData,
        }
    }

    fn data_set(&self, scope: Option<&Scope>, perform_get_all: &GetAllFn<'_, E, I>) -> RepoResult<Arc<Vec<E>>> {
        let cache = self.cache.resolve(scope);
        let value = cache.get_or_add(
            &entity_type_cache_key::<E>(),
            self.expiration,
            &mut || perform_get_all(&[]).map(|all| Some(Arc::new(all) as CacheValue)),
        )?;
        Ok(downcast_data_set(value))
    }

    async fn data_set_async(
        &self,
        scope: Option<&Scope>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Arc<Vec<E>>> {
        let cache = self.cache.resolve(scope);
        let key = entity_type_cache_key::<E>();
        let fetch = Box::pin(async move {
            let all: RepoResult<Vec<E>> = perform_get_all(Vec::new()).await;
            all.map(|all| Some(Arc::new(all) as CacheValue))
        });
        let value = cancellable(cancel, cache.get_or_add_async(&key, self.expiration, fetch)).await?;
        Ok(downcast_data_set(value))
    }

    fn cached_data_set(&self, scope: Option<&Scope>) -> Option<Arc<Vec<E>>> {
        self.cache
            .resolve(scope)
            .get_shared::<Vec<E>>(&entity_type_cache_key::<E>())
    }
}

fn downcast_data_set<E: Entity>(value: Option<CacheValue>) -> Arc<Vec<E>> {
    value
        .and_then(|value| value.downcast::<Vec<E>>().ok())
        .unwrap_or_default()
}

fn find<E: Entity, I: CacheId>(all: &[E], id: &I) -> Option<E> {
    all.iter().find(|entity| &I::of(*entity) == id).cloned()
}

fn select<E: Entity, I: CacheId>(all: &[E], ids: &[I]) -> Vec<E> {
    if ids.is_empty() {
        return all.to_vec();
    }
    all.iter()
        .filter(|entity| ids.contains(&I::of(*entity)))
        .cloned()
        .collect()
}

#[async_trait]
impl<E: Entity, I: CacheId> RepositoryCachePolicy<E, I> for FullDataSetRepositoryCachePolicy<E, I> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::FullDataSet
    }

    fn get(
        &self,
        scope: Option<&Scope>,
        id: &I,
        _perform_get: &GetFn<'_, E, I>,
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Option<E>> {
        Ok(find(&self.data_set(scope, perform_get_all)?, id))
    }

    async fn get_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        _perform_get: &AsyncGetFn<'_, E, I>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>> {
        let all = self.data_set_async(scope, perform_get_all, cancel).await?;
        Ok(find(&all, id))
    }

    fn get_cached(&self, scope: Option<&Scope>, id: &I) -> Option<E> {
        match self.cached_data_set(scope) {
            Some(all) => find(&all, id),
            None => self
                .cache
                .resolve(scope)
                .get_typed::<E>(&entity_cache_key::<E, I>(id)),
        }
    }

    fn exists(
        &self,
        scope: Option<&Scope>,
        id: &I,
        _perform_exists: &ExistsFn<'_, I>,
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<bool> {
        Ok(find(&self.data_set(scope, perform_get_all)?, id).is_some())
    }

    async fn exists_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        _perform_exists: &AsyncExistsFn<'_, I>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<bool> {
        let all = self.data_set_async(scope, perform_get_all, cancel).await?;
        Ok(find(&all, id).is_some())
    }

    fn create(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        let result = persist_new(entity);
        self.clear_all(scope);
        result
    }

    async fn create_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        let result = cancellable(cancel, persist_new(entity)).await;
        self.clear_all(scope);
        result
    }

    fn update(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        let result = persist_updated(entity);
        self.clear_all(scope);
        result
    }

    async fn update_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        let result = cancellable(cancel, persist_updated(entity)).await;
        self.clear_all(scope);
        result
    }

    fn delete(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &DeleteFn<'_, E>,
    ) -> RepoResult<()> {
        let result = persist_deleted(entity);
        self.clear_all(scope);
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
        self.clear_all(scope);
        result
    }

    fn get_all(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Vec<E>> {
        Ok(select(&self.data_set(scope, perform_get_all)?, ids))
    }

    async fn get_all_async(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>> {
        let all = self.data_set_async(scope, perform_get_all, cancel).await?;
        Ok(select(&all, ids))
    }

    fn clear_all(&self, scope: Option<&Scope>) {
        self.cache
            .resolve(scope)
            .clear_by_key_prefix(&entity_type_cache_key::<E>());
    }

    fn set_cached(&self, scope: Option<&Scope>, entity: E) -> RepoResult<()> {
        let cache = self.cache.resolve(scope);
        let id = I::of(&entity);
        let Some(all) = self.cached_data_set(scope) else {
            cache.insert_typed(&entity_cache_key::<E, I>(&id), entity, self.expiration);
            return Ok(());
        };

        let mut all = all.as_ref().clone();
        match all.iter_mut().find(|cached| I::of(&**cached) == id) {
            Some(cached) => *cached = entity,
            None => all.push(entity),
        }
        cache.insert_typed(&entity_type_cache_key::<E>(), all, self.expiration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::policy::testing::{FakeRepository, Template};

    fn policy() -> FullDataSetRepositoryCachePolicy<Template, i32> {
        FullDataSetRepositoryCachePolicy::new(Arc::new(AppCaches::new()), Expiration::Never)
    }

    fn seeded() -> FakeRepository {
        FakeRepository::seeded(&[
            Template::new(1, "home"),
            Template::new(2, "blog"),
            Template::new(3, "post"),
        ])
    }

    #[test]
    fn one_fetch_serves_get_all_get_and_exists() {
        let repo = seeded();
        let policy = policy();

        let all = policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(all.len(), 3);

        let found = policy
            .get(None, &2, &|id| repo.get(id), &|ids| repo.get_all(ids))
            .unwrap();
        assert_eq!(found, Some(Template::new(2, "blog")));
        assert!(policy
            .exists(None, &3, &|id| repo.exists(id), &|ids| repo.get_all(ids))
            .unwrap());
        assert!(!policy
            .exists(None, &8, &|id| repo.exists(id), &|ids| repo.get_all(ids))
            .unwrap());

        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);
        assert_eq!(repo.gets.load(Ordering::SeqCst), 0);
        assert_eq!(repo.exists_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ids_filter_the_cached_set() {
        let repo = seeded();
        let policy = policy();

        let subset = policy.get_all(None, &[3, 1], &|ids| repo.get_all(ids)).unwrap();
        let ids: Vec<i32> = subset.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn writes_clear_the_data_set_even_on_failure() {
        let repo = seeded();
        let policy = policy();
        policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert!(policy.get_cached(None, &1).is_some());

        repo.fail_writes.store(true, Ordering::SeqCst);
        assert!(policy
            .update(None, Template::new(1, "changed"), &|entity| repo.save(entity))
            .is_err());
        assert!(policy.get_cached(None, &1).is_none());

        repo.fail_writes.store(false, Ordering::SeqCst);
        policy
            .create(None, Template::new(0, "new"), &|entity| repo.save(entity))
            .unwrap();
        let all = policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_cached_patches_a_cached_set_in_place() {
        let repo = seeded();
        let policy = policy();
        policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();

        policy.set_cached(None, Template::new(2, "news")).unwrap();
        policy.set_cached(None, Template::new(4, "tag")).unwrap();

        assert_eq!(policy.get_cached(None, &2), Some(Template::new(2, "news")));
        let all = policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_cached_without_a_set_is_readable_until_cleared() {
        let policy = policy();
        policy.set_cached(None, Template::new(7, "draft")).unwrap();
        assert_eq!(policy.get_cached(None, &7), Some(Template::new(7, "draft")));

        policy.clear_all(None);
        assert_eq!(policy.get_cached(None, &7), None);
    }

    #[test]
    fn empty_data_set_is_cached() {
        let repo = FakeRepository::default();
        let policy = policy();
        assert!(policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap().is_empty());
        assert!(policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap().is_empty());
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_reads_share_the_sync_data_set() {
        let repo = seeded();
        let policy = policy();
        let cancel = CancellationToken::new();

        policy.get_all(None, &[], &|ids| repo.get_all(ids)).unwrap();
        let found = policy
            .get_async(
                None,
                &1,
                &|id| repo.get_async(id),
                &|ids| repo.get_all_async(ids),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(found, Some(Template::new(1, "home")));
        assert_eq!(repo.get_alls.load(Ordering::SeqCst), 1);
    }
}
