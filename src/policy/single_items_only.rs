use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{DefaultRepositoryCachePolicy, PolicyKind, RepositoryCachePolicy, RepositoryCachePolicyOptions};
use crate::cache::{AppCaches, Expiration};
use crate::entity::{CacheId, Entity};
use crate::repository::{
    AsyncDeleteFn, AsyncExistsFn, AsyncGetAllFn, AsyncGetFn, AsyncPersistFn, DeleteFn, ExistsFn,
    GetAllFn, GetFn, PersistFn, RepoResult,
};
use crate::scoping::Scope;

/// Per-item caching that never stores "get all" results.
///
/// Reads of individual entities are cached exactly like
/// [`DefaultRepositoryCachePolicy`]; collection reads still consult the per-item
/// entries but their results are not written back.
pub struct SingleItemsOnlyRepositoryCachePolicy<E, I> {
    inner: DefaultRepositoryCachePolicy<E, I>,
}

impl<E: Entity, I: CacheId> SingleItemsOnlyRepositoryCachePolicy<E, I> {
    pub fn new(
        caches: Arc<AppCaches>,
        options: RepositoryCachePolicyOptions,
        expiration: Expiration,
    ) -> Self {
        Self {
            inner: DefaultRepositoryCachePolicy::new(caches, options, expiration)
                .without_collections(),
        }
    }
}

#[async_trait]
impl<E: Entity, I: CacheId> RepositoryCachePolicy<E, I>
    for SingleItemsOnlyRepositoryCachePolicy<E, I>
{
    fn kind(&self) -> PolicyKind {
        PolicyKind::SingleItemsOnly
    }

    fn get(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_get: &GetFn<'_, E, I>,
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Option<E>> {
        self.inner.get(scope, id, perform_get, perform_get_all)
    }

    async fn get_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_get: &AsyncGetFn<'_, E, I>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>> {
        self.inner
            .get_async(scope, id, perform_get, perform_get_all, cancel)
            .await
    }

    fn get_cached(&self, scope: Option<&Scope>, id: &I) -> Option<E> {
        self.inner.get_cached(scope, id)
    }

    fn exists(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_exists: &ExistsFn<'_, I>,
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<bool> {
        self.inner.exists(scope, id, perform_exists, perform_get_all)
    }

    async fn exists_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_exists: &AsyncExistsFn<'_, I>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<bool> {
        self.inner
            .exists_async(scope, id, perform_exists, perform_get_all, cancel)
            .await
    }

    fn create(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        self.inner.create(scope, entity, persist_new)
    }

    async fn create_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        self.inner.create_async(scope, entity, persist_new, cancel).await
    }

    fn update(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        self.inner.update(scope, entity, persist_updated)
    }

    async fn update_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        self.inner
            .update_async(scope, entity, persist_updated, cancel)
            .await
    }

    fn delete(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &DeleteFn<'_, E>,
    ) -> RepoResult<()> {
        self.inner.delete(scope, entity, persist_deleted)
    }

    async fn delete_async(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &AsyncDeleteFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        self.inner
            .delete_async(scope, entity, persist_deleted, cancel)
            .await
    }

    fn get_all(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Vec<E>> {
        self.inner.get_all(scope, ids, perform_get_all)
    }

    async fn get_all_async(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>> {
        self.inner
            .get_all_async(scope, ids, perform_get_all, cancel)
            .await
    }

    fn clear_all(&self, scope: Option<&Scope>) {
        self.inner.clear_all(scope);
    }
}
