//! Pass-through policy: every call reaches the repository and nothing is stored.

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{PolicyKind, RepositoryCachePolicy};
use crate::entity::{CacheId, Entity};
use crate::repository::{
    AsyncDeleteFn, AsyncExistsFn, AsyncGetAllFn, AsyncGetFn, AsyncPersistFn, DeleteFn, ExistsFn,
    GetAllFn, GetFn, PersistFn, RepoResult, cancellable,
};
use crate::scoping::Scope;

pub struct NoCacheRepositoryCachePolicy<E, I> {
    _marker: PhantomData<fn() -> (E, I)>,
}

impl<E, I> NoCacheRepositoryCachePolicy<E, I> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E, I> Default for NoCacheRepositoryCachePolicy<E, I> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity, I: CacheId> RepositoryCachePolicy<E, I> for NoCacheRepositoryCachePolicy<E, I> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::NoCache
    }

    fn get(
        &self,
        _scope: Option<&Scope>,
        id: &I,
        perform_get: &GetFn<'_, E, I>,
        _perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Option<E>> {
        perform_get(id)
    }

    async fn get_async(
        &self,
        _scope: Option<&Scope>,
        id: &I,
        perform_get: &AsyncGetFn<'_, E, I>,
        _perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>> {
        cancellable(cancel, perform_get(id.clone())).await
    }

    fn get_cached(&self, _scope: Option<&Scope>, _id: &I) -> Option<E> {
        None
    }

    fn exists(
        &self,
        _scope: Option<&Scope>,
        id: &I,
        perform_exists: &ExistsFn<'_, I>,
        _perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<bool> {
        perform_exists(id)
    }

    async fn exists_async(
        &self,
        _scope: Option<&Scope>,
        id: &I,
        perform_exists: &AsyncExistsFn<'_, I>,
        _perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<bool> {
        cancellable(cancel, perform_exists(id.clone())).await
    }

    fn create(
        &self,
        _scope: Option<&Scope>,
        entity: E,
        persist_new: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        persist_new(entity)
    }

    async fn create_async(
        &self,
        _scope: Option<&Scope>,
        entity: E,
        persist_new: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        cancellable(cancel, persist_new(entity)).await
    }

    fn update(
        &self,
        _scope: Option<&Scope>,
        entity: E,
        persist_updated: &PersistFn<'_, E>,
    ) -> RepoResult<E> {
        persist_updated(entity)
    }

    async fn update_async(
        &self,
        _scope: Option<&Scope>,
        entity: E,
        persist_updated: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E> {
        cancellable(cancel, persist_updated(entity)).await
    }

    fn delete(
        &self,
        _scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &DeleteFn<'_, E>,
    ) -> RepoResult<()> {
        persist_deleted(entity)
    }

    async fn delete_async(
        &self,
        _scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &AsyncDeleteFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        cancellable(cancel, persist_deleted(entity.clone())).await
    }

    fn get_all(
        &self,
        _scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Vec<E>> {
        perform_get_all(ids)
    }

    async fn get_all_async(
        &self,
        _scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>> {
        cancellable(cancel, perform_get_all(ids.to_vec())).await
    }

    fn clear_all(&self, _scope: Option<&Scope>) {}
}
