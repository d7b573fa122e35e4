//! Typed cache-or-fetch facade for services that address entities by integer id.
//!
//! [`LegacyEntityCache`] picks its policy from the [`PolicyRegistry`] using the entity's
//! kind, then routes every call through it. Writes made through the facade only touch
//! the cache; the persistence callbacks it hands to the policy are identity functions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::ready;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{AppCaches, CacheConfig};
use crate::entity::Entity;
use crate::policy::{PolicyKind, PolicyRegistry, RepositoryCachePolicy};
use crate::repository::{AsyncGetAllFn, AsyncGetFn, GetAllFn, GetFn, RepoResult, cancellable};
use crate::scoping::Scope;

/// Caller hints for [`EntityCache::set`].
///
/// Entry lifetimes are owned by the policy, so the hint is accepted and recorded in
/// logs but does not change the stored entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCacheOptions {
    pub expiration: Option<Duration>,
}

#[async_trait]
pub trait EntityCache<E: Entity>: Send + Sync {
    /// Cached entity, or the result of `perform_get` on a miss. Without a fetch routine
    /// the lookup is cache-only.
    fn get_entity(
        &self,
        scope: Option<&Scope>,
        id: i32,
        perform_get: Option<&GetFn<'_, E, i32>>,
    ) -> RepoResult<Option<E>>;

    async fn get_entity_async(
        &self,
        scope: Option<&Scope>,
        id: i32,
        perform_get: Option<&AsyncGetFn<'_, E, i32>>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>>;

    /// Entities with the given ids (all entities when `ids` is empty). Without a fetch
    /// routine only cached entities are returned.
    fn get_entities(
        &self,
        scope: Option<&Scope>,
        ids: &[i32],
        perform_get_entities: Option<&GetAllFn<'_, E, i32>>,
    ) -> RepoResult<Vec<E>>;

    async fn get_entities_async(
        &self,
        scope: Option<&Scope>,
        ids: &[i32],
        perform_get_entities: Option<&AsyncGetAllFn<'_, E, i32>>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>>;

    /// Stores `entity`, taking the update path when it is already cached and the
    /// create path otherwise. Whole-set policies patch their cached set instead, since
    /// their write paths only drop it.
    fn set(
        &self,
        scope: Option<&Scope>,
        entity: E,
        options: Option<&EntityCacheOptions>,
    ) -> RepoResult<()>;

    async fn set_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        options: Option<&EntityCacheOptions>,
        cancel: &CancellationToken,
    ) -> RepoResult<()>;

    fn remove(&self, scope: Option<&Scope>, entity: &E) -> RepoResult<()>;

    async fn remove_async(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        cancel: &CancellationToken,
    ) -> RepoResult<()>;

    /// Renews the entity's expiration without changing its content.
    fn refresh_entity(&self, scope: Option<&Scope>, id: i32);

    async fn refresh_entity_async(
        &self,
        scope: Option<&Scope>,
        id: i32,
        cancel: &CancellationToken,
    );
}

/// [`EntityCache`] backed by a repository cache policy.
pub struct LegacyEntityCache<E: Entity> {
    policy: Arc<dyn RepositoryCachePolicy<E, i32>>,
}

impl<E: Entity> LegacyEntityCache<E> {
    pub fn new(registry: &PolicyRegistry, caches: Arc<AppCaches>, config: &CacheConfig) -> Self {
        Self::with_policy(registry.create::<E, i32>(caches, config))
    }

    pub fn with_policy(policy: Arc<dyn RepositoryCachePolicy<E, i32>>) -> Self {
        Self { policy }
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    fn cached_only(&self, scope: Option<&Scope>, ids: &[i32]) -> Vec<E> {
        ids.iter()
            .filter_map(|id| self.policy.get_cached(scope, id))
            .collect()
    }

    /// A full-data-set policy can only be populated by a "get all" fetch, so single
    /// lookups read the cached set and fall back to an uncached fetch.
    fn reads_whole_set(&self) -> bool {
        self.policy.kind() == PolicyKind::FullDataSet
    }
}

fn no_entities<E: Entity>(_ids: &[i32]) -> RepoResult<Vec<E>> {
    Ok(Vec::new())
}

#[async_trait]
impl<E: Entity> EntityCache<E> for LegacyEntityCache<E> {
    fn get_entity(
        &self,
        scope: Option<&Scope>,
        id: i32,
        perform_get: Option<&GetFn<'_, E, i32>>,
    ) -> RepoResult<Option<E>> {
        let Some(perform_get) = perform_get else {
            return Ok(self.policy.get_cached(scope, &id));
        };
        if self.reads_whole_set() {
            return match self.policy.get_cached(scope, &id) {
                Some(entity) => Ok(Some(entity)),
                None => perform_get(&id),
            };
        }
        self.policy.get(scope, &id, perform_get, &no_entities::<E>)
    }

    async fn get_entity_async(
        &self,
        scope: Option<&Scope>,
        id: i32,
        perform_get: Option<&AsyncGetFn<'_, E, i32>>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>> {
        let Some(perform_get) = perform_get else {
            return Ok(self.policy.get_cached(scope, &id));
        };
        if self.reads_whole_set() {
            if let Some(entity) = self.policy.get_cached(scope, &id) {
                return Ok(Some(entity));
            }
            return cancellable(cancel, perform_get(id)).await;
        }
        self.policy
            .get_async(
                scope,
                &id,
                perform_get,
                &|_ids| ready(Ok(Vec::new())).boxed(),
                cancel,
            )
            .await
    }

    fn get_entities(
        &self,
        scope: Option<&Scope>,
        ids: &[i32],
        perform_get_entities: Option<&GetAllFn<'_, E, i32>>,
    ) -> RepoResult<Vec<E>> {
        match perform_get_entities {
            Some(perform_get_entities) => self.policy.get_all(scope, ids, perform_get_entities),
            None => Ok(self.cached_only(scope, ids)),
        }
    }

    async fn get_entities_async(
        &self,
        scope: Option<&Scope>,
        ids: &[i32],
        perform_get_entities: Option<&AsyncGetAllFn<'_, E, i32>>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>> {
        match perform_get_entities {
            Some(perform_get_entities) => {
                self.policy
                    .get_all_async(scope, ids, perform_get_entities, cancel)
                    .await
            }
            None => Ok(self.cached_only(scope, ids)),
        }
    }

    fn set(
        &self,
        scope: Option<&Scope>,
        entity: E,
        options: Option<&EntityCacheOptions>,
    ) -> RepoResult<()> {
        let id = entity.id();
        let present = self.get_entity(scope, id, None)?.is_some();
        debug!(entity = E::TYPE_NAME, id, present, options = ?options, "Setting cached entity");
        if self.reads_whole_set() {
            self.policy.set_cached(scope, entity)?;
        } else if present {
            self.policy.update(scope, entity, &|entity| Ok(entity))?;
        } else {
            self.policy.create(scope, entity, &|entity| Ok(entity))?;
        }
        Ok(())
    }

    async fn set_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        options: Option<&EntityCacheOptions>,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        let id = entity.id();
        let present = self.get_entity_async(scope, id, None, cancel).await?.is_some();
        debug!(entity = E::TYPE_NAME, id, present, options = ?options, "Setting cached entity");
        if self.reads_whole_set() {
            self.policy.set_cached(scope, entity)?;
        } else if present {
            self.policy
                .update_async(scope, entity, &|entity| ready(Ok(entity)).boxed(), cancel)
                .await?;
        } else {
            self.policy
                .create_async(scope, entity, &|entity| ready(Ok(entity)).boxed(), cancel)
                .await?;
        }
        Ok(())
    }

    fn remove(&self, scope: Option<&Scope>, entity: &E) -> RepoResult<()> {
        self.policy.delete(scope, entity, &|_| Ok(()))
    }

    async fn remove_async(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        self.policy
            .delete_async(scope, entity, &|_| ready(Ok(())).boxed(), cancel)
            .await
    }

    /// # Panics
    ///
    /// Always panics: repository cache policies cannot renew an entry in place.
    fn refresh_entity(&self, _scope: Option<&Scope>, id: i32) {
        panic!(
            "refresh_entity({id}) is not supported by the {} policy for {}",
            self.policy.kind(),
            E::TYPE_NAME
        );
    }

    /// # Panics
    ///
    /// Always panics, like [`EntityCache::refresh_entity`].
    async fn refresh_entity_async(
        &self,
        scope: Option<&Scope>,
        id: i32,
        _cancel: &CancellationToken,
    ) {
        self.refresh_entity(scope, id);
    }
}
