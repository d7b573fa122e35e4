//! Repository cache policies.
//!
//! A policy decides how one entity type's reads and writes interact with the cache.
//! Policies never own data: every operation receives the repository's fetch or persist
//! routine and the scope the call runs in, and resolves the cache to use from that
//! scope on each access.
//!
//! | Policy | Granularity |
//! |---|---|
//! | [`NoCacheRepositoryCachePolicy`] | none; every call goes to the repository |
//! | [`DefaultRepositoryCachePolicy`] | one entry per id, plus cached "get all" results |
//! | [`FullDataSetRepositoryCachePolicy`] | one entry holding the whole collection |
//! | [`SingleItemsOnlyRepositoryCachePolicy`] | one entry per id, "get all" never cached |

mod default;
mod full_data_set;
mod no_cache;
mod registry;
mod single_items_only;

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use default::DefaultRepositoryCachePolicy;
pub use full_data_set::FullDataSetRepositoryCachePolicy;
pub use no_cache::NoCacheRepositoryCachePolicy;
pub use registry::PolicyRegistry;
pub use single_items_only::SingleItemsOnlyRepositoryCachePolicy;

use crate::cache::{AppCache, AppCaches, NoAppCache};
use crate::entity::{CacheId, Entity};
use crate::repository::{
    AsyncDeleteFn, AsyncExistsFn, AsyncGetAllFn, AsyncGetFn, AsyncPersistFn, CountFn, DeleteFn,
    ExistsFn, GetAllFn, GetFn, PersistFn, RepoResult,
};
use crate::scoping::{RepositoryCacheMode, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    NoCache,
    Default,
    FullDataSet,
    SingleItemsOnly,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::NoCache => "no_cache",
            PolicyKind::Default => "default",
            PolicyKind::FullDataSet => "full_data_set",
            PolicyKind::SingleItemsOnly => "single_items_only",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cache policy `{0}`")]
pub struct UnknownPolicyKind(pub String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicyKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "no_cache" | "none" => Ok(PolicyKind::NoCache),
            "default" => Ok(PolicyKind::Default),
            "full_data_set" => Ok(PolicyKind::FullDataSet),
            "single_items_only" => Ok(PolicyKind::SingleItemsOnly),
            _ => Err(UnknownPolicyKind(value.to_string())),
        }
    }
}

/// Tuning for "get all" lookups of the per-item policies.
#[derive(Clone)]
pub struct RepositoryCachePolicyOptions {
    /// Compare the number of cached entities with `perform_count` before trusting a
    /// cached "get all" result.
    pub get_all_validate_count: bool,
    /// Cache an explicit empty marker when "get all" finds nothing.
    pub get_all_allow_zero_count: bool,
    pub perform_count: Option<Arc<CountFn>>,
}

impl RepositoryCachePolicyOptions {
    pub fn with_count(mut self, perform_count: Arc<CountFn>) -> Self {
        self.perform_count = Some(perform_count);
        self
    }
}

impl Default for RepositoryCachePolicyOptions {
    fn default() -> Self {
        Self {
            get_all_validate_count: true,
            get_all_allow_zero_count: false,
            perform_count: None,
        }
    }
}

impl fmt::Debug for RepositoryCachePolicyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryCachePolicyOptions")
            .field("get_all_validate_count", &self.get_all_validate_count)
            .field("get_all_allow_zero_count", &self.get_all_allow_zero_count)
            .field("perform_count", &self.perform_count.is_some())
            .finish()
    }
}

/// Key under which a policy stores the whole collection of `E` (and the prefix of
/// every per-item key).
pub fn entity_type_cache_key<E: Entity>() -> String {
    format!("uRepo_{}_", E::TYPE_NAME)
}

pub fn entity_cache_key<E: Entity, I: CacheId>(id: &I) -> String {
    format!("uRepo_{}_{}", E::TYPE_NAME, id)
}

/// Resolves the cache a policy should use for a call.
pub(crate) struct ScopedCache<E> {
    caches: Arc<AppCaches>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ScopedCache<E> {
    pub(crate) fn new(caches: Arc<AppCaches>) -> Self {
        Self {
            caches,
            _entity: PhantomData,
        }
    }

    /// # Panics
    ///
    /// Panics when the scope carries an unresolved (`Unspecified`) cache mode.
    pub(crate) fn resolve(&self, scope: Option<&Scope>) -> Arc<dyn AppCache> {
        let Some(scope) = scope else {
            return self.caches.isolated_caches().get_or_create::<E>();
        };
        match scope.repository_cache_mode() {
            RepositoryCacheMode::Default => self.caches.isolated_caches().get_or_create::<E>(),
            RepositoryCacheMode::Scoped => scope.isolated_caches().get_or_create::<E>(),
            RepositoryCacheMode::None => NoAppCache::shared(),
            RepositoryCacheMode::Unspecified => panic!(
                "scope {} has no resolved repository cache mode; cannot pick a cache for {}",
                scope.id(),
                E::TYPE_NAME
            ),
        }
    }
}

/// How an entity type's reads and writes interact with caching.
///
/// `scope` is the scope the call runs in; `None` means the global caches. Async
/// methods use the scope handed to them for every cache access, before and after
/// each suspension point.
///
/// Cache resolution panics on a scope whose cache mode is `Unspecified`.
#[async_trait]
pub trait RepositoryCachePolicy<E: Entity, I: CacheId>: Send + Sync {
    fn kind(&self) -> PolicyKind;

    fn get(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_get: &GetFn<'_, E, I>,
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Option<E>>;

    async fn get_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_get: &AsyncGetFn<'_, E, I>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E>>;

    /// Cache-only lookup; never calls the repository.
    fn get_cached(&self, scope: Option<&Scope>, id: &I) -> Option<E>;

    fn exists(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_exists: &ExistsFn<'_, I>,
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<bool>;

    async fn exists_async(
        &self,
        scope: Option<&Scope>,
        id: &I,
        perform_exists: &AsyncExistsFn<'_, I>,
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<bool>;

    fn create(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &PersistFn<'_, E>,
    ) -> RepoResult<E>;

    async fn create_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_new: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E>;

    fn update(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &PersistFn<'_, E>,
    ) -> RepoResult<E>;

    async fn update_async(
        &self,
        scope: Option<&Scope>,
        entity: E,
        persist_updated: &AsyncPersistFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<E>;

    fn delete(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &DeleteFn<'_, E>,
    ) -> RepoResult<()>;

    async fn delete_async(
        &self,
        scope: Option<&Scope>,
        entity: &E,
        persist_deleted: &AsyncDeleteFn<'_, E>,
        cancel: &CancellationToken,
    ) -> RepoResult<()>;

    /// Entities with the given ids, or all entities when `ids` is empty.
    fn get_all(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &GetAllFn<'_, E, I>,
    ) -> RepoResult<Vec<E>>;

    async fn get_all_async(
        &self,
        scope: Option<&Scope>,
        ids: &[I],
        perform_get_all: &AsyncGetAllFn<'_, E, I>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E>>;

    /// Evicts every entry this policy manages in the resolved cache.
    fn clear_all(&self, scope: Option<&Scope>);

    /// Writes `entity` into the cache as though it had just been persisted, without
    /// calling the repository.
    fn set_cached(&self, scope: Option<&Scope>, entity: E) -> RepoResult<()> {
        self.update(scope, entity, &|entity| Ok(entity)).map(drop)
    }
}
