//! Scope-aware repository caching and published-content caches.
//!
//! The crate is organised in layers:
//!
//! - [`cache`]: the application cache abstraction, the per-entity-type isolated caches and
//!   the process-wide cache registry.
//! - [`scoping`]: unit-of-work scopes that decide which cache a repository operation sees.
//! - [`policy`]: repository cache policies (no cache, per item, full data set, single items
//!   only) and the registry that maps entity kinds to them.
//! - [`entity_cache`]: the entity-cache facade used by legacy call sites.
//! - [`published`]: published content, media, member and domain caches plus the snapshot
//!   service that hands them to request handlers.
//! - [`config`] and [`infra`]: layered settings and telemetry bootstrap.

pub mod cache;
pub mod config;
pub mod entity;
pub mod entity_cache;
pub mod infra;
pub mod policy;
pub mod published;
pub mod repository;
pub mod scoping;

pub use cache::{AppCache, AppCacheExt, AppCaches, CacheValue, Expiration, NoAppCache, ObjectCache};
pub use entity::{CacheId, Entity, EntityKind};
pub use entity_cache::{EntityCache, EntityCacheOptions, LegacyEntityCache};
pub use policy::{PolicyKind, PolicyRegistry, RepositoryCachePolicy, RepositoryCachePolicyOptions};
pub use repository::{RepoError, RepoResult};
pub use scoping::{RepositoryCacheMode, Scope, ScopeOptions, ScopeProvider};
