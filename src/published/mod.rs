//! Published content, media, member and domain caches.
//!
//! Each cache answers query-shaped reads in two steps: a cached list of identifiers
//! for the query, then one cached entry per identifier. Misses are computed from the
//! backing service traits in [`services`]. All entries live in the shared
//! [`CacheRegion`](crate::cache::CacheRegion)s of [`AppCaches`](crate::cache::AppCaches)
//! with the configured absolute lifetime.
//!
//! [`PublishedSnapshotService`] builds the caches once and hands out a
//! [`PublishedSnapshot`] per request.

mod content;
mod domain;
mod keys;
mod media;
mod member;
mod model;
mod read_through;
mod service;
pub mod services;
mod snapshot;

pub use content::{PublishedContentCache, should_include_content_in_cache};
pub use domain::DomainCache;
pub use keys::PublishedKey;
pub use media::PublishedMediaCache;
pub use member::PublishedMemberCache;
pub use model::{
    ContentNode, ContentTypeInfo, ContentVariation, Domain, DomainRecord, MemberNode,
    PublishedContent, PublishedMember,
};
pub use service::{
    CacheRefresh, PublishedServices, PublishedSnapshotService, STATUS_CACHE_KEY, STATUS_UNKNOWN,
};
pub use snapshot::{ForcedPreview, PublishedSnapshot};
