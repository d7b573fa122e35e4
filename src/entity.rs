//! Entity contracts shared by repositories and cache policies.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Broad classification of repository entities.
///
/// A concrete entity type declares the kind it belongs to; sub-types of a kind (for
/// example a specialised content item) declare the same kind as their parent so that
/// they pick up the same cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Content,
    Language,
    ContentType,
    Domain,
    LogViewerQuery,
    MediaType,
    MemberType,
    PublicAccessEntry,
    RelationType,
    Template,
    AuditItem,
    DictionaryItem,
    Media,
    Member,
    Relation,
    User,
    Other,
}

impl EntityKind {
    pub const ALL: [EntityKind; 17] = [
        EntityKind::Content,
        EntityKind::Language,
        EntityKind::ContentType,
        EntityKind::Domain,
        EntityKind::LogViewerQuery,
        EntityKind::MediaType,
        EntityKind::MemberType,
        EntityKind::PublicAccessEntry,
        EntityKind::RelationType,
        EntityKind::Template,
        EntityKind::AuditItem,
        EntityKind::DictionaryItem,
        EntityKind::Media,
        EntityKind::Member,
        EntityKind::Relation,
        EntityKind::User,
        EntityKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Content => "content",
            EntityKind::Language => "language",
            EntityKind::ContentType => "content_type",
            EntityKind::Domain => "domain",
            EntityKind::LogViewerQuery => "log_viewer_query",
            EntityKind::MediaType => "media_type",
            EntityKind::MemberType => "member_type",
            EntityKind::PublicAccessEntry => "public_access_entry",
            EntityKind::RelationType => "relation_type",
            EntityKind::Template => "template",
            EntityKind::AuditItem => "audit_item",
            EntityKind::DictionaryItem => "dictionary_item",
            EntityKind::Media => "media",
            EntityKind::Member => "member",
            EntityKind::Relation => "relation",
            EntityKind::User => "user",
            EntityKind::Other => "other",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity kind `{0}`")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownEntityKind(value.to_string()))
    }
}

/// A repository entity that can be cached.
///
/// Entities are stored in caches by value and handed out as clones, so `Clone` should
/// be cheap (wrap large payloads in `Arc`).
pub trait Entity: Clone + Send + Sync + 'static {
    /// Stable type name used in cache keys, e.g. `"Content"`.
    const TYPE_NAME: &'static str;
    const KIND: EntityKind;

    /// Integer identity; zero or negative until the entity has been persisted.
    fn id(&self) -> i32;

    fn key(&self) -> Uuid;

    fn has_identity(&self) -> bool {
        self.id() > 0
    }
}

/// Identifier types a cache policy can key entities by.
pub trait CacheId: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {
    fn of<E: Entity>(entity: &E) -> Self;
}

impl CacheId for i32 {
    fn of<E: Entity>(entity: &E) -> Self {
        entity.id()
    }
}

impl CacheId for Uuid {
    fn of<E: Entity>(entity: &E) -> Self {
        entity.key()
    }
}
