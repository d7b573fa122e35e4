//! Published-cache key definitions.
//!
//! Every key renders as `v0:<Region>:<Query>:<discriminators...>`. Free-text
//! discriminators (cultures, aliases) are escaped so a `:` inside a value can never
//! make two different queries produce the same string.

use std::fmt;

use uuid::Uuid;

use crate::cache::CacheRegion;

/// Rendering of an absent culture.
const NULL_SEGMENT: &str = "__NULL__";

/// A published-cache query, identified by all of its discriminators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublishedKey {
    // Content
    ContentKeysAtRoot { preview: bool, culture: Option<String> },
    ContentKeysByContentType { preview: bool, alias: String },
    ContentKeyById { preview: bool, id: i32 },
    ContentByKey { preview: bool, key: Uuid },

    // Media
    MediaKeysAtRoot { culture: Option<String> },
    MediaKeysByContentType { alias: String },
    MediaKeyById { id: i32 },
    MediaByKey { key: Uuid },

    // Members
    MemberKeyById { id: i32 },
    MemberByKey { key: Uuid },

    // Domains
    AllDomainIds { include_wildcards: bool },
    Domain { id: i32 },
    AssignedDomainIds { document_id: i32, include_wildcards: bool },
}

impl PublishedKey {
    pub fn region(&self) -> CacheRegion {
        match self {
            PublishedKey::ContentKeysAtRoot { .. }
            | PublishedKey::ContentKeysByContentType { .. }
            | PublishedKey::ContentKeyById { .. }
            | PublishedKey::ContentByKey { .. } => CacheRegion::PublishedContent,
            PublishedKey::MediaKeysAtRoot { .. }
            | PublishedKey::MediaKeysByContentType { .. }
            | PublishedKey::MediaKeyById { .. }
            | PublishedKey::MediaByKey { .. } => CacheRegion::PublishedMedia,
            PublishedKey::MemberKeyById { .. } | PublishedKey::MemberByKey { .. } => {
                CacheRegion::PublishedMember
            }
            PublishedKey::AllDomainIds { .. }
            | PublishedKey::Domain { .. }
            | PublishedKey::AssignedDomainIds { .. } => CacheRegion::Domain,
        }
    }

    /// The string stored in the cache.
    pub fn to_cache_key(&self) -> String {
        self.to_string()
    }
}

fn mode(preview: bool) -> &'static str {
    if preview { "Preview" } else { "Published" }
}

fn wildcards(include: bool) -> &'static str {
    if include {
        "IncludeWildcards"
    } else {
        "ExcludeWildcards"
    }
}

/// Escapes `%` and `:` so the value fits in one segment.
fn escape(value: &str) -> String {
    value.replace('%', "%25").replace(':', "%3A")
}

/// Cultures additionally escape `_` so no value can render as [`NULL_SEGMENT`].
fn culture(value: Option<&str>) -> String {
    value.map_or_else(
        || NULL_SEGMENT.to_string(),
        |value| escape(value).replace('_', "%5F"),
    )
}

impl fmt::Display for PublishedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let region = self.region();
        match self {
            PublishedKey::ContentKeysAtRoot { preview, culture: c } => write!(
                f,
                "{region}:GetKeysAtRoot:{}:{}",
                culture(c.as_deref()),
                mode(*preview)
            ),
            PublishedKey::ContentKeysByContentType { preview, alias } => write!(
                f,
                "{region}:GetKeysByContentType:{}:{}",
                escape(alias),
                mode(*preview)
            ),
            PublishedKey::ContentKeyById { preview, id } => {
                write!(f, "{region}:GetKeyById:{id}:{}", mode(*preview))
            }
            PublishedKey::ContentByKey { preview, key } => {
                write!(f, "{region}:GetByKey:{key}:{}", mode(*preview))
            }
            PublishedKey::MediaKeysAtRoot { culture: c } => {
                write!(f, "{region}:GetKeysAtRoot:{}", culture(c.as_deref()))
            }
            PublishedKey::MediaKeysByContentType { alias } => {
                write!(f, "{region}:GetKeysByContentType:{}", escape(alias))
            }
            PublishedKey::MediaKeyById { id } | PublishedKey::MemberKeyById { id } => {
                write!(f, "{region}:GetKeyById:{id}")
            }
            PublishedKey::MediaByKey { key } | PublishedKey::MemberByKey { key } => {
                write!(f, "{region}:GetByKey:{key}")
            }
            PublishedKey::AllDomainIds { include_wildcards } => {
                write!(f, "{region}:GetAllDomainIds:{}", wildcards(*include_wildcards))
            }
            PublishedKey::Domain { id } => write!(f, "{region}:Domain:{id}"),
            PublishedKey::AssignedDomainIds {
                document_id,
                include_wildcards,
            } => write!(
                f,
                "{region}:AssignedToIds:{document_id}:{}",
                wildcards(*include_wildcards)
            ),
        }
    }
}
