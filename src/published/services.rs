//! Backing services the published caches read from on a miss.

use uuid::Uuid;

use super::model::{ContentNode, DomainRecord, MemberNode};
use crate::repository::RepoResult;

pub trait ContentService: Send + Sync {
    fn root_content(&self) -> RepoResult<Vec<ContentNode>>;

    /// Every node below `id`, excluding `id` itself.
    fn descendants(&self, id: i32) -> RepoResult<Vec<ContentNode>>;

    fn by_id(&self, id: i32) -> RepoResult<Option<ContentNode>>;

    fn by_key(&self, key: Uuid) -> RepoResult<Option<ContentNode>>;
}

/// Media items share the content node shape; the publish flags are ignored.
pub trait MediaService: Send + Sync {
    fn root_media(&self) -> RepoResult<Vec<ContentNode>>;

    fn descendants(&self, id: i32) -> RepoResult<Vec<ContentNode>>;

    fn by_id(&self, id: i32) -> RepoResult<Option<ContentNode>>;

    fn by_key(&self, key: Uuid) -> RepoResult<Option<ContentNode>>;
}

pub trait MemberService: Send + Sync {
    fn by_id(&self, id: i32) -> RepoResult<Option<MemberNode>>;

    fn by_key(&self, key: Uuid) -> RepoResult<Option<MemberNode>>;
}

pub trait DomainService: Send + Sync {
    fn all(&self, include_wildcards: bool) -> RepoResult<Vec<DomainRecord>>;

    fn by_id(&self, id: i32) -> RepoResult<Option<DomainRecord>>;

    fn assigned(&self, document_id: i32, include_wildcards: bool) -> RepoResult<Vec<DomainRecord>>;
}

pub trait DefaultCultureAccessor: Send + Sync {
    fn default_culture(&self) -> String;
}

impl<F> DefaultCultureAccessor for F
where
    F: Fn() -> String + Send + Sync,
{
    fn default_culture(&self) -> String {
        self()
    }
}
