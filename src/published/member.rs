use std::sync::Arc;

use uuid::Uuid;

use super::keys::PublishedKey;
use super::model::PublishedMember;
use super::read_through::RegionCache;
use super::services::MemberService;
use crate::repository::RepoResult;

/// Published member cache, addressed by id or key.
pub struct PublishedMemberCache {
    cache: RegionCache,
    service: Arc<dyn MemberService>,
}

impl PublishedMemberCache {
    pub(crate) fn new(cache: RegionCache, service: Arc<dyn MemberService>) -> Self {
        Self { cache, service }
    }

    pub fn by_id(&self, id: i32) -> RepoResult<Option<PublishedMember>> {
        let key = self.cache.get_or_set(&PublishedKey::MemberKeyById { id }, || {
            Ok(self.service.by_id(id)?.map(|member| member.key))
        })?;
        match key {
            Some(key) => self.by_key(key),
            None => Ok(None),
        }
    }

    pub fn by_key(&self, key: Uuid) -> RepoResult<Option<PublishedMember>> {
        self.cache.get_or_set(&PublishedKey::MemberByKey { key }, || {
            Ok(self
                .service
                .by_key(key)?
                .filter(|member| member.approved)
                .map(|member| PublishedMember::from(&member)))
        })
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }
}
