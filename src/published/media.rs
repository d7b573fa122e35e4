//! Published media cache. Media has no publish state: only culture availability
//! filters query answers.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::keys::PublishedKey;
use super::model::{ContentNode, ContentTypeInfo, PublishedContent};
use super::read_through::RegionCache;
use super::services::MediaService;
use crate::repository::RepoResult;

fn should_include_media(media: &ContentNode, culture: Option<&str>) -> bool {
    match culture {
        Some(culture) if media.content_type.varies_by_culture() => {
            media.is_culture_available(culture)
        }
        _ => true,
    }
}

pub struct PublishedMediaCache {
    cache: RegionCache,
    service: Arc<dyn MediaService>,
}

impl PublishedMediaCache {
    pub(crate) fn new(cache: RegionCache, service: Arc<dyn MediaService>) -> Self {
        Self { cache, service }
    }

    pub fn at_root(&self, culture: Option<&str>) -> RepoResult<Vec<PublishedContent>> {
        let key = PublishedKey::MediaKeysAtRoot {
            culture: culture.map(str::to_string),
        };
        let keys = self.cache.get_or_set_list(&key, || {
            Ok(self
                .service
                .root_media()?
                .into_iter()
                .filter(|media| should_include_media(media, culture))
                .map(|media| media.key)
                .collect::<Vec<Uuid>>())
        })?;
        self.resolve(&keys)
    }

    pub fn by_content_type(&self, content_type: &ContentTypeInfo) -> RepoResult<Vec<PublishedContent>> {
        let key = PublishedKey::MediaKeysByContentType {
            alias: content_type.alias.clone(),
        };
        let keys = self.cache.get_or_set_list(&key, || {
            let mut keys = Vec::new();
            for root in self.service.root_media()? {
                let descendants = self.service.descendants(root.id)?;
                keys.extend(
                    std::iter::once(root)
                        .chain(descendants)
                        .filter(|media| media.content_type.id == content_type.id)
                        .map(|media| media.key),
                );
            }
            Ok(keys)
        })?;
        self.resolve(&keys)
    }

    pub fn by_id(&self, id: i32) -> RepoResult<Option<PublishedContent>> {
        let key = self.cache.get_or_set(&PublishedKey::MediaKeyById { id }, || {
            Ok(self.service.by_id(id)?.map(|media| media.key))
        })?;
        match key {
            Some(key) => self.by_key(key),
            None => Ok(None),
        }
    }

    pub fn by_key(&self, key: Uuid) -> RepoResult<Option<PublishedContent>> {
        self.cache.get_or_set(&PublishedKey::MediaByKey { key }, || {
            Ok(self
                .service
                .by_key(key)?
                .map(|media| PublishedContent::from_node(&media, true)))
        })
    }

    pub fn has_by_id(&self, id: i32) -> RepoResult<bool> {
        Ok(self.by_id(id)?.is_some())
    }

    pub fn has_content(&self) -> RepoResult<bool> {
        Ok(!self.at_root(None)?.is_empty())
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }

    fn resolve(&self, keys: &[Uuid]) -> RepoResult<Vec<PublishedContent>> {
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            match self.by_key(*key)? {
                Some(media) => resolved.push(media),
                None => debug!(%key, "Cached media key no longer resolves"),
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegion;
    use crate::published::testing::{FakeContentService, invariant_node, region_cache, variant_node};

    fn cache(service: Arc<FakeContentService>) -> PublishedMediaCache {
        PublishedMediaCache::new(region_cache(CacheRegion::PublishedMedia), service)
    }

    #[test]
    fn unpublished_media_is_still_listed() {
        let service = Arc::new(FakeContentService::new(vec![invariant_node(1), invariant_node(2)]));
        let media = cache(service.clone());

        assert_eq!(media.at_root(None).unwrap().len(), 2);
        assert_eq!(media.at_root(None).unwrap().len(), 2);
        assert_eq!(service.root_calls(), 1);
        assert!(media.has_content().unwrap());
    }

    #[test]
    fn culture_filters_variant_media() {
        let service = Arc::new(FakeContentService::new(vec![
            variant_node(1).with_culture("en-US", false),
            variant_node(2).with_culture("da-DK", false),
            invariant_node(3),
        ]));
        let media = cache(service);

        let ids: Vec<i32> = media
            .at_root(Some("en-US"))
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn by_id_resolves_through_key() {
        let service = Arc::new(FakeContentService::new(vec![invariant_node(4)]));
        let media = cache(service);
        assert_eq!(media.by_id(4).unwrap().map(|m| m.id), Some(4));
        assert!(!media.has_by_id(5).unwrap());
    }
}
