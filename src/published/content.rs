//! Published content cache.
//!
//! Queries cache lists of content keys; each key is then resolved through a second
//! per-item entry. Keys that no longer resolve are dropped from the answer.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::keys::PublishedKey;
use super::model::{ContentNode, ContentTypeInfo, PublishedContent};
use super::read_through::RegionCache;
use super::services::ContentService;
use crate::repository::RepoResult;

/// Whether `content` belongs in a published query answer for `culture`.
///
/// Culture-variant content asked for in a specific culture needs that culture
/// available, and outside preview also published. Everything else is included only
/// when no culture was requested and the type does not vary by culture; outside
/// preview the content must also be published.
pub fn should_include_content_in_cache(
    content: &ContentNode,
    preview: bool,
    culture: Option<&str>,
) -> bool {
    let varies = content.content_type.varies_by_culture();
    if let Some(culture) = culture.filter(|_| varies) {
        let available = content.is_culture_available(culture);
        return if preview {
            available
        } else {
            available && content.is_culture_published(culture)
        };
    }

    let invariant_query = culture.is_none() && !varies;
    if preview {
        invariant_query
    } else {
        invariant_query && content.published
    }
}

/// Visibility of a single item fetched by id or key.
fn is_visible(content: &ContentNode, preview: bool) -> bool {
    preview || content.published
}

pub struct PublishedContentCache {
    cache: RegionCache,
    service: Arc<dyn ContentService>,
}

impl PublishedContentCache {
    pub(crate) fn new(cache: RegionCache, service: Arc<dyn ContentService>) -> Self {
        Self { cache, service }
    }

    pub fn at_root(&self, preview: bool, culture: Option<&str>) -> RepoResult<Vec<PublishedContent>> {
        let key = PublishedKey::ContentKeysAtRoot {
            preview,
            culture: culture.map(str::to_string),
        };
        let keys = self.cache.get_or_set_list(&key, || {
            Ok(self
                .service
                .root_content()?
                .into_iter()
                .filter(|node| should_include_content_in_cache(node, preview, culture))
                .map(|node| node.key)
                .collect::<Vec<Uuid>>())
        })?;
        self.resolve(preview, &keys)
    }

    /// Content of the given type anywhere in the tree, roots included.
    pub fn by_content_type(
        &self,
        preview: bool,
        content_type: &ContentTypeInfo,
    ) -> RepoResult<Vec<PublishedContent>> {
        let key = PublishedKey::ContentKeysByContentType {
            preview,
            alias: content_type.alias.clone(),
        };
        let keys = self.cache.get_or_set_list(&key, || {
            let mut keys = Vec::new();
            for root in self.service.root_content()? {
                let descendants = self.service.descendants(root.id)?;
                keys.extend(
                    std::iter::once(root)
                        .chain(descendants)
                        .filter(|node| node.content_type.id == content_type.id)
                        .map(|node| node.key),
                );
            }
            Ok(keys)
        })?;
        self.resolve(preview, &keys)
    }

    /// Same visibility as [`Self::by_key`].
    pub fn by_id(&self, preview: bool, id: i32) -> RepoResult<Option<PublishedContent>> {
        let key = self.cache.get_or_set(&PublishedKey::ContentKeyById { preview, id }, || {
            Ok(self
                .service
                .by_id(id)?
                .filter(|node| is_visible(node, preview))
                .map(|node| node.key))
        })?;
        match key {
            Some(key) => self.by_key(preview, key),
            None => Ok(None),
        }
    }

    /// Published items resolve, and any item resolves in preview. No culture is
    /// checked, so variant content is visible by id or key whichever cultures are
    /// published.
    pub fn by_key(&self, preview: bool, key: Uuid) -> RepoResult<Option<PublishedContent>> {
        self.cache.get_or_set(&PublishedKey::ContentByKey { preview, key }, || {
            Ok(self
                .service
                .by_key(key)?
                .filter(|node| is_visible(node, preview))
                .map(|node| PublishedContent::from_node(&node, preview)))
        })
    }

    pub fn has_by_id(&self, preview: bool, id: i32) -> RepoResult<bool> {
        Ok(self.by_id(preview, id)?.is_some())
    }

    pub fn has_content(&self, preview: bool) -> RepoResult<bool> {
        Ok(!self.at_root(preview, None)?.is_empty())
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }

    fn resolve(&self, preview: bool, keys: &[Uuid]) -> RepoResult<Vec<PublishedContent>> {
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            match self.by_key(preview, *key)? {
                Some(content) => resolved.push(content),
                None => debug!(%key, preview, "Cached content key no longer resolves"),
            }
        }
        Ok(resolved)
    }
}
