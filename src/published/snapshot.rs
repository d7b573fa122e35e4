//! Per-request published snapshot.
//!
//! A snapshot bundles the shared content, media, member and domain caches with two
//! caches private to the snapshot, and carries the preview flag its convenience
//! readers use. [`PublishedSnapshot::forced_preview`] overrides that flag until the
//! returned guard drops.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::content::PublishedContentCache;
use super::domain::DomainCache;
use super::media::PublishedMediaCache;
use super::member::PublishedMemberCache;
use super::model::PublishedContent;
use crate::cache::lock::mutex_lock;
use crate::cache::{CacheRegion, ObjectCache};
use crate::repository::RepoResult;

const SOURCE: &str = "published::snapshot";

#[derive(Debug)]
struct PreviewState {
    current: bool,
    /// Values saved by active overrides, outermost first.
    saved: Vec<bool>,
}

pub struct PublishedSnapshot {
    content: Arc<PublishedContentCache>,
    media: Arc<PublishedMediaCache>,
    members: Arc<PublishedMemberCache>,
    domains: Arc<DomainCache>,
    snapshot_cache: ObjectCache,
    elements_cache: ObjectCache,
    preview: Mutex<PreviewState>,
}

impl PublishedSnapshot {
    pub(crate) fn new(
        default_preview: bool,
        content: Arc<PublishedContentCache>,
        media: Arc<PublishedMediaCache>,
        members: Arc<PublishedMemberCache>,
        domains: Arc<DomainCache>,
    ) -> Self {
        Self {
            content,
            media,
            members,
            domains,
            snapshot_cache: ObjectCache::new(CacheRegion::Snapshot.prefix()),
            elements_cache: ObjectCache::new(CacheRegion::Elements.prefix()),
            preview: Mutex::new(PreviewState {
                current: default_preview,
                saved: Vec::new(),
            }),
        }
    }

    /// Current default preview flag.
    pub fn preview(&self) -> bool {
        mutex_lock(&self.preview, SOURCE, "preview").current
    }

    pub fn content(&self) -> &PublishedContentCache {
        &self.content
    }

    pub fn media(&self) -> &PublishedMediaCache {
        &self.media
    }

    pub fn members(&self) -> &PublishedMemberCache {
        &self.members
    }

    pub fn domains(&self) -> &DomainCache {
        &self.domains
    }

    /// Cache living as long as this snapshot.
    pub fn snapshot_cache(&self) -> &ObjectCache {
        &self.snapshot_cache
    }

    /// Per-request cache for converted element values.
    pub fn elements_cache(&self) -> &ObjectCache {
        &self.elements_cache
    }

    pub fn content_at_root(&self, culture: Option<&str>) -> RepoResult<Vec<PublishedContent>> {
        self.content.at_root(self.preview(), culture)
    }

    pub fn content_by_id(&self, id: i32) -> RepoResult<Option<PublishedContent>> {
        self.content.by_id(self.preview(), id)
    }

    pub fn content_by_key(&self, key: Uuid) -> RepoResult<Option<PublishedContent>> {
        self.content.by_key(self.preview(), key)
    }

    /// Sets the preview flag to `preview` until the guard drops.
    pub fn forced_preview(&self, preview: bool) -> ForcedPreview<'_> {
        self.push_override(preview, None)
    }

    /// Like [`PublishedSnapshot::forced_preview`]; `callback` receives the restored
    /// value when the guard drops.
    pub fn forced_preview_with<'a, F>(&'a self, preview: bool, callback: F) -> ForcedPreview<'a>
    where
        F: FnOnce(bool) + Send + 'a,
    {
        self.push_override(preview, Some(Box::new(callback)))
    }

    fn push_override<'a>(
        &'a self,
        preview: bool,
        callback: Option<Box<dyn FnOnce(bool) + Send + 'a>>,
    ) -> ForcedPreview<'a> {
        let mut state = mutex_lock(&self.preview, SOURCE, "forced_preview");
        let original = state.current;
        let depth = state.saved.len();
        state.saved.push(original);
        state.current = preview;
        ForcedPreview {
            snapshot: self,
            depth,
            original,
            callback,
        }
    }
}

impl std::fmt::Debug for PublishedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishedSnapshot")
            .field("preview", &self.preview())
            .finish_non_exhaustive()
    }
}

/// Restores the preview flag captured when the override began.
///
/// Dropping an outer guard while an inner one is alive restores the outer value and
/// discards the inner override.
#[must_use = "the override ends as soon as the guard is dropped"]
pub struct ForcedPreview<'a> {
    snapshot: &'a PublishedSnapshot,
    depth: usize,
    original: bool,
    callback: Option<Box<dyn FnOnce(bool) + Send + 'a>>,
}

impl Drop for ForcedPreview<'_> {
    fn drop(&mut self) {
        {
            let mut state = mutex_lock(&self.snapshot.preview, SOURCE, "restore_preview");
            if self.depth < state.saved.len() {
                state.current = self.original;
                state.saved.truncate(self.depth);
            }
        }
        if let Some(callback) = self.callback.take() {
            callback(self.original);
        }
    }
}
