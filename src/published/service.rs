use std::sync::Arc;

use tracing::{debug, info};

use super::content::PublishedContentCache;
use super::domain::DomainCache;
use super::media::PublishedMediaCache;
use super::member::PublishedMemberCache;
use super::read_through::RegionCache;
use super::services::{
    ContentService, DefaultCultureAccessor, DomainService, MediaService, MemberService,
};
use super::snapshot::PublishedSnapshot;
use crate::cache::{AppCache, AppCacheExt, AppCaches, CacheConfig, CacheRegion};

/// Runtime-cache key holding the last recorded rebuild status.
pub const STATUS_CACHE_KEY: &str = "PublishedSnapshotStatus";

/// Status reported until a rebuild records one.
pub const STATUS_UNKNOWN: &str = "NOT ok (rebuild?)";

/// Backing services for the published caches.
#[derive(Clone)]
pub struct PublishedServices {
    pub content: Arc<dyn ContentService>,
    pub media: Arc<dyn MediaService>,
    pub members: Arc<dyn MemberService>,
    pub domains: Arc<dyn DomainService>,
    pub default_culture: Arc<dyn DefaultCultureAccessor>,
}

/// What changed in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRefresh {
    Content,
    Media,
    Member,
    Domain,
    /// Content, media or member types changed; every typed query is stale.
    ContentType,
    All,
}

impl CacheRefresh {
    fn regions(self) -> &'static [CacheRegion] {
        match self {
            CacheRefresh::Content => &[CacheRegion::PublishedContent],
            CacheRefresh::Media => &[CacheRegion::PublishedMedia],
            CacheRefresh::Member => &[CacheRegion::PublishedMember],
            CacheRefresh::Domain => &[CacheRegion::Domain],
            CacheRefresh::ContentType => &[
                CacheRegion::PublishedContent,
                CacheRegion::PublishedMedia,
                CacheRegion::PublishedMember,
            ],
            CacheRefresh::All => &[
                CacheRegion::PublishedContent,
                CacheRegion::PublishedMedia,
                CacheRegion::PublishedMember,
                CacheRegion::Domain,
            ],
        }
    }
}

/// Owns the shared published caches and hands out snapshots over them.
pub struct PublishedSnapshotService {
    caches: Arc<AppCaches>,
    content: Arc<PublishedContentCache>,
    media: Arc<PublishedMediaCache>,
    members: Arc<PublishedMemberCache>,
    domains: Arc<DomainCache>,
}

impl PublishedSnapshotService {
    pub fn new(caches: Arc<AppCaches>, config: &CacheConfig, services: PublishedServices) -> Self {
        let expiration = config.published_expiration();
        let region =
            |region: CacheRegion| RegionCache::new(region, caches.region(region), expiration);
        let content = Arc::new(PublishedContentCache::new(
            region(CacheRegion::PublishedContent),
            services.content,
        ));
        let media = Arc::new(PublishedMediaCache::new(
            region(CacheRegion::PublishedMedia),
            services.media,
        ));
        let members = Arc::new(PublishedMemberCache::new(
            region(CacheRegion::PublishedMember),
            services.members,
        ));
        let domains = Arc::new(DomainCache::new(
            region(CacheRegion::Domain),
            services.domains,
            services.default_culture,
        ));
        Self {
            caches,
            content,
            media,
            members,
            domains,
        }
    }

    /// A snapshot for one request. Preview is on when a non-blank token is given.
    pub fn create_published_snapshot(&self, preview_token: Option<&str>) -> PublishedSnapshot {
        let preview = preview_token.is_some_and(|token| !token.trim().is_empty());
        debug!(preview, "Creating published snapshot");
        PublishedSnapshot::new(
            preview,
            Arc::clone(&self.content),
            Arc::clone(&self.media),
            Arc::clone(&self.members),
            Arc::clone(&self.domains),
        )
    }

    pub fn status(&self) -> String {
        self.caches
            .runtime_cache()
            .get_typed::<String>(STATUS_CACHE_KEY)
            .unwrap_or_else(|| STATUS_UNKNOWN.to_string())
    }

    pub fn mark_status(&self, status: impl Into<String>) {
        self.caches.runtime_cache().insert_typed(
            STATUS_CACHE_KEY,
            status.into(),
            crate::cache::Expiration::Never,
        );
    }

    /// Drops every cached query affected by `refresh`.
    pub fn notify(&self, refresh: CacheRefresh) {
        for region in refresh.regions() {
            match region {
                CacheRegion::PublishedContent => self.content.clear(),
                CacheRegion::PublishedMedia => self.media.clear(),
                CacheRegion::PublishedMember => self.members.clear(),
                CacheRegion::Domain => self.domains.clear(),
                CacheRegion::Elements | CacheRegion::Snapshot => {}
            }
        }
        info!(?refresh, regions = ?refresh.regions(), "Published caches refreshed");
    }

    /// Clears the status and every published region.
    pub fn rebuild(&self) {
        self.notify(CacheRefresh::All);
        self.caches.runtime_cache().remove(STATUS_CACHE_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::published::testing::{invariant_node, services};

    #[test]
    fn preview_follows_token() {
        let service = PublishedSnapshotService::new(
            Arc::new(AppCaches::new()),
            &CacheConfig::default(),
            services(vec![]),
        );
        assert!(!service.create_published_snapshot(None).preview());
        assert!(!service.create_published_snapshot(Some("  ")).preview());
        assert!(service.create_published_snapshot(Some("token")).preview());
    }

    #[test]
    fn status_defaults_until_marked() {
        let service = PublishedSnapshotService::new(
            Arc::new(AppCaches::new()),
            &CacheConfig::default(),
            services(vec![]),
        );
        assert_eq!(service.status(), STATUS_UNKNOWN);
        service.mark_status("Ok");
        assert_eq!(service.status(), "Ok");
        service.rebuild();
        assert_eq!(service.status(), STATUS_UNKNOWN);
    }

    #[test]
    fn notify_clears_only_affected_regions() {
        let caches = Arc::new(AppCaches::new());
        let service = PublishedSnapshotService::new(
            caches.clone(),
            &CacheConfig::default(),
            services(vec![invariant_node(1).published(true)]),
        );
        let snapshot = service.create_published_snapshot(None);
        snapshot.content_at_root(None).unwrap();
        snapshot.domains().all(false).unwrap();
        assert!(!caches.region(CacheRegion::PublishedContent).is_empty());
        assert!(!caches.region(CacheRegion::Domain).is_empty());

        service.notify(CacheRefresh::Content);
        assert!(caches.region(CacheRegion::PublishedContent).is_empty());
        assert!(!caches.region(CacheRegion::Domain).is_empty());
    }
}
