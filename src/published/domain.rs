//! Domain cache.
//!
//! Domain id lists are cached per query; each id resolves to a validated [`Domain`].
//! Records without a root content id or a language are skipped, not cached.

use std::sync::Arc;

use tracing::{debug, warn};

use super::keys::PublishedKey;
use super::model::{Domain, DomainRecord};
use super::read_through::RegionCache;
use super::services::{DefaultCultureAccessor, DomainService};
use crate::repository::RepoResult;

pub struct DomainCache {
    cache: RegionCache,
    service: Arc<dyn DomainService>,
    default_culture: Arc<dyn DefaultCultureAccessor>,
}

impl DomainCache {
    pub(crate) fn new(
        cache: RegionCache,
        service: Arc<dyn DomainService>,
        default_culture: Arc<dyn DefaultCultureAccessor>,
    ) -> Self {
        Self {
            cache,
            service,
            default_culture,
        }
    }

    pub fn default_culture(&self) -> String {
        self.default_culture.default_culture()
    }

    pub fn all(&self, include_wildcards: bool) -> RepoResult<Vec<Domain>> {
        let ids = self
            .cache
            .get_or_set_list(&PublishedKey::AllDomainIds { include_wildcards }, || {
                Ok(ids_of(self.service.all(include_wildcards)?))
            })?;
        self.resolve(&ids)
    }

    pub fn assigned(&self, document_id: i32, include_wildcards: bool) -> RepoResult<Vec<Domain>> {
        let ids = self.assigned_ids(document_id, include_wildcards)?;
        self.resolve(&ids)
    }

    pub fn has_assigned(&self, document_id: i32, include_wildcards: bool) -> RepoResult<bool> {
        Ok(!self.assigned_ids(document_id, include_wildcards)?.is_empty())
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }

    fn assigned_ids(&self, document_id: i32, include_wildcards: bool) -> RepoResult<Vec<i32>> {
        let key = PublishedKey::AssignedDomainIds {
            document_id,
            include_wildcards,
        };
        self.cache.get_or_set_list(&key, || {
            Ok(ids_of(self.service.assigned(document_id, include_wildcards)?))
        })
    }

    fn domain(&self, id: i32) -> RepoResult<Option<Domain>> {
        self.cache.get_or_set(&PublishedKey::Domain { id }, || {
            Ok(self.service.by_id(id)?.and_then(validate))
        })
    }

    fn resolve(&self, ids: &[i32]) -> RepoResult<Vec<Domain>> {
        let mut domains = Vec::with_capacity(ids.len());
        for id in ids {
            match self.domain(*id)? {
                Some(domain) => domains.push(domain),
                None => debug!(domain_id = id, "Cached domain id no longer resolves"),
            }
        }
        Ok(domains)
    }
}

fn ids_of(records: Vec<DomainRecord>) -> Vec<i32> {
    records.into_iter().map(|record| record.id).collect()
}

fn validate(record: DomainRecord) -> Option<Domain> {
    let Some(content_id) = record.root_content_id else {
        warn!(
            domain_id = record.id,
            "Domain has no root content id; skipped for caching"
        );
        return None;
    };
    let culture = match record.language_iso_code {
        Some(code) if !code.trim().is_empty() => code,
        other => {
            warn!(
                domain_id = record.id,
                language_iso_code = ?other,
                "Domain has no valid language iso code; skipped for caching"
            );
            return None;
        }
    };
    Some(Domain {
        id: record.id,
        name: record.name,
        content_id,
        culture,
        is_wildcard: record.is_wildcard,
        sort_order: record.sort_order,
    })
}
