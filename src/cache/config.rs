//! Cache configuration.
//!
//! Controls entry lifetimes, "get all" validation and per-kind policy overrides via the
//! `[cache]` table of `pubcache.toml`.

use std::collections::BTreeMap;
use std::time::Duration;

use super::app_cache::Expiration;
use crate::entity::EntityKind;
use crate::policy::{PolicyKind, PolicyRegistry, RepositoryCachePolicyOptions};

pub(crate) const DEFAULT_ENTITY_TTL_SECS: u64 = 300;
pub(crate) const DEFAULT_PUBLISHED_TTL_SECS: u64 = 3600;

/// Typed cache configuration shared by repository policies and published caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Sliding lifetime of per-entity repository entries.
    pub entity_ttl: Duration,
    /// Whether full-data-set entries expire (with `entity_ttl`) or live until invalidated.
    pub full_data_set_expires: bool,
    /// Absolute lifetime of published-content query entries.
    pub published_ttl: Duration,
    pub get_all_validate_count: bool,
    pub get_all_allow_zero_count: bool,
    /// Policy overrides applied on top of the built-in kind table.
    pub policy_overrides: BTreeMap<EntityKind, PolicyKind>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl: Duration::from_secs(DEFAULT_ENTITY_TTL_SECS),
            full_data_set_expires: false,
            published_ttl: Duration::from_secs(DEFAULT_PUBLISHED_TTL_SECS),
            get_all_validate_count: true,
            get_all_allow_zero_count: false,
            policy_overrides: BTreeMap::new(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            entity_ttl: settings.entity_ttl,
            full_data_set_expires: settings.full_data_set_expires,
            published_ttl: settings.published_ttl,
            get_all_validate_count: settings.get_all_validate_count,
            get_all_allow_zero_count: settings.get_all_allow_zero_count,
            policy_overrides: settings.policies.clone(),
        }
    }
}

impl CacheConfig {
    pub fn entity_expiration(&self) -> Expiration {
        Expiration::Sliding(self.entity_ttl)
    }

    pub fn full_data_set_expiration(&self) -> Expiration {
        if self.full_data_set_expires {
            Expiration::Sliding(self.entity_ttl)
        } else {
            Expiration::Never
        }
    }

    pub fn published_expiration(&self) -> Expiration {
        Expiration::Absolute(self.published_ttl)
    }

    /// "Get all" options without a count callback; repositories attach theirs.
    pub fn policy_options(&self) -> RepositoryCachePolicyOptions {
        RepositoryCachePolicyOptions {
            get_all_validate_count: self.get_all_validate_count,
            get_all_allow_zero_count: self.get_all_allow_zero_count,
            perform_count: None,
        }
    }

    pub fn policy_registry(&self) -> PolicyRegistry {
        self.policy_overrides
            .iter()
            .fold(PolicyRegistry::default(), |registry, (kind, policy)| {
                registry.with_override(*kind, *policy)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_repository_conventions() {
        let config = CacheConfig::default();
        assert_eq!(
            config.entity_expiration(),
            Expiration::Sliding(Duration::from_secs(300))
        );
        assert_eq!(config.full_data_set_expiration(), Expiration::Never);
        assert_eq!(
            config.published_expiration(),
            Expiration::Absolute(Duration::from_secs(3600))
        );
        let options = config.policy_options();
        assert!(options.get_all_validate_count);
        assert!(!options.get_all_allow_zero_count);
    }

    #[test]
    fn overrides_feed_the_policy_registry() {
        let mut config = CacheConfig::default();
        config
            .policy_overrides
            .insert(EntityKind::Template, PolicyKind::NoCache);
        let registry = config.policy_registry();
        assert_eq!(registry.policy_for(EntityKind::Template), PolicyKind::NoCache);
        assert_eq!(registry.policy_for(EntityKind::Language), PolicyKind::FullDataSet);
    }
}
