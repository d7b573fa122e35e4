use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{
    DefaultRepositoryCachePolicy, FullDataSetRepositoryCachePolicy, NoCacheRepositoryCachePolicy,
    PolicyKind, RepositoryCachePolicy, RepositoryCachePolicyOptions,
    SingleItemsOnlyRepositoryCachePolicy,
};
use crate::cache::{AppCaches, CacheConfig};
use crate::entity::{CacheId, Entity, EntityKind};

/// Kinds whose whole collection is small and enumerated often.
const FULL_DATA_SET_KINDS: [EntityKind; 11] = [
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
];

const SINGLE_ITEMS_ONLY_KINDS: [EntityKind; 1] = [EntityKind::DictionaryItem];

/// Maps entity kinds to the cache policy their repositories use.
///
/// Built once at startup. Kinds missing from the table use [`PolicyKind::Default`].
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    table: BTreeMap<EntityKind, PolicyKind>,
}

impl PolicyRegistry {
    /// A registry with no entries; every kind maps to `Default`.
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, kind: EntityKind, policy: PolicyKind) -> Self {
        self.table.insert(kind, policy);
        self
    }

    pub fn policy_for(&self, kind: EntityKind) -> PolicyKind {
        self.table.get(&kind).copied().unwrap_or(PolicyKind::Default)
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntityKind, PolicyKind)> + '_ {
        self.table.iter().map(|(kind, policy)| (*kind, *policy))
    }

    /// Builds the policy registered for `E::KIND`, with options and lifetimes taken
    /// from `config`.
    pub fn create<E: Entity, I: CacheId>(
        &self,
        caches: Arc<AppCaches>,
        config: &CacheConfig,
    ) -> Arc<dyn RepositoryCachePolicy<E, I>> {
        self.create_with_options(caches, config, config.policy_options())
    }

    /// Like [`PolicyRegistry::create`], with caller-supplied "get all" options (for
    /// example carrying the repository's count routine).
    pub fn create_with_options<E: Entity, I: CacheId>(
        &self,
        caches: Arc<AppCaches>,
        config: &CacheConfig,
        options: RepositoryCachePolicyOptions,
    ) -> Arc<dyn RepositoryCachePolicy<E, I>> {
        let kind = self.policy_for(E::KIND);
        debug!(entity = E::TYPE_NAME, kind = %E::KIND, policy = %kind, "Selected cache policy");
        match kind {
            PolicyKind::NoCache => Arc::new(NoCacheRepositoryCachePolicy::new()),
            PolicyKind::Default => Arc::new(DefaultRepositoryCachePolicy::new(
                caches,
                options,
                config.entity_expiration(),
            )),
            PolicyKind::FullDataSet => Arc::new(FullDataSetRepositoryCachePolicy::new(
                caches,
                config.full_data_set_expiration(),
            )),
            PolicyKind::SingleItemsOnly => Arc::new(SingleItemsOnlyRepositoryCachePolicy::new(
                caches,
                options,
                config.entity_expiration(),
            )),
        }
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        let full = FULL_DATA_SET_KINDS
            .into_iter()
            .map(|kind| (kind, PolicyKind::FullDataSet));
        let single = SINGLE_ITEMS_ONLY_KINDS
            .into_iter()
            .map(|kind| (kind, PolicyKind::SingleItemsOnly));
        Self {
            table: full.chain(single).collect(),
        }
    }
}
