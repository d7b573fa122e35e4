use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use super::ScopeError;
use super::mode::RepositoryCacheMode;
use super::notifications::{NotificationSink, ScopedNotificationPublisher, TracingSink};
use super::scope::{Scope, ScopeInner, ScopeOptions, ScopeState};
use crate::cache::{AppCaches, IsolatedCaches};

/// Creates scopes bound to one set of application caches.
#[derive(Clone)]
pub struct ScopeProvider {
    caches: Arc<AppCaches>,
    sink: Arc<dyn NotificationSink>,
}

impl ScopeProvider {
    pub fn new(caches: Arc<AppCaches>) -> Self {
        Self {
            caches,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn app_caches(&self) -> &Arc<AppCaches> {
        &self.caches
    }

    /// Opens a root scope (`parent == None`) or a child of an active scope.
    pub fn create_scope(
        &self,
        parent: Option<&Scope>,
        options: ScopeOptions,
    ) -> Result<Scope, ScopeError> {
        if let Some(parent) = parent.filter(|parent| parent.state() != ScopeState::Active) {
            return Err(ScopeError::ParentCompleted(parent.id()));
        }

        let mode = options
            .repository_cache_mode
            .resolve(parent.map(Scope::repository_cache_mode))?;

        let inherited = parent.and_then(|parent| parent.unit_of_work().cloned());
        let (unit_of_work, owns_unit_of_work) = match (options.unit_of_work, inherited) {
            (Some(_), Some(_)) => return Err(ScopeError::NestedUnitOfWork),
            (Some(own), None) => (Some(own), true),
            (None, inherited) => (inherited, false),
        };

        let (isolated, owns_isolated) = match parent {
            Some(parent)
                if mode == RepositoryCacheMode::Scoped
                    && parent.repository_cache_mode() == RepositoryCacheMode::Scoped =>
            {
                (Arc::clone(parent.isolated_caches()), false)
            }
            _ => (Arc::new(IsolatedCaches::new("scoped")), true),
        };

        let inner = Arc::new(ScopeInner {
            id: Uuid::new_v4(),
            parent: parent.map(|parent| Arc::downgrade(&parent.inner)),
            mode,
            global: Arc::clone(&self.caches),
            isolated,
            owns_isolated,
            unit_of_work,
            owns_unit_of_work,
            notifications: ScopedNotificationPublisher::new(),
            sink: Arc::clone(&self.sink),
            state: Mutex::new(ScopeState::Active),
        });
        let scope = Scope { inner };

        debug!(
            scope_id = %scope.id(),
            parent_id = ?scope.parent_id(),
            depth = scope.depth(),
            mode = %mode,
            "Created scope"
        );
        Ok(scope)
    }
}

impl std::fmt::Debug for ScopeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeProvider").finish_non_exhaustive()
    }
}
