//! Scope lifetime.
//!
//! A [`Scope`] is a guard: it is active until [`Scope::completed`] is called or the
//! guard is dropped, whichever happens first. Dropping without completing counts as a
//! rollback. Exit runs exactly once and then forwards the outcome to the parent scope.

use std::sync::{Arc, Mutex, Weak};

use metrics::counter;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::ScopeError;
use super::mode::RepositoryCacheMode;
use super::notifications::{NotificationSink, ScopedNotificationPublisher};
use super::unit_of_work::UnitOfWork;
use crate::cache::lock::mutex_lock;
use crate::cache::{AppCaches, IsolatedCaches};

const SOURCE: &str = "scoping::scope";

pub(crate) const METRIC_SCOPE_EXIT: &str = "pubcache_scope_exit_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Active,
    /// Exited; `true` when the scope committed.
    Completed(bool),
}

/// Options for a new scope.
#[derive(Clone, Default)]
pub struct ScopeOptions {
    pub repository_cache_mode: RepositoryCacheMode,
    /// Transaction opened by the new scope. Must be `None` when the parent already
    /// carries one; the child then shares it.
    pub unit_of_work: Option<Arc<dyn UnitOfWork>>,
}

impl ScopeOptions {
    pub fn with_mode(repository_cache_mode: RepositoryCacheMode) -> Self {
        Self {
            repository_cache_mode,
            unit_of_work: None,
        }
    }

    pub fn unit_of_work(mut self, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        self.unit_of_work = Some(unit_of_work);
        self
    }
}

impl std::fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("repository_cache_mode", &self.repository_cache_mode)
            .field("unit_of_work", &self.unit_of_work.is_some())
            .finish()
    }
}

pub(crate) struct ScopeInner {
    pub(crate) id: Uuid,
    pub(crate) parent: Option<Weak<ScopeInner>>,
    pub(crate) mode: RepositoryCacheMode,
    pub(crate) global: Arc<AppCaches>,
    pub(crate) isolated: Arc<IsolatedCaches>,
    pub(crate) owns_isolated: bool,
    pub(crate) unit_of_work: Option<Arc<dyn UnitOfWork>>,
    pub(crate) owns_unit_of_work: bool,
    pub(crate) notifications: ScopedNotificationPublisher,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) state: Mutex<ScopeState>,
}

impl ScopeInner {
    pub(crate) fn state(&self) -> ScopeState {
        *mutex_lock(&self.state, SOURCE, "state")
    }

    fn parent(&self) -> Option<Arc<ScopeInner>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn depth(&self) -> usize {
        match self.parent.as_ref() {
            None => 0,
            Some(parent) => parent.upgrade().map_or(1, |parent| parent.depth() + 1),
        }
    }

    /// Runs exit duties once, then forwards the outcome to the parent.
    fn finish(&self, completed: bool) {
        {
            let mut state = mutex_lock(&self.state, SOURCE, "finish");
            if *state != ScopeState::Active {
                return;
            }
            *state = ScopeState::Completed(completed);
        }

        let committed = self.exit_unit_of_work(completed);
        if committed != completed {
            *mutex_lock(&self.state, SOURCE, "finish") = ScopeState::Completed(committed);
        }

        let parent = self.parent();
        self.exit_isolated_caches(committed);
        self.exit_notifications(committed, parent.as_deref());

        let outcome = if committed { "committed" } else { "rolled_back" };
        counter!(METRIC_SCOPE_EXIT, "outcome" => outcome).increment(1);
        debug!(
            scope_id = %self.id,
            depth = self.depth(),
            mode = %self.mode,
            outcome,
            "Scope exited"
        );

        match parent {
            Some(parent) => parent.finish(committed),
            None if self.parent.is_some() => warn!(
                scope_id = %self.id,
                "Parent scope was dropped before its child; completion not propagated"
            ),
            None => {}
        }
    }

    fn exit_unit_of_work(&self, completed: bool) -> bool {
        let Some(unit_of_work) = self.unit_of_work.as_ref().filter(|_| self.owns_unit_of_work)
        else {
            return completed;
        };

        if !completed {
            unit_of_work.rollback();
            return false;
        }

        match unit_of_work.commit() {
            Ok(()) => true,
            Err(err) => {
                let err = ScopeError::from(err);
                error!(scope_id = %self.id, error = %err, "Rolling back after failed commit");
                unit_of_work.rollback();
                false
            }
        }
    }

    fn exit_isolated_caches(&self, committed: bool) {
        if !self.owns_isolated || self.mode != RepositoryCacheMode::Scoped {
            return;
        }

        if committed {
            let global = self.global.isolated_caches();
            for type_id in self.isolated.type_ids() {
                global.clear_type(type_id);
            }
            debug!(
                scope_id = %self.id,
                types = ?self.isolated.type_names(),
                "Flushed global caches for scoped writes"
            );
        }
        self.isolated.clear_all();
    }

    fn exit_notifications(&self, committed: bool, parent: Option<&ScopeInner>) {
        if !committed {
            let dropped = self.notifications.discard();
            if dropped > 0 {
                debug!(scope_id = %self.id, dropped, "Discarded notifications of rolled back scope");
            }
            return;
        }

        let queued = self.notifications.take();
        if queued.is_empty() {
            return;
        }
        match parent {
            Some(parent) => parent.notifications.extend(queued),
            None if self.parent.is_some() => warn!(
                scope_id = %self.id,
                dropped = queued.len(),
                "Parent scope gone; notifications dropped"
            ),
            None => self.sink.deliver(queued),
        }
    }
}

/// An active unit of work and the cache context repository calls should use.
///
/// Completing a child completes (and exits) its parent with the same outcome.
pub struct Scope {
    pub(crate) inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 0 for a root scope, otherwise the parent's depth plus one.
    pub fn depth(&self) -> usize {
        self.inner.depth()
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.inner.parent().map(|parent| parent.id)
    }

    /// The resolved mode; never `Unspecified` for scopes created by a provider.
    pub fn repository_cache_mode(&self) -> RepositoryCacheMode {
        self.inner.mode
    }

    pub fn isolated_caches(&self) -> &Arc<IsolatedCaches> {
        &self.inner.isolated
    }

    pub fn notifications(&self) -> &ScopedNotificationPublisher {
        &self.inner.notifications
    }

    pub fn unit_of_work(&self) -> Option<&Arc<dyn UnitOfWork>> {
        self.inner.unit_of_work.as_ref()
    }

    pub fn state(&self) -> ScopeState {
        self.inner.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ScopeState::Active
    }

    /// Marks the scope completed and exits it. Subsequent calls are ignored.
    pub fn completed(&self, completed: bool) {
        self.inner.finish(completed);
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.inner.finish(false);
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("state", &self.state())
            .finish()
    }
}
