//! Scopes: nested units of work that decide which cache tier repository calls visit.
//!
//! Scopes are passed explicitly. A repository call made with `Some(&scope)` resolves its
//! cache from that scope's [`RepositoryCacheMode`]; a call made with `None` uses the
//! global caches, exactly as a `Default`-mode scope would.

mod mode;
mod notifications;
mod provider;
mod scope;
mod unit_of_work;

use thiserror::Error;
use uuid::Uuid;

pub use mode::RepositoryCacheMode;
pub use notifications::{
    Epoch, Notification, NotificationKind, NotificationSink, ScopedNotificationPublisher,
    SuppressNotifications, TracingSink,
};
pub use provider::ScopeProvider;
pub(crate) use scope::METRIC_SCOPE_EXIT;
pub use scope::{Scope, ScopeOptions, ScopeState};
pub use unit_of_work::UnitOfWork;

use crate::repository::RepoError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("repository cache mode `{requested}` cannot be less isolated than parent mode `{parent}`")]
    IncompatibleCacheMode {
        requested: RepositoryCacheMode,
        parent: RepositoryCacheMode,
    },
    #[error("a unit of work is already active in the parent scope")]
    NestedUnitOfWork,
    #[error("parent scope {0} has already exited")]
    ParentCompleted(Uuid),
    #[error("failed to commit unit of work: {0}")]
    Commit(#[from] RepoError),
}
