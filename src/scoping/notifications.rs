//! Scope-bound notification queue.
//!
//! Notifications raised inside a scope are held until the outermost scope exits
//! successfully; a rolled-back scope discards its queue.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "scoping::notifications";

/// Monotonic epoch for ordering notifications within this process.
pub type Epoch = u64;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct Notification {
    /// Unique identifier for idempotent delivery.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: NotificationKind,
    pub timestamp: OffsetDateTime,
}

impl Notification {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// An entity was created or updated.
    EntitySaved { entity_type: &'static str, id: i32 },
    EntityDeleted { entity_type: &'static str, id: i32 },
    /// Application-defined notification.
    Custom { name: String },
}

/// Receives the notifications of a successfully completed root scope.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notifications: Vec<Notification>);
}

/// Sink that records each delivered notification as a log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            info!(
                notification_id = %notification.id,
                epoch = notification.epoch,
                kind = ?notification.kind,
                "Notification published"
            );
        }
    }
}

/// Per-scope notification queue.
#[derive(Debug, Default)]
pub struct ScopedNotificationPublisher {
    queue: Mutex<Vec<Notification>>,
    suppressed: AtomicUsize,
}

impl ScopedNotificationPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a notification. Returns `None` when publishing is suppressed.
    pub fn publish(&self, kind: NotificationKind) -> Option<Epoch> {
        if self.is_suppressed() {
            debug!(kind = ?kind, "Notification suppressed");
            return None;
        }
        let notification = Notification::new(kind);
        let epoch = notification.epoch;
        mutex_lock(&self.queue, SOURCE, "publish").push(notification);
        Some(epoch)
    }

    /// Suppresses publishing until the returned guard is dropped.
    pub fn suppress(&self) -> SuppressNotifications<'_> {
        self.suppressed.fetch_add(1, Ordering::AcqRel);
        SuppressNotifications { publisher: self }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Acquire) > 0
    }

    pub fn pending(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "pending").len()
    }

    pub(crate) fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *mutex_lock(&self.queue, SOURCE, "take"))
    }

    pub(crate) fn extend(&self, notifications: Vec<Notification>) {
        mutex_lock(&self.queue, SOURCE, "extend").extend(notifications);
    }

    pub(crate) fn discard(&self) -> usize {
        let mut queue = mutex_lock(&self.queue, SOURCE, "discard");
        let dropped = queue.len();
        queue.clear();
        dropped
    }
}

/// Guard returned by [`ScopedNotificationPublisher::suppress`].
#[must_use = "notifications are only suppressed while the guard is held"]
pub struct SuppressNotifications<'a> {
    publisher: &'a ScopedNotificationPublisher,
}

impl Drop for SuppressNotifications<'_> {
    fn drop(&mut self) {
        self.publisher.suppressed.fetch_sub(1, Ordering::AcqRel);
    }
}
