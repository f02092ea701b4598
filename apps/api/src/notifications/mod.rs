//! Transient user-facing notifications with automatic expiry.
//!
//! Every notification owns a Tokio task that removes it once its display
//! duration has elapsed. Dismissing a notification aborts that task, so the
//! queue never relies on a late expiry becoming a harmless no-op (though it is
//! one: an expiry that finds nothing simply returns).

pub mod handlers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

/// How long a notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueInner {
    entries: Vec<Notification>,
    timers: HashMap<Uuid, AbortHandle>,
}

/// Insertion-ordered notification list. Clones share the same queue.
///
/// Must be used from within a Tokio runtime: `notify` spawns the expiry task.
#[derive(Clone, Default)]
pub struct NotificationQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a notification and schedules its removal after [`NOTIFICATION_TTL`].
    pub fn notify(&self, message: impl Into<String>, kind: NotificationKind) -> Uuid {
        // v7 ids combine a millisecond timestamp with random bits.
        let id = Uuid::now_v7();
        let notification = Notification {
            id,
            message: message.into(),
            kind,
            created_at: Utc::now(),
        };
        debug!(%id, ?kind, message = %notification.message, "notification queued");

        let weak = Arc::downgrade(&self.inner);
        let mut inner = self.lock();
        inner.entries.push(notification);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(NOTIFICATION_TTL).await;
            expire(&weak, id);
        });
        inner.timers.insert(id, timer.abort_handle());
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, NotificationKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, NotificationKind::Error)
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, NotificationKind::Warning)
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, NotificationKind::Info)
    }

    /// Removes a notification now and cancels its expiry.
    /// Returns `false` if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut inner = self.lock();
        if let Some(timer) = inner.timers.remove(&id) {
            timer.abort();
        }
        let before = inner.entries.len();
        inner.entries.retain(|n| n.id != id);
        inner.entries.len() != before
    }

    /// Current notifications in insertion order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every notification and cancels all pending expiries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
        inner.entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn expire(inner: &Weak<Mutex<QueueInner>>, id: Uuid) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.timers.remove(&id);
    inner.entries.retain(|n| n.id != id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test(start_paused = true)]
    async fn test_notification_expires_after_ttl() {
        let queue = NotificationQueue::new();
        queue.info("Resume uploaded");

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(queue.len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_then_expiry_is_noop() {
        let queue = NotificationQueue::new();
        let id = queue.error("Upload failed");
        let other = queue.info("Still here");

        assert!(queue.dismiss(id));
        assert!(!queue.dismiss(id));
        assert_eq!(queue.len(), 1);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let late = queue.success("Later");
        tokio::time::sleep(Duration::from_millis(2500)).await;

        // `other` expired on schedule; `late` is still within its window.
        let ids: Vec<_> = queue.snapshot().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![late]);
        assert!(!ids.contains(&other));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_preserves_insertion_order() {
        let queue = NotificationQueue::new();
        let a = queue.info("a");
        let b = queue.warning("b");
        let c = queue.success("c");

        queue.dismiss(b);
        let ids: Vec<_> = queue.snapshot().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_tick_expiry_removes_all() {
        let queue = NotificationQueue::new();
        for i in 0..20 {
            queue.info(format!("n{i}"));
        }
        assert_eq!(queue.len(), 20);

        tokio::time::sleep(NOTIFICATION_TTL + Duration::from_millis(1)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_ids_unique_for_same_instant_inserts() {
        let queue = NotificationQueue::new();
        let ids: HashSet<_> = (0..500).map(|_| queue.info("x")).collect();
        assert_eq!(ids.len(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_timers() {
        let queue = NotificationQueue::new();
        queue.info("a");
        queue.error("b");
        queue.clear();
        assert!(queue.is_empty());

        let fresh = queue.info("c");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.snapshot()[0].id, fresh);
    }

    #[tokio::test]
    async fn test_kind_serializes_lowercase() {
        let queue = NotificationQueue::new();
        queue.warning("Please upload your resume first");
        let value = serde_json::to_value(queue.snapshot()).unwrap();
        assert_eq!(value[0]["kind"], "warning");
    }
}
