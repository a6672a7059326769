use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// How long a notification stays visible unless dismissed earlier.
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Notifications shown at once; the oldest is dropped beyond this.
pub const MAX_VISIBLE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.created_at) >= timeout
    }
}

pub type NotificationListener = Box<dyn Fn(&Notification) + Send + Sync>;

/// Stack of transient notifications. Newest last, bounded, expiring after a
/// fixed delay.
pub struct NotificationCenter {
    queue: VecDeque<Notification>,
    next_id: u64,
    timeout: Duration,
    max_visible: usize,
    listeners: Vec<NotificationListener>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NOTIFICATION_TIMEOUT, MAX_VISIBLE)
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("queue", &self.queue)
            .field("timeout", &self.timeout)
            .field("max_visible", &self.max_visible)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl NotificationCenter {
    pub fn new(timeout: Duration, max_visible: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 1,
            timeout,
            max_visible: max_visible.max(1),
            listeners: Vec::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Registers a host callback invoked for every pushed notification.
    pub fn on_notification(&mut self, listener: impl Fn(&Notification) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn push(
        &mut self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        now: Instant,
    ) -> u64 {
        let notification = Notification {
            id: self.next_id,
            kind,
            title: title.into(),
            message: message.into(),
            created_at: now,
        };
        self.next_id += 1;

        info!(
            kind = kind.as_str(),
            title = %notification.title,
            message = %notification.message,
            "Notification"
        );
        for listener in &self.listeners {
            listener(&notification);
        }

        let id = notification.id;
        self.queue.push_back(notification);
        while self.queue.len() > self.max_visible {
            self.queue.pop_front();
        }
        id
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Success, title, message, Instant::now())
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Warning, title, message, Instant::now())
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Error, title, message, Instant::now())
    }

    /// Returns whether the notification was still visible.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|n| n.id != id);
        let removed = self.queue.len() != before;
        if removed {
            debug!(notification_id = id, "Notification dismissed");
        }
        removed
    }

    /// Drops every notification whose lifetime has elapsed at `now`.
    pub fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.queue.len();
        self.queue.retain(|n| !n.is_expired(now, timeout));
        before - self.queue.len()
    }

    pub fn active(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// When the oldest visible notification expires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.iter().map(|n| n.created_at + self.timeout).min()
    }
}
