//! Transient user-visible notifications.
//!
//! Library code reports user-facing problems (an unresolvable group, a
//! rejected file name) through [`report`], which emits a `tracing` event on
//! the [`NOTIFY_TARGET`] target. A [`NotificationLayer`] attached to the
//! subscriber captures those events into a bounded ring buffer, and a
//! [`NotificationReader`] hands the still-visible ones to the host UI.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Target used for events that should surface as notifications.
pub const NOTIFY_TARGET: &str = "pillbox::notify";

/// Emit a notification at the given level.
pub fn report(level: Level, message: &str) {
    match level {
        Level::ERROR => tracing::error!(target: NOTIFY_TARGET, "{message}"),
        Level::WARN => tracing::warn!(target: NOTIFY_TARGET, "{message}"),
        Level::INFO => tracing::info!(target: NOTIFY_TARGET, "{message}"),
        Level::DEBUG => tracing::debug!(target: NOTIFY_TARGET, "{message}"),
        Level::TRACE => tracing::trace!(target: NOTIFY_TARGET, "{message}"),
    }
}

/// A single captured notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub raised_at: Instant,
    pub level: Level,
    pub message: String,
}

#[derive(Debug)]
struct NotificationBuffer {
    entries: Vec<Notification>,
    capacity: usize,
}

impl NotificationBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, level: Level, message: String) {
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(Notification {
            raised_at: Instant::now(),
            level,
            message,
        });
    }
}

/// A `tracing` layer that captures notification events into a shared ring
/// buffer. Events on other targets are ignored.
#[derive(Debug, Clone)]
pub struct NotificationLayer {
    buffer: Arc<Mutex<NotificationBuffer>>,
    ttl: Duration,
}

impl NotificationLayer {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(NotificationBuffer::new(capacity.max(1)))),
            ttl,
        }
    }

    pub fn from_config(config: &pillbox_config::LoggingConfig) -> Self {
        Self::new(config.notification_capacity, config.notification_ttl())
    }

    pub fn reader(&self) -> NotificationReader {
        NotificationReader {
            buffer: Arc::clone(&self.buffer),
            ttl: self.ttl,
        }
    }
}

impl<S: Subscriber> Layer<S> for NotificationLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target() != NOTIFY_TARGET {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(*metadata.level(), visitor.message);
        }
    }
}

/// Read handle for captured notifications.
#[derive(Debug, Clone)]
pub struct NotificationReader {
    buffer: Arc<Mutex<NotificationBuffer>>,
    ttl: Duration,
}

impl NotificationReader {
    /// Every captured notification, oldest first.
    pub fn entries(&self) -> Vec<Notification> {
        self.buffer
            .lock()
            .map(|buf| buf.entries.clone())
            .unwrap_or_default()
    }

    /// Notifications raised within the time-to-live as of `now`.
    pub fn visible(&self, now: Instant) -> Vec<Notification> {
        self.entries()
            .into_iter()
            .filter(|n| now.saturating_duration_since(n.raised_at) < self.ttl)
            .collect()
    }

    /// The most recent still-visible notification.
    pub fn latest(&self, now: Instant) -> Option<Notification> {
        self.visible(now).pop()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn test_layer_captures_only_notify_target() {
        let layer = NotificationLayer::new(10, Duration::from_secs(60));
        let reader = layer.reader();
        let _guard = tracing_subscriber::registry().with(layer).set_default();

        tracing::info!("ordinary log line");
        report(Level::WARN, "group not found: faces");

        let entries = reader.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::WARN);
        assert_eq!(entries[0].message, "group not found: faces");
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let layer = NotificationLayer::new(2, Duration::from_secs(60));
        let reader = layer.reader();
        let _guard = tracing_subscriber::registry().with(layer).set_default();

        report(Level::INFO, "one");
        report(Level::INFO, "two");
        report(Level::INFO, "three");

        let entries = reader.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "two");
        assert_eq!(reader.latest(Instant::now()).unwrap().message, "three");
    }

    #[test]
    fn test_expired_notifications_are_hidden() {
        let layer = NotificationLayer::new(4, Duration::from_millis(50));
        let reader = layer.reader();
        let _guard = tracing_subscriber::registry().with(layer).set_default();

        report(Level::ERROR, "boom");
        assert_eq!(reader.visible(Instant::now()).len(), 1);

        let later = Instant::now() + Duration::from_secs(1);
        assert!(reader.visible(later).is_empty());
        assert!(reader.latest(later).is_none());
        assert!(!reader.is_empty());
    }
}
