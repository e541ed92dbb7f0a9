//! User-visible error notifications.

use std::time::{Duration, Instant};

use serde::Serialize;

pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_millis(2_000);
const ERROR_TITLE: &str = "Error";
const UNKNOWN_ERROR: &str = "Unknown error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn error(description: impl Into<String>) -> Self {
        let description = description.into();
        let description = if description.trim().is_empty() {
            UNKNOWN_ERROR.to_owned()
        } else {
            description
        };

        Self {
            title: ERROR_TITLE.to_owned(),
            description,
        }
    }
}

pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Keeps every notification it receives, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    delivered: Vec<Notification>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> &[Notification] {
        &self.delivered
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notification: Notification) {
        self.delivered.push(notification);
    }
}

/// Drops a notification whose text equals the previous one shown less than
/// `window` ago.
#[derive(Debug)]
pub struct DedupingNotifier<N> {
    inner: N,
    window: Duration,
    last: Option<(String, Instant)>,
}

impl<N: Notifier> DedupingNotifier<N> {
    pub fn new(inner: N, window: Duration) -> Self {
        Self {
            inner,
            window,
            last: None,
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }

    pub fn notify_at(&mut self, notification: Notification, now: Instant) {
        if let Some((text, shown_at)) = &self.last {
            if *text == notification.description && now.duration_since(*shown_at) < self.window {
                tracing::debug!(description = %notification.description, "duplicate notification suppressed");
                return;
            }
        }

        self.last = Some((notification.description.clone(), now));
        self.inner.notify(notification);
    }
}

impl<N: Notifier> Notifier for DedupingNotifier<N> {
    fn notify(&mut self, notification: Notification) {
        self.notify_at(notification, Instant::now());
    }
}
