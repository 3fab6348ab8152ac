//! User-visible notifications

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    #[default]
    Default,
    /// Something failed or was refused
    Destructive,
}

/// Toast-style message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short headline
    pub title: String,
    /// Detail line
    pub description: String,
    /// How the message should be styled
    pub severity: Severity,
}

impl Notification {
    /// Notification with an explicit severity
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    /// Failure notification
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Destructive)
    }
}

/// Sink the entitlement layers report failures to
pub trait NotificationSink: Send + Sync {
    /// Show `notification` to the user
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the tracing log
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Destructive => tracing::warn!(
                title = %notification.title,
                "{}", notification.description
            ),
            Severity::Default => tracing::info!(
                title = %notification.title,
                "{}", notification.description
            ),
        }
    }
}

/// Sink that keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: RwLock<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of everything recorded so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().clone()
    }

    /// Number recorded
    pub fn len(&self) -> usize {
        self.notifications.read().len()
    }

    /// Nothing recorded
    pub fn is_empty(&self) -> bool {
        self.notifications.read().is_empty()
    }

    /// Drain recorded notifications
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.write())
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.write().push(notification);
    }
}
