//! Notification sinks
//!
//! Reminders surface twice: as an in-app toast, which is always shown, and
//! as an OS notification, which needs the user's permission.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// OS notification permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    /// The user has not been asked yet
    Default,
    /// Notifications may be shown
    Granted,
    /// The user refused
    Denied,
}

/// OS-level notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Icon URL or path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Tag; notifications sharing a tag replace each other
    pub tag: String,
}

/// Sink for reminder notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Current OS notification permission
    fn permission(&self) -> NotificationPermission;

    /// Ask the user for OS notification permission
    async fn request_permission(&self) -> NotificationPermission;

    /// Show an in-app toast
    fn toast(&self, message: &str);

    /// Show an OS notification
    fn show(&self, notification: &Notification);
}

/// Notifier that writes to the log. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    async fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn toast(&self, message: &str) {
        info!("Reminder: {}", message);
    }

    fn show(&self, notification: &Notification) {
        info!(
            "Notification [{}] {}: {}",
            notification.tag, notification.title, notification.body
        );
    }
}
