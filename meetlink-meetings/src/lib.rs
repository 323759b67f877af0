//! # MeetLink Meetings
//!
//! Scheduled meeting list and reminder notifications for MeetLink.
//! Provides the HTTP client for the meetings API, the once-per-session
//! reminder tracker and the background poller that ties them together.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod meeting;
pub mod notify;
pub mod poller;
pub mod reminder;

// Re-export main types
pub use client::{MeetingSource, MeetingsClient, TokenSource};
pub use error::MeetingsError;
pub use meeting::Meeting;
pub use notify::{LogNotifier, Notification, NotificationPermission, Notifier};
pub use poller::{PollerHandle, ReminderConfig, ReminderPoller};
pub use reminder::{Reminder, ReminderTracker, GRACE_WINDOW_MINUTES, REMINDER_TITLE};
