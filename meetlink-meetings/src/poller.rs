//! Background reminder poller
//!
//! The poller refetches the meeting list on one timer and re-evaluates
//! reminders on another. Fetches run as detached tasks so a slow request
//! never delays the next tick; a fetch that completes after the poller has
//! stopped is discarded.

use crate::client::MeetingSource;
use crate::error::MeetingsError;
use crate::meeting::Meeting;
use crate::notify::{NotificationPermission, Notifier};
use crate::reminder::{Reminder, ReminderTracker};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Poller timing
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Meeting list refresh interval
    pub fetch_interval: Duration,
    /// Reminder evaluation interval
    pub check_interval: Duration,
    /// Icon attached to OS notifications
    pub icon: Option<String>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_secs(60),
            check_interval: Duration::from_secs(30),
            icon: None,
        }
    }
}

impl ReminderConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MeetingsError> {
        if self.fetch_interval.is_zero() || self.check_interval.is_zero() {
            return Err(MeetingsError::InvalidConfiguration {
                message: "poll intervals must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

struct PollerShared {
    meetings: RwLock<Vec<Meeting>>,
    tracker: Mutex<ReminderTracker>,
    stopped: AtomicBool,
    notifier: Arc<dyn Notifier>,
    icon: Option<String>,
}

impl PollerShared {
    fn evaluate(&self) -> Vec<Reminder> {
        if self.stopped.load(Ordering::SeqCst) {
            return Vec::new();
        }
        let due = {
            let meetings = self.meetings.read();
            if meetings.is_empty() {
                return Vec::new();
            }
            self.tracker.lock().evaluate(&meetings, Utc::now())
        };

        for reminder in &due {
            info!("Reminding about meeting {}", reminder.meeting_id);
            self.notifier.toast(&reminder.message);
            if self.notifier.permission() == NotificationPermission::Granted {
                self.notifier
                    .show(&reminder.notification(self.icon.as_deref()));
            }
        }
        due
    }

    fn store(&self, meetings: Vec<Meeting>) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("Discarding meeting list fetched after stop");
            return false;
        }
        *self.meetings.write() = meetings;
        true
    }
}

/// Spawns reminder pollers
pub struct ReminderPoller;

impl ReminderPoller {
    /// Start polling `source` and notifying through `notifier`.
    ///
    /// Asks for notification permission once if it is still
    /// [`NotificationPermission::Default`] and fetches immediately without
    /// waiting for the answer.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or no tokio runtime is running.
    pub fn spawn(
        source: Arc<dyn MeetingSource>,
        notifier: Arc<dyn Notifier>,
        config: ReminderConfig,
    ) -> Result<PollerHandle, MeetingsError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| MeetingsError::Runtime {
            reason: e.to_string(),
        })?;

        let shared = Arc::new(PollerShared {
            meetings: RwLock::new(Vec::new()),
            tracker: Mutex::new(ReminderTracker::new()),
            stopped: AtomicBool::new(false),
            notifier,
            icon: config.icon.clone(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        runtime.spawn(Self::run(
            source.clone(),
            shared.clone(),
            config,
            shutdown_rx,
        ));

        Ok(PollerHandle {
            source,
            shared,
            shutdown_tx,
        })
    }

    async fn run(
        source: Arc<dyn MeetingSource>,
        shared: Arc<PollerShared>,
        config: ReminderConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        // The prompt may stay unanswered; polling does not wait for it.
        if shared.notifier.permission() == NotificationPermission::Default {
            let notifier = shared.notifier.clone();
            let mut prompt_shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = prompt_shutdown.changed() => {}
                    permission = notifier.request_permission() => {
                        debug!("Notification permission: {:?}", permission);
                    }
                }
            });
        }

        let mut fetch = interval(config.fetch_interval);
        fetch.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut check = interval(config.check_interval);
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first check tick fires immediately; the list is still empty then.
        check.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = fetch.tick() => {
                    let source = source.clone();
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        match source.list_meetings().await {
                            Ok(meetings) => {
                                if shared.store(meetings) {
                                    shared.evaluate();
                                }
                            }
                            Err(e) => warn!("Failed to fetch meetings: {}", e),
                        }
                    });
                }
                _ = check.tick() => {
                    shared.evaluate();
                }
            }
        }
        debug!("Reminder poller stopped");
    }
}

/// Handle to a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    source: Arc<dyn MeetingSource>,
    shared: Arc<PollerShared>,
    shutdown_tx: watch::Sender<bool>,
}

impl PollerHandle {
    /// Stop both timers. Idempotent.
    pub fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(true);
        }
    }

    /// Whether the poller is still running
    pub fn is_running(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Snapshot of the loaded meetings
    pub fn meetings(&self) -> Vec<Meeting> {
        self.shared.meetings.read().clone()
    }

    /// Whether a reminder has fired for `meeting_id`
    pub fn is_reminded(&self, meeting_id: &str) -> bool {
        self.shared.tracker.lock().is_reminded(meeting_id)
    }

    /// Evaluate reminders now instead of waiting for the next tick
    pub fn check_now(&self) -> Vec<Reminder> {
        self.shared.evaluate()
    }

    /// Delete a meeting remotely and drop it from the loaded list
    pub async fn delete_meeting(&self, id: &str) -> Result<(), MeetingsError> {
        self.source.delete_meeting(id).await?;
        self.shared.meetings.write().retain(|m| m.id != id);
        Ok(())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
