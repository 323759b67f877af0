//! Reminder evaluation
//!
//! A meeting with reminder offset `R` and start time `T` is due when
//! `0 < T - now <= R + 2 minutes`. The extra two minutes absorb the poll
//! granularity so a tick landing just before the boundary is not lost. Each
//! meeting is reminded at most once per tracker.

use crate::meeting::Meeting;
use crate::notify::Notification;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Slack added to every reminder offset
pub const GRACE_WINDOW_MINUTES: i64 = 2;

/// Title of reminder notifications
pub const REMINDER_TITLE: &str = "Meeting Reminder";

/// A reminder that is due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Meeting ID
    pub meeting_id: String,
    /// Meeting title
    pub title: String,
    /// Room to join
    pub room_id: String,
    /// Minutes shown to the user
    pub minutes: i64,
    /// Human readable message
    pub message: String,
}

impl Reminder {
    /// OS notification for this reminder, tagged with the meeting id
    pub fn notification(&self, icon: Option<&str>) -> Notification {
        Notification {
            title: REMINDER_TITLE.to_string(),
            body: self.message.clone(),
            icon: icon.map(str::to_string),
            tag: self.meeting_id.clone(),
        }
    }
}

/// Tracks which meetings have been reminded
#[derive(Debug, Default)]
pub struct ReminderTracker {
    reminded: HashSet<String>,
}

impl ReminderTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `meeting_id` as reminded; `false` if it already was
    pub fn mark_reminded(&mut self, meeting_id: &str) -> bool {
        if self.reminded.contains(meeting_id) {
            return false;
        }
        self.reminded.insert(meeting_id.to_string())
    }

    /// Whether `meeting_id` has been reminded
    pub fn is_reminded(&self, meeting_id: &str) -> bool {
        self.reminded.contains(meeting_id)
    }

    /// Number of meetings reminded so far
    pub fn reminded_count(&self) -> usize {
        self.reminded.len()
    }

    /// Reminders due at `now`. Each returned meeting is marked reminded.
    pub fn evaluate(&mut self, meetings: &[Meeting], now: DateTime<Utc>) -> Vec<Reminder> {
        let mut due = Vec::new();

        for meeting in meetings {
            let Some(offset) = meeting.reminder_offset() else {
                continue;
            };
            let remaining = meeting.starts_in(now);
            let window = offset + Duration::minutes(GRACE_WINDOW_MINUTES);

            if remaining <= Duration::zero() || remaining > window {
                continue;
            }
            if !self.mark_reminded(&meeting.id) {
                continue;
            }

            let minutes = display_minutes(remaining, offset);
            debug!(
                "Meeting {} due for reminder ({}s left)",
                meeting.id,
                remaining.num_seconds()
            );
            due.push(Reminder {
                meeting_id: meeting.id.clone(),
                title: meeting.title.clone(),
                room_id: meeting.room_id.clone(),
                minutes,
                message: format!("\"{}\" starts in {}", meeting.title, plural_minutes(minutes)),
            });
        }

        due
    }
}

/// Nominal offset while inside the grace window, actual time left after it
fn display_minutes(remaining: Duration, offset: Duration) -> i64 {
    let seconds = remaining.num_seconds();
    let left = (seconds + 59) / 60;
    let nominal = offset.num_minutes();
    if left >= nominal {
        nominal
    } else {
        left.max(1)
    }
}

fn plural_minutes(minutes: i64) -> String {
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn meeting(id: &str, starts_in: Duration, reminder: Option<u32>) -> Meeting {
        Meeting {
            id: id.to_string(),
            title: format!("Meeting {}", id),
            description: None,
            scheduled_date_time: now() + starts_in,
            duration: 30,
            reminder_time: reminder,
            room_id: format!("room-{}", id),
            room_password: None,
        }
    }

    #[test]
    fn test_eight_minutes_out_with_ten_minute_reminder() {
        let mut tracker = ReminderTracker::new();
        let meetings = vec![meeting("a", Duration::minutes(8), Some(10))];

        let due = tracker.evaluate(&meetings, now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].minutes, 8);
        assert_eq!(due[0].message, "\"Meeting a\" starts in 8 minutes");

        let later = tracker.evaluate(&meetings, now() + Duration::seconds(30));
        assert!(later.is_empty());
        assert!(tracker.is_reminded("a"));
    }

    #[test]
    fn test_window_bounds() {
        let mut tracker = ReminderTracker::new();
        let meetings = vec![
            meeting("edge", Duration::minutes(12), Some(10)),
            meeting("outside", Duration::minutes(12) + Duration::seconds(1), Some(10)),
            meeting("started", Duration::zero(), Some(10)),
            meeting("past", Duration::minutes(-5), Some(10)),
            meeting("none", Duration::minutes(1), None),
        ];

        let due = tracker.evaluate(&meetings, now());
        let ids: Vec<_> = due.iter().map(|r| r.meeting_id.as_str()).collect();
        assert_eq!(ids, ["edge"]);
    }

    #[test]
    fn test_nominal_phrase_inside_grace_window() {
        let mut tracker = ReminderTracker::new();
        let meetings = vec![meeting("g", Duration::seconds(11 * 60 + 30), Some(10))];

        let due = tracker.evaluate(&meetings, now());
        assert_eq!(due[0].minutes, 10);
        assert!(due[0].message.ends_with("starts in 10 minutes"));
    }

    #[test]
    fn test_late_observation_uses_actual_minutes() {
        let mut tracker = ReminderTracker::new();
        let meetings = vec![meeting("late", Duration::seconds(45), Some(15))];

        let due = tracker.evaluate(&meetings, now());
        assert_eq!(due[0].minutes, 1);
        assert!(due[0].message.ends_with("starts in 1 minute"));
    }

    #[test]
    fn test_notified_once_across_many_ticks() {
        let mut tracker = ReminderTracker::new();
        let meetings = vec![
            meeting("a", Duration::minutes(5), Some(5)),
            meeting("b", Duration::minutes(20), Some(10)),
        ];

        let mut fired = Vec::new();
        for tick in 0..40 {
            let at = now() + Duration::seconds(30 * tick);
            fired.extend(tracker.evaluate(&meetings, at).into_iter().map(|r| r.meeting_id));
        }
        assert_eq!(fired, ["a", "b"]);
        assert_eq!(tracker.reminded_count(), 2);
    }

    #[test]
    fn test_notification_tag() {
        let mut tracker = ReminderTracker::new();
        let due = tracker.evaluate(&[meeting("x", Duration::minutes(3), Some(5))], now());
        let notification = due[0].notification(Some("/logo192.png"));
        assert_eq!(notification.tag, "x");
        assert_eq!(notification.title, REMINDER_TITLE);
        assert_eq!(notification.icon.as_deref(), Some("/logo192.png"));
    }
}
