//! Meeting records as served by the meetings API

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Scheduled meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Meeting ID
    #[serde(alias = "_id")]
    pub id: String,
    /// Display title
    pub title: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start time
    pub scheduled_date_time: DateTime<Utc>,
    /// Length in minutes
    #[serde(default)]
    pub duration: u32,
    /// Minutes before start at which to remind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<u32>,
    /// Room to join
    #[serde(default)]
    pub room_id: String,
    /// Room password, if the room is protected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_password: Option<String>,
}

impl Meeting {
    /// Reminder offset; a zero offset means no reminder
    pub fn reminder_offset(&self) -> Option<Duration> {
        match self.reminder_time {
            Some(minutes) if minutes > 0 => Some(Duration::minutes(i64::from(minutes))),
            _ => None,
        }
    }

    /// Time left until the meeting starts; negative once started
    pub fn starts_in(&self, now: DateTime<Utc>) -> Duration {
        self.scheduled_date_time - now
    }

    /// End time
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_date_time + Duration::minutes(i64::from(self.duration))
    }
}
