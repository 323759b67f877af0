//! Track and stream types
//!
//! A [`MediaTrack`] holds a lease on the hardware it captures from. The
//! lease is released exactly once, either by an explicit [`MediaTrack::stop`]
//! or when the track is dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone
    Audio,
    /// Camera
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Track lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Capturing
    Live,
    /// Stopped, hardware released
    Ended,
}

/// Hold on a capture device, released when the track stops
pub trait DeviceLease: Send + Sync {
    /// Release the device
    fn release(&self);
}

/// A single captured track
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    enabled: bool,
    state: TrackState,
    lease: Option<Arc<dyn DeviceLease>>,
}

impl MediaTrack {
    /// Create a live track holding `lease`
    pub fn new(kind: TrackKind, label: impl Into<String>, lease: Arc<dyn DeviceLease>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            enabled: true,
            state: TrackState::Live,
            lease: Some(lease),
        }
    }

    /// Track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Device label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the track is producing media
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or mute the track without releasing the device
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current state
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Stop the track and release its device. Idempotent.
    pub fn stop(&mut self) {
        if let Some(lease) = self.lease.take() {
            lease.release();
        }
        self.state = TrackState::Ended;
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .finish()
    }
}

/// Set of tracks acquired by one capture request
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Create a stream from acquired tracks
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// Stream ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All tracks
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Tracks of `kind`
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// Whether the stream carries a track of `kind`
    pub fn has(&self, kind: TrackKind) -> bool {
        self.tracks_of(kind).next().is_some()
    }

    /// First track of `kind`
    pub fn first_mut(&mut self, kind: TrackKind) -> Option<&mut MediaTrack> {
        self.tracks.iter_mut().find(|t| t.kind == kind)
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| t.state == TrackState::Live)
    }

    /// Stop every track
    pub fn stop_all(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}
