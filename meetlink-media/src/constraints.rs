//! Capture constraints
//!
//! Constraints serialize to the `{video: bool|object, audio: bool|object}`
//! shape capture APIs accept: a disabled kind is `false`, a kind requested
//! with platform defaults is `true`, and a constrained kind is an object.

use crate::error::{MediaError, MediaResult};
use crate::tracks::TrackKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Request for one kind of track
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackRequest<T> {
    /// Do not capture this kind
    #[default]
    Disabled,
    /// Capture with platform defaults
    Enabled,
    /// Capture with explicit constraints
    Constrained(T),
}

impl<T> TrackRequest<T> {
    /// Whether a track of this kind is requested
    pub fn is_requested(&self) -> bool {
        !matches!(self, TrackRequest::Disabled)
    }

    /// Explicit constraints, if any
    pub fn constraints(&self) -> Option<&T> {
        match self {
            TrackRequest::Constrained(c) => Some(c),
            _ => None,
        }
    }
}

impl<T: Serialize> Serialize for TrackRequest<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TrackRequest::Disabled => serializer.serialize_bool(false),
            TrackRequest::Enabled => serializer.serialize_bool(true),
            TrackRequest::Constrained(c) => c.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for TrackRequest<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Flag(bool),
            Object(T),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(false) => TrackRequest::Disabled,
            Repr::Flag(true) => TrackRequest::Enabled,
            Repr::Object(c) => TrackRequest::Constrained(c),
        })
    }
}

/// Video capture constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    /// Ideal width in pixels
    pub width: u32,
    /// Ideal height in pixels
    pub height: u32,
    /// Ideal frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Preferred camera, e.g. `user` or `environment`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing_mode: Option<String>,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: None,
            facing_mode: None,
        }
    }
}

/// Audio capture constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    /// Enable echo cancellation
    pub echo_cancellation: bool,
    /// Enable noise suppression
    pub noise_suppression: bool,
    /// Enable automatic gain control
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Constraints for a capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Video request
    pub video: TrackRequest<VideoConstraints>,
    /// Audio request
    pub audio: TrackRequest<AudioConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: TrackRequest::Constrained(VideoConstraints::default()),
            audio: TrackRequest::Constrained(AudioConstraints::default()),
        }
    }
}

impl MediaConstraints {
    /// Request video only, with platform defaults
    pub fn video_only() -> Self {
        Self {
            video: TrackRequest::Enabled,
            audio: TrackRequest::Disabled,
        }
    }

    /// Request audio only, with platform defaults
    pub fn audio_only() -> Self {
        Self {
            video: TrackRequest::Disabled,
            audio: TrackRequest::Enabled,
        }
    }

    /// Whether a track of `kind` is requested
    pub fn requests(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.video.is_requested(),
            TrackKind::Audio => self.audio.is_requested(),
        }
    }

    /// Validate constraints
    pub fn validate(&self) -> MediaResult<()> {
        if !self.video.is_requested() && !self.audio.is_requested() {
            return Err(MediaError::InvalidConfiguration {
                message: "at least one of video or audio must be requested".to_string(),
            });
        }

        if let Some(video) = self.video.constraints() {
            if video.width == 0 || video.height == 0 {
                return Err(MediaError::InvalidConfiguration {
                    message: "Invalid resolution".to_string(),
                });
            }
            if let Some(rate) = video.frame_rate {
                if rate <= 0.0 || rate > 120.0 {
                    return Err(MediaError::InvalidConfiguration {
                        message: "Invalid framerate".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
