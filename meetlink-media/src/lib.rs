//! # MeetLink Media
//!
//! Camera and microphone capture for MeetLink clients. Capture requests go
//! through the first capture API the platform exposes, failures are folded
//! into a handful of user-facing kinds, and the single held stream is
//! released on every exit path.

#![warn(clippy::all)]

pub mod capture;
pub mod constraints;
pub mod error;
pub mod manager;
pub mod tracks;

// Re-export main types
pub use capture::{
    select_backend, CaptureApi, CaptureBackend, CapturePlatform, NoCapture, VirtualDevice,
    VirtualPlatform,
};
pub use constraints::{AudioConstraints, MediaConstraints, TrackRequest, VideoConstraints};
pub use error::{CaptureErrorKind, DeviceError, ErrorCategory, MediaError, MediaResult};
pub use manager::{MediaCaptureManager, MediaEvent};
pub use tracks::{DeviceLease, MediaStream, MediaTrack, TrackKind, TrackState};

#[cfg(feature = "native")]
pub use capture::NativePlatform;
