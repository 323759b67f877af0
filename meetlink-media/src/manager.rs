//! Capture manager
//!
//! [`MediaCaptureManager`] owns at most one [`MediaStream`]. Starting a new
//! stream stops the old one first so two capture handles are never held at
//! once, and dropping the manager releases whatever it still holds.

use crate::capture::{self, CaptureApi, CapturePlatform};
use crate::constraints::MediaConstraints;
use crate::error::{CaptureErrorKind, MediaError, MediaResult};
use crate::tracks::{MediaStream, TrackKind};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capture lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// A stream was acquired
    StreamStarted {
        /// API that served the request
        api: CaptureApi,
        /// Stream carries video
        video: bool,
        /// Stream carries audio
        audio: bool,
    },
    /// The held stream was stopped
    StreamStopped,
    /// A track was enabled or muted
    TrackToggled {
        /// Track kind
        kind: TrackKind,
        /// New enabled state
        enabled: bool,
    },
    /// A capture request failed
    CaptureFailed {
        /// Failure kind, `None` when no capture API exists
        kind: Option<CaptureErrorKind>,
        /// Message for the user
        message: String,
    },
}

/// Owns the active capture stream
pub struct MediaCaptureManager {
    platform: Arc<dyn CapturePlatform>,
    stream: Option<MediaStream>,
    active_api: Option<CaptureApi>,
    last_error: Option<MediaError>,
    event_tx: broadcast::Sender<MediaEvent>,
}

impl MediaCaptureManager {
    /// Create a manager using `platform`
    pub fn new(platform: Arc<dyn CapturePlatform>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            platform,
            stream: None,
            active_api: None,
            last_error: None,
            event_tx,
        }
    }

    /// Create a manager using the host's default platform
    pub fn with_default_platform() -> Self {
        Self::new(capture::default_platform())
    }

    /// Subscribe to capture events
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.event_tx.subscribe()
    }

    /// Acquire a new stream, releasing any stream already held.
    ///
    /// Uses [`MediaConstraints::default`] when `constraints` is `None`.
    pub async fn start_stream(
        &mut self,
        constraints: Option<MediaConstraints>,
    ) -> MediaResult<&MediaStream> {
        let constraints = constraints.unwrap_or_default();
        constraints.validate()?;

        self.stop_stream();

        let Some(backend) = capture::select_backend(self.platform.as_ref()) else {
            warn!("No capture API available");
            return Err(self.record_failure(MediaError::Unsupported));
        };
        let api = backend.api();
        debug!("Requesting capture through {} API", api);

        match backend.acquire(&constraints).await {
            Ok(stream) => {
                let video = stream.has(TrackKind::Video);
                let audio = stream.has(TrackKind::Audio);
                info!(
                    "Capture started via {} (video: {}, audio: {})",
                    api, video, audio
                );
                self.last_error = None;
                self.active_api = Some(api);
                let _ = self
                    .event_tx
                    .send(MediaEvent::StreamStarted { api, video, audio });
                Ok(self.stream.insert(stream))
            }
            Err(device_error) => {
                warn!("Capture via {} failed: {}", api, device_error);
                Err(self.record_failure(MediaError::from_device_error(api.name(), device_error)))
            }
        }
    }

    /// Stop every track and drop the stream. No-op when nothing is held.
    pub fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all();
            self.active_api = None;
            debug!("Capture stream {} stopped", stream.id());
            let _ = self.event_tx.send(MediaEvent::StreamStopped);
        }
    }

    /// Flip the first video track; `false` if there is none
    pub fn toggle_video(&mut self) -> bool {
        self.toggle(TrackKind::Video)
    }

    /// Flip the first audio track; `false` if there is none
    pub fn toggle_audio(&mut self) -> bool {
        self.toggle(TrackKind::Audio)
    }

    fn toggle(&mut self, kind: TrackKind) -> bool {
        let Some(track) = self.stream.as_mut().and_then(|s| s.first_mut(kind)) else {
            return false;
        };
        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        let _ = self.event_tx.send(MediaEvent::TrackToggled { kind, enabled });
        enabled
    }

    /// Currently held stream
    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    /// API that served the current stream
    pub fn active_api(&self) -> Option<CaptureApi> {
        self.active_api
    }

    /// Error from the last failed request, cleared on success
    pub fn last_error(&self) -> Option<&MediaError> {
        self.last_error.as_ref()
    }

    fn record_failure(&mut self, error: MediaError) -> MediaError {
        let _ = self.event_tx.send(MediaEvent::CaptureFailed {
            kind: error.kind(),
            message: error.user_message(),
        });
        self.last_error = Some(error.clone());
        error
    }
}

impl Drop for MediaCaptureManager {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{NoCapture, VirtualPlatform};

    #[tokio::test]
    async fn test_start_uses_default_constraints() {
        let platform = VirtualPlatform::default();
        let mut manager = MediaCaptureManager::new(Arc::new(platform.clone()));

        let stream = manager.start_stream(None).await.unwrap();
        assert!(stream.has(TrackKind::Video));
        assert!(stream.has(TrackKind::Audio));
        assert_eq!(manager.active_api(), Some(CaptureApi::Standard));
    }

    #[tokio::test]
    async fn test_toggle_without_track_returns_false() {
        let platform = VirtualPlatform::default();
        let mut manager = MediaCaptureManager::new(Arc::new(platform));
        assert!(!manager.toggle_video());

        manager
            .start_stream(Some(MediaConstraints::audio_only()))
            .await
            .unwrap();
        assert!(!manager.toggle_video());
        assert!(!manager.toggle_audio());
        assert!(manager.toggle_audio());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let platform = VirtualPlatform::default();
        let mut manager = MediaCaptureManager::new(Arc::new(platform.clone()));
        manager.start_stream(None).await.unwrap();

        manager.stop_stream();
        manager.stop_stream();
        assert!(manager.stream().is_none());
        assert_eq!(platform.live_tracks(TrackKind::Video), 0);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let mut manager = MediaCaptureManager::new(Arc::new(NoCapture));
        let err = manager.start_stream(None).await.unwrap_err();
        assert_eq!(err, MediaError::Unsupported);
        assert_eq!(manager.last_error(), Some(&MediaError::Unsupported));
    }
}
