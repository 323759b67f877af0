//! In-memory capture platform
//!
//! Simulates cameras and microphones for headless use and tests. Devices can
//! be marked busy or removed, permission can be revoked, and the set of
//! exposed capture APIs is configurable. The platform counts live leases per
//! kind so callers can check that hardware is released.

use super::{CaptureApi, CaptureBackend, CapturePlatform};
use crate::constraints::MediaConstraints;
use crate::error::DeviceError;
use crate::tracks::{DeviceLease, MediaStream, MediaTrack, TrackKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Simulated capture device
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    /// Kind of track the device produces
    pub kind: TrackKind,
    /// Device label
    pub label: String,
    /// Held by another application
    pub busy: bool,
}

impl VirtualDevice {
    /// Simulated camera
    pub fn camera(label: impl Into<String>) -> Self {
        Self {
            kind: TrackKind::Video,
            label: label.into(),
            busy: false,
        }
    }

    /// Simulated microphone
    pub fn microphone(label: impl Into<String>) -> Self {
        Self {
            kind: TrackKind::Audio,
            label: label.into(),
            busy: false,
        }
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    devices: Vec<VirtualDevice>,
    permission_granted: bool,
    forced_error: Option<DeviceError>,
    live: HashMap<TrackKind, usize>,
    peak: HashMap<TrackKind, usize>,
    acquisitions: Vec<CaptureApi>,
}

/// Builder for [`VirtualPlatform`]
#[derive(Debug)]
pub struct VirtualPlatformBuilder {
    apis: Vec<CaptureApi>,
    devices: Vec<VirtualDevice>,
    permission_granted: bool,
}

impl VirtualPlatformBuilder {
    /// Expose only `apis`
    pub fn apis(mut self, apis: &[CaptureApi]) -> Self {
        self.apis = apis.to_vec();
        self
    }

    /// Replace the device list
    pub fn devices(mut self, devices: Vec<VirtualDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Refuse every capture request
    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Build the platform
    pub fn build(self) -> VirtualPlatform {
        VirtualPlatform {
            apis: self.apis,
            state: Arc::new(Mutex::new(VirtualState {
                devices: self.devices,
                permission_granted: self.permission_granted,
                ..Default::default()
            })),
        }
    }
}

/// In-memory capture platform. Clones share device state.
#[derive(Debug, Clone)]
pub struct VirtualPlatform {
    apis: Vec<CaptureApi>,
    state: Arc<Mutex<VirtualState>>,
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl VirtualPlatform {
    /// Builder with every capture API, one camera, one microphone and
    /// permission granted
    pub fn builder() -> VirtualPlatformBuilder {
        VirtualPlatformBuilder {
            apis: CaptureApi::FALLBACK_ORDER.to_vec(),
            devices: vec![
                VirtualDevice::camera("Virtual Camera"),
                VirtualDevice::microphone("Virtual Microphone"),
            ],
            permission_granted: true,
        }
    }

    /// Grant or revoke permission
    pub fn set_permission(&self, granted: bool) {
        self.state.lock().permission_granted = granted;
    }

    /// Mark every device of `kind` busy or free
    pub fn set_busy(&self, kind: TrackKind, busy: bool) {
        let mut state = self.state.lock();
        for device in state.devices.iter_mut().filter(|d| d.kind == kind) {
            device.busy = busy;
        }
    }

    /// Unplug every device of `kind`
    pub fn remove_devices(&self, kind: TrackKind) {
        self.state.lock().devices.retain(|d| d.kind != kind);
    }

    /// Fail the next acquisition with `error`
    pub fn fail_next(&self, error: DeviceError) {
        self.state.lock().forced_error = Some(error);
    }

    /// Tracks of `kind` currently holding a device
    pub fn live_tracks(&self, kind: TrackKind) -> usize {
        self.state.lock().live.get(&kind).copied().unwrap_or(0)
    }

    /// Highest number of simultaneously live tracks of `kind`
    pub fn peak_tracks(&self, kind: TrackKind) -> usize {
        self.state.lock().peak.get(&kind).copied().unwrap_or(0)
    }

    /// APIs used by successful acquisitions, oldest first
    pub fn acquisitions(&self) -> Vec<CaptureApi> {
        self.state.lock().acquisitions.clone()
    }
}

impl CapturePlatform for VirtualPlatform {
    fn backend(&self, api: CaptureApi) -> Option<Arc<dyn CaptureBackend>> {
        if !self.apis.contains(&api) {
            return None;
        }
        Some(Arc::new(VirtualBackend {
            api,
            state: self.state.clone(),
        }))
    }
}

struct VirtualBackend {
    api: CaptureApi,
    state: Arc<Mutex<VirtualState>>,
}

#[async_trait]
impl CaptureBackend for VirtualBackend {
    fn api(&self) -> CaptureApi {
        self.api
    }

    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, DeviceError> {
        let mut state = self.state.lock();

        if let Some(error) = state.forced_error.take() {
            return Err(error);
        }
        if !state.permission_granted {
            return Err(DeviceError::new("NotAllowedError", "Permission denied"));
        }

        let mut labels = Vec::new();
        for kind in [TrackKind::Video, TrackKind::Audio] {
            if !constraints.requests(kind) {
                continue;
            }
            let device = state
                .devices
                .iter()
                .find(|d| d.kind == kind)
                .ok_or_else(|| DeviceError::new("NotFoundError", "Requested device not found"))?;
            if device.busy {
                return Err(DeviceError::new(
                    "NotReadableError",
                    format!("Could not start {} source", kind),
                ));
            }
            labels.push((kind, device.label.clone()));
        }

        let mut tracks = Vec::with_capacity(labels.len());
        for (kind, label) in labels {
            let live = state.live.entry(kind).or_insert(0);
            *live += 1;
            let live = *live;
            let peak = state.peak.entry(kind).or_insert(0);
            *peak = (*peak).max(live);

            let lease = Arc::new(VirtualLease {
                kind,
                state: self.state.clone(),
            });
            tracks.push(MediaTrack::new(kind, label, lease));
        }
        state.acquisitions.push(self.api);

        debug!("Virtual {} capture acquired {} track(s)", self.api, tracks.len());
        Ok(MediaStream::new(tracks))
    }
}

struct VirtualLease {
    kind: TrackKind,
    state: Arc<Mutex<VirtualState>>,
}

impl DeviceLease for VirtualLease {
    fn release(&self) {
        let mut state = self.state.lock();
        if let Some(live) = state.live.get_mut(&self.kind) {
            *live = live.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::TrackRequest;

    fn both() -> MediaConstraints {
        MediaConstraints {
            video: TrackRequest::Enabled,
            audio: TrackRequest::Enabled,
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let platform = VirtualPlatform::default();
        let backend = platform.backend(CaptureApi::Standard).unwrap();

        let stream = backend.acquire(&both()).await.unwrap();
        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(platform.live_tracks(TrackKind::Video), 1);
        assert_eq!(platform.live_tracks(TrackKind::Audio), 1);

        drop(stream);
        assert_eq!(platform.live_tracks(TrackKind::Video), 0);
        assert_eq!(platform.acquisitions(), vec![CaptureApi::Standard]);
    }

    #[tokio::test]
    async fn test_failure_names() {
        let platform = VirtualPlatform::builder().deny_permission().build();
        let backend = platform.backend(CaptureApi::Standard).unwrap();
        let err = backend.acquire(&both()).await.unwrap_err();
        assert_eq!(err.name, "NotAllowedError");

        platform.set_permission(true);
        platform.set_busy(TrackKind::Audio, true);
        let err = backend.acquire(&both()).await.unwrap_err();
        assert_eq!(err.name, "NotReadableError");

        platform.remove_devices(TrackKind::Video);
        let err = backend.acquire(&both()).await.unwrap_err();
        assert_eq!(err.name, "NotFoundError");
        assert_eq!(platform.live_tracks(TrackKind::Audio), 0);
    }

    #[tokio::test]
    async fn test_forced_error_applies_once() {
        let platform = VirtualPlatform::default();
        let backend = platform.backend(CaptureApi::Webkit).unwrap();
        platform.fail_next(DeviceError::new("AbortError", "Starting videoinput failed"));

        assert!(backend.acquire(&both()).await.is_err());
        assert!(backend.acquire(&both()).await.is_ok());
    }

    #[test]
    fn test_missing_api() {
        let platform = VirtualPlatform::builder().apis(&[CaptureApi::Moz]).build();
        assert!(platform.backend(CaptureApi::Standard).is_none());
        assert!(platform.backend(CaptureApi::Moz).is_some());
    }
}
