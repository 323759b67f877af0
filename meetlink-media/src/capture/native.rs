//! Native camera and microphone capture
//!
//! Cameras are opened through nokhwa and microphones through cpal. Neither
//! handle can move between threads, so each device is opened on its own
//! thread and held there until its track releases the lease.

use super::{CaptureApi, CaptureBackend, CapturePlatform};
use crate::constraints::{MediaConstraints, VideoConstraints};
use crate::error::DeviceError;
use crate::tracks::{DeviceLease, MediaStream, MediaTrack, TrackKind};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const DEFAULT_FRAME_RATE: u32 = 30;

/// Host capture through the operating system's camera and audio APIs.
///
/// Only [`CaptureApi::Standard`] is exposed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePlatform;

impl CapturePlatform for NativePlatform {
    fn backend(&self, api: CaptureApi) -> Option<Arc<dyn CaptureBackend>> {
        match api {
            CaptureApi::Standard => Some(Arc::new(NativeBackend)),
            _ => None,
        }
    }
}

struct NativeBackend;

#[async_trait]
impl CaptureBackend for NativeBackend {
    fn api(&self) -> CaptureApi {
        CaptureApi::Standard
    }

    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, DeviceError> {
        let mut tracks = Vec::new();

        // Earlier tracks are released on drop if a later device fails
        if constraints.requests(TrackKind::Video) {
            let video = constraints.video.constraints().cloned().unwrap_or_default();
            tracks.push(hold_device(TrackKind::Video, move || open_camera(&video)).await?);
        }
        if constraints.requests(TrackKind::Audio) {
            tracks.push(hold_device(TrackKind::Audio, open_microphone).await?);
        }

        info!("Native capture acquired {} track(s)", tracks.len());
        Ok(MediaStream::new(tracks))
    }
}

/// Open a device on a dedicated thread and keep it there until released.
///
/// `open` runs on the new thread and returns the track label plus the
/// device handle. Dropping the handle closes the device.
async fn hold_device<F, H>(kind: TrackKind, open: F) -> Result<MediaTrack, DeviceError>
where
    F: FnOnce() -> Result<(String, H), DeviceError> + Send + 'static,
    H: 'static,
{
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

    thread::Builder::new()
        .name(format!("meetlink-{}", kind))
        .spawn(move || match open() {
            Ok((label, device)) => {
                if ready_tx.send(Ok(label)).is_err() {
                    // Request abandoned before the device was handed out
                    return;
                }
                let _ = stop_rx.recv();
                drop(device);
                debug!("Released native {} device", kind);
            }
            Err(error) => {
                let _ = ready_tx.send(Err(error));
            }
        })
        .map_err(|e| {
            DeviceError::new(
                "NotReadableError",
                format!("Could not start {} capture thread: {}", kind, e),
            )
        })?;

    let label = ready_rx.await.map_err(|_| {
        DeviceError::new("AbortError", format!("{} capture thread exited", kind))
    })??;

    Ok(MediaTrack::new(
        kind,
        label,
        Arc::new(NativeLease {
            stop: Mutex::new(Some(stop_tx)),
        }),
    ))
}

struct NativeLease {
    stop: Mutex<Option<std_mpsc::Sender<()>>>,
}

impl DeviceLease for NativeLease {
    fn release(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for NativeLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera whose stream stops when dropped
struct OpenCamera(Camera);

impl Drop for OpenCamera {
    fn drop(&mut self) {
        if let Err(e) = self.0.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
    }
}

fn open_camera(constraints: &VideoConstraints) -> Result<(String, OpenCamera), DeviceError> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| DeviceError::new(classify_open_failure(&e.to_string()), e.to_string()))?;
    let info = cameras
        .first()
        .ok_or_else(|| DeviceError::new("NotFoundError", "No camera found"))?;

    let frame_rate = constraints
        .frame_rate
        .map(|rate| rate.round().max(1.0) as u32)
        .unwrap_or(DEFAULT_FRAME_RATE);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(constraints.width, constraints.height),
            FrameFormat::MJPEG,
            frame_rate,
        ),
    ));

    let mut camera = Camera::new(info.index().clone(), requested)
        .map_err(|e| DeviceError::new(classify_open_failure(&e.to_string()), e.to_string()))?;
    camera
        .open_stream()
        .map_err(|e| DeviceError::new(classify_open_failure(&e.to_string()), e.to_string()))?;

    let label = camera.info().human_name();
    debug!("Opened camera {} at {:?}", label, camera.camera_format());
    Ok((label, OpenCamera(camera)))
}

fn open_microphone() -> Result<(String, cpal::Stream), DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| DeviceError::new("NotFoundError", "No microphone found"))?;
    let label = device.name().unwrap_or_else(|_| "Microphone".to_string());

    let config = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => {
            DeviceError::new("NotFoundError", e.to_string())
        }
        other => DeviceError::new(classify_open_failure(&other.to_string()), other.to_string()),
    })?;

    let stream = device
        .build_input_stream_raw(
            &config.config(),
            config.sample_format(),
            |_data: &cpal::Data, _: &cpal::InputCallbackInfo| {},
            |err| warn!("Microphone stream error: {}", err),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                DeviceError::new("NotFoundError", e.to_string())
            }
            other => {
                DeviceError::new(classify_open_failure(&other.to_string()), other.to_string())
            }
        })?;
    stream
        .play()
        .map_err(|e| DeviceError::new(classify_open_failure(&e.to_string()), e.to_string()))?;

    debug!(
        "Opened microphone {} at {} Hz",
        label,
        config.sample_rate().0
    );
    Ok((label, stream))
}

/// Error name for a native open failure, judged from its message.
///
/// Anything not recognisable as a permission or missing-device problem is
/// reported as unreadable.
fn classify_open_failure(message: &str) -> &'static str {
    let message = message.to_ascii_lowercase();
    if ["permission", "denied", "not authorized", "unauthorized"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        "NotAllowedError"
    } else if ["not found", "no such", "no device", "not available", "disconnected"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        "NotFoundError"
    } else {
        "NotReadableError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FakeDevice {
        closed: Arc<AtomicBool>,
        done: std_mpsc::Sender<()>,
    }

    impl Drop for FakeDevice {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
            let _ = self.done.send(());
        }
    }

    #[test]
    fn test_only_standard_api() {
        let platform = NativePlatform;
        assert!(platform.backend(CaptureApi::Standard).is_some());
        assert!(platform.backend(CaptureApi::Legacy).is_none());
        assert!(platform.backend(CaptureApi::Webkit).is_none());
        assert!(platform.backend(CaptureApi::Moz).is_none());
    }

    #[test]
    fn test_classify_open_failure() {
        let cases = [
            ("Access denied by the operating system", CaptureErrorKind::PermissionDenied),
            ("Could not open device: No such file or directory", CaptureErrorKind::NotFound),
            ("The requested device is no longer available", CaptureErrorKind::NotFound),
            ("Device or resource busy", CaptureErrorKind::Busy),
            ("VIDIOC_STREAMON failed", CaptureErrorKind::Busy),
        ];
        for (message, kind) in cases {
            let name = classify_open_failure(message);
            assert_eq!(CaptureErrorKind::from_error_name(name), kind, "{}", message);
        }
    }

    #[tokio::test]
    async fn test_held_device_closes_on_release() {
        let closed = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = std_mpsc::channel();
        let device = FakeDevice {
            closed: closed.clone(),
            done: done_tx,
        };

        let mut track = hold_device(TrackKind::Video, move || Ok(("Fake Camera".to_string(), device)))
            .await
            .unwrap();
        assert_eq!(track.label(), "Fake Camera");
        assert!(!closed.load(Ordering::SeqCst));

        track.stop();
        track.stop();
        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(closed.load(Ordering::SeqCst));
        // Closed exactly once
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[tokio::test]
    async fn test_dropped_track_closes_device() {
        let closed = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = std_mpsc::channel();
        let device = FakeDevice {
            closed: closed.clone(),
            done: done_tx,
        };

        let track = hold_device(TrackKind::Audio, move || Ok(("Fake Mic".to_string(), device)))
            .await
            .unwrap();
        drop(track);
        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let result = hold_device::<_, ()>(TrackKind::Video, || {
            Err(DeviceError::new("NotFoundError", "No camera found"))
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.name, "NotFoundError");
        assert_eq!(
            CaptureErrorKind::from_error_name(&err.name),
            CaptureErrorKind::NotFound
        );
    }
}
