//! Integration tests for the capture manager
//!
//! These run against the in-memory platform and cover API fallback, error
//! classification and hardware release.

use meetlink_media::*;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn manager_on(platform: &VirtualPlatform) -> MediaCaptureManager {
    MediaCaptureManager::new(Arc::new(platform.clone()))
}

// ============================================================================
// API FALLBACK
// ============================================================================

#[tokio::test]
async fn test_moz_only_platform_video_without_audio() {
    let platform = VirtualPlatform::builder().apis(&[CaptureApi::Moz]).build();
    let mut manager = manager_on(&platform);

    let constraints = MediaConstraints {
        video: TrackRequest::Enabled,
        audio: TrackRequest::Disabled,
    };
    let stream = assert_ok!(manager.start_stream(Some(constraints)).await);

    assert!(stream.has(TrackKind::Video));
    assert!(!stream.has(TrackKind::Audio));
    assert_eq!(manager.active_api(), Some(CaptureApi::Moz));
    assert_eq!(platform.acquisitions(), vec![CaptureApi::Moz]);
}

#[tokio::test]
async fn test_fallback_skips_missing_apis_in_order() {
    let platform = VirtualPlatform::builder()
        .apis(&[CaptureApi::Moz, CaptureApi::Webkit])
        .build();
    let mut manager = manager_on(&platform);

    assert_ok!(manager.start_stream(None).await);
    assert_eq!(manager.active_api(), Some(CaptureApi::Webkit));
}

#[tokio::test]
async fn test_no_api_is_unsupported() {
    let platform = VirtualPlatform::builder().apis(&[]).build();
    let mut manager = manager_on(&platform);

    let err = assert_err!(manager.start_stream(None).await);
    assert_eq!(err, MediaError::Unsupported);
    assert!(!err.is_recoverable());
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

#[tokio::test]
async fn test_permission_denied() {
    let platform = VirtualPlatform::builder().deny_permission().build();
    let mut manager = manager_on(&platform);

    let err = assert_err!(manager.start_stream(None).await);
    assert_eq!(err.kind(), Some(CaptureErrorKind::PermissionDenied));
    assert_eq!(
        err.user_message(),
        CaptureErrorKind::PermissionDenied.user_message()
    );
}

#[tokio::test]
async fn test_missing_and_busy_devices() {
    let platform = VirtualPlatform::default();
    let mut manager = manager_on(&platform);

    platform.set_busy(TrackKind::Video, true);
    let err = assert_err!(manager.start_stream(None).await);
    assert_eq!(err.kind(), Some(CaptureErrorKind::Busy));

    platform.set_busy(TrackKind::Video, false);
    platform.remove_devices(TrackKind::Audio);
    let err = assert_err!(manager.start_stream(None).await);
    assert_eq!(err.kind(), Some(CaptureErrorKind::NotFound));

    // Video alone still works without a microphone
    assert_ok!(manager.start_stream(Some(MediaConstraints::video_only())).await);
}

#[tokio::test]
async fn test_unknown_error_name_is_generic() {
    let platform = VirtualPlatform::default();
    let mut manager = manager_on(&platform);
    platform.fail_next(DeviceError::new("TypeError", "constraints malformed"));

    let err = assert_err!(manager.start_stream(None).await);
    assert_eq!(err.kind(), Some(CaptureErrorKind::Generic));
}

#[tokio::test]
async fn test_last_error_cleared_on_success() {
    let platform = VirtualPlatform::default();
    let mut manager = manager_on(&platform);
    platform.fail_next(DeviceError::new("AbortError", "Starting videoinput failed"));

    assert_err!(manager.start_stream(None).await);
    assert_eq!(
        manager.last_error().and_then(|e| e.kind()),
        Some(CaptureErrorKind::Busy)
    );

    assert_ok!(manager.start_stream(None).await);
    assert!(manager.last_error().is_none());
}

#[tokio::test]
async fn test_both_kinds_disabled_is_rejected() {
    let platform = VirtualPlatform::default();
    let mut manager = manager_on(&platform);

    let constraints = MediaConstraints {
        video: TrackRequest::Disabled,
        audio: TrackRequest::Disabled,
    };
    let err = assert_err!(manager.start_stream(Some(constraints)).await);
    assert!(matches!(err, MediaError::InvalidConfiguration { .. }));
    assert!(platform.acquisitions().is_empty());
}

// ============================================================================
// HARDWARE RELEASE
// ============================================================================

#[tokio::test]
async fn test_restart_keeps_one_track_per_kind() {
    let requests = [
        MediaConstraints::default(),
        MediaConstraints::video_only(),
        MediaConstraints::audio_only(),
        MediaConstraints {
            video: TrackRequest::Constrained(VideoConstraints {
                width: 640,
                height: 480,
                frame_rate: Some(15.0),
                facing_mode: Some("user".to_string()),
            }),
            audio: TrackRequest::Enabled,
        },
    ];

    for constraints in requests {
        let platform = VirtualPlatform::default();
        let mut manager = manager_on(&platform);

        assert_ok!(manager.start_stream(Some(constraints.clone())).await);
        manager.stop_stream();
        assert_ok!(manager.start_stream(Some(constraints.clone())).await);
        // Restart without an explicit stop
        assert_ok!(manager.start_stream(Some(constraints.clone())).await);

        for kind in [TrackKind::Video, TrackKind::Audio] {
            let expected = usize::from(constraints.requests(kind));
            assert_eq!(platform.live_tracks(kind), expected, "{} live", kind);
            assert_eq!(platform.peak_tracks(kind), expected, "{} peak", kind);
            let held = manager.stream().map(|s| s.tracks_of(kind).count());
            assert_eq!(held, Some(expected));
        }
    }
}

#[tokio::test]
async fn test_drop_releases_hardware() {
    let platform = VirtualPlatform::default();
    {
        let mut manager = manager_on(&platform);
        assert_ok!(manager.start_stream(None).await);
        assert_eq!(platform.live_tracks(TrackKind::Video), 1);
    }
    assert_eq!(platform.live_tracks(TrackKind::Video), 0);
    assert_eq!(platform.live_tracks(TrackKind::Audio), 0);
}

#[tokio::test]
async fn test_failed_restart_leaves_nothing_held() {
    let platform = VirtualPlatform::default();
    let mut manager = manager_on(&platform);
    assert_ok!(manager.start_stream(None).await);

    platform.set_permission(false);
    assert_err!(manager.start_stream(None).await);
    assert!(manager.stream().is_none());
    assert_eq!(platform.live_tracks(TrackKind::Video), 0);
}

// ============================================================================
// EVENTS
// ============================================================================

#[tokio::test]
async fn test_events() {
    let platform = VirtualPlatform::default();
    let mut manager = manager_on(&platform);
    let mut events = manager.subscribe();

    assert_ok!(manager.start_stream(None).await);
    assert!(!manager.toggle_video());
    manager.stop_stream();

    assert_eq!(
        assert_ok!(events.try_recv()),
        MediaEvent::StreamStarted {
            api: CaptureApi::Standard,
            video: true,
            audio: true,
        }
    );
    assert_eq!(
        assert_ok!(events.try_recv()),
        MediaEvent::TrackToggled {
            kind: TrackKind::Video,
            enabled: false,
        }
    );
    assert_eq!(assert_ok!(events.try_recv()), MediaEvent::StreamStopped);
    assert!(events.try_recv().is_err());
}
