//! Capture error types and handling
//!
//! Capture backends report failures the way browser capture APIs do: an
//! error *name* plus a free-form message. This module folds those names into
//! the small set of kinds the UI distinguishes, each with its own
//! user-facing message.

use thiserror::Error;

/// Error reported by a capture backend before classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct DeviceError {
    /// Native error name, e.g. `NotAllowedError`
    pub name: String,
    /// Native error message
    pub message: String,
}

impl DeviceError {
    /// Create a device error from a native error name and message
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Classification of a failed capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// The user or the platform refused access
    PermissionDenied,
    /// No device satisfies the request
    NotFound,
    /// The device exists but another application holds it
    Busy,
    /// Any other failure
    Generic,
}

impl CaptureErrorKind {
    /// Map a native error name onto a kind
    pub fn from_error_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                CaptureErrorKind::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                CaptureErrorKind::NotFound
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => CaptureErrorKind::Busy,
            _ => CaptureErrorKind::Generic,
        }
    }

    /// Message shown to the user for this kind
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureErrorKind::PermissionDenied => {
                "Camera and microphone access was denied. Allow access in your settings and try again."
            }
            CaptureErrorKind::NotFound => {
                "No camera or microphone was found. Connect a device and try again."
            }
            CaptureErrorKind::Busy => {
                "Your camera or microphone is already in use by another application."
            }
            CaptureErrorKind::Generic => "Could not access your camera or microphone.",
        }
    }
}

/// Main error type for capture operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// No capture API is available on this platform
    #[error("Media capture is not supported on this platform")]
    Unsupported,

    /// A capture API rejected the request
    #[error("Capture failed ({kind:?}) via {api}: {source}")]
    Capture {
        /// Classified failure kind
        kind: CaptureErrorKind,
        /// Name of the capture API that failed
        api: &'static str,
        /// Native error
        #[source]
        source: DeviceError,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Classify a native device error reported through `api`
    pub fn from_device_error(api: &'static str, source: DeviceError) -> Self {
        MediaError::Capture {
            kind: CaptureErrorKind::from_error_name(&source.name),
            api,
            source,
        }
    }

    /// Failure kind, if this error came from a capture backend
    pub fn kind(&self) -> Option<CaptureErrorKind> {
        match self {
            MediaError::Capture { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if retrying the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Capture { kind, .. } => matches!(
                kind,
                CaptureErrorKind::Busy | CaptureErrorKind::NotFound | CaptureErrorKind::Generic
            ),
            MediaError::Unsupported => false,
            MediaError::InvalidConfiguration { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Unsupported => ErrorCategory::Platform,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::Capture { kind, .. } => match kind {
                CaptureErrorKind::PermissionDenied => ErrorCategory::Permission,
                CaptureErrorKind::NotFound | CaptureErrorKind::Busy => ErrorCategory::Device,
                CaptureErrorKind::Generic => ErrorCategory::System,
            },
        }
    }

    /// Message suitable for display to the user
    pub fn user_message(&self) -> String {
        match self {
            MediaError::Unsupported => {
                "Your browser or device does not support camera and microphone capture."
                    .to_string()
            }
            MediaError::Capture { kind, .. } => kind.user_message().to_string(),
            MediaError::InvalidConfiguration { message } => {
                format!("Invalid media settings: {}", message)
            }
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permission and security errors
    Permission,
    /// Device and hardware errors
    Device,
    /// Platform compatibility errors
    Platform,
    /// Configuration and parameter errors
    Configuration,
    /// Other system-level errors
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_name_mapping() {
        for name in ["NotAllowedError", "PermissionDeniedError", "SecurityError"] {
            assert_eq!(
                CaptureErrorKind::from_error_name(name),
                CaptureErrorKind::PermissionDenied
            );
        }
        for name in ["NotFoundError", "DevicesNotFoundError", "OverconstrainedError"] {
            assert_eq!(
                CaptureErrorKind::from_error_name(name),
                CaptureErrorKind::NotFound
            );
        }
        for name in ["NotReadableError", "TrackStartError", "AbortError"] {
            assert_eq!(CaptureErrorKind::from_error_name(name), CaptureErrorKind::Busy);
        }
        assert_eq!(
            CaptureErrorKind::from_error_name("TypeError"),
            CaptureErrorKind::Generic
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let kinds = [
            CaptureErrorKind::PermissionDenied,
            CaptureErrorKind::NotFound,
            CaptureErrorKind::Busy,
            CaptureErrorKind::Generic,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
        assert_ne!(
            MediaError::Unsupported.user_message(),
            CaptureErrorKind::Generic.user_message()
        );
    }

    #[test]
    fn test_error_categories() {
        let denied = MediaError::from_device_error(
            "standard",
            DeviceError::new("NotAllowedError", "Permission denied"),
        );
        assert_eq!(denied.kind(), Some(CaptureErrorKind::PermissionDenied));
        assert_eq!(denied.category(), ErrorCategory::Permission);
        assert!(!denied.is_recoverable());

        let busy = MediaError::from_device_error(
            "moz",
            DeviceError::new("NotReadableError", "Could not start video source"),
        );
        assert_eq!(busy.category(), ErrorCategory::Device);
        assert!(busy.is_recoverable());

        assert_eq!(MediaError::Unsupported.category(), ErrorCategory::Platform);
        assert_eq!(MediaError::Unsupported.kind(), None);
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::from_device_error(
            "webkit",
            DeviceError::new("NotFoundError", "Requested device not found"),
        );
        assert_eq!(
            error.to_string(),
            "Capture failed (NotFound) via webkit: NotFoundError: Requested device not found"
        );
    }
}
