//! Capture API selection
//!
//! Platforms expose up to four capture entry points. They are tried in a
//! fixed order and the first one present is used; a platform exposing none
//! cannot capture at all.

#[cfg(feature = "native")]
pub mod native;
pub mod virtual_device;

use crate::constraints::MediaConstraints;
use crate::error::DeviceError;
use crate::tracks::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "native")]
pub use native::NativePlatform;
pub use virtual_device::{VirtualDevice, VirtualPlatform};

/// Capture entry point exposed by a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureApi {
    /// `mediaDevices.getUserMedia`
    Standard,
    /// Unprefixed legacy `getUserMedia`
    Legacy,
    /// `webkitGetUserMedia`
    Webkit,
    /// `mozGetUserMedia`
    Moz,
}

impl CaptureApi {
    /// Order in which capture APIs are tried
    pub const FALLBACK_ORDER: [CaptureApi; 4] = [
        CaptureApi::Standard,
        CaptureApi::Legacy,
        CaptureApi::Webkit,
        CaptureApi::Moz,
    ];

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            CaptureApi::Standard => "standard",
            CaptureApi::Legacy => "legacy",
            CaptureApi::Webkit => "webkit",
            CaptureApi::Moz => "moz",
        }
    }
}

impl fmt::Display for CaptureApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acquires streams through one capture API
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// API this backend drives
    fn api(&self) -> CaptureApi;

    /// Acquire a stream satisfying `constraints`
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, DeviceError>;
}

/// Host environment offering capture APIs
pub trait CapturePlatform: Send + Sync {
    /// Backend for `api`, or `None` if the platform lacks it
    fn backend(&self, api: CaptureApi) -> Option<Arc<dyn CaptureBackend>>;
}

/// First available backend in [`CaptureApi::FALLBACK_ORDER`]
pub fn select_backend(platform: &dyn CapturePlatform) -> Option<Arc<dyn CaptureBackend>> {
    CaptureApi::FALLBACK_ORDER
        .iter()
        .find_map(|api| platform.backend(*api))
}

/// Platform without any capture API
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl CapturePlatform for NoCapture {
    fn backend(&self, _api: CaptureApi) -> Option<Arc<dyn CaptureBackend>> {
        None
    }
}

/// Get the default capture platform for this host.
///
/// Native capture when built with the `native` feature, otherwise
/// [`NoCapture`].
pub fn default_platform() -> Arc<dyn CapturePlatform> {
    #[cfg(feature = "native")]
    {
        Arc::new(NativePlatform)
    }
    #[cfg(not(feature = "native"))]
    {
        Arc::new(NoCapture)
    }
}
