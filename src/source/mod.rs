//! Frame acquisition sources.
//!
//! Two kinds of input feed the console:
//! - `live`: a network camera (HTTP MJPEG or single-JPEG snapshot) or a
//!   `stub://` synthetic camera for tests and demos
//! - `image`: a local still image, detected once
//!
//! Video-file input is accepted at the interface but this build carries no
//! decoder; it is preview-only (see `StillSource::load` for the still path).
//!
//! Sources produce `CapturedFrame`s; the capture loop publishes them onto
//! the shared `VideoSurface`.

pub mod file;
pub mod live;

use thiserror::Error;

pub use file::StillSource;
pub use live::{CameraConfig, LiveSource, LiveStats};

/// Why a capture device could not be acquired.
///
/// Both variants surface as a persistent "feed unavailable" state; the
/// session does not retry acquisition on its own.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The device or stream refused access.
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    /// No matching hardware or the stream endpoint is unreachable.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}
