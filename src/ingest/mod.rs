//! Video sources.
//!
//! A source is opened once, read until it fails or the loop stops, and then
//! released. Sources never reconnect on their own: a failed `open` or `read`
//! is handed straight back to the capture loop, which decides what it means.
//!
//! Backends:
//! - `stub://<name>` synthetic frames (always available, used by tests)
//! - V4L2 device nodes such as `/dev/video1` (feature: ingest-v4l2)

mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::frame::Frame;

pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Camera index 1, matching the device the demo has always opened.
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video1";

/// Device prefix selecting the synthetic source.
pub const SYNTHETIC_PREFIX: &str = "stub://";

/// Whether `device` names a synthetic source rather than a camera.
pub fn is_synthetic(device: &str) -> bool {
    device.starts_with(SYNTHETIC_PREFIX)
}

/// The video-source collaborator driven by the capture loop.
pub trait FrameSource: Send {
    /// Human-readable source identifier for logs.
    fn describe(&self) -> String;

    /// Acquire the underlying device.
    fn open(&mut self) -> Result<()>;

    /// Read the next frame. Only valid after a successful `open`.
    fn read(&mut self) -> Result<Frame>;

    /// Release the device. Must be safe to call on a source that never opened.
    fn release(&mut self);
}

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path, or `stub://<name>` for a synthetic source.
    pub device: String,
    /// Requested capture rate. 0 leaves the device default in place.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            target_fps: 0,
            width: 640,
            height: 480,
        }
    }
}

/// Camera source that picks a backend from the configured device string.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Source),
    #[cfg(not(feature = "ingest-v4l2"))]
    Unsupported(String),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        if is_synthetic(&config.device) {
            return Self {
                backend: CameraBackend::Synthetic(SyntheticSource::new(config)),
            };
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Self {
                backend: CameraBackend::Device(V4l2Source::new(config)),
            }
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Self {
                backend: CameraBackend::Unsupported(config.device),
            }
        }
    }

    fn inner(&mut self) -> Result<&mut dyn FrameSource> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => Ok(source),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => Ok(source),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(device) => Err(anyhow::anyhow!(
                "camera device {} requires the ingest-v4l2 feature",
                device
            )),
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.describe(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.describe(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(device) => format!("{} (unsupported)", device),
        }
    }

    fn open(&mut self) -> Result<()> {
        self.inner()?.open()
    }

    fn read(&mut self) -> Result<Frame> {
        self.inner()?.read()
    }

    fn release(&mut self) {
        if let Ok(source) = self.inner() {
            source.release();
        }
    }
}
