//! Preview surfaces.
//!
//! The capture loop renders each annotated frame through `PreviewSurface`
//! and asks it for key presses. Display is a side effect only: a failed
//! `show` is logged by the loop and never stops it.
//!
//! - `HeadlessPreview`: no window; logs annotation changes at debug level
//! - `OpenCvPreview`: highgui window (feature: preview-opencv)

mod headless;
#[cfg(feature = "preview-opencv")]
mod window;

use anyhow::Result;

use crate::frame::Frame;

pub use headless::HeadlessPreview;
#[cfg(feature = "preview-opencv")]
pub use window::OpenCvPreview;

/// Key that ends the capture loop when pressed in the preview.
pub const STOP_KEY: char = 'q';

/// Window title used by windowed previews.
pub const WINDOW_TITLE: &str = "Emotion Detection";

/// The preview-surface collaborator.
pub trait PreviewSurface: Send {
    /// Show a frame with its overlay line.
    fn show(&mut self, frame: &Frame, annotation: &str) -> Result<()>;

    /// Most recent key pressed since the last poll, if any.
    fn poll_key(&mut self) -> Option<char>;

    /// Tear the surface down. Called exactly once when the loop stops.
    fn close(&mut self);
}

/// Pick the preview for this build: a window when enabled and compiled in,
/// headless otherwise.
pub fn build_preview(enabled: bool) -> Result<Box<dyn PreviewSurface>> {
    if enabled {
        #[cfg(feature = "preview-opencv")]
        {
            return Ok(Box::new(OpenCvPreview::new(WINDOW_TITLE)?));
        }
        #[cfg(not(feature = "preview-opencv"))]
        log::warn!("preview window requested but preview-opencv is not compiled in; running headless");
    }
    Ok(Box::new(HeadlessPreview::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_preview_is_headless() -> Result<()> {
        let mut preview = build_preview(false)?;
        assert_eq!(preview.poll_key(), None);
        preview.close();
        Ok(())
    }
}
