use anyhow::{anyhow, Context, Result};
use opencv::{core, highgui, imgproc, prelude::*};

use super::PreviewSurface;
use crate::annotate::{OVERLAY_ORIGIN, OVERLAY_RGB};
use crate::frame::Frame;

/// highgui window preview.
///
/// `show` pumps the highgui event loop once (1 ms) and keeps any key it
/// observed for the next `poll_key`.
pub struct OpenCvPreview {
    window: String,
    pending_key: Option<char>,
    closed: bool,
}

impl OpenCvPreview {
    pub fn new(window: &str) -> Result<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("create preview window '{}'", window))?;
        log::info!("preview window '{}' opened", window);
        Ok(Self {
            window: window.to_string(),
            pending_key: None,
            closed: false,
        })
    }

    fn to_bgr_mat(frame: &Frame) -> Result<core::Mat> {
        let mut rgb = core::Mat::new_rows_cols_with_default(
            frame.height as i32,
            frame.width as i32,
            core::CV_8UC3,
            core::Scalar::all(0.0),
        )?;
        rgb.data_bytes_mut()?.copy_from_slice(frame.pixels());

        let mut bgr = core::Mat::default();
        imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)?;
        Ok(bgr)
    }

    fn render(&self, frame: &Frame, annotation: &str) -> Result<()> {
        let mut image = Self::to_bgr_mat(frame)?;
        let [r, g, b] = OVERLAY_RGB;
        imgproc::put_text(
            &mut image,
            annotation,
            core::Point::new(OVERLAY_ORIGIN.0, OVERLAY_ORIGIN.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.0,
            core::Scalar::new(b as f64, g as f64, r as f64, 0.0),
            2,
            imgproc::LINE_AA,
            false,
        )?;
        highgui::imshow(&self.window, &image)?;
        Ok(())
    }
}

/// `wait_key` returns -1 when nothing was pressed.
fn key_from_code(code: i32) -> Option<char> {
    if code < 0 {
        return None;
    }
    char::from_u32((code & 0xFF) as u32)
}

impl PreviewSurface for OpenCvPreview {
    fn show(&mut self, frame: &Frame, annotation: &str) -> Result<()> {
        if self.closed {
            return Err(anyhow!("preview window '{}' is closed", self.window));
        }
        let rendered = self.render(frame, annotation);
        // The event loop runs even when rendering failed, or the stop key
        // would go unseen.
        match highgui::wait_key(1) {
            Ok(code) => {
                if let Some(key) = key_from_code(code) {
                    self.pending_key = Some(key);
                }
            }
            Err(err) => log::warn!("preview window '{}' key poll failed: {}", self.window, err),
        }
        rendered
    }

    fn poll_key(&mut self) -> Option<char> {
        self.pending_key.take()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = highgui::destroy_window(&self.window) {
            log::warn!("failed to close preview window '{}': {}", self.window, err);
        }
    }
}
