use anyhow::Result;

use super::PreviewSurface;
use crate::frame::Frame;

/// Preview that renders nothing and never reports a key.
#[derive(Debug, Default)]
pub struct HeadlessPreview {
    last_annotation: Option<String>,
    frames_shown: u64,
}

impl HeadlessPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl PreviewSurface for HeadlessPreview {
    fn show(&mut self, frame: &Frame, annotation: &str) -> Result<()> {
        self.frames_shown += 1;
        if self.last_annotation.as_deref() != Some(annotation) {
            log::debug!("frame {}: {}", frame.seq, annotation);
            self.last_annotation = Some(annotation.to_string());
        }
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        None
    }

    fn close(&mut self) {
        log::debug!("headless preview closed after {} frames", self.frames_shown);
    }
}
