use anyhow::Result;

use crate::classify::result::Classification;
use crate::frame::Frame;

/// The classifier collaborator.
///
/// `classify` answers with the most likely emotion for the frame, or no label
/// when nothing recognisable is in view. An `Err` means the backend itself
/// failed; the capture loop treats that frame as having no label.
pub trait EmotionClassifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify one frame. The frame is borrowed for the duration of the call only.
    fn classify(&mut self, frame: &Frame) -> Result<Classification>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
