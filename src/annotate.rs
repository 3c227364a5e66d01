//! Overlay text for the preview surface.

/// Shown when a frame yields no label.
pub const NO_EMOTION_TEXT: &str = "No emotion detected";

/// Top-left anchor of the overlay baseline, in pixels.
pub const OVERLAY_ORIGIN: (i32, i32) = (10, 30);

/// Overlay colour as RGB.
pub const OVERLAY_RGB: [u8; 3] = [0, 255, 0];

/// Compose the overlay line for one classification.
pub fn annotation_text(label: Option<&str>, confidence: f64) -> String {
    match label {
        Some(label) => format!("Emotion: {}, Score: {:.2}", label, confidence),
        None => NO_EMOTION_TEXT.to_string(),
    }
}
