use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::classify::backend::EmotionClassifier;
use crate::classify::labels::Emotion;
use crate::classify::result::Classification;
use crate::frame::Frame;

/// Stub classifier for headless runs and tests.
///
/// Hashes the pixels and derives a label and score from the digest, so the
/// same frame always classifies the same way. One digest value in eight is
/// reported as "no face in view".
#[derive(Default)]
pub struct StubClassifier {
    frames_seen: u64,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl EmotionClassifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, frame: &Frame) -> Result<Classification> {
        self.frames_seen += 1;
        let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();

        if digest[0] % 8 == 7 {
            return Ok(Classification::none());
        }
        let emotion = Emotion::ALL[(digest[0] % 7) as usize];
        let confidence = 0.5 + (digest[1] as f64 / 255.0) * 0.5;
        Ok(Classification::labelled(emotion.as_str(), confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_classifier_is_deterministic_per_frame() -> Result<()> {
        let mut classifier = StubClassifier::new();
        let frame = Frame::filled(16, 16, 1, 0x20)?;

        let first = classifier.classify(&frame)?;
        let second = classifier.classify(&frame)?;
        assert_eq!(first, second);
        assert_eq!(classifier.frames_seen(), 2);
        Ok(())
    }

    #[test]
    fn stub_scores_stay_in_range() -> Result<()> {
        let mut classifier = StubClassifier::new();
        for shade in 0..=255u8 {
            let frame = Frame::filled(4, 4, shade as u64, shade)?;
            let result = classifier.classify(&frame)?;
            match result.label {
                Some(_) => assert!((0.5..=1.0).contains(&result.confidence)),
                None => assert_eq!(result.confidence, 0.0),
            }
        }
        Ok(())
    }
}
