//! Face-first classification.
//!
//! A detector looks for faces in the full frame. With none in view the frame
//! classifies as "no emotion detected" without running the emotion model;
//! otherwise the model only ever sees the crop around the primary face.

use anyhow::{Context, Result};

use crate::classify::backend::EmotionClassifier;
use crate::classify::result::Classification;
use crate::frame::Frame;

/// Confidence a detection needs before it counts as a face.
pub const DEFAULT_FACE_THRESHOLD: f64 = 0.7;

/// Pixel bounding box of one detected face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f64,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// The face-detection stage.
///
/// Implementations may keep state across frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn name(&self) -> &'static str;

    /// Faces found in the frame, in any order. Empty when none are in view.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>>;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The face to classify: most confident, larger box on ties.
pub fn primary_face(faces: &[FaceRegion]) -> Option<&FaceRegion> {
    faces.iter().max_by(|a, b| {
        a.confidence
            .total_cmp(&b.confidence)
            .then_with(|| a.area().cmp(&b.area()))
    })
}

/// Runs an emotion model on the primary face only.
pub struct FaceGatedClassifier {
    detector: Box<dyn FaceDetector>,
    classifier: Box<dyn EmotionClassifier>,
}

impl FaceGatedClassifier {
    pub fn new(detector: Box<dyn FaceDetector>, classifier: Box<dyn EmotionClassifier>) -> Self {
        Self {
            detector,
            classifier,
        }
    }
}

impl EmotionClassifier for FaceGatedClassifier {
    fn name(&self) -> &'static str {
        self.classifier.name()
    }

    fn classify(&mut self, frame: &Frame) -> Result<Classification> {
        let faces = self
            .detector
            .detect(frame)
            .with_context(|| format!("face detector '{}' failed", self.detector.name()))?;
        let Some(face) = primary_face(&faces) else {
            return Ok(Classification::none());
        };
        log::trace!(
            "frame {}: {} face(s), classifying {}x{} at ({}, {})",
            frame.seq,
            faces.len(),
            face.width,
            face.height,
            face.x,
            face.y
        );
        let crop = frame.crop(face.x, face.y, face.width, face.height)?;
        self.classifier.classify(&crop)
    }

    fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up()?;
        self.classifier.warm_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedDetector {
        script: VecDeque<Vec<FaceRegion>>,
    }

    impl FaceDetector for ScriptedDetector {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceRegion>> {
            Ok(self.script.pop_front().unwrap_or_default())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceRegion>> {
            Err(anyhow::anyhow!("model not loaded"))
        }
    }

    /// Records the size of every frame it is asked to classify.
    struct SizeRecorder {
        seen: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl EmotionClassifier for SizeRecorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn classify(&mut self, frame: &Frame) -> Result<Classification> {
            self.seen.lock().unwrap().push((frame.width, frame.height));
            Ok(Classification::labelled("happy", 0.9))
        }
    }

    fn region(x: u32, y: u32, width: u32, height: u32, confidence: f64) -> FaceRegion {
        FaceRegion {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    fn gated(script: Vec<Vec<FaceRegion>>) -> (FaceGatedClassifier, Arc<Mutex<Vec<(u32, u32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let classifier = FaceGatedClassifier::new(
            Box::new(ScriptedDetector {
                script: script.into(),
            }),
            Box::new(SizeRecorder { seen: seen.clone() }),
        );
        (classifier, seen)
    }

    #[test]
    fn no_face_skips_the_emotion_model() -> Result<()> {
        let (mut classifier, seen) = gated(vec![vec![]]);
        let frame = Frame::filled(64, 48, 1, 0)?;

        assert_eq!(classifier.classify(&frame)?, Classification::none());
        assert!(seen.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn emotion_model_sees_only_the_primary_face() -> Result<()> {
        let (mut classifier, seen) = gated(vec![vec![
            region(0, 0, 10, 10, 0.8),
            region(20, 10, 30, 20, 0.95),
        ]]);
        let frame = Frame::filled(64, 48, 1, 0)?;

        let result = classifier.classify(&frame)?;
        assert_eq!(result.label.as_deref(), Some("happy"));
        assert_eq!(*seen.lock().unwrap(), vec![(30, 20)]);
        Ok(())
    }

    #[test]
    fn face_at_the_edge_is_clipped_to_the_frame() -> Result<()> {
        let (mut classifier, seen) = gated(vec![vec![region(50, 40, 30, 30, 0.9)]]);
        let frame = Frame::filled(64, 48, 1, 0)?;

        classifier.classify(&frame)?;
        assert_eq!(*seen.lock().unwrap(), vec![(14, 8)]);
        Ok(())
    }

    #[test]
    fn detector_failure_is_a_classifier_error() -> Result<()> {
        let mut classifier = FaceGatedClassifier::new(
            Box::new(FailingDetector),
            Box::new(SizeRecorder {
                seen: Arc::new(Mutex::new(Vec::new())),
            }),
        );
        let frame = Frame::filled(8, 8, 1, 0)?;

        let err = classifier.classify(&frame).unwrap_err();
        assert!(err.to_string().contains("face detector 'failing'"));
        Ok(())
    }

    #[test]
    fn primary_face_breaks_ties_by_area() {
        let faces = [region(0, 0, 10, 10, 0.9), region(5, 5, 20, 20, 0.9)];
        assert_eq!(primary_face(&faces).map(|f| f.width), Some(20));
        assert!(primary_face(&[]).is_none());
    }
}
