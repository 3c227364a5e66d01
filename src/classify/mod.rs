//! Emotion classification.
//!
//! The capture loop only sees the `EmotionClassifier` trait. Backends:
//! - `stub`: deterministic, driven by a hash of the pixels; synthetic
//!   sources only
//! - `tract`: face detector plus ONNX emotion model on CPU, the model only
//!   seeing the primary face (feature: backend-tract)

mod backend;
pub mod backends;
pub mod face;
mod labels;
mod result;
mod scores;

use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub use backend::EmotionClassifier;
pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::{TractClassifier, TractFaceDetector};
pub use face::{FaceDetector, FaceGatedClassifier, FaceRegion, DEFAULT_FACE_THRESHOLD};
pub use labels::Emotion;
pub use result::Classification;
pub use scores::{softmax, top_emotion};

pub const DEFAULT_BACKEND: &str = "tract";
/// 0 reports the top emotion of every detected face.
pub const DEFAULT_THRESHOLD: f64 = 0.0;
pub const DEFAULT_MODEL_PATH: &str = "models/emotion-ferplus-8.onnx";
pub const DEFAULT_FACE_MODEL_PATH: &str = "models/version-RFB-320.onnx";

/// Which classifier to build and how.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierSettings {
    pub backend: String,
    /// Emotion model (tract only).
    pub model_path: PathBuf,
    /// Face detector model (tract only).
    pub face_model_path: PathBuf,
    /// Top emotion scores below this count as "no emotion detected".
    pub threshold: f64,
    /// Detections below this are not faces.
    pub face_threshold: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            face_model_path: PathBuf::from(DEFAULT_FACE_MODEL_PATH),
            threshold: DEFAULT_THRESHOLD,
            face_threshold: DEFAULT_FACE_THRESHOLD,
        }
    }
}

/// Build and warm up the configured backend.
pub fn build_classifier(settings: &ClassifierSettings) -> Result<Box<dyn EmotionClassifier>> {
    let mut classifier: Box<dyn EmotionClassifier> = match settings.backend.as_str() {
        "stub" => Box::new(StubClassifier::new()),
        "tract" => build_tract(settings)?,
        other => return Err(anyhow!("unknown classifier backend '{}'", other)),
    };
    classifier.warm_up()?;
    log::info!("classifier backend '{}' ready", classifier.name());
    Ok(classifier)
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &ClassifierSettings) -> Result<Box<dyn EmotionClassifier>> {
    let detector = TractFaceDetector::new(&settings.face_model_path)?
        .with_threshold(settings.face_threshold);
    let classifier =
        TractClassifier::new(&settings.model_path)?.with_threshold(settings.threshold);
    Ok(Box::new(FaceGatedClassifier::new(
        Box::new(detector),
        Box::new(classifier),
    )))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &ClassifierSettings) -> Result<Box<dyn EmotionClassifier>> {
    Err(anyhow!("tract backend requires the backend-tract feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_settings_build_stub_backend() -> Result<()> {
        let settings = ClassifierSettings {
            backend: "stub".to_string(),
            ..ClassifierSettings::default()
        };
        let classifier = build_classifier(&settings)?;
        assert_eq!(classifier.name(), "stub");
        Ok(())
    }

    #[test]
    fn default_settings_select_face_gated_tract() {
        let settings = ClassifierSettings::default();
        assert_eq!(settings.backend, "tract");
        assert_eq!(settings.threshold, 0.0);
        assert_eq!(settings.face_threshold, DEFAULT_FACE_THRESHOLD);
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_without_feature_is_reported() {
        let err = build_classifier(&ClassifierSettings::default())
            .err()
            .expect("tract is not compiled in");
        assert!(err.to_string().contains("backend-tract"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let settings = ClassifierSettings {
            backend: "mtcnn".to_string(),
            ..ClassifierSettings::default()
        };
        let err = build_classifier(&settings).err().expect("unknown backend");
        assert!(err.to_string().contains("unknown classifier backend"));
    }
}
