pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;
#[cfg(feature = "backend-tract")]
pub mod tract_face;

pub use stub::StubClassifier;

#[cfg(feature = "backend-tract")]
pub use tract::TractClassifier;
#[cfg(feature = "backend-tract")]
pub use tract_face::TractFaceDetector;
