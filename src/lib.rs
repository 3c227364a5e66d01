//! Emotion Beacon
//!
//! Captures webcam frames, classifies the most likely facial emotion on each
//! one, shows the annotated frame in a preview, and serves the latest result
//! over HTTP.
//!
//! # Architecture
//!
//! Two execution contexts share exactly one value:
//!
//! - The capture loop (`capture`) reads a frame from a `FrameSource`, asks an
//!   `EmotionClassifier` for a label and score, renders the overlay through a
//!   `PreviewSurface`, and publishes a `DetectionResult` into the
//!   `EmotionSlot`.
//! - The API (`api`) answers `GET /emotion` from the same `EmotionSlot`.
//!
//! The two never call each other. Publishing swaps a whole result, so the
//! API never sees a label from one frame next to a score from another.
//!
//! # Module Structure
//!
//! - `frame`: owned RGB frames
//! - `ingest`: video sources (synthetic `stub://`, V4L2)
//! - `classify`: classifier trait, face-first gating, backends (stub, tract ONNX)
//! - `preview`: preview surfaces (headless, OpenCV window)
//! - `annotate`: overlay text
//! - `state`: the shared result slot and the JSON report
//! - `capture`: loop state machine and lifecycle handle
//! - `api`: the HTTP listener
//! - `config`: file + environment configuration

pub mod annotate;
pub mod api;
pub mod capture;
pub mod classify;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod preview;
pub mod state;

pub use capture::{CaptureError, CaptureHandle, CaptureLoop, LoopOutcome, LoopState, StopReason};
pub use classify::{build_classifier, Classification, ClassifierSettings, EmotionClassifier};
pub use frame::Frame;
pub use ingest::{CameraConfig, CameraSource, FrameSource};
pub use preview::{build_preview, HeadlessPreview, PreviewSurface, STOP_KEY};
pub use state::{DetectionResult, EmotionReport, EmotionSlot};
