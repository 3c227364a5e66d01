//! The single shared result slot.
//!
//! The capture loop is the only writer; HTTP handlers are readers. A publish
//! swaps one `Arc<DetectionResult>` under the write lock, so a reader always
//! holds a label and a confidence that came from the same frame.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::{Arc, PoisonError, RwLock};

use crate::annotate::NO_EMOTION_TEXT;
use crate::classify::Classification;

/// Latest result for one processed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub label: Option<String>,
    /// In [0, 1]; 0 when `label` is `None`.
    pub confidence: f64,
    /// Sequence number of the frame this result came from.
    pub frame_seq: u64,
}

impl DetectionResult {
    pub fn from_classification(classification: Classification, frame_seq: u64) -> Self {
        match classification.label {
            Some(label) => Self {
                label: Some(label),
                confidence: classification.confidence,
                frame_seq,
            },
            None => Self::none_detected(frame_seq),
        }
    }

    pub fn none_detected(frame_seq: u64) -> Self {
        Self {
            label: None,
            confidence: 0.0,
            frame_seq,
        }
    }
}

/// Owned cell holding the current result, shared by the loop and the API.
#[derive(Debug, Default)]
pub struct EmotionSlot {
    current: RwLock<Option<Arc<DetectionResult>>>,
}

impl EmotionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current result.
    pub fn publish(&self, result: DetectionResult) {
        let next = Arc::new(result);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(next);
    }

    /// Latest published result, if any.
    pub fn latest(&self) -> Option<Arc<DetectionResult>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The response body for the current state.
    pub fn snapshot(&self) -> EmotionReport {
        EmotionReport::from(self.latest().as_deref())
    }
}

/// JSON body served by `GET /emotion`.
#[derive(Clone, Debug, PartialEq)]
pub struct EmotionReport {
    pub emotion: String,
    pub score: f64,
}

impl EmotionReport {
    pub fn none_detected() -> Self {
        Self {
            emotion: NO_EMOTION_TEXT.to_string(),
            score: 0.0,
        }
    }

    pub fn is_none_detected(&self) -> bool {
        self.emotion == NO_EMOTION_TEXT && self.score == 0.0
    }
}

impl Serialize for EmotionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("EmotionReport", 2)?;
        body.serialize_field("emotion", &self.emotion)?;
        if self.is_none_detected() {
            // Clients compare against the integer sentinel.
            body.serialize_field("score", &0u8)?;
        } else {
            body.serialize_field("score", &self.score)?;
        }
        body.end()
    }
}

impl From<Option<&DetectionResult>> for EmotionReport {
    fn from(result: Option<&DetectionResult>) -> Self {
        match result {
            Some(DetectionResult {
                label: Some(label),
                confidence,
                ..
            }) => Self {
                emotion: label.clone(),
                score: *confidence,
            },
            _ => Self::none_detected(),
        }
    }
}
