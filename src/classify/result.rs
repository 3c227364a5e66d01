/// Outcome of classifying one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    /// Most likely emotion, or `None` when nothing was detected.
    pub label: Option<String>,
    /// Score in [0, 1] for `label`. Meaningless when `label` is `None`.
    pub confidence: f64,
}

impl Classification {
    pub fn labelled(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: Some(label.into()),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_detected(&self) -> bool {
        self.label.is_some()
    }
}
