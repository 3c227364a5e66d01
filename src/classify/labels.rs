use std::fmt;

/// Emotion categories, in the output order of FER+ style models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Surprise,
    Sad,
    Angry,
    Disgust,
    Fear,
    Contempt,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprise,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Contempt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Surprise => "surprise",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Contempt => "contempt",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
