use crate::classify::labels::Emotion;
use crate::classify::result::Classification;

/// Numerically stable softmax. Non-finite inputs yield an all-zero vector.
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f64> = logits.iter().map(|&l| ((l - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pick the highest-probability emotion, or no label below `threshold`.
pub fn top_emotion(probabilities: &[f64], threshold: f64) -> Classification {
    let best = probabilities
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1));
    match best {
        Some((index, &p)) if p >= threshold => match Emotion::from_index(index) {
            Some(emotion) => Classification::labelled(emotion.as_str(), p),
            None => Classification::none(),
        },
        _ => Classification::none(),
    }
}
