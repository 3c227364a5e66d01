#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use tract_onnx::prelude::*;

use crate::classify::face::{FaceDetector, FaceRegion, DEFAULT_FACE_THRESHOLD};
use crate::frame::Frame;

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;

/// Overlap above which two boxes are treated as the same face.
const NMS_IOU: f32 = 0.3;

/// UltraFace (RFB-320) face detector on tract.
///
/// The model takes a 1x3x240x320 RGB tensor normalised to (p - 127) / 128
/// and emits per-anchor `scores` [1, N, 2] and corner `boxes` [1, N, 4] in
/// 0..1 coordinates.
pub struct TractFaceDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    threshold: f32,
}

impl TractFaceDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| {
                format!("failed to load face model from {}", model_path.display())
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
                ),
            )
            .context("failed to set face model input fact")?
            .into_optimized()
            .context("failed to optimize face model")?
            .into_runnable()
            .context("failed to build runnable face model")?;

        Ok(Self {
            model,
            threshold: DEFAULT_FACE_THRESHOLD as f32,
        })
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold as f32;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let resized = DynamicImage::ImageRgb8(rgb)
            .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle)
            .to_rgb8();

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
            |(_, c, y, x)| (resized.get_pixel(x as u32, y as u32).0[c] as f32 - 127.0) / 128.0,
        );
        Ok(input.into_tensor())
    }
}

fn flatten(output: &TValue, what: &str) -> Result<Vec<f32>> {
    Ok(output
        .to_array_view::<f32>()
        .with_context(|| format!("face model {} tensor was not f32", what))?
        .iter()
        .cloned()
        .collect())
}

/// Corner box in 0..1 coordinates with its face score.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    score: f32,
    corners: [f32; 4],
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn suppress(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| iou(&k.corners, &candidate.corners) < NMS_IOU)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn to_region(candidate: &Candidate, frame: &Frame) -> Option<FaceRegion> {
    let [x1, y1, x2, y2] = candidate.corners;
    let fw = frame.width as f32;
    let fh = frame.height as f32;
    let left = (x1.clamp(0.0, 1.0) * fw) as u32;
    let top = (y1.clamp(0.0, 1.0) * fh) as u32;
    let right = (x2.clamp(0.0, 1.0) * fw) as u32;
    let bottom = (y2.clamp(0.0, 1.0) * fh) as u32;
    (right > left && bottom > top).then(|| FaceRegion {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
        confidence: candidate.score as f64,
    })
}

impl FaceDetector for TractFaceDetector {
    fn name(&self) -> &'static str {
        "ultraface"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("face model inference failed")?;
        if outputs.len() < 2 {
            return Err(anyhow!(
                "face model produced {} outputs, expected scores and boxes",
                outputs.len()
            ));
        }
        let scores = flatten(&outputs[0], "scores")?;
        let boxes = flatten(&outputs[1], "boxes")?;
        if scores.len() / 2 != boxes.len() / 4 {
            return Err(anyhow!(
                "face model scores ({}) and boxes ({}) disagree",
                scores.len() / 2,
                boxes.len() / 4
            ));
        }

        let candidates = scores
            .chunks_exact(2)
            .zip(boxes.chunks_exact(4))
            .filter(|(score, _)| score[1] >= self.threshold)
            .map(|(score, corners)| Candidate {
                score: score[1],
                corners: [corners[0], corners[1], corners[2], corners[3]],
            })
            .collect();

        Ok(suppress(candidates)
            .iter()
            .filter_map(|candidate| to_region(candidate, frame))
            .collect())
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::filled(INPUT_WIDTH, INPUT_HEIGHT, 0, 128)?;
        self.detect(&blank).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_boxes_collapse_to_the_best_one() {
        let kept = suppress(vec![
            Candidate {
                score: 0.8,
                corners: [0.1, 0.1, 0.5, 0.5],
            },
            Candidate {
                score: 0.95,
                corners: [0.12, 0.1, 0.52, 0.5],
            },
            Candidate {
                score: 0.9,
                corners: [0.6, 0.6, 0.9, 0.9],
            },
        ]);
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.95, 0.9]);
    }

    #[test]
    fn regions_are_scaled_to_frame_pixels() -> Result<()> {
        let frame = Frame::filled(200, 100, 1, 0)?;
        let region = to_region(
            &Candidate {
                score: 0.9,
                corners: [0.25, 0.5, 0.75, 1.2],
            },
            &frame,
        );
        assert_eq!(
            region,
            Some(FaceRegion {
                x: 50,
                y: 50,
                width: 100,
                height: 50,
                confidence: 0.9f32 as f64,
            })
        );
        Ok(())
    }
}
