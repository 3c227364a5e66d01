#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use tract_onnx::prelude::*;

use crate::classify::backend::EmotionClassifier;
use crate::classify::labels::Emotion;
use crate::classify::result::Classification;
use crate::classify::scores::{softmax, top_emotion};
use crate::classify::DEFAULT_THRESHOLD;
use crate::frame::Frame;

/// Side of the square grayscale input FER+ style models expect.
const INPUT_SIDE: u32 = 64;

/// Tract-based ONNX emotion classifier (FER+ layout).
///
/// Expects a face crop, which `FaceGatedClassifier` supplies. The crop is
/// reduced to a 64x64 grayscale tensor (raw 0..255 intensities, NCHW) and the
/// model's eight logits are soft-maxed.
pub struct TractClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    threshold: f64,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = INPUT_SIDE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 1, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let gray = DynamicImage::ImageRgb8(rgb)
            .resize_exact(INPUT_SIDE, INPUT_SIDE, FilterType::Triangle)
            .to_luma8();

        let side = INPUT_SIDE as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 1, side, side), |(_, _, y, x)| {
            gray.get_pixel(x as u32, y as u32).0[0] as f32
        });
        Ok(input.into_tensor())
    }

    fn extract_logits(&self, outputs: TVec<TValue>) -> Result<Vec<f32>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let logits: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .cloned()
            .collect();
        if logits.len() != Emotion::ALL.len() {
            return Err(anyhow!(
                "expected {} emotion logits, model produced {}",
                Emotion::ALL.len(),
                logits.len()
            ));
        }
        Ok(logits)
    }
}

impl EmotionClassifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, frame: &Frame) -> Result<Classification> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let logits = self.extract_logits(outputs)?;
        Ok(top_emotion(&softmax(&logits), self.threshold))
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::filled(INPUT_SIDE, INPUT_SIDE, 0, 128)?;
        self.classify(&blank).map(|_| ())
    }
}
