//! Captured video frames.
//!
//! A `Frame` is owned by exactly one iteration of the capture loop: the source
//! produces it, the classifier and preview borrow it, and it is dropped before
//! the next frame is read. Nothing retains frames beyond that iteration.

use anyhow::{anyhow, Result};
use std::time::Instant;

/// Bytes per pixel of the packed RGB8 layout every source produces.
pub const RGB_CHANNELS: usize = 3;

/// One decoded frame in packed RGB8 (row-major, no padding).
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-source sequence number, starting at 1.
    pub seq: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a pixel buffer. Fails if the buffer does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}x{} expects {} RGB bytes, received {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            seq,
            captured_at: Instant::now(),
        })
    }

    /// A uniformly filled frame, mostly useful for tests and synthetic sources.
    pub fn filled(width: u32, height: u32, seq: u64, value: u8) -> Result<Self> {
        let len = expected_len(width, height)?;
        Self::new(vec![value; len], width, height, seq)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy out the `width` x `height` region at (`x`, `y`), clipped to the
    /// frame. The crop keeps the sequence number and capture instant.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Frame> {
        let right = x.saturating_add(width).min(self.width);
        let bottom = y.saturating_add(height).min(self.height);
        if x >= right || y >= bottom {
            return Err(anyhow!(
                "crop {}x{} at ({}, {}) lies outside the {}x{} frame",
                width,
                height,
                x,
                y,
                self.width,
                self.height
            ));
        }
        let (crop_width, crop_height) = (right - x, bottom - y);
        let stride = self.width as usize * RGB_CHANNELS;
        let row_len = crop_width as usize * RGB_CHANNELS;
        let mut data = Vec::with_capacity(row_len * crop_height as usize);
        for row in y..bottom {
            let start = row as usize * stride + x as usize * RGB_CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Ok(Frame {
            data,
            width: crop_width,
            height: crop_height,
            seq: self.seq,
            captured_at: self.captured_at,
        })
    }

    /// Milliseconds since the frame was captured.
    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel content is never logged.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("seq", &self.seq)
            .finish()
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
