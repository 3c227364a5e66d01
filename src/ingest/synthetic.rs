use anyhow::{anyhow, Result};

use super::{CameraConfig, FrameSource};
use crate::frame::Frame;

/// Synthetic source for `stub://` devices.
///
/// Produces a gradient whose offset drifts every frame and whose base shade
/// changes every 30 frames, so hash-driven classifiers see a changing scene.
pub struct SyntheticSource {
    config: CameraConfig,
    opened: bool,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            opened: false,
            frame_count: 0,
            scene_state: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;

        if self.frame_count % 30 == 0 {
            self.scene_state = self.scene_state.wrapping_add(37);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.config.device)
    }

    fn open(&mut self) -> Result<()> {
        self.opened = true;
        log::info!("SyntheticSource: opened {}", self.config.device);
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(anyhow!("synthetic source {} is not open", self.config.device));
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(pixels, self.config.width, self.config.height, self.frame_count)
    }

    fn release(&mut self) {
        if self.opened {
            log::info!(
                "SyntheticSource: released {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_source_produces_sequenced_frames() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.open()?;

        let first = source.read()?;
        let second = source.read()?;
        assert_eq!(first.width, 64);
        assert_eq!(first.height, 48);
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_ne!(first.pixels(), second.pixels());
        assert_eq!(source.frames_captured(), 2);

        Ok(())
    }

    #[test]
    fn synthetic_source_refuses_reads_after_release() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.open()?;
        source.read()?;
        source.release();

        assert!(source.read().is_err());
        Ok(())
    }
}
