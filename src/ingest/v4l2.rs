//! V4L2 webcam source.
//!
//! Opens a local device node, negotiates a packed format the normalizer
//! understands (RGB3 preferred, YUYV accepted), and maps a small ring of
//! buffers. Each `read` copies one buffer out as an RGB `Frame`.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CameraConfig, FrameSource};
use crate::frame::Frame;

const MMAP_BUFFERS: u32 = 4;

pub struct V4l2Source {
    config: CameraConfig,
    state: Option<V4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::Rgb24,
            config,
            state: None,
            frame_count: 0,
        }
    }

    fn negotiate(&mut self, device: &mut v4l::Device) -> Result<()> {
        use v4l::video::Capture;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;

        let mut negotiated = None;
        for fourcc in [b"RGB3", b"YUYV"] {
            format.fourcc = v4l::FourCC::new(fourcc);
            match device.set_format(&format) {
                Ok(applied) if PixelFormat::from_fourcc(&applied.fourcc.repr).is_some() => {
                    negotiated = Some(applied);
                    break;
                }
                Ok(applied) => {
                    log::debug!(
                        "V4l2Source: {} answered {} when asked for {}",
                        self.config.device,
                        applied.fourcc,
                        v4l::FourCC::new(fourcc)
                    );
                }
                Err(err) => {
                    log::warn!(
                        "V4l2Source: failed to set {} on {}: {}",
                        v4l::FourCC::new(fourcc),
                        self.config.device,
                        err
                    );
                }
            }
        }
        let applied = negotiated.ok_or_else(|| {
            anyhow!(
                "v4l2 device {} offers no supported pixel format (need RGB3 or YUYV)",
                self.config.device
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = applied.width;
        self.active_height = applied.height;
        self.active_format = PixelFormat::from_fourcc(&applied.fourcc.repr)
            .ok_or_else(|| anyhow!("unsupported fourcc {}", applied.fourcc))?;
        Ok(())
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        self.config.device.clone()
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        self.negotiate(&mut device)?;

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, MMAP_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: opened {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.active_format);
        let state = self.state.as_mut().context("v4l2 device not open")?;
        let pixels = state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, _meta) = fields
                .stream
                .next()
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            normalize_to_rgb(buf, width, height, format)
        })?;

        self.frame_count += 1;
        Frame::new(pixels, width, height, self.frame_count)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }
}
