//! Capture-and-infer loop.
//!
//! `Starting → Running → Stopped`. The loop opens the source, then per frame:
//! read, classify, render the overlay, publish to the shared slot, and check
//! for a stop signal. Any source failure is terminal for the loop. Nothing is
//! retried; the API keeps serving whatever was published last.
//!
//! The source and preview are held by a `Session` whose `Drop` releases the
//! source and closes the preview, so every exit path (including errors and
//! panics in a collaborator) tears both down.

use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::annotate::annotation_text;
use crate::classify::{Classification, EmotionClassifier};
use crate::ingest::FrameSource;
use crate::preview::{PreviewSurface, STOP_KEY};
use crate::state::{DetectionResult, EmotionSlot};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source failed to open. The loop never ran.
    #[error("video source {device} unavailable: {source}")]
    SourceUnavailable {
        device: String,
        #[source]
        source: BoxError,
    },
    /// A read from an open source failed.
    #[error("frame read failed after {frames} frames: {source}")]
    FrameReadFailure {
        frames: u64,
        #[source]
        source: BoxError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The stop key was pressed in the preview.
    StopKey,
    /// `CaptureHandle::stop` (or Ctrl-C in the daemon) raised the stop flag.
    StopRequested,
}

/// How a loop that started successfully came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopOutcome {
    pub frames_processed: u64,
    pub reason: StopReason,
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    classifier: Box<dyn EmotionClassifier>,
    preview: Box<dyn PreviewSurface>,
    slot: Arc<EmotionSlot>,
    frame_interval: Option<Duration>,
    state: LoopState,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        classifier: Box<dyn EmotionClassifier>,
        preview: Box<dyn PreviewSurface>,
        slot: Arc<EmotionSlot>,
    ) -> Self {
        Self {
            source,
            classifier,
            preview,
            slot,
            frame_interval: None,
            state: LoopState::Starting,
        }
    }

    /// Pace the loop to at most `fps` frames per second. 0 disables pacing.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.frame_interval = (fps > 0).then(|| Duration::from_secs(1) / fps);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until the stop key, the stop flag, or a source failure.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<LoopOutcome, CaptureError> {
        self.state = LoopState::Starting;
        let mut session = Session {
            source: &mut self.source,
            preview: &mut self.preview,
        };
        let device = session.source.describe();
        log::info!("capture loop starting on {}", device);

        if let Err(err) = session.source.open() {
            self.state = LoopState::Stopped;
            let err = CaptureError::SourceUnavailable {
                device,
                source: err.into(),
            };
            log::error!("{}", err);
            return Err(err);
        }
        self.state = LoopState::Running;
        log::info!("capture loop running on {}", device);

        let mut frames_processed = 0u64;
        let mut last_health_log = Instant::now();
        let outcome = loop {
            let iteration_started = Instant::now();

            let frame = match session.source.read() {
                Ok(frame) => frame,
                Err(err) => {
                    let err = CaptureError::FrameReadFailure {
                        frames: frames_processed,
                        source: err.into(),
                    };
                    log::error!("{}", err);
                    break Err(err);
                }
            };

            let classification = match self.classifier.classify(&frame) {
                Ok(classification) => classification,
                Err(err) => {
                    log::warn!(
                        "classifier '{}' failed on frame {}: {:#}",
                        self.classifier.name(),
                        frame.seq,
                        err
                    );
                    Classification::none()
                }
            };

            let result = DetectionResult::from_classification(classification, frame.seq);
            let annotation = annotation_text(result.label.as_deref(), result.confidence);
            if let Err(err) = session.preview.show(&frame, &annotation) {
                log::warn!("preview failed on frame {}: {:#}", frame.seq, err);
            }
            let latency_ms = frame.age_ms();
            drop(frame);

            log::debug!(
                "publish frame {} ({} ms): {}",
                result.frame_seq,
                latency_ms,
                annotation
            );
            self.slot.publish(result);
            frames_processed += 1;

            if session.preview.poll_key() == Some(STOP_KEY) {
                log::info!("stop key pressed");
                break Ok(StopReason::StopKey);
            }
            if stop.load(Ordering::SeqCst) {
                log::info!("capture stop requested");
                break Ok(StopReason::StopRequested);
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let latest = self.slot.snapshot();
                log::info!(
                    "capture health: frames={} latest={} score={:.2}",
                    frames_processed,
                    latest.emotion,
                    latest.score
                );
                last_health_log = Instant::now();
            }

            if let Some(interval) = self.frame_interval {
                if let Some(remaining) = interval.checked_sub(iteration_started.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        };

        drop(session);
        self.state = LoopState::Stopped;
        let reason = outcome?;
        log::info!(
            "capture loop stopped ({:?}) after {} frames",
            reason,
            frames_processed
        );
        Ok(LoopOutcome {
            frames_processed,
            reason,
        })
    }
}

struct Session<'a> {
    source: &'a mut Box<dyn FrameSource>,
    preview: &'a mut Box<dyn PreviewSurface>,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.source.release();
        self.preview.close();
    }
}

/// Background capture loop with an explicit lifecycle.
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<Result<LoopOutcome, CaptureError>>>,
}

impl CaptureHandle {
    /// Spawn the loop on its own thread.
    pub fn start(mut capture: CaptureLoop) -> anyhow::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let join = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || capture.run(&stop_thread))?;
        Ok(Self {
            stop,
            join: Some(join),
        })
    }

    /// Ask the loop to stop after the frame in flight.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Wait for the loop to end. Loop failures come back as `CaptureError`
    /// inside the `anyhow::Error`.
    pub fn join(mut self) -> anyhow::Result<LoopOutcome> {
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("capture loop already joined"))?;
        let outcome = join
            .join()
            .map_err(|_| anyhow!("capture thread panicked"))??;
        Ok(outcome)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            self.stop.store(true, Ordering::SeqCst);
            let _ = join.join();
        }
    }
}
