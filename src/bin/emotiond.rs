//! emotiond - webcam emotion daemon
//!
//! This daemon:
//! 1. Starts the emotion API on a background thread
//! 2. Runs the capture loop on the main thread until the stop key ('q' in the
//!    preview window), Ctrl-C, or a camera failure
//! 3. Keeps serving the last result after the loop ends, until Ctrl-C
//!
//! A classifier that cannot be built (missing model, backend not compiled in)
//! is handled like a camera that cannot be opened: logged once, the loop never
//! runs, and the endpoint keeps answering with the default body.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use emotion_beacon::{
    api::{ApiConfig, ApiServer},
    build_classifier, build_preview,
    config::EmotiondConfig,
    CameraSource, CaptureLoop, EmotionSlot,
};

#[derive(Parser, Debug)]
#[command(name = "emotiond", version, about = "Webcam emotion classifier with a JSON endpoint")]
struct Args {
    /// JSON config file.
    #[arg(long, env = "EMOTIOND_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = EmotiondConfig::load_from(args.config.as_deref())?;

    let slot = Arc::new(EmotionSlot::new());
    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
    };
    // The handle is kept alive but never stopped: the listener runs until the
    // process exits.
    let api_handle = ApiServer::new(api_config, slot.clone()).spawn()?;
    log::info!("emotion api listening on http://{}/emotion", api_handle.addr);

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let stop_signal = stop.clone();
    ctrlc::set_handler(move || {
        stop_signal.store(true, Ordering::SeqCst);
        let _ = tx.send(());
    })?;

    match build_classifier(&config.classifier) {
        Ok(classifier) => {
            let preview = build_preview(config.preview_enabled)?;
            let source = CameraSource::new(config.camera.clone());
            let mut capture = CaptureLoop::new(Box::new(source), classifier, preview, slot)
                .with_target_fps(config.camera.target_fps);

            // Loop failures are logged inside the loop and stay local to it.
            if let Ok(outcome) = capture.run(&stop) {
                log::info!(
                    "capture finished after {} frames ({:?})",
                    outcome.frames_processed,
                    outcome.reason
                );
            }
        }
        Err(err) => {
            log::error!(
                "classifier backend '{}' unavailable: {:#}",
                config.classifier.backend,
                err
            );
        }
    }

    log::info!(
        "capture loop stopped; still serving the last result on {} (Ctrl-C to exit)",
        api_handle.addr
    );
    let _ = rx.recv();
    log::info!("shutdown signal received");
    Ok(())
}
