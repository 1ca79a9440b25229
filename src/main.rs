//! posepipe demo host: synthetic capture driving the pose pipeline

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info, warn};

use posepipe::capture::SyntheticCapture;
use posepipe::pose::SimulatedEngine;
use posepipe::sink::{ChannelSink, HostPayload};
use posepipe::{utils, Config, Frame, Pipeline};

/// Read when no path is given; missing is fine
const DEFAULT_CONFIG_PATH: &str = "posepipe.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    utils::init_tracing()?;

    info!("posepipe launching...");

    // Load configuration; the only argument is the TOML path
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = Config::load(Some(config_path.as_path()))?;
    debug!("Configuration: {:?}", config);

    let (sink, results) = ChannelSink::unbounded();
    let engine = SimulatedEngine::new(Duration::from_millis(config.engine.latency_ms));
    let pipeline = Arc::new(Pipeline::start(&config, engine, sink)?);

    // Report results as host payloads
    let mirror = config.engine.mirror;
    let reporter = tokio::spawn(async move {
        while let Ok(result) = results.recv_async().await {
            match HostPayload::from_result(&result, mirror).to_json() {
                Ok(json) => info!("onFrame {}", json),
                Err(e) => warn!("Failed to encode result {}: {}", result.sequence, e),
            }
        }
    });

    // Spawn capture task; submit blocks, so it lives on the blocking pool
    let running = Arc::new(AtomicBool::new(true));
    let mut producer = tokio::task::spawn_blocking({
        let pipeline = pipeline.clone();
        let running = running.clone();
        let capture_config = config.capture.clone();
        move || run_capture(capture_config, &pipeline, &running)
    });

    let last_frame = tokio::select! {
        joined = &mut producer => joined?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping capture");
            running.store(false, Ordering::SeqCst);
            producer.await?
        }
    }?;

    let stats = pipeline.stats();
    info!(
        "Processed {} frames ({} failed), fps {:?}",
        stats.frames_processed, stats.frames_failed, stats.fps
    );

    if let (Some(path), Some(frame)) = (config.engine.snapshot_path.as_ref(), last_frame) {
        frame.image.save(path)?;
        info!("Saved last annotated frame to {}", path);
    }

    match Arc::try_unwrap(pipeline) {
        Ok(pipeline) => pipeline.shutdown()?,
        Err(_) => return Err(eyre!("Pipeline still shared at shutdown")),
    }
    reporter.await?;

    info!("posepipe shutting down");
    Ok(())
}

/// Producer loop: capture, submit, pace to the configured rate.
fn run_capture(
    config: posepipe::CaptureConfig,
    pipeline: &Pipeline,
    running: &AtomicBool,
) -> Result<Option<Frame>> {
    let interval = utils::frame_interval(config.fps);
    let limit = config.frame_count;
    let mut capture = SyntheticCapture::new(config);
    let mut last = None;
    let mut submitted = 0u64;

    while running.load(Ordering::SeqCst) && limit.map_or(true, |n| submitted < n) {
        let tick = Instant::now();

        let frame = capture.capture_frame()?;
        let completed = pipeline.submit(frame)?;
        submitted += 1;
        last = Some(completed.frame);

        if let Some(rest) = interval.and_then(|i| i.checked_sub(tick.elapsed())) {
            thread::sleep(rest);
        }
    }

    Ok(last)
}
