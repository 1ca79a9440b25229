//! The frame stage and the single worker thread that drives it

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{info, instrument, trace, warn};

use crate::capture::Frame;
use crate::pipeline::handoff::HandoffReceiver;
use crate::pipeline::rate::{FpsGauge, RateEstimator};
use crate::pipeline::stats::StatsCell;
use crate::pose::{InferenceEngine, KeypointPipeline};
use crate::sink::{PoseResult, ResultSink};

/// Everything needed to turn one frame into a delivered result.
///
/// Owned by exactly one thread at a time: the worker in threaded mode, the
/// caller (behind a mutex) in inline mode.
pub struct FrameStage {
    pipeline: KeypointPipeline,
    engine: Box<dyn InferenceEngine>,
    sink: Box<dyn ResultSink>,
    rate: RateEstimator,
    epoch: Instant,
    stats: Arc<StatsCell>,
    fps: Arc<FpsGauge>,
}

impl FrameStage {
    pub fn new(
        pipeline: KeypointPipeline,
        engine: Box<dyn InferenceEngine>,
        sink: Box<dyn ResultSink>,
        stats: Arc<StatsCell>,
        fps: Arc<FpsGauge>,
    ) -> Self {
        Self {
            pipeline,
            engine,
            sink,
            rate: RateEstimator::new(),
            epoch: Instant::now(),
            stats,
            fps,
        }
    }

    /// Process, update the rate, deliver to the sink.
    ///
    /// Per-frame failures become a failed result with no keypoints; they never
    /// stop the stage.
    #[instrument(skip_all, fields(sequence = frame.sequence()))]
    pub fn run(&mut self, mut frame: Frame) -> (Frame, PoseResult) {
        let outcome = self.pipeline.process(&mut *self.engine, &mut frame);
        let fps = self.rate.update(self.epoch.elapsed().as_secs_f64() * 1000.0);
        self.fps.publish(fps);

        let (keypoints, failure) = match outcome {
            Ok(keypoints) => (keypoints, None),
            Err(err) => {
                warn!("Frame {} failed: {}", frame.sequence(), err);
                (Vec::new(), Some(err))
            }
        };

        let result = PoseResult {
            sequence: frame.sequence(),
            keypoints,
            fps,
            failure,
            frame_width: frame.width(),
            frame_height: frame.height(),
        };

        self.stats.record(&result);
        self.sink.deliver(&result);

        let latency = frame.meta.timestamp.elapsed();
        metrics::histogram!("frame_latency_ms").record(latency.as_secs_f64() * 1000.0);
        trace!(latency_ms = latency.as_millis() as u64, "Frame delivered");

        (frame, result)
    }
}

/// Spawn the worker loop on its own named thread.
///
/// The loop ends once the producer side of the handoff is dropped; a frame
/// already taken is always completed first.
pub fn spawn_worker(
    receiver: HandoffReceiver,
    mut stage: FrameStage,
) -> io::Result<thread::JoinHandle<()>> {
    // inherit the caller's subscriber so worker events land in the same place
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());

    thread::Builder::new()
        .name("pose-worker".into())
        .spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                info!("Worker loop started");
                let mut frames = 0u64;
                while let Some((frame, completion)) = receiver.take() {
                    let (frame, result) = stage.run(frame);
                    completion.complete(frame, result);
                    frames += 1;
                }
                info!(frames, "Worker loop exiting");
            })
        })
}
