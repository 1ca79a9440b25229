//! Pipeline handle owned by the host: startup, frame submission, shutdown

pub mod handoff;
pub mod rate;
pub mod stats;
pub mod worker;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::capture::Frame;
use crate::display::{Overlay, SkeletonOverlay};
use crate::error::{PipelineError, PipelineResult, TerminationReason};
use crate::pose::{InferenceEngine, KeypointPipeline, PipelineConfig};
use crate::sink::{PoseResult, ResultSink};
use crate::Config;

pub use handoff::{frame_handoff, Completed, Completion, FrameHandoff, HandoffReceiver};
pub use rate::{FpsGauge, RateEstimator, RATE_WINDOW};
pub use stats::{PipelineStats, StatsCell};
pub use worker::{spawn_worker, FrameStage};

/// How frames reach the frame stage. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Dedicated worker thread fed through the frame handoff
    #[default]
    Threaded,
    /// Frames are processed on the submitting thread
    Inline,
}

enum Execution {
    Threaded {
        handoff: Option<FrameHandoff>,
        worker: Option<JoinHandle<()>>,
    },
    Inline(Mutex<FrameStage>),
}

/// Startup options beyond the model config
pub struct PipelineBuilder {
    config: PipelineConfig,
    mode: ExecutionMode,
    submit_timeout: Option<Duration>,
    overlay: Arc<dyn Overlay>,
}

impl PipelineBuilder {
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Treat a worker that takes longer than `timeout` as terminated.
    pub fn submit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn overlay(mut self, overlay: Arc<dyn Overlay>) -> Self {
        self.overlay = overlay;
        self
    }

    /// Build the stage and, in threaded mode, spawn the worker.
    #[instrument(skip_all, fields(variant = %self.config.variant(), mode = ?self.mode))]
    pub fn start<E, S>(self, engine: E, sink: S) -> PipelineResult<Pipeline>
    where
        E: InferenceEngine + 'static,
        S: ResultSink + 'static,
    {
        let config = Arc::new(self.config);
        let stats = Arc::new(StatsCell::new());
        let fps = Arc::new(FpsGauge::new());
        let stage = FrameStage::new(
            KeypointPipeline::new(config.clone(), self.overlay),
            Box::new(engine),
            Box::new(sink),
            stats.clone(),
            fps.clone(),
        );

        let execution = match self.mode {
            ExecutionMode::Threaded => {
                let (handoff, receiver) = frame_handoff(self.submit_timeout);
                let worker = spawn_worker(receiver, stage).map_err(|e| {
                    error!("Failed to spawn worker thread: {}", e);
                    PipelineError::PipelineTerminated(TerminationReason::WorkerGone)
                })?;
                Execution::Threaded {
                    handoff: Some(handoff),
                    worker: Some(worker),
                }
            }
            ExecutionMode::Inline => Execution::Inline(Mutex::new(stage)),
        };

        info!(
            "Pipeline started: {} @ {}px, accelerator {}",
            config.variant(),
            config.input_size(),
            if config.use_accelerator() { "on" } else { "off" }
        );

        Ok(Pipeline {
            config,
            mode: self.mode,
            execution,
            stats,
            fps,
            next_sequence: AtomicU64::new(1),
        })
    }
}

/// Owned pipeline instance. Replaces any process-global detector: the host
/// constructs it explicitly and passes it to its capture entry point.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    mode: ExecutionMode,
    execution: Execution,
    stats: Arc<StatsCell>,
    fps: Arc<FpsGauge>,
    next_sequence: AtomicU64,
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            mode: ExecutionMode::default(),
            submit_timeout: None,
            overlay: Arc::new(SkeletonOverlay::default()),
        }
    }

    /// Validate the loaded configuration and start. An invalid model section
    /// is a configuration error and nothing is spawned.
    pub fn start<E, S>(config: &Config, engine: E, sink: S) -> PipelineResult<Self>
    where
        E: InferenceEngine + 'static,
        S: ResultSink + 'static,
    {
        let pipeline_config = PipelineConfig::from_settings(&config.model)?;
        Self::builder(pipeline_config)
            .mode(config.runtime.mode)
            .submit_timeout(config.runtime.submit_timeout())
            .start(engine, sink)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.snapshot()
    }

    /// Latest smoothed rate, `None` while warming up.
    pub fn fps(&self) -> Option<f64> {
        self.fps.read()
    }

    /// Wrap a host buffer as the next frame in sequence.
    pub fn frame_from_rgba(&self, data: Vec<u8>, width: u32, height: u32) -> PipelineResult<Frame> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        Ok(Frame::from_rgba(data, width, height, sequence)?)
    }

    /// Process one frame. Returns only after the result was delivered to the
    /// sink, handing back the annotated frame.
    pub fn submit(&self, frame: Frame) -> PipelineResult<Completed> {
        match &self.execution {
            Execution::Threaded { handoff, .. } => match handoff {
                Some(handoff) => handoff.submit(frame),
                None => Err(PipelineError::PipelineTerminated(TerminationReason::WorkerGone)),
            },
            Execution::Inline(stage) => {
                let mut stage = stage
                    .lock()
                    .map_err(|_| PipelineError::PipelineTerminated(TerminationReason::WorkerGone))?;
                let (frame, result) = stage.run(frame);
                Ok(Completed { frame, result })
            }
        }
    }

    /// Host capture entry point: process an RGBA buffer and write the
    /// annotated pixels back into it.
    pub fn annotate_in_place(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
    ) -> PipelineResult<PoseResult> {
        let frame = self.frame_from_rgba(pixels.to_vec(), width, height)?;
        let Completed { frame, result } = self.submit(frame)?;
        pixels.copy_from_slice(frame.as_raw());
        Ok(result)
    }

    /// Stop accepting frames and wait for the worker to finish its current one.
    pub fn shutdown(mut self) -> PipelineResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> PipelineResult<()> {
        if let Execution::Threaded { handoff, worker } = &mut self.execution {
            // closing the handoff is the shutdown signal
            drop(handoff.take());
            if let Some(worker) = worker.take() {
                if worker.join().is_err() {
                    return Err(PipelineError::PipelineTerminated(TerminationReason::WorkerGone));
                }
                info!("Pipeline worker stopped");
            }
        }
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
