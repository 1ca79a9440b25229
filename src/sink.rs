//! Result records and the sinks that deliver them to the host

use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pose::Keypoint;

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct PoseResult {
    pub sequence: u64,
    /// Ordered by joint index; empty when no pose was found or the frame failed
    pub keypoints: Vec<Keypoint>,
    /// `None` while the rate estimator is warming up
    pub fps: Option<f64>,
    /// Per-frame inference or decode failure
    pub failure: Option<PipelineError>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl PoseResult {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Receives every finished result, on the thread that processed the frame.
pub trait ResultSink: Send {
    fn deliver(&mut self, result: &PoseResult);
}

impl<F> ResultSink for F
where
    F: FnMut(&PoseResult) + Send,
{
    fn deliver(&mut self, result: &PoseResult) {
        self(result)
    }
}

/// Forwards results to a `flume` receiver
pub struct ChannelSink {
    tx: flume::Sender<PoseResult>,
}

impl ChannelSink {
    pub fn new(tx: flume::Sender<PoseResult>) -> Self {
        Self { tx }
    }

    /// Unbounded pair; the sink never blocks the worker.
    pub fn unbounded() -> (Self, flume::Receiver<PoseResult>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&mut self, result: &PoseResult) {
        if self.tx.send(result.clone()).is_err() {
            warn!(sequence = result.sequence, "Result receiver dropped");
        }
    }
}

/// Logs each result
#[derive(Debug, Default)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn deliver(&mut self, result: &PoseResult) {
        match &result.failure {
            None => info!(
                sequence = result.sequence,
                keypoints = result.keypoints.len(),
                fps = ?result.fps,
                "Pose result"
            ),
            Some(err) => warn!(sequence = result.sequence, fps = ?result.fps, "Frame failed: {}", err),
        }
    }
}

/// Keypoint as the host bridge expects it: score as a percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HostKeypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// JSON payload for a host callback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostPayload {
    pub sequence: u64,
    pub keypoints: Vec<HostKeypoint>,
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostPayload {
    /// `mirror` flips x around the frame width for selfie-view hosts.
    pub fn from_result(result: &PoseResult, mirror: bool) -> Self {
        let width = result.frame_width as f32;
        let keypoints = result
            .keypoints
            .iter()
            .map(|kp| HostKeypoint {
                x: if mirror { width - kp.x } else { kp.x },
                y: kp.y,
                score: kp.score * 100.0,
            })
            .collect();

        Self {
            sequence: result.sequence,
            keypoints,
            fps: result.fps,
            error: result.failure.as_ref().map(ToString::to_string),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
