use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::sink::PoseResult;

/// Snapshot of pipeline progress, readable from any thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub last_sequence: Option<u64>,
    /// Smoothed rate as last published by the worker
    pub fps: Option<f64>,
}

/// Written by the thread running the frame stage, read by monitors.
///
/// Each update swaps in a whole new snapshot, so readers never observe a
/// half-applied rate update.
#[derive(Debug, Default)]
pub struct StatsCell {
    current: ArcSwap<PipelineStats>,
}

impl StatsCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<PipelineStats> {
        self.current.load_full()
    }

    pub(crate) fn record(&self, result: &PoseResult) {
        self.current.rcu(|prev| {
            let mut next = PipelineStats::clone(prev);
            next.frames_processed += 1;
            if !result.is_ok() {
                next.frames_failed += 1;
            }
            next.last_sequence = Some(result.sequence);
            next.fps = result.fps;
            next
        });

        metrics::counter!("frames_processed").increment(1);
        if !result.is_ok() {
            metrics::counter!("frames_failed").increment(1);
        }
        if let Some(fps) = result.fps {
            metrics::gauge!("pipeline_fps").set(fps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, PipelineError};

    fn result(sequence: u64, failure: Option<PipelineError>, fps: Option<f64>) -> PoseResult {
        PoseResult {
            sequence,
            keypoints: Vec::new(),
            fps,
            failure,
            frame_width: 8,
            frame_height: 8,
        }
    }

    #[test]
    fn test_record_accumulates() {
        let cell = StatsCell::new();
        assert_eq!(*cell.snapshot(), PipelineStats::default());

        cell.record(&result(1, None, None));
        cell.record(&result(2, Some(EngineError::NotLoaded.into()), Some(24.0)));

        let stats = cell.snapshot();
        assert_eq!(stats.frames_processed, 2);
        assert_eq!(stats.frames_failed, 1);
        assert_eq!(stats.last_sequence, Some(2));
        assert_eq!(stats.fps, Some(24.0));
    }
}
