//! Per-frame orchestration: preprocess, infer, decode, render

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::capture::Frame;
use crate::display::Overlay;
use crate::error::PipelineError;
use crate::pose::decode::decode;
use crate::pose::engine::InferenceEngine;
use crate::pose::keypoint::Keypoint;
use crate::pose::preprocess::preprocess;
use crate::pose::variant::PipelineConfig;

/// Stateless apart from the config and overlay it was built with, so the
/// same instance serves the worker thread and the inline path.
#[derive(Clone)]
pub struct KeypointPipeline {
    config: Arc<PipelineConfig>,
    overlay: Arc<dyn Overlay>,
}

impl KeypointPipeline {
    pub fn new(config: Arc<PipelineConfig>, overlay: Arc<dyn Overlay>) -> Self {
        Self { config, overlay }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one frame through the model and annotate it in place.
    ///
    /// Engine failures surface as [`PipelineError::InferenceUnavailable`],
    /// shape problems as [`PipelineError::PipelineFailure`]. An empty pose is
    /// returned as an empty vector.
    #[instrument(skip_all, fields(sequence = frame.sequence()))]
    pub fn process<E>(&self, engine: &mut E, frame: &mut Frame) -> Result<Vec<Keypoint>, PipelineError>
    where
        E: InferenceEngine + ?Sized,
    {
        let (tensor, letterbox) = preprocess(frame, &self.config);

        let infer_start = Instant::now();
        let raw = engine.infer(&tensor, &self.config)?;
        let infer_time = infer_start.elapsed();
        metrics::histogram!("inference_time_us").record(infer_time.as_micros() as f64);

        let keypoints = decode(&raw, &letterbox)?;
        debug!(
            keypoints = keypoints.len(),
            infer_us = infer_time.as_micros() as u64,
            "Decoded pose"
        );

        self.overlay
            .draw(frame, &keypoints, self.config.score_threshold());

        Ok(keypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::SkeletonOverlay;
    use crate::error::{DecodeError, EngineError};
    use crate::pose::decode::RawOutput;
    use crate::pose::engine::SimulatedEngine;
    use crate::pose::preprocess::InputTensor;
    use crate::pose::variant::ModelVariant;
    use ndarray::{ArrayD, IxDyn};
    use std::time::Duration;

    struct FixedOutput(RawOutput);

    impl InferenceEngine for FixedOutput {
        fn infer(&mut self, _: &InputTensor, _: &PipelineConfig) -> Result<RawOutput, EngineError> {
            Ok(self.0.clone())
        }
    }

    struct Unloaded;

    impl InferenceEngine for Unloaded {
        fn infer(&mut self, _: &InputTensor, _: &PipelineConfig) -> Result<RawOutput, EngineError> {
            Err(EngineError::NotLoaded)
        }
    }

    fn pipeline() -> KeypointPipeline {
        KeypointPipeline::new(
            Arc::new(PipelineConfig::new(ModelVariant::Lightning, false)),
            Arc::new(SkeletonOverlay::default()),
        )
    }

    fn frame() -> Frame {
        Frame::from_rgba(vec![0; 320 * 240 * 4], 320, 240, 1).unwrap()
    }

    #[test]
    fn test_process_annotates_frame() {
        let mut frame = frame();
        let mut engine = SimulatedEngine::new(Duration::ZERO);
        let kps = pipeline().process(&mut engine, &mut frame).unwrap();

        assert_eq!(kps.len(), 17);
        assert!(kps.iter().all(|k| k.x <= 320.0 && k.y <= 240.0));
        assert!(frame.as_raw().iter().any(|&b| b != 0));
    }

    #[test]
    fn test_engine_failure_is_inference_unavailable() {
        let mut frame = frame();
        let err = pipeline().process(&mut Unloaded, &mut frame).unwrap_err();
        assert_eq!(err, PipelineError::InferenceUnavailable(EngineError::NotLoaded));
    }

    #[test]
    fn test_shape_mismatch_is_pipeline_failure() {
        let mut frame = frame();
        let mut engine = FixedOutput(ArrayD::zeros(IxDyn(&[1, 1, 4, 3])));
        let err = pipeline().process(&mut engine, &mut frame).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PipelineFailure(DecodeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_low_confidence_pose_is_not_an_error() {
        let mut frame = frame();
        let mut engine = FixedOutput(ArrayD::from_elem(IxDyn(&[1, 1, 17, 3]), 0.01));
        let kps = pipeline().process(&mut engine, &mut frame).unwrap();
        assert_eq!(kps.len(), 17);
        assert!(frame.as_raw().iter().all(|&b| b == 0));
    }
}
