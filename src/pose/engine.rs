//! Inference engine contract and the simulated engine used by the demo binary

use std::thread;
use std::time::Duration;

use ndarray::{ArrayD, IxDyn};

use crate::error::EngineError;
use crate::pose::decode::RawOutput;
use crate::pose::keypoint::KeypointIndex;
use crate::pose::preprocess::InputTensor;
use crate::pose::variant::PipelineConfig;

/// Turns a preprocessed tensor into raw keypoint output.
///
/// Calls may be slow; the engine is owned by whichever thread runs the
/// pipeline stage and is never called concurrently.
pub trait InferenceEngine: Send {
    fn infer(
        &mut self,
        tensor: &InputTensor,
        config: &PipelineConfig,
    ) -> Result<RawOutput, EngineError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn infer(
        &mut self,
        tensor: &InputTensor,
        config: &PipelineConfig,
    ) -> Result<RawOutput, EngineError> {
        (**self).infer(tensor, config)
    }
}

/// Standing figure in normalised `(y, x)` input coordinates
const STANDING_POSE: [(f32, f32); KeypointIndex::COUNT] = [
    (0.20, 0.50),
    (0.18, 0.48),
    (0.18, 0.52),
    (0.19, 0.46),
    (0.19, 0.54),
    (0.30, 0.42),
    (0.30, 0.58),
    (0.42, 0.38),
    (0.42, 0.62),
    (0.52, 0.36),
    (0.52, 0.64),
    (0.55, 0.45),
    (0.55, 0.55),
    (0.70, 0.45),
    (0.70, 0.55),
    (0.85, 0.45),
    (0.85, 0.55),
];

/// Engine that sleeps for a fixed latency and returns a standing pose that
/// sways with the frame count.
pub struct SimulatedEngine {
    latency: Duration,
    calls: u64,
}

impl SimulatedEngine {
    pub fn new(latency: Duration) -> Self {
        Self { latency, calls: 0 }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl InferenceEngine for SimulatedEngine {
    fn infer(
        &mut self,
        tensor: &InputTensor,
        config: &PipelineConfig,
    ) -> Result<RawOutput, EngineError> {
        let side = config.input_size() as usize;
        if tensor.shape() != [1, side, side, 3] {
            return Err(EngineError::MalformedInput(format!(
                "expected [1, {side}, {side}, 3], got {:?}",
                tensor.shape()
            )));
        }

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.calls += 1;

        let sway = ((self.calls % 40) as f32 / 40.0 * std::f32::consts::TAU).sin() * 0.03;
        let mut flat = Vec::with_capacity(KeypointIndex::COUNT * 3);
        for (i, &(y, x)) in STANDING_POSE.iter().enumerate() {
            flat.push(y);
            flat.push(x + sway);
            flat.push(if i < 5 { 0.9 } else { 0.75 });
        }

        ArrayD::from_shape_vec(IxDyn(&[1, 1, KeypointIndex::COUNT, 3]), flat)
            .map_err(|e| EngineError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::variant::ModelVariant;

    #[test]
    fn test_simulated_engine_output_shape() {
        let config = PipelineConfig::new(ModelVariant::Lightning, false);
        let tensor = InputTensor::zeros((1, 192, 192, 3));
        let mut engine = SimulatedEngine::new(Duration::ZERO);

        let out = engine.infer(&tensor, &config).unwrap();
        assert_eq!(out.shape(), &[1, 1, 17, 3]);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_simulated_engine_rejects_wrong_input() {
        let config = PipelineConfig::new(ModelVariant::Thunder, false);
        let tensor = InputTensor::zeros((1, 192, 192, 3));
        let mut engine = SimulatedEngine::new(Duration::ZERO);

        assert!(matches!(
            engine.infer(&tensor, &config),
            Err(EngineError::MalformedInput(_))
        ));
        assert_eq!(engine.calls(), 0);
    }
}
