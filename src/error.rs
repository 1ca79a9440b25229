//! Error taxonomy for the pose pipeline

use std::time::Duration;

use thiserror::Error;

/// Invalid or missing startup configuration. Fatal: the pipeline never starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown model variant `{0}` (expected `lightning` or `thunder`)")]
    UnknownVariant(String),

    #[error("input size must be non-zero")]
    ZeroInputSize,

    #[error("norm value for channel {channel} must be finite and non-zero, got {value}")]
    InvalidNorm { channel: usize, value: f32 },

    #[error("mean value for channel {channel} must be finite, got {value}")]
    InvalidMean { channel: usize, value: f32 },

    #[error("score threshold must lie in [0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
}

/// A raw buffer that cannot be wrapped as an RGBA frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("frame dimensions {width}x{height} exceed the addressable buffer size")]
    TooLarge { width: u32, height: u32 },

    #[error("buffer holds {actual} bytes, {width}x{height} RGBA needs {expected}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Failure reported by an inference engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("inference engine is not loaded")]
    NotLoaded,

    #[error("inference rejected input: {0}")]
    MalformedInput(String),

    #[error("inference call failed: {0}")]
    Backend(String),
}

/// Decode or render invariant violated for a single frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("raw output has shape {actual:?}, expected [{expected}, 3]")]
    ShapeMismatch {
        expected: usize,
        actual: Vec<usize>,
    },

    #[error("raw output contains a non-finite value at keypoint {index}")]
    NonFinite { index: usize },
}

/// Why the worker can no longer accept frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The worker thread exited (panic or shutdown) while frames were still submitted.
    WorkerGone,
    /// The worker did not accept or complete a frame within the submit timeout.
    Stalled(Duration),
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::WorkerGone => write!(f, "worker thread is gone"),
            TerminationReason::Stalled(timeout) => {
                write!(f, "worker stalled for more than {} ms", timeout.as_millis())
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("inference unavailable: {0}")]
    InferenceUnavailable(#[from] EngineError),

    #[error("pipeline failure: {0}")]
    PipelineFailure(#[from] DecodeError),

    #[error("pipeline terminated: {0}")]
    PipelineTerminated(TerminationReason),
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: PipelineError = ConfigError::UnknownVariant("m".into()).into();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("`m`")));
    }
}
