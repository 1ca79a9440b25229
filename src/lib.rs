pub mod capture;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod pose;
pub mod sink;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::Frame;
pub use error::{ConfigError, PipelineError, PipelineResult, TerminationReason};
pub use pipeline::{Completed, ExecutionMode, Pipeline, PipelineStats};
pub use pose::{InferenceEngine, Keypoint, ModelVariant, PipelineConfig};
pub use sink::{PoseResult, ResultSink};

/// Prefix for environment overrides, e.g. `POSEPIPE__MODEL__VARIANT=thunder`
pub const ENV_PREFIX: &str = "POSEPIPE";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelSettings,
    pub runtime: RuntimeConfig,
    pub capture: CaptureConfig,
    pub engine: EngineConfig,
}

/// Model selection, validated into a [`PipelineConfig`] at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub variant: String,
    pub use_accelerator: bool,
    pub score_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mode: ExecutionMode,
    /// 0 disables the timeout
    pub submit_timeout_ms: u64,
}

/// Synthetic capture source used by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Stop after this many frames; run until Ctrl-C when unset
    pub frame_count: Option<u64>,
}

/// Simulated engine used by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub latency_ms: u64,
    /// Mirror x in the host payload (selfie view)
    pub mirror: bool,
    /// Write the last annotated frame here on exit
    pub snapshot_path: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            variant: ModelVariant::Lightning.name().into(),
            use_accelerator: false,
            score_threshold: pose::variant::DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Threaded,
            submit_timeout_ms: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn submit_timeout(&self) -> Option<Duration> {
        (self.submit_timeout_ms > 0).then(|| Duration::from_millis(self.submit_timeout_ms))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            frame_count: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            latency_ms: 25,
            mirror: true,
            snapshot_path: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `POSEPIPE__*` environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let config = Config::default();
        let resolved = PipelineConfig::from_settings(&config.model).unwrap();
        assert_eq!(resolved.variant(), ModelVariant::Lightning);
        assert_eq!(config.runtime.submit_timeout(), None);
        assert_eq!(config.runtime.mode, ExecutionMode::Threaded);
    }

    #[test]
    fn test_load_toml_file() {
        let dir = std::env::temp_dir().join(format!("posepipe-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("posepipe.toml");
        std::fs::write(
            &path,
            "[model]\nvariant = \"thunder\"\nuse_accelerator = true\n\n\
             [runtime]\nmode = \"inline\"\nsubmit_timeout_ms = 250\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.model.variant, "thunder");
        assert!(config.model.use_accelerator);
        assert_eq!(config.runtime.mode, ExecutionMode::Inline);
        assert_eq!(
            config.runtime.submit_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.capture.width, 640);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
