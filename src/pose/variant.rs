//! Model variants and the immutable per-pipeline configuration they resolve to

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ModelSettings;

/// Default render cut-off for joint confidence
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;

/// Supported MoveNet single-pose variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Lightning,
    Thunder,
}

impl ModelVariant {
    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Lightning => "lightning",
            ModelVariant::Thunder => "thunder",
        }
    }

    /// Square input edge the model expects
    pub fn input_size(self) -> u32 {
        match self {
            ModelVariant::Lightning => 192,
            ModelVariant::Thunder => 256,
        }
    }

    pub fn mean(self) -> [f32; 3] {
        [127.5, 127.5, 127.5]
    }

    pub fn norm(self) -> [f32; 3] {
        [1.0 / 127.5, 1.0 / 127.5, 1.0 / 127.5]
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lightning" => Ok(ModelVariant::Lightning),
            "thunder" => Ok(ModelVariant::Thunder),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

/// Immutable after construction; shared read-only by producer and worker.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    variant: ModelVariant,
    input_size: u32,
    mean: [f32; 3],
    norm: [f32; 3],
    use_accelerator: bool,
    score_threshold: f32,
}

impl PipelineConfig {
    pub fn new(variant: ModelVariant, use_accelerator: bool) -> Self {
        Self {
            variant,
            input_size: variant.input_size(),
            mean: variant.mean(),
            norm: variant.norm(),
            use_accelerator,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }

    /// Build with explicit constants, validating each of them.
    pub fn with_constants(
        variant: ModelVariant,
        input_size: u32,
        mean: [f32; 3],
        norm: [f32; 3],
        use_accelerator: bool,
    ) -> Result<Self, ConfigError> {
        if input_size == 0 {
            return Err(ConfigError::ZeroInputSize);
        }
        for (channel, &value) in mean.iter().enumerate() {
            if !value.is_finite() {
                return Err(ConfigError::InvalidMean { channel, value });
            }
        }
        for (channel, &value) in norm.iter().enumerate() {
            if !value.is_finite() || value == 0.0 {
                return Err(ConfigError::InvalidNorm { channel, value });
            }
        }

        Ok(Self {
            variant,
            input_size,
            mean,
            norm,
            use_accelerator,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        })
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        self.score_threshold = threshold;
        Ok(self)
    }

    /// Resolve the serde-level model section into a validated config.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, ConfigError> {
        let variant: ModelVariant = settings.variant.parse()?;
        Self::with_constants(
            variant,
            variant.input_size(),
            variant.mean(),
            variant.norm(),
            settings.use_accelerator,
        )?
        .with_score_threshold(settings.score_threshold)
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn mean(&self) -> [f32; 3] {
        self.mean
    }

    pub fn norm(&self) -> [f32; 3] {
        self.norm
    }

    pub fn use_accelerator(&self) -> bool {
        self.use_accelerator
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }
}
