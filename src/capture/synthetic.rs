//! Synthetic RGBA capture source for driving the pipeline without a camera

use tracing::{info, instrument};

use crate::capture::frame::{Frame, CHANNELS};
use crate::error::FrameError;
use crate::CaptureConfig;

/// Generates a moving gradient at the configured resolution
pub struct SyntheticCapture {
    config: CaptureConfig,
    sequence: u64,
}

impl SyntheticCapture {
    pub fn new(config: CaptureConfig) -> Self {
        info!(
            "Initializing synthetic capture: {}x{} @ {} fps",
            config.width, config.height, config.fps
        );
        Self {
            config,
            sequence: 0,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Produce the next frame
    #[instrument(skip(self), fields(sequence = self.sequence + 1))]
    pub fn capture_frame(&mut self) -> Result<Frame, FrameError> {
        self.sequence += 1;

        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let shift = (self.sequence % 256) as usize;

        let mut data = vec![0u8; width * height * CHANNELS];
        for (i, px) in data.chunks_exact_mut(CHANNELS).enumerate() {
            let x = i % width;
            let y = i / width;
            px[0] = ((x + shift) % 256) as u8;
            px[1] = ((y + shift) % 256) as u8;
            px[2] = ((x + y) % 256) as u8;
            px[3] = 255;
        }

        Frame::from_rgba(data, self.config.width, self.config.height, self.sequence)
    }
}
