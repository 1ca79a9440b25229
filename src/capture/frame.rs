use std::time::Instant;

use image::RgbaImage;

use crate::error::FrameError;

/// Bytes per pixel of the fixed RGBA layout
pub const CHANNELS: usize = 4;

/// Owned RGBA frame. Move-only: handing it to the pipeline gives up access
/// until the pipeline hands it back.
#[derive(Debug)]
pub struct Frame {
    /// Pixel data, annotated in place by the overlay stage
    pub image: RgbaImage,

    /// Frame metadata
    pub meta: FrameMetadata,
}

/// Frame metadata
#[derive(Debug, Clone, Copy)]
pub struct FrameMetadata {
    pub sequence: u64,
    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

impl Frame {
    /// Wrap a raw RGBA buffer, checking that its length matches the dimensions.
    pub fn from_rgba(
        data: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension { width, height });
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .ok_or(FrameError::TooLarge { width, height })?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        let actual = data.len();
        let image = RgbaImage::from_raw(width, height, data).ok_or(FrameError::LengthMismatch {
            width,
            height,
            expected,
            actual,
        })?;

        Ok(Self {
            image,
            meta: FrameMetadata {
                sequence,
                timestamp: Instant::now(),
            },
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Give the pixel buffer back to the host.
    pub fn into_raw(self) -> Vec<u8> {
        self.image.into_raw()
    }
}
