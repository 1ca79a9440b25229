use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::capture::Frame;
use crate::pose::variant::PipelineConfig;

/// NHWC model input, `[1, input_size, input_size, 3]`
pub type InputTensor = Array4<f32>;

/// Geometry of the letterbox applied to a frame, needed to map model
/// coordinates back onto the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub input_size: u32,
    /// Model pixels per frame pixel
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Letterbox {
    /// Fit a `width`x`height` frame into an `input_size` square, keeping aspect ratio.
    pub fn fit(width: u32, height: u32, input_size: u32) -> Self {
        let longest = width.max(height).max(1);
        let scale = input_size as f32 / longest as f32;
        let resized_w = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let resized_h = ((height as f32 * scale).round() as u32).clamp(1, input_size);

        Self {
            input_size,
            scale,
            pad_x: (input_size - resized_w) / 2,
            pad_y: (input_size - resized_h) / 2,
            resized_width: resized_w,
            resized_height: resized_h,
            frame_width: width,
            frame_height: height,
        }
    }

    /// Map a point normalised to the model input square back to frame pixels.
    pub fn to_frame(&self, x_norm: f32, y_norm: f32) -> (f32, f32) {
        let x = (x_norm * self.input_size as f32 - self.pad_x as f32) / self.scale;
        let y = (y_norm * self.input_size as f32 - self.pad_y as f32) / self.scale;
        (
            x.clamp(0.0, self.frame_width as f32),
            y.clamp(0.0, self.frame_height as f32),
        )
    }
}

/// Letterbox the frame into the model input square and normalise RGB as
/// `(v - mean) * norm`. Alpha is dropped; padding holds normalised black.
pub fn preprocess(frame: &Frame, config: &PipelineConfig) -> (InputTensor, Letterbox) {
    let size = config.input_size();
    let letterbox = Letterbox::fit(frame.width(), frame.height(), size);
    let mean = config.mean();
    let norm = config.norm();

    let resized = imageops::resize(
        &frame.image,
        letterbox.resized_width,
        letterbox.resized_height,
        FilterType::Triangle,
    );

    let side = size as usize;
    let mut tensor = InputTensor::zeros((1, side, side, 3));
    for c in 0..3 {
        tensor
            .slice_mut(ndarray::s![0, .., .., c])
            .fill((0.0 - mean[c]) * norm[c]);
    }

    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, px) in resized.enumerate_pixels() {
        let (tx, ty) = (pad_x + x as usize, pad_y + y as usize);
        for c in 0..3 {
            tensor[[0, ty, tx, c]] = (px.0[c] as f32 - mean[c]) * norm[c];
        }
    }

    (tensor, letterbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::variant::ModelVariant;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> Frame {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Frame::from_rgba(data, width, height, 0).unwrap()
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = Letterbox::fit(640, 480, 192);
        assert!((lb.scale - 0.3).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 24);
    }

    #[test]
    fn test_letterbox_inverse_maps_corners() {
        let lb = Letterbox::fit(640, 480, 192);
        let (x, y) = lb.to_frame(0.0, 24.0 / 192.0);
        assert!(x.abs() < 1e-3 && y.abs() < 1e-3);
        let (x, y) = lb.to_frame(1.0, 168.0 / 192.0);
        assert!((x - 640.0).abs() < 1e-2);
        assert!((y - 480.0).abs() < 1e-2);
    }

    #[test]
    fn test_to_frame_clamps_into_padding() {
        let lb = Letterbox::fit(640, 480, 192);
        let (_, y) = lb.to_frame(0.5, 0.0);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_preprocess_normalises_and_pads() {
        let config = PipelineConfig::new(ModelVariant::Lightning, false);
        let frame = solid_frame(64, 32, [255, 127, 0, 255]);
        let (tensor, lb) = preprocess(&frame, &config);

        assert_eq!(tensor.shape(), &[1, 192, 192, 3]);
        assert_eq!(lb.pad_y, 48);

        // top padding row is normalised black
        assert!((tensor[[0, 0, 0, 0]] + 1.0).abs() < 1e-5);
        // centre pixel carries the solid colour
        assert!((tensor[[0, 96, 96, 0]] - 1.0).abs() < 1e-5);
        assert!((tensor[[0, 96, 96, 1]] - (127.0 - 127.5) / 127.5).abs() < 1e-5);
        assert!((tensor[[0, 96, 96, 2]] + 1.0).abs() < 1e-5);
    }
}
