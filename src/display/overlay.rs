//! Skeleton overlay drawn onto the frame buffer

use image::Rgba;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::capture::Frame;
use crate::pose::keypoint::{Keypoint, SKELETON};

/// Pure drawing step: reads keypoints, writes pixels, keeps no state.
pub trait Overlay: Send + Sync {
    fn draw(&self, frame: &mut Frame, keypoints: &[Keypoint], threshold: f32);
}

/// Joints as filled dots, limbs as line segments between visible joints
#[derive(Debug, Clone)]
pub struct SkeletonOverlay {
    pub joint_radius: i32,
    pub joint_color: Rgba<u8>,
    pub limb_color: Rgba<u8>,
}

impl Default for SkeletonOverlay {
    fn default() -> Self {
        Self {
            joint_radius: 3,
            joint_color: Rgba([0, 255, 0, 255]),
            limb_color: Rgba([255, 255, 0, 255]),
        }
    }
}

impl Overlay for SkeletonOverlay {
    fn draw(&self, frame: &mut Frame, keypoints: &[Keypoint], threshold: f32) {
        if keypoints.is_empty() {
            return;
        }

        for &(a, b) in SKELETON.iter() {
            let (Some(p), Some(q)) = (keypoints.get(a as usize), keypoints.get(b as usize)) else {
                continue;
            };
            if p.is_visible(threshold) && q.is_visible(threshold) {
                draw_line_segment_mut(&mut frame.image, (p.x, p.y), (q.x, q.y), self.limb_color);
            }
        }

        for kp in keypoints.iter().filter(|kp| kp.is_visible(threshold)) {
            draw_filled_circle_mut(
                &mut frame.image,
                (kp.x.round() as i32, kp.y.round() as i32),
                self.joint_radius,
                self.joint_color,
            );
        }
    }
}
