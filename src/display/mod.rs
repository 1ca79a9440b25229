pub mod overlay;

pub use overlay::{Overlay, SkeletonOverlay};
