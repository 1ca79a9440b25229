pub mod frame;
pub mod synthetic;

pub use frame::Frame;
pub use frame::FrameMetadata;
pub use synthetic::SyntheticCapture;
