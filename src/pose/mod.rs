pub mod decode;
pub mod engine;
pub mod keypoint;
pub mod keypoint_pipeline;
pub mod preprocess;
pub mod variant;

pub use decode::{decode, RawOutput};
pub use engine::{InferenceEngine, SimulatedEngine};
pub use keypoint::{Keypoint, KeypointIndex, SKELETON};
pub use keypoint_pipeline::KeypointPipeline;
pub use preprocess::{preprocess, InputTensor, Letterbox};
pub use variant::{ModelVariant, PipelineConfig};
