mod backend;
mod classification;
pub mod nms;
mod tensor;
#[cfg(feature = "backend-tract")]
mod tract;
mod types;


pub use backend::InferenceBackend;
pub use classification::{ClassificationDetector, SquareCrop};
pub use nms::{reduce, Candidate, NmsParams};
pub use tensor::{DetectionTensors, InferenceOutput, RawTensor};
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
pub use types::{ClassDetectionOutput, DocumentClass};
