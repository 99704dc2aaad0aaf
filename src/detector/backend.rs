use image::RgbImage;

use crate::detector::tensor::InferenceOutput;
use crate::error::InferenceError;

/// Black-box model runtime.
///
/// Receives the square model input and returns the raw score and box
/// tensors. Implementations are shared between concurrent scans, so `infer`
/// takes `&self`; any internal mutability is the implementation's concern.
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on a square RGB image.
    fn infer(&self, image: &RgbImage) -> Result<InferenceOutput, InferenceError>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}
