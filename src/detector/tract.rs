use image::RgbImage;
use std::path::Path;
use tracing::info;
use tract_onnx::prelude::*;

use crate::detector::backend::InferenceBackend;
use crate::detector::tensor::{InferenceOutput, RawTensor};
use crate::error::InferenceError;

/// ONNX detection model executed with tract.
///
/// The model takes a `[1, 3, size, size]` float input scaled to `0..1` and
/// returns the score tensor followed by the box tensor.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        info!(
            "Loading ONNX detection model from {} ({}x{})",
            model_path.display(),
            input_size,
            input_size
        );

        let load_error = |e: TractError| InferenceError::ModelLoad {
            details: format!("{}: {}", model_path.display(), e),
        };

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(load_error)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .map_err(load_error)?
            .into_optimized()
            .map_err(load_error)?
            .into_runnable()
            .map_err(load_error)?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, image: &RgbImage) -> Result<Tensor, InferenceError> {
        let (width, height) = image.dimensions();
        if width != self.input_size || height != self.input_size {
            return Err(InferenceError::Input {
                details: format!(
                    "image size {}x{} does not match model input {}x{}",
                    width, height, self.input_size, self.input_size
                ),
            });
        }

        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }
}

fn to_raw(value: &TValue) -> Result<RawTensor, InferenceError> {
    let view = value
        .to_array_view::<f32>()
        .map_err(|e| InferenceError::Execution {
            details: format!("model output tensor was not f32: {}", e),
        })?;
    Ok(RawTensor::new(view.shape().to_vec(), view.iter().copied().collect()))
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&self, image: &RgbImage) -> Result<InferenceOutput, InferenceError> {
        let input = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Execution {
                details: format!("ONNX inference failed: {}", e),
            })?;

        let scores = outputs.first().map(to_raw).transpose()?;
        let boxes = outputs.get(1).map(to_raw).transpose()?;

        Ok(InferenceOutput { scores, boxes })
    }

    fn warm_up(&self) -> Result<(), InferenceError> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.infer(&blank).map(|_| ())
    }
}
