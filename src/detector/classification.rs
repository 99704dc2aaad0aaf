use image::imageops::{self, FilterType};
use image::RgbImage;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::DetectorConfig;
use crate::detector::backend::InferenceBackend;
use crate::detector::nms::{reduce, Candidate, NmsParams};
use crate::detector::tensor::DetectionTensors;
use crate::detector::types::{ClassDetectionOutput, DocumentClass};
use crate::error::Result;
use crate::frame::FrameData;
use crate::geometry::{center_square, Rect};

/// Square model input cut from the center of a frame
pub struct SquareCrop {
    /// Resized model input
    pub image: RgbImage,
    /// Region of the frame the input was cut from, normalized
    pub region: Rect,
}

/// Runs the detection model on a frame and reduces its output to the single
/// best class
pub struct ClassificationDetector {
    backend: Arc<dyn InferenceBackend>,
    config: DetectorConfig,
}

impl ClassificationDetector {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: DetectorConfig) -> Self {
        debug!(
            "Creating classification detector on backend '{}' (min score {}, min iou {})",
            backend.name(),
            config.min_score,
            config.min_iou
        );
        Self { backend, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Detect the document class in a frame.
    ///
    /// Any failure (undecodable frame, backend error, malformed tensors) is
    /// logged and reported as no detection so a bad frame never stops the
    /// stream.
    pub fn detect(&self, frame: &FrameData) -> Option<ClassDetectionOutput> {
        match self.try_detect(frame) {
            Ok(output) => output,
            Err(e) => {
                warn!("Detection failed for frame {}: {}", frame.id, e);
                None
            }
        }
    }

    /// Detect the document class, surfacing failures to the caller
    pub fn try_detect(&self, frame: &FrameData) -> Result<Option<ClassDetectionOutput>> {
        let rgb = frame.to_rgb_image()?;
        self.try_detect_image(frame.id, &rgb)
    }

    /// Detect the document class in an already decoded frame
    pub fn try_detect_image(
        &self,
        frame_id: u64,
        rgb: &RgbImage,
    ) -> Result<Option<ClassDetectionOutput>> {
        let crop = self.crop_center_square(rgb);

        let output = self.backend.infer(&crop.image)?;
        let tensors = DetectionTensors::validate(&output)?;

        let candidates = Self::candidates(&tensors);
        trace!(
            "Frame {}: {} predictions, {} model classes, {} candidates",
            frame_id,
            tensors.num_predictions(),
            tensors.num_classes(),
            candidates.len()
        );

        let params = NmsParams {
            score_threshold: self.config.min_score,
            iou_threshold: self.config.min_iou,
            max_per_class: 1,
            max_total: DocumentClass::COUNT,
        };
        let survivors = reduce(&candidates, DocumentClass::COUNT, &params);

        let Some(best) = survivors.first() else {
            debug!("No candidate survived reduction for frame {}", frame_id);
            return Ok(None);
        };

        let all_scores: BTreeMap<DocumentClass, f32> = survivors
            .iter()
            .filter_map(|c| DocumentClass::from_index(c.class_id).map(|class| (class, c.score)))
            .collect();

        let Some(class) = DocumentClass::from_index(best.class_id) else {
            return Ok(None);
        };

        let output = ClassDetectionOutput {
            class,
            score: best.score,
            bounds: best.rect.to_outer(&crop.region),
            all_scores,
        };

        debug!(
            "Frame {} classified as {} ({:.3})",
            frame_id, output.class, output.score
        );
        Ok(Some(output))
    }

    /// Cut the largest centered square out of the frame and scale it to the
    /// model input size
    pub fn crop_center_square(&self, image: &RgbImage) -> SquareCrop {
        let (width, height) = image.dimensions();
        let (x, y, side_w, side_h) = center_square(width, height).to_pixels(width, height);

        // Region actually covered after rounding to whole pixels
        let region = Rect::new(
            x as f32 / width as f32,
            y as f32 / height as f32,
            (x + side_w) as f32 / width as f32,
            (y + side_h) as f32 / height as f32,
        );

        let cropped = imageops::crop_imm(image, x, y, side_w, side_h).to_image();
        let size = self.config.input_size;
        let image = if cropped.dimensions() == (size, size) {
            cropped
        } else {
            imageops::resize(&cropped, size, size, FilterType::Triangle)
        };

        SquareCrop { image, region }
    }

    /// One candidate per prediction and recognized class
    fn candidates(tensors: &DetectionTensors<'_>) -> Vec<Candidate> {
        let known_classes = tensors.num_classes().min(DocumentClass::COUNT);
        let mut candidates = Vec::with_capacity(tensors.num_predictions() * known_classes);

        for prediction in 0..tensors.num_predictions() {
            let rect = tensors.bounds(prediction);
            for class_id in 0..known_classes {
                candidates.push(Candidate::new(
                    class_id,
                    tensors.score(prediction, class_id),
                    rect,
                ));
            }
        }

        candidates
    }
}
