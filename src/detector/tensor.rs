use serde::{Deserialize, Serialize};

use crate::error::TensorError;
use crate::geometry::Rect;

/// Dense row-major f32 tensor as produced by an inference backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl RawTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// Raw outputs of one inference call.
///
/// `scores` is shaped `[1, predictions, classes]`, `boxes` is shaped
/// `[1, predictions, 4]` holding `min_x, min_y, max_x, max_y` relative to the
/// model input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutput {
    pub scores: Option<RawTensor>,
    pub boxes: Option<RawTensor>,
}

impl InferenceOutput {
    pub fn new(scores: RawTensor, boxes: RawTensor) -> Self {
        Self {
            scores: Some(scores),
            boxes: Some(boxes),
        }
    }
}

/// Score and box tensors whose shapes have been checked against each other
#[derive(Debug)]
pub struct DetectionTensors<'a> {
    scores: &'a [f32],
    boxes: &'a [f32],
    num_predictions: usize,
    num_classes: usize,
}

impl<'a> DetectionTensors<'a> {
    pub fn validate(output: &'a InferenceOutput) -> Result<Self, TensorError> {
        let scores = output
            .scores
            .as_ref()
            .ok_or(TensorError::Missing { name: "scores" })?;
        let boxes = output
            .boxes
            .as_ref()
            .ok_or(TensorError::Missing { name: "boxes" })?;

        check_rank("scores", scores, 3)?;
        check_rank("boxes", boxes, 3)?;

        let score_shape = scores.shape();
        let box_shape = boxes.shape();

        if score_shape[0] != 1 {
            return Err(TensorError::Shape {
                name: "scores",
                expected: "[1, P, C]".to_string(),
                actual: score_shape.to_vec(),
            });
        }

        if box_shape[0] != 1 || box_shape[2] != 4 || box_shape[1] != score_shape[1] {
            return Err(TensorError::Shape {
                name: "boxes",
                expected: format!("[1, {}, 4]", score_shape[1]),
                actual: box_shape.to_vec(),
            });
        }

        check_length("scores", scores)?;
        check_length("boxes", boxes)?;

        Ok(Self {
            scores: scores.data(),
            boxes: boxes.data(),
            num_predictions: score_shape[1],
            num_classes: score_shape[2],
        })
    }

    pub fn num_predictions(&self) -> usize {
        self.num_predictions
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn score(&self, prediction: usize, class: usize) -> f32 {
        self.scores[prediction * self.num_classes + class]
    }

    pub fn bounds(&self, prediction: usize) -> Rect {
        let offset = prediction * 4;
        Rect::new(
            self.boxes[offset],
            self.boxes[offset + 1],
            self.boxes[offset + 2],
            self.boxes[offset + 3],
        )
    }
}

fn check_rank(name: &'static str, tensor: &RawTensor, expected: usize) -> Result<(), TensorError> {
    if tensor.rank() != expected {
        return Err(TensorError::Rank {
            name,
            expected,
            actual: tensor.rank(),
        });
    }
    Ok(())
}

fn check_length(name: &'static str, tensor: &RawTensor) -> Result<(), TensorError> {
    let actual = tensor.data().len();
    let expected = tensor
        .shape()
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or(TensorError::Length {
            name,
            expected: usize::MAX,
            actual,
        })?;
    if actual != expected {
        return Err(TensorError::Length {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}
