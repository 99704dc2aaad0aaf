use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geometry::Rect;

/// Object classes the detection model distinguishes, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    IdCardFront,
    IdCardBack,
    Passport,
    Invalid,
    PaymentCard,
}

impl DocumentClass {
    pub const ALL: [DocumentClass; 5] = [
        DocumentClass::IdCardFront,
        DocumentClass::IdCardBack,
        DocumentClass::Passport,
        DocumentClass::Invalid,
        DocumentClass::PaymentCard,
    ];

    /// Number of classes this crate recognizes
    pub const COUNT: usize = Self::ALL.len();

    /// Class for a model output index. Newer models may emit indices past
    /// the ones known here; those map to `None`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentClass::IdCardFront => "id_card_front",
            DocumentClass::IdCardBack => "id_card_back",
            DocumentClass::Passport => "passport",
            DocumentClass::Invalid => "invalid",
            DocumentClass::PaymentCard => "payment_card",
        }
    }
}

impl std::fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Reduced result of one classification pass over a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDetectionOutput {
    /// Highest scoring class that survived reduction
    pub class: DocumentClass,
    /// Score of the chosen class
    pub score: f32,
    /// Bounds of the chosen detection in full-frame normalized coordinates
    pub bounds: Rect,
    /// Best surviving score of every class that had one
    pub all_scores: BTreeMap<DocumentClass, f32>,
}

impl ClassDetectionOutput {
    pub fn score_for(&self, class: DocumentClass) -> Option<f32> {
        self.all_scores.get(&class).copied()
    }
}
