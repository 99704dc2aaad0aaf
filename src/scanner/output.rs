use serde::{Deserialize, Serialize};

use crate::analyzer::{SecondarySignal, StabilityVerdict};
use crate::detector::ClassDetectionOutput;
use crate::frame::CaptureMetadata;

/// Everything the scanner learned about one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeOutput {
    pub frame_id: u64,
    pub detection: ClassDetectionOutput,
    /// Secondary signal, when searched for and found
    pub secondary: Option<SecondarySignal>,
    /// The secondary window closed without a find
    pub secondary_timed_out: bool,
    pub stability: StabilityVerdict,
    /// Capture settings as they were when the scan was accepted
    pub metadata: CaptureMetadata,
}

impl CompositeOutput {
    pub fn is_stable(&self) -> bool {
        self.stability.is_stable()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }
}

/// Result of one accepted scan, delivered exactly once per frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCompletion {
    pub frame_id: u64,
    /// `None` when nothing was detected or the scan failed
    pub output: Option<CompositeOutput>,
}

impl ScanCompletion {
    pub fn empty(frame_id: u64) -> Self {
        Self {
            frame_id,
            output: None,
        }
    }
}
