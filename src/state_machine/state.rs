use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Progress of a scan towards a final result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Nothing usable seen yet
    Initial,
    /// Document readable, waiting out error correction
    OcrOnly,
    /// Physical object seen but the document is not readable yet
    CardOnly,
    /// Document readable and physical object seen
    OcrAndCard,
    /// Readable document of the wrong class
    OcrIncorrect,
    /// Torch on, giving the object one more chance
    OcrDelayForCard,
    /// Asking the camera to light the torch
    OcrForceFlash,
    /// Waiting for the name and expiry fields
    NameAndExpiry,
    /// Terminal
    Finished,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Finished)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanState::Initial => "initial",
            ScanState::OcrOnly => "ocr_only",
            ScanState::CardOnly => "card_only",
            ScanState::OcrAndCard => "ocr_and_card",
            ScanState::OcrIncorrect => "ocr_incorrect",
            ScanState::OcrDelayForCard => "ocr_delay_for_card",
            ScanState::OcrForceFlash => "ocr_force_flash",
            ScanState::NameAndExpiry => "name_and_expiry",
            ScanState::Finished => "finished",
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Current state together with the instant it was entered
#[derive(Debug, Clone, Copy)]
pub struct StateClock {
    state: ScanState,
    entered_at: Instant,
}

impl StateClock {
    pub fn new(now: Instant) -> Self {
        Self {
            state: ScanState::Initial,
            entered_at: now,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn entered_at(&self) -> Instant {
        self.entered_at
    }

    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// Move to `next`; staying in the same state keeps the entry instant
    pub fn transition(&mut self, next: ScanState, now: Instant) -> ScanState {
        if next != self.state {
            info!(
                "Scan state {} -> {} after {:?}",
                self.state,
                next,
                self.time_in_state(now)
            );
            self.state = next;
            self.entered_at = now;
        }
        self.state
    }
}
