//! Completion policies deciding when a scan is done.
//!
//! Every policy walks the same [`ScanState`] set; configuration picks one.
//! Machines assume outputs arrive in frame order from a single consumer.

mod accurate;
mod card_verify;
mod ocr;
mod signals;
mod state;

use std::time::{Duration, Instant};

use crate::config::{CompletionPolicy, ScannerConfig};
use crate::scanner::CompositeOutput;

pub use accurate::AccurateOcrStateMachine;
pub use card_verify::CardVerifyStateMachine;
pub use ocr::OcrStateMachine;
pub use signals::{ScanSignals, SignalCriteria};
pub use state::{ScanState, StateClock};

pub trait ScanStateMachine: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> ScanState;

    fn time_in_state(&self, now: Instant) -> Duration;

    /// Feed one frame's output and return the resulting state.
    /// `Finished` absorbs every later event.
    fn event(&mut self, output: &CompositeOutput, now: Instant) -> ScanState;

    /// Fresh machine in `Initial` with the same configuration
    fn reset(&self, now: Instant) -> Box<dyn ScanStateMachine>;

    /// Whether the camera should light the torch
    fn wants_torch(&self) -> bool {
        false
    }

    fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }
}

/// Build the machine selected by `completion.policy`
pub fn from_config(config: &ScannerConfig, now: Instant) -> Box<dyn ScanStateMachine> {
    match config.completion.policy {
        CompletionPolicy::Ocr => Box::new(OcrStateMachine::new(config, now)),
        CompletionPolicy::Accurate => Box::new(AccurateOcrStateMachine::new(config, now)),
        CompletionPolicy::CardVerify => Box::new(CardVerifyStateMachine::new(config, now)),
    }
}
