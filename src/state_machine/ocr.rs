use std::time::{Duration, Instant};

use crate::config::ScannerConfig;
use crate::scanner::CompositeOutput;
use crate::state_machine::signals::{ScanSignals, SignalCriteria};
use crate::state_machine::state::{ScanState, StateClock};
use crate::state_machine::ScanStateMachine;

/// Finishes once a readable document has held for the error-correction
/// duration, optionally waiting for the name and expiry fields afterwards
#[derive(Debug, Clone)]
pub struct OcrStateMachine {
    clock: StateClock,
    criteria: SignalCriteria,
    error_correction: Duration,
    extract_name_and_expiry: bool,
    name_and_expiry_duration: Duration,
    auxiliary_seen: bool,
}

impl OcrStateMachine {
    pub fn new(config: &ScannerConfig, now: Instant) -> Self {
        let completion = &config.completion;
        Self {
            clock: StateClock::new(now),
            criteria: SignalCriteria::from_config(config),
            error_correction: Duration::from_secs_f64(completion.error_correction),
            extract_name_and_expiry: completion.extract_name_and_expiry,
            name_and_expiry_duration: Duration::from_secs_f64(completion.name_and_expiry_duration),
            auxiliary_seen: false,
        }
    }

    fn next_state(&self, signals: &ScanSignals, now: Instant) -> ScanState {
        let in_state = self.clock.time_in_state(now);

        match self.clock.state() {
            ScanState::Initial if signals.has_primary => ScanState::OcrOnly,
            ScanState::OcrOnly if in_state >= self.error_correction => {
                if self.extract_name_and_expiry {
                    ScanState::NameAndExpiry
                } else {
                    ScanState::Finished
                }
            }
            ScanState::NameAndExpiry
                if self.auxiliary_seen || in_state >= self.name_and_expiry_duration =>
            {
                ScanState::Finished
            }
            state => state,
        }
    }
}

impl ScanStateMachine for OcrStateMachine {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn state(&self) -> ScanState {
        self.clock.state()
    }

    fn time_in_state(&self, now: Instant) -> Duration {
        self.clock.time_in_state(now)
    }

    fn event(&mut self, output: &CompositeOutput, now: Instant) -> ScanState {
        if self.clock.state().is_terminal() {
            return ScanState::Finished;
        }

        let signals = ScanSignals::from_output(output, &self.criteria);
        self.auxiliary_seen |= signals.auxiliary_seen();

        let next = self.next_state(&signals, now);
        self.clock.transition(next, now)
    }

    fn reset(&self, now: Instant) -> Box<dyn ScanStateMachine> {
        Box::new(Self {
            clock: StateClock::new(now),
            auxiliary_seen: false,
            ..self.clone()
        })
    }
}
