use std::time::{Duration, Instant};

use crate::config::ScannerConfig;
use crate::scanner::CompositeOutput;
use crate::state_machine::signals::{ScanSignals, SignalCriteria};
use crate::state_machine::state::{ScanState, StateClock};
use crate::state_machine::ScanStateMachine;

/// Waits longer for the auxiliary field: finishes at the minimum error
/// correction once it has been seen, at the maximum regardless
#[derive(Debug, Clone)]
pub struct AccurateOcrStateMachine {
    clock: StateClock,
    criteria: SignalCriteria,
    min_error_correction: Duration,
    max_error_correction: Duration,
    auxiliary_seen: bool,
}

impl AccurateOcrStateMachine {
    pub fn new(config: &ScannerConfig, now: Instant) -> Self {
        Self {
            clock: StateClock::new(now),
            criteria: SignalCriteria::from_config(config),
            min_error_correction: Duration::from_secs_f64(config.completion.min_error_correction),
            max_error_correction: Duration::from_secs_f64(config.completion.max_error_correction),
            auxiliary_seen: false,
        }
    }
}

impl ScanStateMachine for AccurateOcrStateMachine {
    fn name(&self) -> &'static str {
        "accurate"
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
        let in_state = self.clock.time_in_state(now);

        let next = match self.clock.state() {
            ScanState::Initial if signals.has_primary => ScanState::OcrOnly,
            ScanState::OcrOnly
                if (self.auxiliary_seen && in_state >= self.min_error_correction)
                    || in_state >= self.max_error_correction =>
            {
                ScanState::Finished
            }
            state => state,
        };

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
