use std::time::{Duration, Instant};

use crate::config::ScannerConfig;
use crate::scanner::CompositeOutput;
use crate::state_machine::signals::{ScanSignals, SignalCriteria};
use crate::state_machine::state::{ScanState, StateClock};
use crate::state_machine::ScanStateMachine;

#[derive(Debug, Clone, Copy)]
struct CardVerifyDurations {
    ocr_and_card: Duration,
    ocr_only: Duration,
    ocr_incorrect: Duration,
    force_flash: Duration,
    delay_for_card: Duration,
}

/// Requires both a readable document of the expected class and the physical
/// object evidence, lighting the torch when the evidence is slow to appear
#[derive(Debug, Clone)]
pub struct CardVerifyStateMachine {
    clock: StateClock,
    criteria: SignalCriteria,
    durations: CardVerifyDurations,
}

impl CardVerifyStateMachine {
    pub fn new(config: &ScannerConfig, now: Instant) -> Self {
        let completion = &config.completion;
        Self {
            clock: StateClock::new(now),
            criteria: SignalCriteria::from_config(config),
            durations: CardVerifyDurations {
                ocr_and_card: Duration::from_secs_f64(completion.ocr_and_card_duration),
                ocr_only: Duration::from_secs_f64(completion.ocr_only_duration),
                ocr_incorrect: Duration::from_secs_f64(completion.ocr_incorrect_duration),
                force_flash: Duration::from_secs_f64(completion.ocr_force_flash_duration),
                delay_for_card: Duration::from_secs_f64(completion.ocr_delay_for_card_duration),
            },
        }
    }

    fn next_state(&self, signals: &ScanSignals, now: Instant) -> ScanState {
        let ScanSignals {
            has_primary: primary,
            has_object: object,
            matches_expected: matches,
        } = *signals;
        let in_state = self.clock.time_in_state(now);
        let d = &self.durations;

        match self.clock.state() {
            ScanState::Initial => match (primary, object, matches) {
                (true, true, true) => ScanState::OcrAndCard,
                (true, false, true) => ScanState::OcrOnly,
                (true, _, false) => ScanState::OcrIncorrect,
                (false, true, _) => ScanState::CardOnly,
                _ => ScanState::Initial,
            },
            ScanState::CardOnly => match (primary, matches) {
                (true, false) => ScanState::OcrIncorrect,
                (true, true) => ScanState::OcrAndCard,
                _ => ScanState::CardOnly,
            },
            ScanState::OcrOnly => {
                if object {
                    ScanState::OcrAndCard
                } else if in_state >= d.ocr_only {
                    ScanState::OcrForceFlash
                } else {
                    ScanState::OcrOnly
                }
            }
            ScanState::OcrIncorrect => match (primary, object, matches) {
                (true, false, true) => ScanState::OcrOnly,
                (true, true, true) => ScanState::OcrAndCard,
                (false, _, _) if in_state >= d.ocr_incorrect => ScanState::Initial,
                _ => ScanState::OcrIncorrect,
            },
            ScanState::OcrAndCard if in_state >= d.ocr_and_card => ScanState::Finished,
            ScanState::OcrForceFlash if in_state >= d.force_flash => {
                if object {
                    ScanState::OcrAndCard
                } else {
                    ScanState::OcrDelayForCard
                }
            }
            ScanState::OcrDelayForCard => {
                if object {
                    ScanState::OcrAndCard
                } else if in_state >= d.delay_for_card {
                    ScanState::Finished
                } else {
                    ScanState::OcrDelayForCard
                }
            }
            state => state,
        }
    }
}

impl ScanStateMachine for CardVerifyStateMachine {
    fn name(&self) -> &'static str {
        "card_verify"
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
        let next = self.next_state(&signals, now);
        self.clock.transition(next, now)
    }

    fn reset(&self, now: Instant) -> Box<dyn ScanStateMachine> {
        Box::new(Self {
            clock: StateClock::new(now),
            ..self.clone()
        })
    }

    fn wants_torch(&self) -> bool {
        self.clock.state() == ScanState::OcrForceFlash
    }
}
