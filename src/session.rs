use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{EventBus, ScanEvent};
use crate::scanner::{CompositeOutput, FrameScanner, ScanCompletion};
use crate::state_machine::{self, ScanState, ScanStateMachine};

/// One scanning attempt: a scanner, the completion policy consuming its
/// outputs, and the output kept for finalization.
///
/// The consumer feeds completions in frame order; the session is not
/// shared between threads.
pub struct ScanSession {
    id: Uuid,
    scanner: FrameScanner,
    machine: Box<dyn ScanStateMachine>,
    event_bus: Option<EventBus>,
    last_output: Option<CompositeOutput>,
    outputs_seen: u64,
}

impl ScanSession {
    /// Start a session using the policy selected by the scanner's configuration
    pub fn new(scanner: FrameScanner, now: Instant) -> Self {
        let machine = state_machine::from_config(scanner.config(), now);
        Self::with_machine(scanner, machine)
    }

    pub fn with_machine(scanner: FrameScanner, machine: Box<dyn ScanStateMachine>) -> Self {
        let id = Uuid::new_v4();
        info!("Starting scan session {} with {} policy", id, machine.name());
        Self {
            id,
            scanner,
            machine,
            event_bus: None,
            last_output: None,
            outputs_seen: 0,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scanner(&self) -> &FrameScanner {
        &self.scanner
    }

    pub fn state(&self) -> ScanState {
        self.machine.state()
    }

    pub fn is_finished(&self) -> bool {
        self.machine.is_finished()
    }

    pub fn wants_torch(&self) -> bool {
        self.machine.wants_torch()
    }

    /// Output to finalize with: the latest stable one, or the latest seen
    /// when nothing was stable
    pub fn last_output(&self) -> Option<&CompositeOutput> {
        self.last_output.as_ref()
    }

    /// Number of non-empty outputs fed since the last reset
    pub fn outputs_seen(&self) -> u64 {
        self.outputs_seen
    }

    /// Feed one scan result. Empty outputs leave the state untouched.
    pub fn handle_output(&mut self, output: Option<CompositeOutput>, now: Instant) -> ScanState {
        let Some(output) = output else {
            return self.machine.state();
        };
        if self.machine.is_finished() {
            return ScanState::Finished;
        }

        self.outputs_seen += 1;
        let from = self.machine.state();
        let to = self.machine.event(&output, now);

        if output.is_stable() || self.last_output.as_ref().map_or(true, |last| !last.is_stable()) {
            self.last_output = Some(output);
        }

        if from != to {
            self.publish(ScanEvent::StateChanged {
                session_id: self.id,
                from,
                to,
                timestamp: Utc::now(),
            });
        }

        if to.is_terminal() {
            let last = self.last_output.as_ref();
            self.publish(ScanEvent::ScanFinished {
                session_id: self.id,
                frame_id: last.map(|o| o.frame_id),
                class: last.map(|o| o.detection.class),
                timestamp: Utc::now(),
            });
        }

        to
    }

    pub fn handle_completion(&mut self, completion: ScanCompletion, now: Instant) -> ScanState {
        debug!("Session {} handling frame {}", self.id, completion.frame_id);
        self.handle_output(completion.output, now)
    }

    /// Start over: scanner history and policy state are cleared and the
    /// session gets a new id
    pub fn reset(&mut self, now: Instant) {
        let previous = self.id;
        self.scanner.reset();
        self.machine = self.machine.reset(now);
        self.id = Uuid::new_v4();
        self.last_output = None;
        self.outputs_seen = 0;
        info!("Scan session {} reset as {}", previous, self.id);
    }

    fn publish(&self, event: ScanEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::StabilityVerdict;
    use crate::config::ScannerConfig;
    use crate::detector::{ClassDetectionOutput, DocumentClass, InferenceBackend, InferenceOutput};
    use crate::error::InferenceError;
    use crate::frame::CaptureMetadata;
    use crate::geometry::Rect;
    use image::RgbImage;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Runtime;

    struct UnusedBackend;

    impl InferenceBackend for UnusedBackend {
        fn name(&self) -> &'static str {
            "unused"
        }

        fn infer(&self, _image: &RgbImage) -> Result<InferenceOutput, InferenceError> {
            Ok(InferenceOutput::default())
        }
    }

    fn session(runtime: &Runtime, start: Instant) -> ScanSession {
        let scanner = FrameScanner::builder()
            .config(ScannerConfig::default())
            .inference_backend(Arc::new(UnusedBackend))
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        ScanSession::new(scanner, start)
    }

    fn output(frame_id: u64, stable: bool) -> CompositeOutput {
        CompositeOutput {
            frame_id,
            detection: ClassDetectionOutput {
                class: DocumentClass::Passport,
                score: 0.8,
                bounds: Rect::new(0.2, 0.2, 0.8, 0.8),
                all_scores: BTreeMap::from([(DocumentClass::Passport, 0.8)]),
            },
            secondary: None,
            secondary_timed_out: false,
            stability: if stable {
                StabilityVerdict::Stable
            } else {
                StabilityVerdict::Blurred
            },
            metadata: CaptureMetadata::default(),
        }
    }

    #[test]
    fn test_empty_outputs_are_skipped() {
        let runtime = Runtime::new().unwrap();
        let start = Instant::now();
        let mut session = session(&runtime, start);

        assert_eq!(session.handle_output(None, start), ScanState::Initial);
        assert_eq!(session.outputs_seen(), 0);
        assert!(session.last_output().is_none());
    }

    #[test]
    fn test_transitions_are_published_with_session_id() {
        let runtime = Runtime::new().unwrap();
        let start = Instant::now();
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let mut session = session(&runtime, start).with_event_bus(bus);
        let id = session.id();

        session.handle_output(Some(output(1, true)), start);
        session.handle_output(Some(output(2, false)), start + Duration::from_secs(1));
        let state = session.handle_output(Some(output(3, false)), start + Duration::from_secs(2));
        assert_eq!(state, ScanState::Finished);
        assert!(session.is_finished());

        // Stable frame 1 beats the later blurred ones
        assert_eq!(session.last_output().unwrap().frame_id, 1);

        let mut transitions = Vec::new();
        let mut finished = None;
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.session_id(), Some(id));
            match event {
                ScanEvent::StateChanged { from, to, .. } => transitions.push((from, to)),
                ScanEvent::ScanFinished { frame_id, class, .. } => finished = Some((frame_id, class)),
                other => panic!("Unexpected event: {:?}", other),
            }
        }
        assert_eq!(
            transitions,
            vec![
                (ScanState::Initial, ScanState::OcrOnly),
                (ScanState::OcrOnly, ScanState::Finished),
            ]
        );
        assert_eq!(finished, Some((Some(1), Some(DocumentClass::Passport))));
    }

    #[test]
    fn test_finished_session_ignores_further_outputs() {
        let runtime = Runtime::new().unwrap();
        let start = Instant::now();
        let mut session = session(&runtime, start);

        session.handle_output(Some(output(1, true)), start);
        session.handle_output(Some(output(2, true)), start + Duration::from_secs(2));
        assert!(session.is_finished());

        let later = start + Duration::from_secs(3);
        assert_eq!(session.handle_output(Some(output(3, true)), later), ScanState::Finished);
        assert_eq!(session.last_output().unwrap().frame_id, 2);
        assert_eq!(session.outputs_seen(), 2);
    }

    #[test]
    fn test_reset_starts_a_new_session() {
        let runtime = Runtime::new().unwrap();
        let start = Instant::now();
        let mut session = session(&runtime, start);
        let first_id = session.id();

        session.handle_output(Some(output(1, true)), start);
        assert_eq!(session.state(), ScanState::OcrOnly);

        session.reset(start + Duration::from_secs(1));
        assert_ne!(session.id(), first_id);
        assert_eq!(session.state(), ScanState::Initial);
        assert!(session.last_output().is_none());
        assert_eq!(session.outputs_seen(), 0);
    }
}
