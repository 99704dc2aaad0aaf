use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::StabilityVerdict;
use crate::detector::DocumentClass;
use crate::error::EventBusError;
use crate::state_machine::ScanState;

/// Events emitted while scanning a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A frame went through detection
    FrameScanned {
        frame_id: u64,
        class: Option<DocumentClass>,
        stability: Option<StabilityVerdict>,
        secondary_found: bool,
        timestamp: DateTime<Utc>,
    },
    /// Detection could not run on a frame; it was treated as empty
    InferenceFailed {
        frame_id: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The secondary signal window closed without a find
    SecondaryTimedOut {
        frame_id: u64,
        timestamp: DateTime<Utc>,
    },
    /// The completion state machine moved to a new state
    StateChanged {
        session_id: Uuid,
        from: ScanState,
        to: ScanState,
        timestamp: DateTime<Utc>,
    },
    /// The session reached its terminal state
    ScanFinished {
        session_id: Uuid,
        frame_id: Option<u64>,
        class: Option<DocumentClass>,
        timestamp: DateTime<Utc>,
    },
    /// Scanner history was cleared
    ScannerReset {
        session_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScanEvent::FrameScanned { timestamp, .. }
            | ScanEvent::InferenceFailed { timestamp, .. }
            | ScanEvent::SecondaryTimedOut { timestamp, .. }
            | ScanEvent::StateChanged { timestamp, .. }
            | ScanEvent::ScanFinished { timestamp, .. }
            | ScanEvent::ScannerReset { timestamp, .. } => *timestamp,
        }
    }

    /// Session the event belongs to, when it is session scoped
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            ScanEvent::StateChanged { session_id, .. }
            | ScanEvent::ScanFinished { session_id, .. } => Some(*session_id),
            ScanEvent::ScannerReset { session_id, .. } => *session_id,
            _ => None,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::FrameScanned {
                frame_id,
                class,
                stability,
                ..
            } => match class {
                Some(class) => format!("Frame {} scanned: {} ({:?})", frame_id, class, stability),
                None => format!("Frame {} scanned: no document", frame_id),
            },
            ScanEvent::InferenceFailed { frame_id, error, .. } => {
                format!("Inference failed on frame {}: {}", frame_id, error)
            }
            ScanEvent::SecondaryTimedOut { frame_id, .. } => {
                format!("Secondary signal timed out at frame {}", frame_id)
            }
            ScanEvent::StateChanged { from, to, .. } => {
                format!("State changed: {:?} -> {:?}", from, to)
            }
            ScanEvent::ScanFinished {
                session_id, class, ..
            } => match class {
                Some(class) => format!("Scan {} finished: {}", session_id, class),
                None => format!("Scan {} finished", session_id),
            },
            ScanEvent::ScannerReset { .. } => "Scanner reset".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::FrameScanned { .. } => "frame_scanned",
            ScanEvent::InferenceFailed { .. } => "inference_failed",
            ScanEvent::SecondaryTimedOut { .. } => "secondary_timed_out",
            ScanEvent::StateChanged { .. } => "state_changed",
            ScanEvent::ScanFinished { .. } => "scan_finished",
            ScanEvent::ScannerReset { .. } => "scanner_reset",
        }
    }
}

/// Event bus for scan observers using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers, returning how many received it.
    ///
    /// Never blocks, so it is safe to call from blocking scan threads.
    pub fn publish(&self, event: ScanEvent) -> usize {
        match &event {
            ScanEvent::ScanFinished { .. } | ScanEvent::ScannerReset { .. } => {
                info!("{}", event.description());
            }
            _ => debug!("Publishing event: {}", event.description()),
        }

        // No receivers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events scoped to one session
    Session(Uuid),
    /// Custom filter function
    Custom(fn(&ScanEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Session(id) => event.session_id() == Some(*id),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ScanEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<ScanEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!("Receiver '{}' received event: {}", self.name, event.description());
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ScanEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
