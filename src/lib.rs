pub mod analyzer;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod scanner;
pub mod session;
pub mod state_machine;

pub use analyzer::{
    RqrrBackend, SecondarySignal, SecondarySignalDetector, SignalBackend, StabilityTracker,
    StabilityVerdict, Symbology,
};
pub use config::{CompletionPolicy, ScannerConfig};
pub use detector::{
    ClassDetectionOutput, ClassificationDetector, DocumentClass, InferenceBackend,
    InferenceOutput, RawTensor,
};
#[cfg(feature = "backend-tract")]
pub use detector::TractBackend;
pub use error::{Result, ScanError};
pub use events::{EventBus, EventFilter, EventReceiver, ScanEvent};
pub use frame::{CaptureMetadata, FrameData, FrameFormat};
pub use geometry::Rect;
pub use scanner::{
    CallbackQueue, CompletionQueue, CompositeOutput, FrameScanner, FrameScannerBuilder,
    ScanCompletion, ScanMetrics,
};
pub use session::ScanSession;
pub use state_machine::{ScanState, ScanStateMachine};
