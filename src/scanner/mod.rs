mod completion;
mod orchestrator;
mod output;

pub use completion::{CallbackQueue, CompletionQueue};
pub use orchestrator::{FrameScanner, FrameScannerBuilder, ScanMetrics};
pub use output::{CompositeOutput, ScanCompletion};
