//! Delivery of scan results to the consumer.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::scanner::output::ScanCompletion;

/// Where finished scans are sent.
///
/// Delivery happens on the blocking thread that ran the scan; implementations
/// must not block for long. A consumer that has gone away is not an error.
pub trait CompletionQueue: Clone + Send + Sync + 'static {
    fn deliver(&self, completion: ScanCompletion);
}

impl CompletionQueue for crossbeam::channel::Sender<ScanCompletion> {
    fn deliver(&self, completion: ScanCompletion) {
        if let Err(e) = self.send(completion) {
            debug!("Completion for frame {} dropped: receiver gone", e.0.frame_id);
        }
    }
}

impl CompletionQueue for mpsc::UnboundedSender<ScanCompletion> {
    fn deliver(&self, completion: ScanCompletion) {
        if let Err(e) = self.send(completion) {
            debug!("Completion for frame {} dropped: receiver gone", e.0.frame_id);
        }
    }
}

/// Completion queue backed by a closure
#[derive(Clone)]
pub struct CallbackQueue {
    callback: Arc<dyn Fn(ScanCompletion) + Send + Sync>,
}

impl CallbackQueue {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ScanCompletion) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue").finish_non_exhaustive()
    }
}

impl CompletionQueue for CallbackQueue {
    fn deliver(&self, completion: ScanCompletion) {
        (self.callback)(completion)
    }
}
