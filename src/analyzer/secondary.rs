use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::SignalError;
use crate::geometry::Rect;

/// Barcode symbologies a signal backend can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Qr,
    Pdf417,
}

/// A secondary feature found on the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondarySignal {
    pub symbology: Symbology,
    /// Decoded content
    pub payload: String,
    /// Location in full-frame normalized coordinates, when known
    pub bounds: Option<Rect>,
}

/// Decoder for the secondary signal.
///
/// `region` is normalized to `image`; implementations only need to search
/// inside it.
pub trait SignalBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn find(&self, image: &RgbImage, region: Rect) -> Result<Option<SecondarySignal>, SignalError>;
}

#[derive(Debug, Clone, Default)]
struct SecondarySignalState {
    started_at: Option<Instant>,
    found: Option<SecondarySignal>,
    gave_up: bool,
}

/// Time-boxed, sticky search for a secondary signal.
///
/// The first call after a reset opens the search window. Once a signal is
/// found it is returned for every later call without decoding again; once
/// the window has elapsed without a find, calls return `None` immediately
/// until the next reset. Not synchronized.
pub struct SecondarySignalDetector {
    backend: Arc<dyn SignalBackend>,
    timeout: Duration,
    state: SecondarySignalState,
}

impl SecondarySignalDetector {
    pub fn new(backend: Arc<dyn SignalBackend>, timeout: Duration) -> Self {
        debug!(
            "Creating secondary signal detector on backend '{}' (timeout {:?})",
            backend.name(),
            timeout
        );
        Self {
            backend,
            timeout,
            state: SecondarySignalState::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look for the signal inside `region_of_interest` of a decoded frame
    pub fn detect(
        &mut self,
        image: &RgbImage,
        frame_id: u64,
        region_of_interest: Rect,
        now: Instant,
    ) -> Option<SecondarySignal> {
        if let Some(found) = &self.state.found {
            return Some(found.clone());
        }
        if self.state.gave_up {
            return None;
        }

        let started_at = *self.state.started_at.get_or_insert(now);
        if now.saturating_duration_since(started_at) > self.timeout {
            info!(
                "Secondary signal not found within {:?}, giving up until reset",
                self.timeout
            );
            self.state.gave_up = true;
            return None;
        }

        match self.backend.find(image, region_of_interest) {
            Ok(Some(signal)) => {
                info!(
                    "Secondary signal ({:?}) found in frame {}",
                    signal.symbology, frame_id
                );
                self.state.found = Some(signal.clone());
                Some(signal)
            }
            Ok(None) => {
                debug!("No secondary signal in frame {}", frame_id);
                None
            }
            Err(e) => {
                warn!("Secondary signal search failed for frame {}: {}", frame_id, e);
                None
            }
        }
    }

    /// True once the window has closed without finding the signal.
    ///
    /// Latched: an earlier `now` does not reopen a window already given up.
    pub fn is_timed_out(&self, now: Instant) -> bool {
        self.state.found.is_none()
            && (self.state.gave_up
                || self
                    .state
                    .started_at
                    .is_some_and(|started| now.saturating_duration_since(started) > self.timeout))
    }

    /// True once a call has seen the window close and stopped searching
    pub fn gave_up(&self) -> bool {
        self.state.gave_up
    }

    /// The signal found in this window, if any
    pub fn found(&self) -> Option<&SecondarySignal> {
        self.state.found.as_ref()
    }

    /// Time spent searching as of `now`
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.state
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default()
    }

    /// Forget the window and any found signal
    pub fn reset(&mut self) {
        debug!("Resetting secondary signal detector");
        self.state = SecondarySignalState::default();
    }
}
