use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace, warn};

use crate::analyzer::{RqrrBackend, SecondarySignalDetector, SignalBackend, StabilityTracker};
use crate::config::ScannerConfig;
use crate::detector::{ClassificationDetector, InferenceBackend};
use crate::error::{Result, ScanError};
use crate::events::{EventBus, ScanEvent};
use crate::frame::{CaptureMetadata, FrameData};
use crate::scanner::completion::CompletionQueue;
use crate::scanner::output::{CompositeOutput, ScanCompletion};

/// Per-scanner history, replaced wholesale on reset.
///
/// Each scan holds the generation current when it was accepted, so frames
/// still in flight during a reset never write into the fresh history.
struct ScannerState {
    tracker: StabilityTracker,
    secondary: SecondarySignalDetector,
}

impl ScannerState {
    fn generation(
        config: &ScannerConfig,
        signal_backend: &Arc<dyn SignalBackend>,
    ) -> Arc<Mutex<ScannerState>> {
        Arc::new(Mutex::new(Self {
            tracker: StabilityTracker::new(config.stability.clone()),
            secondary: SecondarySignalDetector::new(
                Arc::clone(signal_backend),
                config.secondary.timeout(),
            ),
        }))
    }
}

/// Counters describing scanner activity
#[derive(Debug, Default)]
struct ScanCounters {
    frames_scanned: AtomicU64,
    detections: AtomicU64,
    inference_failures: AtomicU64,
    panics: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

/// Snapshot of scanner activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanMetrics {
    pub frames_scanned: u64,
    pub detections: u64,
    pub inference_failures: u64,
    pub panics: u64,
    pub in_flight: u64,
    pub peak_in_flight: u64,
}

/// State shared between the scanner handle and its blocking workers
struct ScanContext {
    detector: ClassificationDetector,
    signal_backend: Arc<dyn SignalBackend>,
    config: ScannerConfig,
    secondary_enabled: bool,
    state: RwLock<Arc<Mutex<ScannerState>>>,
    event_bus: Option<EventBus>,
    counters: ScanCounters,
}

/// Bounded-concurrency frame scanner.
///
/// Each accepted frame is classified on a blocking worker, checked for
/// stability and, for the trigger class, searched for the secondary signal.
/// The result is delivered as one [`ScanCompletion`] on the queue the caller
/// passed to [`FrameScanner::scan`].
pub struct FrameScanner {
    context: Arc<ScanContext>,
    slots: Arc<Semaphore>,
    runtime: Handle,
}

impl FrameScanner {
    pub fn builder() -> FrameScannerBuilder {
        FrameScannerBuilder::new()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.context.config
    }

    /// Number of scans that could start right now without waiting
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Scan a frame, delivering the result on `queue`.
    ///
    /// Blocks the calling thread until a concurrency slot is free, then
    /// returns while the scan runs in the background. Must be called from a
    /// plain producer thread: calling it from inside an async runtime panics.
    pub fn scan<Q: CompletionQueue>(&self, frame: FrameData, queue: &Q) {
        let metadata = frame.metadata.snapshot();
        let state = self.context.current_state();

        let permit = match self
            .runtime
            .block_on(Arc::clone(&self.slots).acquire_owned())
        {
            Ok(permit) => permit,
            Err(e) => {
                error!("Scan slots unavailable, skipping frame {}: {}", frame.id, e);
                return;
            }
        };

        let context = Arc::clone(&self.context);
        let queue = queue.clone();
        self.runtime.spawn_blocking(move || {
            let _permit = permit;
            let completion = context.run(&frame, metadata, &state);
            queue.deliver(completion);
        });
    }

    /// Scan a frame from async code, sharing the same slot pool as [`scan`](Self::scan)
    pub async fn scan_async(&self, frame: FrameData) -> Result<ScanCompletion> {
        let metadata = frame.metadata.snapshot();
        let state = self.context.current_state();

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| ScanError::system(format!("Scan slots unavailable: {}", e)))?;

        let context = Arc::clone(&self.context);
        self.runtime
            .spawn_blocking(move || {
                let _permit = permit;
                context.run(&frame, metadata, &state)
            })
            .await
            .map_err(|e| ScanError::component("frame_scanner", e.to_string()))
    }

    /// Forget stability and secondary signal history.
    ///
    /// Frames accepted before the reset, including ones still waiting for a
    /// slot, finish against the history they were accepted under.
    pub fn reset(&self) {
        info!("Resetting frame scanner");
        let fresh = ScannerState::generation(&self.context.config, &self.context.signal_backend);
        *self.context.state.write() = fresh;

        if let Some(bus) = &self.context.event_bus {
            bus.publish(ScanEvent::ScannerReset {
                session_id: None,
                timestamp: Utc::now(),
            });
        }
    }

    pub fn metrics(&self) -> ScanMetrics {
        let counters = &self.context.counters;
        ScanMetrics {
            frames_scanned: counters.frames_scanned.load(Ordering::Relaxed),
            detections: counters.detections.load(Ordering::Relaxed),
            inference_failures: counters.inference_failures.load(Ordering::Relaxed),
            panics: counters.panics.load(Ordering::Relaxed),
            in_flight: counters.in_flight.load(Ordering::Relaxed),
            peak_in_flight: counters.peak_in_flight.load(Ordering::Relaxed),
        }
    }
}

impl ScanContext {
    fn current_state(&self) -> Arc<Mutex<ScannerState>> {
        Arc::clone(&self.state.read())
    }

    /// Run one scan; a panic inside the pipeline yields an empty completion
    fn run(
        &self,
        frame: &FrameData,
        metadata: CaptureMetadata,
        state: &Mutex<ScannerState>,
    ) -> ScanCompletion {
        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .peak_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process(frame, metadata, state)));

        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.counters.frames_scanned.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(completion) => completion,
            Err(_) => {
                error!("Scan of frame {} panicked", frame.id);
                self.counters.panics.fetch_add(1, Ordering::Relaxed);
                ScanCompletion::empty(frame.id)
            }
        }
    }

    fn process(
        &self,
        frame: &FrameData,
        metadata: CaptureMetadata,
        state: &Mutex<ScannerState>,
    ) -> ScanCompletion {
        let now = frame.captured_at;

        // Decoded once; the secondary search reuses the same image
        let detection = match frame.to_rgb_image().and_then(|rgb| {
            let detection = self.detector.try_detect_image(frame.id, &rgb)?;
            Ok(detection.map(|detection| (detection, rgb)))
        }) {
            Ok(detection) => detection,
            Err(e) => {
                warn!("Detection failed for frame {}: {}", frame.id, e);
                self.counters
                    .inference_failures
                    .fetch_add(1, Ordering::Relaxed);
                self.publish(ScanEvent::InferenceFailed {
                    frame_id: frame.id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                None
            }
        };

        let Some((detection, rgb)) = detection else {
            trace!("Frame {}: no detection", frame.id);
            self.publish(ScanEvent::FrameScanned {
                frame_id: frame.id,
                class: None,
                stability: None,
                secondary_found: false,
                timestamp: Utc::now(),
            });
            return ScanCompletion::empty(frame.id);
        };
        self.counters.detections.fetch_add(1, Ordering::Relaxed);

        let triggered =
            self.secondary_enabled && detection.class == self.config.secondary.trigger_class;

        let (stability, secondary, secondary_timed_out, newly_timed_out) = {
            let mut state = state.lock();
            let stability = state.tracker.update(detection.bounds, now);

            if triggered {
                let region = detection.bounds.padded(self.config.secondary.roi_padding);
                let gave_up_before = state.secondary.gave_up();
                let secondary = state.secondary.detect(&rgb, frame.id, region, now);
                let timed_out = state.secondary.is_timed_out(now);
                let newly = state.secondary.gave_up() && !gave_up_before;
                (stability, secondary, timed_out, newly)
            } else {
                (stability, None, false, false)
            }
        };

        if newly_timed_out {
            self.publish(ScanEvent::SecondaryTimedOut {
                frame_id: frame.id,
                timestamp: Utc::now(),
            });
        }

        debug!(
            "Frame {}: {} ({:.3}), {:?}, secondary {}",
            frame.id,
            detection.class,
            detection.score,
            stability,
            if secondary.is_some() {
                "found"
            } else if secondary_timed_out {
                "timed out"
            } else {
                "absent"
            }
        );

        self.publish(ScanEvent::FrameScanned {
            frame_id: frame.id,
            class: Some(detection.class),
            stability: Some(stability),
            secondary_found: secondary.is_some(),
            timestamp: Utc::now(),
        });

        ScanCompletion {
            frame_id: frame.id,
            output: Some(CompositeOutput {
                frame_id: frame.id,
                detection,
                secondary,
                secondary_timed_out,
                stability,
                metadata,
            }),
        }
    }

    fn publish(&self, event: ScanEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

/// Builder for [`FrameScanner`]
pub struct FrameScannerBuilder {
    config: Option<ScannerConfig>,
    inference_backend: Option<Arc<dyn InferenceBackend>>,
    signal_backend: Option<Arc<dyn SignalBackend>>,
    runtime: Option<Handle>,
    event_bus: Option<EventBus>,
}

impl FrameScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            inference_backend: None,
            signal_backend: None,
            runtime: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn inference_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.inference_backend = Some(backend);
        self
    }

    /// Secondary signal decoder; defaults to QR decoding
    pub fn signal_backend(mut self, backend: Arc<dyn SignalBackend>) -> Self {
        self.signal_backend = Some(backend);
        self
    }

    /// Runtime whose blocking pool runs the scans; defaults to the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<FrameScanner> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let inference_backend = self
            .inference_backend
            .ok_or_else(|| ScanError::system("Inference backend must be specified"))?;

        inference_backend.warm_up()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                ScanError::system(format!("No tokio runtime available for scanning: {}", e))
            })?,
        };

        let signal_backend = self
            .signal_backend
            .unwrap_or_else(|| Arc::new(RqrrBackend::new()));

        let secondary_enabled = config.secondary.is_enabled_for(&config.scanner.region);
        info!(
            "Creating frame scanner: {} concurrent scans, region {}, secondary signal {}",
            config.scanner.max_concurrent_scans,
            config.scanner.region,
            if secondary_enabled { "enabled" } else { "disabled" }
        );

        let state = RwLock::new(ScannerState::generation(&config, &signal_backend));
        let slots = Arc::new(Semaphore::new(config.scanner.max_concurrent_scans));
        let detector = ClassificationDetector::new(inference_backend, config.detector.clone());

        Ok(FrameScanner {
            context: Arc::new(ScanContext {
                detector,
                signal_backend,
                config,
                secondary_enabled,
                state,
                event_bus: self.event_bus,
                counters: ScanCounters::default(),
            }),
            slots,
            runtime,
        })
    }
}

impl Default for FrameScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
