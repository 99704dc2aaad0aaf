use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::StabilityConfig;
use crate::geometry::Rect;

/// Whether the document has held still long enough to be captured sharply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityVerdict {
    Stable,
    Blurred,
}

impl StabilityVerdict {
    pub fn is_stable(&self) -> bool {
        matches!(self, StabilityVerdict::Stable)
    }
}

#[derive(Debug, Clone, Default)]
struct StabilityState {
    /// Baseline bounds; only replaced when the document moves
    last_bounds: Option<Rect>,
    /// When the bounds last drifted past the threshold
    stable_since: Option<Instant>,
    last_iou: Option<f32>,
}

/// Flags motion blur by comparing detection bounds across frames.
///
/// Not synchronized: callers feed it one frame at a time, in arrival order.
pub struct StabilityTracker {
    config: StabilityConfig,
    state: StabilityState,
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            state: StabilityState::default(),
        }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Record the bounds of the latest detection and report stability.
    ///
    /// Bounds overlapping the baseline by at least `motion_blur_min_iou`
    /// keep the stable-since instant; anything else (including the very
    /// first bounds) becomes the new baseline and restarts the timer.
    pub fn update(&mut self, new_bounds: Rect, now: Instant) -> StabilityVerdict {
        let iou = self.state.last_bounds.map(|last| last.iou(&new_bounds));
        self.state.last_iou = iou;

        let holding_still = iou.is_some_and(|iou| iou >= self.config.motion_blur_min_iou);
        if !holding_still {
            trace!("Bounds moved (iou {:?}), restarting stability timer", iou);
            self.state.stable_since = Some(now);
            self.state.last_bounds = Some(new_bounds);
        }

        let verdict = if self.stable_for(now) >= self.config.min_duration() {
            StabilityVerdict::Stable
        } else {
            StabilityVerdict::Blurred
        };

        trace!(
            "Stability verdict {:?} after {:?}",
            verdict,
            self.stable_for(now)
        );
        verdict
    }

    /// How long the bounds have held still as of `now`
    pub fn stable_for(&self, now: Instant) -> Duration {
        self.state
            .stable_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    /// IOU computed by the most recent update, if there was a baseline
    pub fn last_iou(&self) -> Option<f32> {
        self.state.last_iou
    }

    /// Forget all history
    pub fn reset(&mut self) {
        debug!("Resetting stability tracker");
        self.state = StabilityState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> StabilityTracker {
        StabilityTracker::new(StabilityConfig::default())
    }

    fn bounds() -> Rect {
        Rect::new(0.2, 0.2, 0.8, 0.6)
    }

    #[test]
    fn test_first_frame_is_blurred() {
        let mut tracker = tracker();
        assert_eq!(tracker.update(bounds(), Instant::now()), StabilityVerdict::Blurred);
        assert_eq!(tracker.last_iou(), None);
    }

    #[test]
    fn test_identical_bounds_become_stable_after_min_duration() {
        let mut tracker = tracker();
        let start = Instant::now();

        tracker.update(bounds(), start);
        assert_eq!(
            tracker.update(bounds(), start + Duration::from_millis(200)),
            StabilityVerdict::Blurred
        );
        assert_eq!(
            tracker.update(bounds(), start + Duration::from_millis(500)),
            StabilityVerdict::Stable
        );
        assert_eq!(tracker.last_iou(), Some(1.0));
    }

    #[test]
    fn test_jump_resets_timer_regardless_of_history() {
        let mut tracker = tracker();
        let start = Instant::now();

        tracker.update(bounds(), start);
        assert!(tracker
            .update(bounds(), start + Duration::from_secs(2))
            .is_stable());

        let moved = Rect::new(0.0, 0.7, 0.1, 0.9);
        let t = start + Duration::from_millis(2100);
        assert_eq!(tracker.update(moved, t), StabilityVerdict::Blurred);
        assert_eq!(tracker.last_iou(), Some(0.0));
        assert_eq!(tracker.stable_for(t), Duration::ZERO);

        // The moved bounds are the new baseline
        assert_eq!(
            tracker.update(moved, t + Duration::from_millis(600)),
            StabilityVerdict::Stable
        );
    }

    #[test]
    fn test_small_drift_keeps_original_baseline() {
        let mut tracker = tracker();
        let start = Instant::now();
        tracker.update(bounds(), start);

        // IOU with the baseline stays above 0.95
        let nudged = Rect::new(0.2, 0.2, 0.805, 0.6);
        assert!(tracker
            .update(nudged, start + Duration::from_millis(600))
            .is_stable());
    }

    #[test]
    fn test_reset_behaves_like_new() {
        let start = Instant::now();
        let mut used = tracker();
        used.update(bounds(), start);
        used.update(bounds(), start + Duration::from_secs(1));
        used.reset();

        let mut fresh = tracker();
        let later = start + Duration::from_secs(5);
        for step in 0..4 {
            let t = later + Duration::from_millis(250 * step);
            assert_eq!(used.update(bounds(), t), fresh.update(bounds(), t));
        }
    }
}
