use super::*;
use crate::error::SignalError;
use crate::geometry::Rect;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backend that finds a code after a fixed number of attempts, or never
struct CountingBackend {
    calls: AtomicUsize,
    find_on_call: Option<usize>,
}

impl CountingBackend {
    fn never() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            find_on_call: None,
        }
    }

    fn on_call(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            find_on_call: Some(n),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignalBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn find(&self, _image: &RgbImage, region: Rect) -> Result<Option<SecondarySignal>, SignalError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.find_on_call == Some(call) {
            Ok(Some(SecondarySignal {
                symbology: Symbology::Pdf417,
                payload: "ANSI 636000".to_string(),
                bounds: Some(region),
            }))
        } else {
            Ok(None)
        }
    }
}

struct BrokenBackend;

impl SignalBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn find(&self, _image: &RgbImage, _region: Rect) -> Result<Option<SecondarySignal>, SignalError> {
        Err(SignalError::Decode {
            details: "corrupt symbol".to_string(),
        })
    }
}

fn white_image() -> RgbImage {
    RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]))
}

fn roi() -> Rect {
    Rect::new(0.1, 0.1, 0.9, 0.9)
}

#[test]
fn test_gives_up_after_timeout_without_calling_backend() {
    let backend = Arc::new(CountingBackend::never());
    let mut detector = SecondarySignalDetector::new(backend.clone(), Duration::from_secs(3));
    let start = Instant::now();

    for step in 0..=3 {
        let now = start + Duration::from_secs(step);
        assert!(detector.detect(&white_image(), 7, roi(), now).is_none());
        assert!(!detector.is_timed_out(now));
    }
    assert_eq!(backend.calls(), 4);

    let late = start + Duration::from_millis(3001);
    assert!(detector.detect(&white_image(), 7, roi(), late).is_none());
    assert!(detector.is_timed_out(late));
    assert!(detector.gave_up());
    assert_eq!(backend.calls(), 4);

    detector.detect(&white_image(), 7, roi(), late + Duration::from_secs(10));
    assert_eq!(backend.calls(), 4);
}

#[test]
fn test_give_up_survives_earlier_capture_time() {
    let backend = Arc::new(CountingBackend::never());
    let mut detector = SecondarySignalDetector::new(backend.clone(), Duration::from_secs(3));
    let start = Instant::now();

    detector.detect(&white_image(), 1, roi(), start);
    assert!(detector.detect(&white_image(), 3, roi(), start + Duration::from_millis(3500)).is_none());
    assert!(detector.gave_up());
    assert_eq!(backend.calls(), 1);

    // A slower scan of an older frame finishes after the window closed
    let older = start + Duration::from_millis(2900);
    assert!(detector.detect(&white_image(), 2, roi(), older).is_none());
    assert!(detector.is_timed_out(older));
    assert_eq!(backend.calls(), 1);
}

#[test]
fn test_found_signal_is_sticky() {
    let backend = Arc::new(CountingBackend::on_call(2));
    let mut detector = SecondarySignalDetector::new(backend.clone(), Duration::from_secs(3));
    let start = Instant::now();

    assert!(detector.detect(&white_image(), 7, roi(), start).is_none());
    let found = detector
        .detect(&white_image(), 7, roi(), start + Duration::from_millis(100))
        .unwrap();
    assert_eq!(found.symbology, Symbology::Pdf417);

    // Found before the window closed: never reported as timed out
    let much_later = start + Duration::from_secs(60);
    assert_eq!(detector.detect(&white_image(), 7, roi(), much_later), Some(found));
    assert!(!detector.is_timed_out(much_later));
    assert_eq!(backend.calls(), 2);
}

#[test]
fn test_reset_reopens_the_window() {
    let backend = Arc::new(CountingBackend::never());
    let mut detector = SecondarySignalDetector::new(backend.clone(), Duration::from_secs(1));
    let start = Instant::now();

    detector.detect(&white_image(), 7, roi(), start);
    let late = start + Duration::from_secs(2);
    detector.detect(&white_image(), 7, roi(), late);
    assert!(detector.is_timed_out(late));

    detector.reset();
    assert!(!detector.is_timed_out(late));
    assert_eq!(detector.elapsed(late), Duration::ZERO);

    detector.detect(&white_image(), 7, roi(), late);
    assert_eq!(backend.calls(), 2);
}

#[test]
fn test_backend_errors_count_as_not_found() {
    let mut detector = SecondarySignalDetector::new(Arc::new(BrokenBackend), Duration::from_secs(3));
    let now = Instant::now();

    assert!(detector.detect(&white_image(), 7, roi(), now).is_none());
    assert!(detector.found().is_none());
}

#[test]
fn test_not_timed_out_before_first_search() {
    let detector =
        SecondarySignalDetector::new(Arc::new(CountingBackend::never()), Duration::from_secs(0));
    assert!(!detector.is_timed_out(Instant::now() + Duration::from_secs(5)));
}

#[test]
fn test_rqrr_backend_plugs_into_detector() {
    let mut detector = SecondarySignalDetector::new(Arc::new(RqrrBackend::new()), Duration::from_secs(3));
    assert!(detector.detect(&white_image(), 7, Rect::unit(), Instant::now()).is_none());
}
