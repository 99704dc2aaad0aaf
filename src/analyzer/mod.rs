mod qr;
mod secondary;
mod stability;
#[cfg(test)]
mod tests;

pub use qr::RqrrBackend;
pub use secondary::{SecondarySignal, SecondarySignalDetector, SignalBackend, Symbology};
pub use stability::{StabilityTracker, StabilityVerdict};
