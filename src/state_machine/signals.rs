use crate::config::ScannerConfig;
use crate::detector::DocumentClass;
use crate::scanner::CompositeOutput;

/// What a composite output must show to count towards completion
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCriteria {
    pub accepted_classes: Vec<DocumentClass>,
    /// Class the flow expects; `None` accepts any accepted class
    pub expected_class: Option<DocumentClass>,
    /// Class that must also carry the secondary signal, when that check is on
    pub trigger_class: Option<DocumentClass>,
}

impl SignalCriteria {
    pub fn from_config(config: &ScannerConfig) -> Self {
        let trigger_class = config
            .secondary
            .is_enabled_for(&config.scanner.region)
            .then_some(config.secondary.trigger_class);

        Self {
            accepted_classes: config.completion.accepted_classes.clone(),
            expected_class: config.completion.expected_class,
            trigger_class,
        }
    }
}

/// Per-frame flags the completion policies decide on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSignals {
    /// A stable detection of an accepted class, with the secondary signal
    /// settled (found or given up on) when the class requires it
    pub has_primary: bool,
    /// The secondary signal was found on the document
    pub has_object: bool,
    /// The detected class is the expected one, or nothing is expected
    pub matches_expected: bool,
}

impl ScanSignals {
    pub fn from_output(output: &CompositeOutput, criteria: &SignalCriteria) -> Self {
        let class = output.detection.class;
        let accepted = criteria.accepted_classes.contains(&class);
        let secondary_settled = criteria.trigger_class != Some(class)
            || output.secondary.is_some()
            || output.secondary_timed_out;

        Self {
            has_primary: accepted && output.is_stable() && secondary_settled,
            has_object: output.secondary.is_some(),
            matches_expected: criteria.expected_class.map_or(true, |expected| expected == class),
        }
    }

    /// The barcode carries the name and expiry fields, so finding it counts
    /// as seeing them
    pub fn auxiliary_seen(&self) -> bool {
        self.has_object
    }
}
