use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::detector::DocumentClass;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScannerConfig {
    pub detector: DetectorConfig,
    pub stability: StabilityConfig,
    pub secondary: SecondaryConfig,
    pub scanner: OrchestratorConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Minimum candidate score kept by the reducer
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Overlap at or above which a lower-scoring candidate is suppressed
    #[serde(default = "default_min_iou")]
    pub min_iou: f32,

    /// Side length of the square model input in pixels
    #[serde(default = "default_input_size")]
    pub input_size: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StabilityConfig {
    /// IOU between consecutive bounds below which the document counts as moving
    #[serde(default = "default_motion_blur_min_iou")]
    pub motion_blur_min_iou: f32,

    /// Seconds the bounds must hold still before the frame counts as stable
    #[serde(default = "default_motion_blur_min_duration")]
    pub motion_blur_min_duration: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SecondaryConfig {
    /// Master switch for barcode detection
    #[serde(default = "default_secondary_enabled")]
    pub enabled: bool,

    /// Regions whose documents carry a barcode worth waiting for
    #[serde(default = "default_secondary_regions")]
    pub regions: Vec<String>,

    /// Class that triggers barcode detection
    #[serde(default = "default_trigger_class")]
    pub trigger_class: DocumentClass,

    /// Seconds to keep trying before giving up on the barcode
    #[serde(default = "default_secondary_timeout")]
    pub timeout: f64,

    /// Padding added around the document bounds when searching for the barcode
    #[serde(default = "default_roi_padding")]
    pub roi_padding: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Maximum number of inferences running at once
    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,

    /// Region of the document being scanned (ISO 3166 alpha-2)
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Finish after the primary signal held for the error-correction duration
    Ocr,
    /// Prefer waiting for the auxiliary field before finishing
    Accurate,
    /// Require the object to be present and the classification to match
    CardVerify,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompletionConfig {
    #[serde(default = "default_policy")]
    pub policy: CompletionPolicy,

    /// Classes that count as the target object
    #[serde(default = "default_accepted_classes")]
    pub accepted_classes: Vec<DocumentClass>,

    /// Class the flow expects; a different accepted class is "incorrect"
    #[serde(default)]
    pub expected_class: Option<DocumentClass>,

    #[serde(default = "default_error_correction")]
    pub error_correction: f64,

    #[serde(default = "default_min_error_correction")]
    pub min_error_correction: f64,

    #[serde(default = "default_max_error_correction")]
    pub max_error_correction: f64,

    /// Continue into the name/expiry state instead of finishing from ocr-only
    #[serde(default)]
    pub extract_name_and_expiry: bool,

    #[serde(default = "default_name_and_expiry_duration")]
    pub name_and_expiry_duration: f64,

    #[serde(default = "default_ocr_and_card_duration")]
    pub ocr_and_card_duration: f64,

    #[serde(default = "default_ocr_only_duration")]
    pub ocr_only_duration: f64,

    #[serde(default = "default_ocr_incorrect_duration")]
    pub ocr_incorrect_duration: f64,

    #[serde(default = "default_ocr_force_flash_duration")]
    pub ocr_force_flash_duration: f64,

    #[serde(default = "default_ocr_delay_for_card_duration")]
    pub ocr_delay_for_card_duration: f64,
}

impl StabilityConfig {
    pub fn min_duration(&self) -> Duration {
        Duration::from_secs_f64(self.motion_blur_min_duration)
    }
}

impl SecondaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Whether barcode detection should run for documents from `region`
    pub fn is_enabled_for(&self, region: &str) -> bool {
        self.enabled
            && self
                .regions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(region))
    }
}

impl ScannerConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("docscan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("detector.min_score", default_min_score() as f64)?
            .set_default("detector.min_iou", default_min_iou() as f64)?
            .set_default("detector.input_size", default_input_size() as i64)?
            .set_default(
                "stability.motion_blur_min_iou",
                default_motion_blur_min_iou() as f64,
            )?
            .set_default(
                "stability.motion_blur_min_duration",
                default_motion_blur_min_duration(),
            )?
            .set_default("secondary.enabled", default_secondary_enabled())?
            .set_default("secondary.regions", default_secondary_regions())?
            .set_default("secondary.trigger_class", "id_card_back")?
            .set_default("secondary.timeout", default_secondary_timeout())?
            .set_default("secondary.roi_padding", default_roi_padding() as f64)?
            .set_default(
                "scanner.max_concurrent_scans",
                default_max_concurrent_scans() as i64,
            )?
            .set_default("scanner.region", default_region())?
            .set_default("completion.policy", "ocr")?
            .set_default(
                "completion.accepted_classes",
                vec!["id_card_front", "id_card_back", "passport"],
            )?
            .set_default("completion.error_correction", default_error_correction())?
            .set_default(
                "completion.min_error_correction",
                default_min_error_correction(),
            )?
            .set_default(
                "completion.max_error_correction",
                default_max_error_correction(),
            )?
            .set_default("completion.extract_name_and_expiry", false)?
            .set_default(
                "completion.name_and_expiry_duration",
                default_name_and_expiry_duration(),
            )?
            .set_default(
                "completion.ocr_and_card_duration",
                default_ocr_and_card_duration(),
            )?
            .set_default("completion.ocr_only_duration", default_ocr_only_duration())?
            .set_default(
                "completion.ocr_incorrect_duration",
                default_ocr_incorrect_duration(),
            )?
            .set_default(
                "completion.ocr_force_flash_duration",
                default_ocr_force_flash_duration(),
            )?
            .set_default(
                "completion.ocr_delay_for_card_duration",
                default_ocr_delay_for_card_duration(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // DOCSCAN_STABILITY__MOTION_BLUR_MIN_IOU=0.9
            .add_source(
                Environment::with_prefix("DOCSCAN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ScannerConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detector.min_score) {
            return Err(ConfigError::Message(
                "Detector min_score must be within 0.0..=1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.min_iou) {
            return Err(ConfigError::Message(
                "Detector min_iou must be within 0.0..=1.0".to_string(),
            ));
        }

        if self.detector.input_size == 0 {
            return Err(ConfigError::Message(
                "Detector input_size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.stability.motion_blur_min_iou) {
            return Err(ConfigError::Message(
                "Stability motion_blur_min_iou must be within 0.0..=1.0".to_string(),
            ));
        }

        if self.scanner.max_concurrent_scans == 0 {
            return Err(ConfigError::Message(
                "Scanner max_concurrent_scans must be greater than 0".to_string(),
            ));
        }

        if self.secondary.roi_padding < 0.0 {
            return Err(ConfigError::Message(
                "Secondary roi_padding must not be negative".to_string(),
            ));
        }

        if self.completion.accepted_classes.is_empty() {
            return Err(ConfigError::Message(
                "Completion accepted_classes must not be empty".to_string(),
            ));
        }

        if self.completion.max_error_correction < self.completion.min_error_correction {
            return Err(ConfigError::Message(
                "Completion max_error_correction must not be below min_error_correction"
                    .to_string(),
            ));
        }

        let durations = [
            ("stability.motion_blur_min_duration", self.stability.motion_blur_min_duration),
            ("secondary.timeout", self.secondary.timeout),
            ("completion.error_correction", self.completion.error_correction),
            ("completion.min_error_correction", self.completion.min_error_correction),
            ("completion.max_error_correction", self.completion.max_error_correction),
            (
                "completion.name_and_expiry_duration",
                self.completion.name_and_expiry_duration,
            ),
            ("completion.ocr_and_card_duration", self.completion.ocr_and_card_duration),
            ("completion.ocr_only_duration", self.completion.ocr_only_duration),
            ("completion.ocr_incorrect_duration", self.completion.ocr_incorrect_duration),
            (
                "completion.ocr_force_flash_duration",
                self.completion.ocr_force_flash_duration,
            ),
            (
                "completion.ocr_delay_for_card_duration",
                self.completion.ocr_delay_for_card_duration,
            ),
        ];

        for (name, seconds) in durations {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(ConfigError::Message(format!(
                    "{} must be a non-negative number of seconds",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            min_iou: default_min_iou(),
            input_size: default_input_size(),
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            motion_blur_min_iou: default_motion_blur_min_iou(),
            motion_blur_min_duration: default_motion_blur_min_duration(),
        }
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: default_secondary_enabled(),
            regions: default_secondary_regions(),
            trigger_class: default_trigger_class(),
            timeout: default_secondary_timeout(),
            roi_padding: default_roi_padding(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: default_max_concurrent_scans(),
            region: default_region(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            accepted_classes: default_accepted_classes(),
            expected_class: None,
            error_correction: default_error_correction(),
            min_error_correction: default_min_error_correction(),
            max_error_correction: default_max_error_correction(),
            extract_name_and_expiry: false,
            name_and_expiry_duration: default_name_and_expiry_duration(),
            ocr_and_card_duration: default_ocr_and_card_duration(),
            ocr_only_duration: default_ocr_only_duration(),
            ocr_incorrect_duration: default_ocr_incorrect_duration(),
            ocr_force_flash_duration: default_ocr_force_flash_duration(),
            ocr_delay_for_card_duration: default_ocr_delay_for_card_duration(),
        }
    }
}

// Default value functions
fn default_min_score() -> f32 {
    0.4
}
fn default_min_iou() -> f32 {
    0.5
}
fn default_input_size() -> u32 {
    224
}

fn default_motion_blur_min_iou() -> f32 {
    0.95
}
fn default_motion_blur_min_duration() -> f64 {
    0.5
}

fn default_secondary_enabled() -> bool {
    true
}
fn default_secondary_regions() -> Vec<String> {
    vec!["US".to_string(), "CA".to_string()]
}
fn default_trigger_class() -> DocumentClass {
    DocumentClass::IdCardBack
}
fn default_secondary_timeout() -> f64 {
    3.0
}
fn default_roi_padding() -> f32 {
    0.08
}

fn default_max_concurrent_scans() -> usize {
    2
}
fn default_region() -> String {
    "US".to_string()
}

fn default_policy() -> CompletionPolicy {
    CompletionPolicy::Ocr
}
fn default_accepted_classes() -> Vec<DocumentClass> {
    vec![
        DocumentClass::IdCardFront,
        DocumentClass::IdCardBack,
        DocumentClass::Passport,
    ]
}
fn default_error_correction() -> f64 {
    2.0
}
fn default_min_error_correction() -> f64 {
    2.0
}
fn default_max_error_correction() -> f64 {
    4.0
}
fn default_name_and_expiry_duration() -> f64 {
    4.0
}
fn default_ocr_and_card_duration() -> f64 {
    1.5
}
fn default_ocr_only_duration() -> f64 {
    1.5
}
fn default_ocr_incorrect_duration() -> f64 {
    2.0
}
fn default_ocr_force_flash_duration() -> f64 {
    1.5
}
fn default_ocr_delay_for_card_duration() -> f64 {
    2.0
}
