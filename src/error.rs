use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("Secondary signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Frame error: {details}")]
    Frame { details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures raised by an inference backend
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model load failed: {details}")]
    ModelLoad { details: String },

    #[error("Input preparation failed: {details}")]
    Input { details: String },

    #[error("Model execution failed: {details}")]
    Execution { details: String },
}

/// Raw output tensors that cannot be interpreted
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    #[error("Missing output tensor '{name}'")]
    Missing { name: &'static str },

    #[error("Tensor '{name}' has rank {actual}, expected {expected}")]
    Rank {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Tensor '{name}' has shape {actual:?}, expected {expected}")]
    Shape {
        name: &'static str,
        expected: String,
        actual: Vec<usize>,
    },

    #[error("Tensor '{name}' holds {actual} values but its shape requires {expected}")]
    Length {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failures raised by a secondary signal backend
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Region of interest is empty")]
    EmptyRegion,

    #[error("Decoding failed: {details}")]
    Decode { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Receiver lagged behind by {count} events")]
    Lagged { count: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

impl ScanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn frame<S: Into<String>>(details: S) -> Self {
        Self::Frame {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
