//! Error types for the collapse engine.

use early_warning::SignalError;
use thiserror::Error;

/// Main error type for collapse engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollapseError {
    /// Vector or matrix dimensions don't match
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Time axis empty, unsorted or non-finite
    #[error("Invalid time axis: {0}")]
    InvalidTimeAxis(String),

    /// Integration span runs backwards or is non-finite
    #[error("Invalid time span: ({start}, {end})")]
    InvalidTimeSpan { start: f64, end: f64 },

    /// Argument outside its domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation needs at least one input
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Series statistics failed structurally
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Result type alias for collapse engine operations.
pub type Result<T> = std::result::Result<T, CollapseError>;

impl CollapseError {
    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            CollapseError::InvalidParameter(_) => true,
            CollapseError::Signal(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CollapseError {
    fn from(err: serde_json::Error) -> Self {
        CollapseError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "wasm")]
impl From<CollapseError> for wasm_bindgen::JsValue {
    fn from(err: CollapseError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
