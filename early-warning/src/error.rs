//! Error types for series statistics and the early-warning detector.

use thiserror::Error;

/// Structural errors raised before any statistic is computed.
///
/// Numerically undefined statistics (zero-variance windows and the like)
/// are not errors; they surface as `None` in the results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Window too small for lag-1 statistics
    #[error("Window too small: need at least {min} points, got {got}")]
    WindowTooSmall { min: usize, got: usize },

    /// Window stride must be positive
    #[error("Invalid window step: {0}")]
    InvalidStep(usize),

    /// Series cannot hold a single window
    #[error("Series too short: need more than {min} points, got {got}")]
    SeriesTooShort { min: usize, got: usize },

    /// Paired inputs differ in length
    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// NaN or infinite input value
    #[error("Non-finite value at index {0}")]
    NonFinite(usize),
}

/// Result type alias for signal operations.
pub type Result<T> = std::result::Result<T, SignalError>;

impl SignalError {
    /// Errors that a caller can fix by supplying more data
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SignalError::SeriesTooShort { .. })
    }
}

/// Reject NaN/inf before they leak into window statistics.
pub(crate) fn ensure_finite(series: &[f64]) -> Result<()> {
    match series.iter().position(|x| !x.is_finite()) {
        Some(idx) => Err(SignalError::NonFinite(idx)),
        None => Ok(()),
    }
}
