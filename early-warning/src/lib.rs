//! # Early Warning
//!
//! Leading indicators of critical transitions in scalar time series.
//!
//! This crate provides the statistical half of coordination-collapse
//! analysis. It operates on any scalar series, simulated or historical:
//!
//! - **Window statistics**: variance, lag-1 autocorrelation, skewness, kurtosis
//! - **Coordination Stress Index**: weighted distance/decline/variance/persistence
//! - **Risk mapping**: logistic collapse probability and ordinal categories
//! - **Series utilities**: detrending, gradients, Pearson correlation with p-value
//!
//! ## Quick Start
//!
//! ```rust
//! use early_warning::{EarlyWarningDetector, DetectorConfig, TRUST_THRESHOLD};
//!
//! let trust: Vec<f64> = (0..60)
//!     .map(|i| 0.6 - 0.004 * i as f64 + 0.01 * (i as f64).sin())
//!     .collect();
//!
//! let detector = EarlyWarningDetector::new(DetectorConfig::with_window(15)).unwrap();
//! let index = detector.compute_csi(&trust, TRUST_THRESHOLD).unwrap();
//!
//! if let Some(csi) = index.latest() {
//!     let risk = detector.assess(csi);
//!     println!("CSI {:.3} -> {} ({:.1}%)", csi, risk.category, 100.0 * risk.collapse_probability);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        early-warning                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  stats.rs          │  resample.rs       │  risk.rs              │
//! │  - moments         │  - window centre → │  - collapse_probability│
//! │  - AR(1)           │    full axis       │  - RiskCategory       │
//! │  - detrend/gradient│                    │  - RiskAssessment     │
//! │  - correlation     │                    │                       │
//! ├────────────────────┴────────────────────┴───────────────────────┤
//! │  detector.rs: EarlyWarningDetector, EarlyWarningSignals,        │
//! │               StressIndex, CsiWeights                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Features
//!
//! - `serialize`: serde derives on configs and results

pub mod detector;
pub mod error;
pub mod resample;
pub mod risk;
pub mod stats;

// Re-exports for convenience
pub use detector::{
    CsiWeights,
    DetectorConfig,
    EarlyWarningDetector,
    EarlyWarningSignals,
    StressIndex,
};

pub use error::{Result, SignalError};

pub use risk::{
    collapse_probability,
    RiskAssessment,
    RiskCategory,
};

pub use stats::{
    correlation,
    detrend_linear,
    gradient,
    gradient_with_axis,
    lag1_autocorrelation,
    Correlation,
};

/// Critical trust level θ below which cascades are assumed to accelerate
pub const TRUST_THRESHOLD: f64 = 0.37;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let detector = EarlyWarningDetector::default();
        assert_eq!(detector.risk_category(0.3), RiskCategory::Moderate);
        assert!(collapse_probability(0.3, 0.4, 10.0) < 0.5);
        assert_eq!(gradient(&[1.0, 2.0, 4.0]), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
