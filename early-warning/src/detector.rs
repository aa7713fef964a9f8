//! Early-Warning Detector
//!
//! Sliding-window indicators of an approaching critical transition in a
//! scalar series (usually trust, H3):
//! - Critical slowing down: variance and lag-1 autocorrelation rise
//! - Distribution shape: skewness and kurtosis drift
//!
//! The detector also folds these into the Coordination Stress Index
//!
//! ```text
//! CSI = w₁·(θ − x)⁺ + w₂·(−dx/dt)⁺ + w₃·σ²/max σ² + w₄·(AR₁ − 0.5)⁺
//! ```
//!
//! evaluated at every original sample, not just at window centres.

use crate::error::{ensure_finite, Result, SignalError};
use crate::resample::{resample_dense, resample_linear};
use crate::risk::{
    collapse_probability, RiskAssessment, RiskCategory, DEFAULT_PROBABILITY_MIDPOINT,
    DEFAULT_STEEPNESS,
};
use crate::stats::{
    detrend_linear, excess_kurtosis, gradient, lag1_autocorrelation, skewness, variance,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Guard added to the variance normaliser
pub const VARIANCE_EPSILON: f64 = 1e-10;

/// Autocorrelation level above which persistence counts as stress
pub const AUTOCORRELATION_FLOOR: f64 = 0.5;

/// Smallest window that supports a lag-1 statistic
pub const MIN_WINDOW: usize = 3;

/// Weights of the four CSI components.
///
/// The canonical weights sum to one; the detector does not enforce this.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CsiWeights {
    /// Distance below threshold
    pub distance: f64,
    /// Rate of decline
    pub decline: f64,
    /// Normalized window variance
    pub variance: f64,
    /// Autocorrelation excess over 0.5
    pub autocorrelation: f64,
}

impl Default for CsiWeights {
    fn default() -> Self {
        Self {
            distance: 0.4,
            decline: 0.3,
            variance: 0.2,
            autocorrelation: 0.1,
        }
    }
}

impl CsiWeights {
    pub fn new(distance: f64, decline: f64, variance: f64, autocorrelation: f64) -> Self {
        Self {
            distance,
            decline,
            variance,
            autocorrelation,
        }
    }

    pub fn sum(&self) -> f64 {
        self.distance + self.decline + self.variance + self.autocorrelation
    }

    /// Whether the weights sum to one (within 1e-9)
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() < 1e-9
    }

    /// Rescaled copy summing to one (unchanged if the sum is zero)
    pub fn normalized(&self) -> Self {
        let s = self.sum();
        if s.abs() < f64::EPSILON {
            return *self;
        }
        Self::new(
            self.distance / s,
            self.decline / s,
            self.variance / s,
            self.autocorrelation / s,
        )
    }
}

/// Configuration for the early-warning detector.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// Points per sliding window
    pub window_size: usize,
    /// Stride between window starts
    pub step: usize,
    /// Remove the linear trend before windowing
    pub detrend: bool,
    /// CSI component weights
    pub weights: CsiWeights,
    /// CSI at which collapse probability is one half
    pub probability_midpoint: f64,
    /// Logistic steepness for collapse probability
    pub steepness: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            step: 1,
            detrend: true,
            weights: CsiWeights::default(),
            probability_midpoint: DEFAULT_PROBABILITY_MIDPOINT,
            steepness: DEFAULT_STEEPNESS,
        }
    }
}

impl DetectorConfig {
    pub fn with_window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Default::default()
        }
    }

    /// Check structural constraints (window ≥ 3, step ≥ 1)
    pub fn validate(&self) -> Result<()> {
        if self.window_size < MIN_WINDOW {
            return Err(SignalError::WindowTooSmall {
                min: MIN_WINDOW,
                got: self.window_size,
            });
        }
        if self.step == 0 {
            return Err(SignalError::InvalidStep(self.step));
        }
        Ok(())
    }
}

/// Window statistics, parallel arrays indexed by window centre.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EarlyWarningSignals {
    /// Centre index `i + W/2` of each window
    pub time_index: Vec<usize>,
    pub variance: Vec<f64>,
    pub autocorrelation: Vec<Option<f64>>,
    pub skewness: Vec<Option<f64>>,
    pub kurtosis: Vec<Option<f64>>,
}

impl EarlyWarningSignals {
    pub fn len(&self) -> usize {
        self.time_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_index.is_empty()
    }

    /// Change in variance between the first and last window
    pub fn variance_trend(&self) -> Option<f64> {
        match (self.variance.first(), self.variance.last()) {
            (Some(a), Some(b)) if self.variance.len() > 1 => Some(b - a),
            _ => None,
        }
    }
}

/// Coordination Stress Index with its per-sample components.
///
/// Components are already weighted; `csi[t]` is their sum and is `None`
/// exactly where the autocorrelation component is undefined.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StressIndex {
    pub distance_below: Vec<f64>,
    pub decline_rate: Vec<f64>,
    pub variance: Vec<f64>,
    pub autocorrelation: Vec<Option<f64>>,
    pub csi: Vec<Option<f64>>,
}

impl StressIndex {
    pub fn len(&self) -> usize {
        self.csi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.csi.is_empty()
    }

    /// Most recent defined CSI value
    pub fn latest(&self) -> Option<f64> {
        self.csi.iter().rev().find_map(|v| *v)
    }

    /// Largest defined CSI value
    pub fn peak(&self) -> Option<f64> {
        self.csi.iter().flatten().copied().reduce(f64::max)
    }
}

/// Sliding-window early-warning detector.
#[derive(Debug, Clone)]
pub struct EarlyWarningDetector {
    config: DetectorConfig,
}

impl EarlyWarningDetector {
    /// Create a detector; fails fast on an unusable window configuration.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        if !config.weights.is_normalized() {
            log::warn!(
                "CSI weights sum to {:.4}, not 1; stress values are not on the canonical scale",
                config.weights.sum()
            );
        }
        Ok(Self { config })
    }

    pub fn with_default_config() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Window statistics over `series`, detrended when configured.
    pub fn compute_early_warning_signals(&self, series: &[f64]) -> Result<EarlyWarningSignals> {
        self.signals(series, self.config.detrend)
    }

    /// Window statistics with an explicit detrending choice.
    pub fn signals(&self, series: &[f64], detrend: bool) -> Result<EarlyWarningSignals> {
        let w = self.config.window_size;
        ensure_finite(series)?;
        if series.len() <= w {
            return Err(SignalError::SeriesTooShort {
                min: w,
                got: series.len(),
            });
        }

        let data = if detrend {
            detrend_linear(series)
        } else {
            series.to_vec()
        };

        let starts: Vec<usize> = (0..data.len() - w).step_by(self.config.step).collect();
        let mut out = EarlyWarningSignals {
            time_index: Vec::with_capacity(starts.len()),
            variance: Vec::with_capacity(starts.len()),
            autocorrelation: Vec::with_capacity(starts.len()),
            skewness: Vec::with_capacity(starts.len()),
            kurtosis: Vec::with_capacity(starts.len()),
        };

        for i in starts {
            let window = &data[i..i + w];
            out.time_index.push(i + w / 2);
            out.variance.push(variance(window));
            out.autocorrelation.push(lag1_autocorrelation(window));
            out.skewness.push(skewness(window));
            out.kurtosis.push(excess_kurtosis(window));
        }

        log::debug!("computed {} early-warning windows (W={})", out.len(), w);
        Ok(out)
    }

    /// Coordination Stress Index using the configured weights.
    pub fn compute_csi(&self, series: &[f64], threshold: f64) -> Result<StressIndex> {
        self.compute_csi_weighted(series, threshold, self.config.weights)
    }

    /// Coordination Stress Index with explicit weights.
    pub fn compute_csi_weighted(
        &self,
        series: &[f64],
        threshold: f64,
        weights: CsiWeights,
    ) -> Result<StressIndex> {
        let ews = self.compute_early_warning_signals(series)?;
        let n = series.len();

        let distance_below: Vec<f64> = series
            .iter()
            .map(|&x| weights.distance * (threshold - x).max(0.0))
            .collect();

        let decline_rate: Vec<f64> = gradient(series)
            .into_iter()
            .map(|d| weights.decline * (-d).max(0.0))
            .collect();

        let var_full = resample_dense(&ews.time_index, &ews.variance, n);
        let var_max = var_full.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance: Vec<f64> = var_full
            .iter()
            .map(|v| weights.variance * v / (var_max + VARIANCE_EPSILON))
            .collect();

        let autocorrelation: Vec<Option<f64>> =
            resample_linear(&ews.time_index, &ews.autocorrelation, n)
                .into_iter()
                .map(|ar| {
                    ar.map(|r| weights.autocorrelation * (r - AUTOCORRELATION_FLOOR).max(0.0))
                })
                .collect();

        let csi = (0..n)
            .map(|t| {
                autocorrelation[t].map(|ar| distance_below[t] + decline_rate[t] + variance[t] + ar)
            })
            .collect();

        Ok(StressIndex {
            distance_below,
            decline_rate,
            variance,
            autocorrelation,
            csi,
        })
    }

    /// Logistic collapse probability with the configured midpoint/steepness.
    pub fn collapse_probability(&self, csi: f64) -> f64 {
        collapse_probability(csi, self.config.probability_midpoint, self.config.steepness)
    }

    pub fn risk_category(&self, csi: f64) -> RiskCategory {
        RiskCategory::from_csi(csi)
    }

    pub fn assess(&self, csi: f64) -> RiskAssessment {
        RiskAssessment::new(csi, self.config.probability_midpoint, self.config.steepness)
    }

    /// Risk read-out at every sample of a stress index.
    pub fn assess_series(&self, index: &StressIndex) -> Vec<Option<RiskAssessment>> {
        index.csi.iter().map(|c| c.map(|v| self.assess(v))).collect()
    }
}

impl Default for EarlyWarningDetector {
    fn default() -> Self {
        Self::with_default_config()
    }
}
