//! Recovery dynamics and collapse/recovery asymmetry.
//!
//! Trust erodes several times faster than it is rebuilt. The analyzer
//! models recovery as an exponential approach to a target trust level:
//!
//! ```text
//! H3(t) = H3_target − (H3_target − H3_0)·e^(−k_build·t)
//! ```

use crate::case::HistoricalCase;
use crate::error::{CollapseError, Result};
use crate::harmony::TRUST_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Default trust building rate k⁺
pub const DEFAULT_TRUST_BUILDING_RATE: f64 = 0.02;

/// Default trust erosion rate k⁻
pub const DEFAULT_TRUST_EROSION_RATE: f64 = 0.10;

/// Full-system recovery time as a multiple of trust recovery time.
///
/// A fixed assumption: the other harmonies are taken to follow trust with
/// a constant lag, not derived from the dynamics.
pub const FULL_RECOVERY_MULTIPLIER: f64 = 1.3;

/// Default target trust level for recovery estimates
pub const DEFAULT_RECOVERY_TARGET: f64 = 0.55;

/// Default fraction of the gap that counts as recovered
pub const DEFAULT_RECOVERY_FRACTION: f64 = 0.95;

/// Outcome of a recovery-time estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoveryEstimate {
    /// Current trust already meets the target
    AlreadyMet,
    /// Times are `None` when the target does not sit above the threshold
    Projected {
        trust_recovery_time: Option<f64>,
        full_recovery_time: Option<f64>,
        trust_gap: f64,
        effective_rate: f64,
    },
}

impl RecoveryEstimate {
    /// Trust recovery time, zero when already met
    pub fn trust_recovery_time(&self) -> Option<f64> {
        match self {
            RecoveryEstimate::AlreadyMet => Some(0.0),
            RecoveryEstimate::Projected {
                trust_recovery_time, ..
            } => *trust_recovery_time,
        }
    }

    pub fn full_recovery_time(&self) -> Option<f64> {
        match self {
            RecoveryEstimate::AlreadyMet => Some(0.0),
            RecoveryEstimate::Projected {
                full_recovery_time, ..
            } => *full_recovery_time,
        }
    }
}

/// Collapse and recovery metrics of one historical case.
///
/// Recovery fields are `None` when the data never retraces halfway back
/// toward the peak after the nadir.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseAsymmetry {
    pub case: String,
    pub peak_k: f64,
    pub peak_time: f64,
    pub nadir_k: f64,
    pub nadir_time: f64,
    pub collapse_duration: f64,
    pub recovery_time: Option<f64>,
    pub recovery_duration: Option<f64>,
    /// recovery / collapse duration; +∞ for an instantaneous collapse
    pub asymmetry_ratio: Option<f64>,
    pub trust_at_nadir: f64,
    pub below_threshold: bool,
}

/// Peak and nadir of a K series
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PeakNadir {
    pub peak: usize,
    pub nadir: usize,
}

/// First arg-max of `k`, then the first arg-min at or after it.
pub(crate) fn peak_and_nadir(k: &[f64]) -> Option<PeakNadir> {
    let peak = argmax(k)?;
    let nadir = peak + argmin(&k[peak..])?;
    Some(PeakNadir { peak, nadir })
}

pub(crate) fn argmax(x: &[f64]) -> Option<usize> {
    x.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn argmin(x: &[f64]) -> Option<usize> {
    x.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Recovery analyzer with a fixed trust building rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAnalyzer {
    pub trust_building_rate: f64,
}

impl Default for RecoveryAnalyzer {
    fn default() -> Self {
        Self {
            trust_building_rate: DEFAULT_TRUST_BUILDING_RATE,
        }
    }
}

impl RecoveryAnalyzer {
    pub fn new(trust_building_rate: f64) -> Result<Self> {
        if !(trust_building_rate.is_finite() && trust_building_rate > 0.0) {
            return Err(CollapseError::InvalidParameter(format!(
                "trust building rate must be positive, got {}",
                trust_building_rate
            )));
        }
        Ok(Self { trust_building_rate })
    }

    /// Time to close `recovery_fraction` of the gap between `current` and
    /// `target` trust.
    ///
    /// The exponential-approach time −ln(1 − f)/k is scaled by
    /// gap / (target − θ). A target at or below `current` is
    /// [`RecoveryEstimate::AlreadyMet`]. A target at or below θ leaves the
    /// reference gap non-positive and the projected times undefined.
    pub fn estimate_recovery_time(
        &self,
        current: f64,
        target: f64,
        recovery_fraction: f64,
    ) -> Result<RecoveryEstimate> {
        if !(current.is_finite() && target.is_finite()) {
            return Err(CollapseError::InvalidParameter(
                "trust levels must be finite".into(),
            ));
        }
        if target <= current {
            return Ok(RecoveryEstimate::AlreadyMet);
        }
        if !(recovery_fraction > 0.0 && recovery_fraction < 1.0) {
            return Err(CollapseError::InvalidParameter(format!(
                "recovery fraction must lie in (0, 1), got {}",
                recovery_fraction
            )));
        }

        let gap = target - current;
        let reference_gap = target - TRUST_THRESHOLD;
        let trust_recovery_time = if reference_gap > 0.0 {
            let base = -(1.0 - recovery_fraction).ln() / self.trust_building_rate;
            Some(base * gap / reference_gap)
        } else {
            log::debug!(
                "recovery target {} not above threshold {}; time undefined",
                target,
                TRUST_THRESHOLD
            );
            None
        };

        Ok(RecoveryEstimate::Projected {
            trust_recovery_time,
            full_recovery_time: trust_recovery_time.map(|t| t * FULL_RECOVERY_MULTIPLIER),
            trust_gap: gap,
            effective_rate: self.trust_building_rate,
        })
    }

    /// Recovery duration over collapse duration; +∞ if collapse ≤ 0
    pub fn asymmetry_ratio(collapse_duration: f64, recovery_duration: f64) -> f64 {
        if collapse_duration <= 0.0 {
            return f64::INFINITY;
        }
        recovery_duration / collapse_duration
    }

    /// Locate peak, nadir and halfway-retracement recovery of K(t).
    pub fn analyze_historical_case(&self, case: &HistoricalCase) -> CaseAsymmetry {
        let k = case.k_index();
        let trust = case.trust();
        let t = case.time();

        // Cases are non-empty by construction.
        let PeakNadir { peak, nadir } =
            peak_and_nadir(&k).unwrap_or(PeakNadir { peak: 0, nadir: 0 });
        let collapse_duration = t[nadir] - t[peak];

        let halfway = k[nadir] + 0.5 * (k[peak] - k[nadir]);
        let recovery = (nadir + 1..k.len()).find(|&i| k[i] > halfway);
        let recovery_time = recovery.map(|i| t[i]);
        let recovery_duration = recovery_time.map(|rt| rt - t[nadir]);

        log::debug!(
            "{}: peak K={:.3} at {}, nadir K={:.3} at {}, recovery {:?}",
            case.name(),
            k[peak],
            t[peak],
            k[nadir],
            t[nadir],
            recovery_time
        );

        CaseAsymmetry {
            case: case.name().to_string(),
            peak_k: k[peak],
            peak_time: t[peak],
            nadir_k: k[nadir],
            nadir_time: t[nadir],
            collapse_duration,
            recovery_time,
            recovery_duration,
            asymmetry_ratio: recovery_duration
                .map(|rd| Self::asymmetry_ratio(collapse_duration, rd)),
            trust_at_nadir: trust[nadir],
            below_threshold: trust[nadir] < TRUST_THRESHOLD,
        }
    }
}

/// P(collapse | H3) = 1 / (1 + e^{k(H3 − θ)}), kept inside (0, 1)
pub fn trust_collapse_probability(trust: f64, theta: f64, steepness: f64) -> f64 {
    // Same logistic with the roles of level and midpoint swapped
    early_warning::collapse_probability(theta, trust, steepness)
}

/// Erosion rate over building rate (k⁻/k⁺)
pub fn trust_asymmetry_ratio(build_rate: f64, erosion_rate: f64) -> f64 {
    erosion_rate / build_rate
}
