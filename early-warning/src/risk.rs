//! Stress-to-risk mapping: logistic collapse probability and ordinal
//! risk categories.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default CSI at which collapse probability reaches one half
pub const DEFAULT_PROBABILITY_MIDPOINT: f64 = 0.4;

/// Default logistic steepness
pub const DEFAULT_STEEPNESS: f64 = 10.0;

/// Distance kept from 0 and 1 when the logistic saturates
pub const PROBABILITY_EPSILON: f64 = f64::EPSILON;

/// Logistic collapse probability
///
/// P(collapse) = 1 / (1 + exp(−k·(CSI − CSI₀)))
///
/// Non-decreasing in `csi` for positive steepness. Clamped to
/// `[ε, 1 − ε]` so saturated tails stay inside the open unit interval.
#[inline]
pub fn collapse_probability(csi: f64, midpoint: f64, steepness: f64) -> f64 {
    let p = 1.0 / (1.0 + (-steepness * (csi - midpoint)).exp());
    p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON)
}

/// Risk level categorization of a stress value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskCategory {
    /// Step function with breakpoints 0.2, 0.4 and 0.6 (lower bound inclusive)
    pub fn from_csi(csi: f64) -> Self {
        if csi < 0.2 {
            RiskCategory::Low
        } else if csi < 0.4 {
            RiskCategory::Moderate
        } else if csi < 0.6 {
            RiskCategory::High
        } else {
            RiskCategory::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "LOW",
            RiskCategory::Moderate => "MODERATE",
            RiskCategory::High => "HIGH",
            RiskCategory::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk read-out for a single stress value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskAssessment {
    pub csi: f64,
    pub collapse_probability: f64,
    pub category: RiskCategory,
}

impl RiskAssessment {
    pub fn new(csi: f64, midpoint: f64, steepness: f64) -> Self {
        Self {
            csi,
            collapse_probability: collapse_probability(csi, midpoint, steepness),
            category: RiskCategory::from_csi(csi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_midpoint_is_half() {
        let p = collapse_probability(0.4, 0.4, 10.0);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_probability_monotone_and_bounded() {
        let mut last = 0.0;
        for i in 0..=200 {
            let csi = -1.0 + i as f64 * 0.01;
            let p = collapse_probability(csi, DEFAULT_PROBABILITY_MIDPOINT, DEFAULT_STEEPNESS);
            assert!(p > 0.0 && p < 1.0);
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn test_probability_saturation_stays_open() {
        for csi in [-1e3, -80.0, 5.0, 80.0, 1e3, f64::MAX] {
            let p = collapse_probability(csi, DEFAULT_PROBABILITY_MIDPOINT, DEFAULT_STEEPNESS);
            assert!(p > 0.0 && p < 1.0, "p({}) = {}", csi, p);
        }
        let lo = collapse_probability(-1e3, DEFAULT_PROBABILITY_MIDPOINT, DEFAULT_STEEPNESS);
        let hi = collapse_probability(1e3, DEFAULT_PROBABILITY_MIDPOINT, DEFAULT_STEEPNESS);
        assert_eq!(lo, PROBABILITY_EPSILON);
        assert_eq!(hi, 1.0 - PROBABILITY_EPSILON);
    }

    #[test]
    fn test_category_breakpoints() {
        assert_eq!(RiskCategory::from_csi(0.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_csi(0.199_999), RiskCategory::Low);
        assert_eq!(RiskCategory::from_csi(0.2), RiskCategory::Moderate);
        assert_eq!(RiskCategory::from_csi(0.399_999), RiskCategory::Moderate);
        assert_eq!(RiskCategory::from_csi(0.4), RiskCategory::High);
        assert_eq!(RiskCategory::from_csi(0.599_999), RiskCategory::High);
        assert_eq!(RiskCategory::from_csi(0.6), RiskCategory::Critical);
        assert_eq!(RiskCategory::from_csi(5.0), RiskCategory::Critical);
    }

    #[test]
    fn test_category_ordering() {
        assert!(RiskCategory::Low < RiskCategory::Moderate);
        assert!(RiskCategory::High < RiskCategory::Critical);
        assert_eq!(RiskCategory::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_assessment() {
        let a = RiskAssessment::new(0.65, 0.4, 10.0);
        assert_eq!(a.category, RiskCategory::Critical);
        assert!(a.collapse_probability > 0.9);
    }
}
