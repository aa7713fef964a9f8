//! The seven harmonies and the K-index.
//!
//! A society's coordination state is a point in the 7-cube, one
//! coordinate per harmony. The K-index summarizes it as the geometric
//! mean of the coordinates.

use crate::error::{CollapseError, Result};
use nalgebra::{Dyn, OMatrix, SVector, U7};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of harmonies
pub const N_HARMONIES: usize = 7;

/// Lower clamp applied to harmony values
pub const STATE_FLOOR: f64 = 0.01;

/// Upper clamp applied to harmony values
pub const STATE_CEILING: f64 = 1.0;

/// Critical trust level θ
pub const TRUST_THRESHOLD: f64 = early_warning::TRUST_THRESHOLD;

/// Uncertainty band around θ
pub const TRUST_THRESHOLD_RANGE: (f64, f64) = (0.35, 0.40);

/// Trust erosion rate / trust building rate (k⁻/k⁺ ≈ 3–10)
pub const TRUST_ASYMMETRY_RATIO: f64 = 5.0;

/// One state vector H = (H1..H7)
pub type HarmonyState = SVector<f64, N_HARMONIES>;

/// A trajectory: one column per time point, one row per harmony
pub type HarmonyMatrix = OMatrix<f64, U7, Dyn>;

/// Named harmony indicators, ordered as in the state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Harmony {
    Governance,
    Economy,
    Trust,
    Complexity,
    Knowledge,
    Wellbeing,
    Technology,
}

impl Harmony {
    pub const ALL: [Harmony; N_HARMONIES] = [
        Harmony::Governance,
        Harmony::Economy,
        Harmony::Trust,
        Harmony::Complexity,
        Harmony::Knowledge,
        Harmony::Wellbeing,
        Harmony::Technology,
    ];

    /// Row/element index in state vectors and trajectories
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short code, `H1`..`H7`
    pub fn code(self) -> &'static str {
        match self {
            Harmony::Governance => "H1",
            Harmony::Economy => "H2",
            Harmony::Trust => "H3",
            Harmony::Complexity => "H4",
            Harmony::Knowledge => "H5",
            Harmony::Wellbeing => "H6",
            Harmony::Technology => "H7",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Harmony::Governance => "Governance",
            Harmony::Economy => "Economy",
            Harmony::Trust => "Trust",
            Harmony::Complexity => "Complexity",
            Harmony::Knowledge => "Knowledge",
            Harmony::Wellbeing => "Wellbeing",
            Harmony::Technology => "Technology",
        }
    }
}

impl std::fmt::Display for Harmony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.code(), self.name())
    }
}

impl FromStr for Harmony {
    type Err = CollapseError;

    /// Accepts codes (`H3`) or names (`trust`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|h| {
                h.code().eq_ignore_ascii_case(needle) || h.name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| CollapseError::ConfigError(format!("Unknown harmony: {}", s)))
    }
}

/// Build a state vector from a slice of exactly seven values.
pub fn harmony_state(values: &[f64]) -> Result<HarmonyState> {
    if values.len() != N_HARMONIES {
        return Err(CollapseError::DimensionMismatch {
            expected: N_HARMONIES,
            got: values.len(),
        });
    }
    Ok(HarmonyState::from_column_slice(values))
}

/// Clamp every component into [0.01, 1.0]
#[inline]
pub fn clamp_state(h: &HarmonyState) -> HarmonyState {
    h.map(|x| x.clamp(STATE_FLOOR, STATE_CEILING))
}

/// K-index: geometric mean of the seven harmonies
#[inline]
pub fn k_index(h: &HarmonyState) -> f64 {
    h.iter().product::<f64>().powf(1.0 / N_HARMONIES as f64)
}

/// K-index of every column of a trajectory
pub fn k_series(m: &HarmonyMatrix) -> Vec<f64> {
    m.column_iter()
        .map(|c| c.iter().product::<f64>().powf(1.0 / N_HARMONIES as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_codes_and_indices() {
        for (i, h) in Harmony::ALL.iter().enumerate() {
            assert_eq!(h.index(), i);
            assert_eq!(Harmony::from_index(i), Some(*h));
            assert_eq!(h.code(), format!("H{}", i + 1));
        }
        assert_eq!(Harmony::Trust.index(), 2);
        assert_eq!(Harmony::from_index(7), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("H3".parse::<Harmony>().unwrap(), Harmony::Trust);
        assert_eq!("technology".parse::<Harmony>().unwrap(), Harmony::Technology);
        assert!("H8".parse::<Harmony>().is_err());
    }

    #[test]
    fn test_k_index_uniform() {
        let h = HarmonyState::repeat(0.5);
        assert_abs_diff_eq!(k_index(&h), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_k_index_geometric_mean() {
        let h = harmony_state(&[0.7, 0.7, 0.6, 0.65, 0.6, 0.65, 0.75]).unwrap();
        let expected = (0.7 * 0.7 * 0.6 * 0.65 * 0.6 * 0.65 * 0.75f64).powf(1.0 / 7.0);
        assert_abs_diff_eq!(k_index(&h), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_clamp() {
        let h = harmony_state(&[-0.5, 0.0, 0.3, 1.2, 0.01, 1.0, 0.5]).unwrap();
        let c = clamp_state(&h);
        assert_eq!(c[0], STATE_FLOOR);
        assert_eq!(c[1], STATE_FLOOR);
        assert_eq!(c[2], 0.3);
        assert_eq!(c[3], STATE_CEILING);
    }

    #[test]
    fn test_state_dimension_checked() {
        assert!(matches!(
            harmony_state(&[0.5; 6]),
            Err(CollapseError::DimensionMismatch { expected: 7, got: 6 })
        ));
    }
}
