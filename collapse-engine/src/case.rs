//! Historical cases: observed harmony trajectories of a single society.

use crate::error::{CollapseError, Result};
use crate::harmony::{k_series, Harmony, HarmonyMatrix, N_HARMONIES};
use nalgebra::{Dyn, U7};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, time-indexed harmony record.
///
/// Time is strictly increasing in arbitrary units (negative for BCE).
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalCase {
    name: String,
    time: Vec<f64>,
    harmonies: HarmonyMatrix,
    metadata: HashMap<String, serde_json::Value>,
}

/// JSON shape: harmonies as seven rows of values
#[derive(Debug, Deserialize)]
struct CaseRecord {
    name: String,
    time: Vec<f64>,
    harmonies: Vec<Vec<f64>>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl HistoricalCase {
    pub fn new(name: impl Into<String>, time: Vec<f64>, harmonies: HarmonyMatrix) -> Result<Self> {
        let name = name.into();
        if time.is_empty() {
            return Err(CollapseError::InvalidTimeAxis(format!("case '{}' has no samples", name)));
        }
        if time.iter().any(|t| !t.is_finite()) {
            return Err(CollapseError::InvalidTimeAxis(format!(
                "case '{}' has non-finite times",
                name
            )));
        }
        if time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CollapseError::InvalidTimeAxis(format!(
                "case '{}' time axis is not strictly increasing",
                name
            )));
        }
        if harmonies.ncols() != time.len() {
            return Err(CollapseError::DimensionMismatch {
                expected: time.len(),
                got: harmonies.ncols(),
            });
        }
        if harmonies.iter().any(|v| !v.is_finite()) {
            return Err(CollapseError::InvalidParameter(format!(
                "case '{}' has non-finite harmony values",
                name
            )));
        }
        // K is a geometric mean; it is only defined for positive levels
        if let Some(v) = harmonies.iter().find(|v| **v <= 0.0) {
            return Err(CollapseError::InvalidParameter(format!(
                "case '{}' has non-positive harmony value {}",
                name, v
            )));
        }

        Ok(Self {
            name,
            time,
            harmonies,
            metadata: HashMap::new(),
        })
    }

    /// Build from seven per-harmony rows
    pub fn from_rows(name: impl Into<String>, time: Vec<f64>, rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != N_HARMONIES {
            return Err(CollapseError::DimensionMismatch {
                expected: N_HARMONIES,
                got: rows.len(),
            });
        }
        let n = time.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n) {
            return Err(CollapseError::DimensionMismatch {
                expected: n,
                got: bad.len(),
            });
        }
        let harmonies = HarmonyMatrix::from_fn_generic(U7, Dyn(n), |r, c| rows[r][c]);
        Self::new(name, time, harmonies)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: CaseRecord = serde_json::from_str(json)?;
        let case = Self::from_rows(record.name, record.time, &record.harmonies)?;
        Ok(case.with_metadata(record.metadata))
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn harmonies(&self) -> &HarmonyMatrix {
        &self.harmonies
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// K(t): geometric mean of each column
    pub fn k_index(&self) -> Vec<f64> {
        k_series(&self.harmonies)
    }

    pub fn harmony(&self, h: Harmony) -> Vec<f64> {
        self.harmonies.row(h.index()).iter().copied().collect()
    }

    /// H3(t)
    pub fn trust(&self) -> Vec<f64> {
        self.harmony(Harmony::Trust)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rows(n: usize) -> Vec<Vec<f64>> {
        (0..N_HARMONIES)
            .map(|r| (0..n).map(|c| 0.5 + 0.01 * r as f64 + 0.02 * c as f64).collect())
            .collect()
    }

    #[test]
    fn test_from_rows_layout() {
        let case = HistoricalCase::from_rows("test", vec![0.0, 1.0, 2.0], &rows(3)).unwrap();
        assert_eq!(case.len(), 3);
        assert_eq!(case.harmonies()[(2, 1)], 0.5 + 0.02 + 0.02);
        assert_eq!(case.trust(), vec![0.52, 0.54, 0.56]);
    }

    #[test]
    fn test_k_index_uniform_columns() {
        let rows: Vec<Vec<f64>> = (0..7).map(|_| vec![0.8, 0.4]).collect();
        let case = HistoricalCase::from_rows("flat", vec![-100.0, 50.0], &rows).unwrap();
        let k = case.k_index();
        assert_abs_diff_eq!(k[0], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(k[1], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_column_count_must_match_time() {
        let m = HarmonyMatrix::from_element(4, 0.5);
        assert!(matches!(
            HistoricalCase::new("bad", vec![0.0, 1.0, 2.0], m),
            Err(CollapseError::DimensionMismatch { expected: 3, got: 4 })
        ));
    }

    #[test]
    fn test_time_must_increase() {
        assert!(matches!(
            HistoricalCase::from_rows("bad", vec![0.0, 1.0, 1.0], &rows(3)),
            Err(CollapseError::InvalidTimeAxis(_))
        ));
        assert!(HistoricalCase::from_rows("empty", vec![], &rows(0)).is_err());
    }

    #[test]
    fn test_non_positive_levels_rejected() {
        for bad in [0.0, -0.2] {
            let mut r = rows(3);
            r[4][1] = bad;
            assert!(matches!(
                HistoricalCase::from_rows("bad", vec![0.0, 1.0, 2.0], &r),
                Err(CollapseError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_row_count_checked() {
        let mut r = rows(3);
        r.pop();
        assert!(matches!(
            HistoricalCase::from_rows("bad", vec![0.0, 1.0, 2.0], &r),
            Err(CollapseError::DimensionMismatch { expected: 7, got: 6 })
        ));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "name": "Western Roman Empire",
            "time": [-27, 200, 476],
            "harmonies": [
                [0.8, 0.6, 0.2], [0.7, 0.6, 0.2], [0.75, 0.5, 0.15],
                [0.8, 0.7, 0.3], [0.6, 0.6, 0.3], [0.6, 0.5, 0.2], [0.5, 0.5, 0.4]
            ],
            "metadata": {"region": "Mediterranean"}
        }"#;
        let case = HistoricalCase::from_json(json).unwrap();
        assert_eq!(case.name(), "Western Roman Empire");
        assert_eq!(case.time(), &[-27.0, 200.0, 476.0]);
        assert_eq!(case.trust(), vec![0.75, 0.5, 0.15]);
        assert_eq!(case.metadata()["region"], "Mediterranean");
    }
}
