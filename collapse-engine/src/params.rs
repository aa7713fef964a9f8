//! Cascade parameters.
//!
//! Two shapes of the same configuration:
//!
//! - [`ParameterSpec`]: the sparse, JSON-facing form. Coefficient maps are
//!   keyed by harmony code and coupling/shock maps may omit entries.
//! - [`CascadeParameters`]: the resolved form consumed by the dynamics.
//!   Every coefficient is present, so the hot path never looks up defaults.

use crate::error::{CollapseError, Result};
use crate::harmony::{Harmony, N_HARMONIES, TRUST_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coupling coefficients used when an entry is absent.
///
/// Trust and technology have no coupling term in the dynamics.
pub const DEFAULT_BETA: [f64; N_HARMONIES] = [0.02, 0.015, 0.0, 0.01, 0.015, 0.01, 0.0];

/// Shock sensitivities used when an entry is absent. Only trust is shocked.
pub const DEFAULT_GAMMA: [f64; N_HARMONIES] = [0.0, 0.0, 0.2, 0.0, 0.0, 0.0, 0.0];

const DEFAULT_ALPHA: [f64; N_HARMONIES] = [0.05, 0.04, 0.06, 0.03, 0.02, 0.03, 0.02];
const DEFAULT_DECAY: [f64; N_HARMONIES] = [0.02, 0.02, 0.03, 0.015, 0.01, 0.02, 0.01];
const DEFAULT_THETA: [f64; N_HARMONIES] = [0.35, 0.35, TRUST_THRESHOLD, 0.5, 0.4, 0.5, 0.5];

/// Resolved parameters of the cascade dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeParameters {
    /// Sensitivity to drivers, per harmony
    pub alpha: [f64; N_HARMONIES],

    /// Cross-harmony coupling, per harmony
    pub beta: [f64; N_HARMONIES],

    /// Shock sensitivity, per harmony
    pub gamma: [f64; N_HARMONIES],

    /// Natural decay rate, per harmony
    pub decay: [f64; N_HARMONIES],

    /// Threshold / reference level, per harmony
    pub theta: [f64; N_HARMONIES],

    /// Baseline external shock applied outside explicit shock windows
    pub external_shock: f64,

    /// Constant infrastructure investment feeding technology
    pub infrastructure_investment: f64,

    /// Optimal stressor level S*
    pub optimal_stressor: f64,

    /// Reference governance level
    pub governance_reference: f64,
}

impl Default for CascadeParameters {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
            decay: DEFAULT_DECAY,
            theta: DEFAULT_THETA,
            external_shock: 0.0,
            infrastructure_investment: 0.01,
            optimal_stressor: 0.5,
            governance_reference: 0.7,
        }
    }
}

impl CascadeParameters {
    #[inline]
    pub fn alpha(&self, h: Harmony) -> f64 {
        self.alpha[h.index()]
    }

    #[inline]
    pub fn beta(&self, h: Harmony) -> f64 {
        self.beta[h.index()]
    }

    #[inline]
    pub fn gamma(&self, h: Harmony) -> f64 {
        self.gamma[h.index()]
    }

    #[inline]
    pub fn decay(&self, h: Harmony) -> f64 {
        self.decay[h.index()]
    }

    #[inline]
    pub fn theta(&self, h: Harmony) -> f64 {
        self.theta[h.index()]
    }

    /// Copy with a different baseline shock
    pub fn with_external_shock(&self, shock: f64) -> Self {
        Self {
            external_shock: shock,
            ..self.clone()
        }
    }

    /// Parse a [`ParameterSpec`] document and resolve it
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: ParameterSpec = serde_json::from_str(json)?;
        spec.resolve()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Sparse view of these parameters
    pub fn to_spec(&self) -> ParameterSpec {
        let dense = |arr: &[f64; N_HARMONIES]| -> BTreeMap<String, f64> {
            Harmony::ALL
                .iter()
                .map(|h| (h.code().to_string(), arr[h.index()]))
                .collect()
        };
        ParameterSpec {
            alpha: dense(&self.alpha),
            beta: dense(&self.beta),
            gamma: dense(&self.gamma),
            decay: dense(&self.decay),
            theta: dense(&self.theta),
            external_shock: self.external_shock,
            infrastructure_investment: self.infrastructure_investment,
            optimal_stressor: self.optimal_stressor,
            governance_reference: self.governance_reference,
        }
    }

    fn validate(&self) -> Result<()> {
        let all = self
            .alpha
            .iter()
            .chain(&self.beta)
            .chain(&self.gamma)
            .chain(&self.decay)
            .chain(&self.theta)
            .chain([
                &self.external_shock,
                &self.infrastructure_investment,
                &self.optimal_stressor,
                &self.governance_reference,
            ]);
        if all.into_iter().any(|v| !v.is_finite()) {
            return Err(CollapseError::ConfigError("non-finite coefficient".into()));
        }
        // Ratio terms divide by these
        for h in [Harmony::Complexity, Harmony::Wellbeing, Harmony::Technology] {
            if self.theta(h) == 0.0 {
                return Err(CollapseError::ConfigError(format!(
                    "theta for {} must be non-zero",
                    h.code()
                )));
            }
        }
        if self.governance_reference == 0.0 {
            return Err(CollapseError::ConfigError(
                "governance_reference must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_map(
    values: &[f64; N_HARMONIES],
    keep: impl Fn(Harmony) -> bool,
) -> BTreeMap<String, f64> {
    Harmony::ALL
        .iter()
        .filter(|h| keep(**h))
        .map(|h| (h.code().to_string(), values[h.index()]))
        .collect()
}

fn default_alpha() -> BTreeMap<String, f64> {
    default_map(&DEFAULT_ALPHA, |_| true)
}

fn default_beta() -> BTreeMap<String, f64> {
    default_map(&DEFAULT_BETA, |h| DEFAULT_BETA[h.index()] != 0.0)
}

fn default_gamma() -> BTreeMap<String, f64> {
    default_map(&DEFAULT_GAMMA, |h| DEFAULT_GAMMA[h.index()] != 0.0)
}

fn default_decay() -> BTreeMap<String, f64> {
    default_map(&DEFAULT_DECAY, |_| true)
}

fn default_theta() -> BTreeMap<String, f64> {
    default_map(&DEFAULT_THETA, |_| true)
}

fn default_infrastructure() -> f64 {
    0.01
}

fn default_optimal_stressor() -> f64 {
    0.5
}

fn default_governance_reference() -> f64 {
    0.7
}

/// Sparse parameter document, keyed by harmony code (`"H1"`..`"H7"`).
///
/// `alpha`, `decay` and `theta` must cover all seven harmonies when given.
/// Missing `beta`/`gamma` entries resolve to [`DEFAULT_BETA`] and
/// [`DEFAULT_GAMMA`]. Omitted fields take the canonical values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(default = "default_alpha")]
    pub alpha: BTreeMap<String, f64>,

    #[serde(default = "default_beta")]
    pub beta: BTreeMap<String, f64>,

    #[serde(default = "default_gamma")]
    pub gamma: BTreeMap<String, f64>,

    #[serde(default = "default_decay")]
    pub decay: BTreeMap<String, f64>,

    #[serde(default = "default_theta")]
    pub theta: BTreeMap<String, f64>,

    #[serde(default)]
    pub external_shock: f64,

    #[serde(default = "default_infrastructure")]
    pub infrastructure_investment: f64,

    #[serde(default = "default_optimal_stressor")]
    pub optimal_stressor: f64,

    #[serde(default = "default_governance_reference")]
    pub governance_reference: f64,
}

impl Default for ParameterSpec {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            decay: default_decay(),
            theta: default_theta(),
            external_shock: 0.0,
            infrastructure_investment: default_infrastructure(),
            optimal_stressor: default_optimal_stressor(),
            governance_reference: default_governance_reference(),
        }
    }
}

impl ParameterSpec {
    /// Resolve into dense parameters, filling coupling/shock defaults.
    pub fn resolve(&self) -> Result<CascadeParameters> {
        let params = CascadeParameters {
            alpha: required("alpha", &self.alpha)?,
            beta: with_defaults("beta", &self.beta, &DEFAULT_BETA)?,
            gamma: with_defaults("gamma", &self.gamma, &DEFAULT_GAMMA)?,
            decay: required("decay", &self.decay)?,
            theta: required("theta", &self.theta)?,
            external_shock: self.external_shock,
            infrastructure_investment: self.infrastructure_investment,
            optimal_stressor: self.optimal_stressor,
            governance_reference: self.governance_reference,
        };
        params.validate()?;
        Ok(params)
    }
}

fn parse_keys(field: &str, map: &BTreeMap<String, f64>) -> Result<Vec<(Harmony, f64)>> {
    map.iter()
        .map(|(k, &v)| {
            let h: Harmony = k.parse().map_err(|_| {
                CollapseError::ConfigError(format!("{}: unknown harmony '{}'", field, k))
            })?;
            Ok((h, v))
        })
        .collect()
}

fn required(field: &str, map: &BTreeMap<String, f64>) -> Result<[f64; N_HARMONIES]> {
    let mut slots = [None; N_HARMONIES];
    for (h, v) in parse_keys(field, map)? {
        slots[h.index()] = Some(v);
    }
    let mut out = [0.0; N_HARMONIES];
    for h in Harmony::ALL {
        out[h.index()] = slots[h.index()].ok_or_else(|| {
            CollapseError::ConfigError(format!("{}: missing entry for {}", field, h.code()))
        })?;
    }
    Ok(out)
}

fn with_defaults(
    field: &str,
    map: &BTreeMap<String, f64>,
    defaults: &[f64; N_HARMONIES],
) -> Result<[f64; N_HARMONIES]> {
    let mut out = *defaults;
    for (h, v) in parse_keys(field, map)? {
        out[h.index()] = v;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_resolves_to_default_params() {
        let resolved = ParameterSpec::default().resolve().unwrap();
        assert_eq!(resolved, CascadeParameters::default());
    }

    #[test]
    fn test_missing_coupling_uses_documented_default() {
        let json = r#"{ "beta": { "H1": 0.05 }, "gamma": {} }"#;
        let params = CascadeParameters::from_json(json).unwrap();
        assert_eq!(params.beta(Harmony::Governance), 0.05);
        assert_eq!(params.beta(Harmony::Economy), DEFAULT_BETA[1]);
        assert_eq!(params.gamma(Harmony::Trust), 0.2);
    }

    #[test]
    fn test_partial_alpha_rejected() {
        let json = r#"{ "alpha": { "H1": 0.05, "H2": 0.04 } }"#;
        let err = CascadeParameters::from_json(json).unwrap_err();
        assert!(matches!(err, CollapseError::ConfigError(msg) if msg.contains("alpha")));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let json = r#"{ "gamma": { "H9": 0.1 } }"#;
        assert!(matches!(
            CascadeParameters::from_json(json),
            Err(CollapseError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            CascadeParameters::from_json("{ not json"),
            Err(CollapseError::SerializationError(_))
        ));
    }

    #[test]
    fn test_spec_round_trip_through_dense() {
        let mut params = CascadeParameters::default();
        params.alpha[2] = 0.08;
        params.external_shock = 0.1;
        assert_eq!(params.to_spec().resolve().unwrap(), params);
    }

    #[test]
    fn test_zero_reference_rejected() {
        let spec = ParameterSpec {
            governance_reference: 0.0,
            ..Default::default()
        };
        assert!(spec.resolve().is_err());
    }
}
