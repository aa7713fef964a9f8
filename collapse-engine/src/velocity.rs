//! Collapse velocity.
//!
//! Below the trust threshold K falls at
//!
//! ```text
//! v_c = −λ · (θ − H3)² · Φ(N)
//! ```
//!
//! where λ is a cascade amplification factor set by the society's economic
//! base and Φ(N) a connectivity term: a topology multiplier times the log10
//! population. Above θ the velocity is zero.

use crate::error::{CollapseError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// θ at which the velocity model is calibrated against historical cases.
///
/// Midpoint of the (0.35, 0.40) threshold band; slightly above the
/// dynamics' canonical 0.37.
pub const VELOCITY_THRESHOLD: f64 = 0.375;

/// Floor applied to projected K values
pub const K_FLOOR: f64 = 0.1;

/// Distance above θ still counted as "at threshold"
const THRESHOLD_TOLERANCE: f64 = 0.05;

/// Economic base, ordered by cascade amplification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocietyType {
    Agrarian,
    EarlyIndustrial,
    Industrial,
    Information,
}

impl SocietyType {
    /// Cascade amplification factor λ
    pub fn lambda(&self) -> f64 {
        match self {
            SocietyType::Agrarian => 0.15,
            SocietyType::EarlyIndustrial => 0.25,
            SocietyType::Industrial => 0.45,
            SocietyType::Information => 0.85,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SocietyType::Agrarian => "agrarian",
            SocietyType::EarlyIndustrial => "early_industrial",
            SocietyType::Industrial => "industrial",
            SocietyType::Information => "information",
        }
    }
}

impl FromStr for SocietyType {
    type Err = CollapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "agrarian" => Ok(SocietyType::Agrarian),
            "early_industrial" => Ok(SocietyType::EarlyIndustrial),
            "industrial" => Ok(SocietyType::Industrial),
            "information" => Ok(SocietyType::Information),
            other => Err(CollapseError::ConfigError(format!("Unknown society type: {}", other))),
        }
    }
}

/// Coordination network shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTopology {
    HubSpoke,
    Distributed,
    Hierarchical,
}

impl NetworkTopology {
    /// Stand-in for ⟨k⟩²/⟨k²⟩ of the degree distribution
    pub fn multiplier(&self) -> f64 {
        match self {
            NetworkTopology::HubSpoke => 1.8,
            NetworkTopology::Distributed => 1.0,
            NetworkTopology::Hierarchical => 0.6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkTopology::HubSpoke => "hub_spoke",
            NetworkTopology::Distributed => "distributed",
            NetworkTopology::Hierarchical => "hierarchical",
        }
    }
}

impl FromStr for NetworkTopology {
    type Err = CollapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hub_spoke" => Ok(NetworkTopology::HubSpoke),
            "distributed" => Ok(NetworkTopology::Distributed),
            "hierarchical" => Ok(NetworkTopology::Hierarchical),
            other => Err(CollapseError::ConfigError(format!(
                "Unknown network topology: {}",
                other
            ))),
        }
    }
}

/// Φ(N) = topology multiplier × log10 population
pub fn connectivity(population_proxy: f64, network: NetworkTopology) -> f64 {
    network.multiplier() * population_proxy
}

/// v_c for the given trust level; zero at or above `theta`
pub fn collapse_velocity(trust: f64, theta: f64, lambda: f64, phi: f64) -> f64 {
    if trust >= theta {
        return 0.0;
    }
    -lambda * (theta - trust).powi(2) * phi
}

/// Observed trust and K trajectories of one collapse episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityCase {
    pub name: String,
    pub society: SocietyType,
    pub network: NetworkTopology,
    /// (time, H3) pairs
    pub trust: Vec<(f64, f64)>,
    /// (time, K) pairs
    pub k: Vec<(f64, f64)>,
    /// log10 of approximate population
    pub population_proxy: f64,
}

/// Forward projection of K under the velocity model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityProjection {
    pub time: Vec<f64>,
    pub k: Vec<f64>,
    /// Velocity applied over each step; the last entry repeats the final step
    pub velocity: Vec<f64>,
}

/// Predicted against observed collapse velocity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityValidation {
    pub case: String,
    pub lambda: f64,
    pub phi: f64,
    pub trust_at_threshold: f64,
    pub predicted_velocity: f64,
    pub observed_velocity: f64,
    /// 1 − relative error, clamped to [0, 1]
    pub accuracy: f64,
}

impl VelocityCase {
    pub fn new(
        name: impl Into<String>,
        society: SocietyType,
        network: NetworkTopology,
        trust: Vec<(f64, f64)>,
        k: Vec<(f64, f64)>,
        population_proxy: f64,
    ) -> Result<Self> {
        let case = Self {
            name: name.into(),
            society,
            network,
            trust,
            k,
            population_proxy,
        };
        case.validate_shape()?;
        Ok(case)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let case: Self = serde_json::from_str(json)?;
        case.validate_shape()?;
        Ok(case)
    }

    fn validate_shape(&self) -> Result<()> {
        if self.k.is_empty() || self.trust.is_empty() {
            return Err(CollapseError::EmptyInput(format!("case '{}' has no samples", self.name)));
        }
        if self.k.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(CollapseError::InvalidTimeAxis(format!(
                "case '{}' K trajectory is not strictly increasing in time",
                self.name
            )));
        }
        Ok(())
    }

    pub fn phi(&self) -> f64 {
        connectivity(self.population_proxy, self.network)
    }

    /// Step K forward from its first observation.
    ///
    /// Each step applies the velocity at the previous sample's trust level
    /// over that step's Δt, flooring K at 0.1. Trust and K are paired by
    /// position.
    pub fn project(&self, theta: f64) -> Result<VelocityProjection> {
        if self.trust.len() < self.k.len() {
            return Err(CollapseError::DimensionMismatch {
                expected: self.k.len(),
                got: self.trust.len(),
            });
        }

        let lambda = self.society.lambda();
        let phi = self.phi();
        let time: Vec<f64> = self.k.iter().map(|&(t, _)| t).collect();

        let mut k = Vec::with_capacity(time.len());
        let mut velocity = Vec::with_capacity(time.len());
        k.push(self.k[0].1);

        for i in 1..time.len() {
            let v = collapse_velocity(self.trust[i - 1].1, theta, lambda, phi);
            let prev = k[i - 1];
            k.push((prev + v * (time[i] - time[i - 1])).max(K_FLOOR));
            velocity.push(v);
        }
        velocity.push(velocity.last().copied().unwrap_or(0.0));

        Ok(VelocityProjection { time, k, velocity })
    }

    /// Mean K change per unit time between first and last observation
    pub fn observed_velocity(&self) -> f64 {
        match (self.k.first(), self.k.last()) {
            (Some(&(t0, k0)), Some(&(t1, k1))) if t1 != t0 => (k1 - k0) / (t1 - t0),
            _ => 0.0,
        }
    }

    /// First trust value within 0.05 above θ, else the minimum trust
    pub fn trust_at_threshold(&self, theta: f64) -> f64 {
        self.trust
            .iter()
            .map(|&(_, h)| h)
            .find(|&h| h <= theta + THRESHOLD_TOLERANCE)
            .unwrap_or_else(|| self.trust.iter().map(|&(_, h)| h).fold(f64::INFINITY, f64::min))
    }

    pub fn validate(&self, theta: f64) -> VelocityValidation {
        let lambda = self.society.lambda();
        let phi = self.phi();
        let trust_at_threshold = self.trust_at_threshold(theta);
        let predicted = collapse_velocity(trust_at_threshold, theta, lambda, phi);
        let observed = self.observed_velocity();

        let accuracy = if observed != 0.0 {
            (1.0 - (predicted - observed).abs() / observed.abs()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        log::debug!(
            "{}: predicted v_c={:.4}, observed {:.4}, accuracy {:.2}",
            self.name,
            predicted,
            observed,
            accuracy
        );

        VelocityValidation {
            case: self.name.clone(),
            lambda,
            phi,
            trust_at_threshold,
            predicted_velocity: predicted,
            observed_velocity: observed,
            accuracy,
        }
    }
}

/// Validate every case at [`VELOCITY_THRESHOLD`]
pub fn validate_cases(cases: &[VelocityCase]) -> Vec<VelocityValidation> {
    cases.iter().map(|c| c.validate(VELOCITY_THRESHOLD)).collect()
}
