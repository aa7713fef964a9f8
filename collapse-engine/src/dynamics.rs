//! Coupled harmony dynamics.
//!
//! Each harmony relaxes toward 1 at its decay rate and is driven by the
//! harmonies upstream of it in the causal ordering:
//!
//! ```text
//! dH3/dt = α₃(H1·H2 − S*)          − γ₃·shock   − δ₃(1 − H3)
//! dH1/dt = α₁(H3 − θ₁)             + β₁·H4      − δ₁(1 − H1)
//! dH2/dt = α₂(H3 − θ₂)(H1/H1_ref)  + β₂·H4·H7   − δ₂(1 − H2)
//! dH4/dt = α₄(H1·H2/θ₄ − 1)        + β₄·H5·H7   − δ₄(1 − H4)
//! dH5/dt = α₅(H4 − θ₅)             + β₅·H1      − δ₅(1 − H5)
//! dH6/dt = α₆(H2·H4/θ₆ − 1)        + β₆·H7      − δ₆(1 − H6)
//! dH7/dt = α₇(H4·H5/θ₇ − 1)        + I          − δ₇(1 − H7)
//! ```
//!
//! The shock magnitude is an argument of the field, not a parameter, so a
//! parameter set can be shared by concurrent simulations.

use crate::harmony::{clamp_state, Harmony, HarmonyState};
use crate::params::CascadeParameters;

/// Right-hand side of an autonomous-or-not ODE over harmony states.
pub trait VectorField {
    fn derivative(&self, t: f64, h: &HarmonyState) -> HarmonyState;
}

/// The cascade dynamics under a fixed external shock.
#[derive(Debug, Clone, Copy)]
pub struct CascadeDynamics<'a> {
    params: &'a CascadeParameters,
    shock: f64,
}

impl<'a> CascadeDynamics<'a> {
    pub fn new(params: &'a CascadeParameters, shock: f64) -> Self {
        Self { params, shock }
    }

    /// Dynamics under the parameter set's baseline shock
    pub fn baseline(params: &'a CascadeParameters) -> Self {
        Self::new(params, params.external_shock)
    }

    pub fn shock(&self) -> f64 {
        self.shock
    }
}

impl VectorField for CascadeDynamics<'_> {
    fn derivative(&self, _t: f64, h: &HarmonyState) -> HarmonyState {
        use Harmony::*;

        let p = self.params;
        let h = clamp_state(h);
        let [h1, h2, h3, h4, h5, h6, h7] = [h[0], h[1], h[2], h[3], h[4], h[5], h[6]];

        let d_trust = p.alpha(Trust) * (h1 * h2 - p.optimal_stressor)
            - p.gamma(Trust) * self.shock
            - p.decay(Trust) * (1.0 - h3);

        let d_governance = p.alpha(Governance) * (h3 - p.theta(Governance))
            + p.beta(Governance) * h4
            - p.decay(Governance) * (1.0 - h1);

        let d_economy = p.alpha(Economy) * (h3 - p.theta(Economy)) * (h1 / p.governance_reference)
            + p.beta(Economy) * h4 * h7
            - p.decay(Economy) * (1.0 - h2);

        let d_complexity = p.alpha(Complexity) * (h1 * h2 / p.theta(Complexity) - 1.0)
            + p.beta(Complexity) * h5 * h7
            - p.decay(Complexity) * (1.0 - h4);

        let d_knowledge = p.alpha(Knowledge) * (h4 - p.theta(Knowledge))
            + p.beta(Knowledge) * h1
            - p.decay(Knowledge) * (1.0 - h5);

        let d_wellbeing = p.alpha(Wellbeing) * (h2 * h4 / p.theta(Wellbeing) - 1.0)
            + p.beta(Wellbeing) * h7
            - p.decay(Wellbeing) * (1.0 - h6);

        // No shock term: technology is the most persistent harmony
        let d_technology = p.alpha(Technology) * (h4 * h5 / p.theta(Technology) - 1.0)
            + p.infrastructure_investment
            - p.decay(Technology) * (1.0 - h7);

        HarmonyState::from([
            d_governance,
            d_economy,
            d_trust,
            d_complexity,
            d_knowledge,
            d_wellbeing,
            d_technology,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::harmony_state;
    use approx::assert_abs_diff_eq;

    fn stable() -> HarmonyState {
        harmony_state(&[0.7, 0.7, 0.6, 0.65, 0.6, 0.65, 0.75]).unwrap()
    }

    #[test]
    fn test_trust_equation() {
        let p = CascadeParameters::default();
        let d = CascadeDynamics::baseline(&p).derivative(0.0, &stable());
        let expected = 0.06 * (0.7 * 0.7 - 0.5) - 0.03 * (1.0 - 0.6);
        assert_abs_diff_eq!(d[2], expected, epsilon = 1e-15);
    }

    #[test]
    fn test_shock_only_moves_trust() {
        let p = CascadeParameters::default();
        let calm = CascadeDynamics::new(&p, 0.0).derivative(0.0, &stable());
        let shocked = CascadeDynamics::new(&p, 0.3).derivative(0.0, &stable());

        let diff = shocked - calm;
        assert_abs_diff_eq!(diff[2], -0.2 * 0.3, epsilon = 1e-15);
        for i in [0, 1, 3, 4, 5, 6] {
            assert_eq!(diff[i], 0.0);
        }
    }

    #[test]
    fn test_inputs_clamped_outputs_not() {
        let p = CascadeParameters::default();
        let f = CascadeDynamics::baseline(&p);
        let wild = harmony_state(&[-3.0, 0.0, 2.0, 0.5, 0.5, 0.5, 0.5]).unwrap();
        let clamped = harmony_state(&[0.01, 0.01, 1.0, 0.5, 0.5, 0.5, 0.5]).unwrap();
        assert_eq!(f.derivative(0.0, &wild), f.derivative(0.0, &clamped));
    }

    #[test]
    fn test_technology_equation() {
        let p = CascadeParameters::default();
        let d = CascadeDynamics::new(&p, 0.5).derivative(0.0, &stable());
        let expected = 0.02 * (0.65 * 0.6 / 0.5 - 1.0) + 0.01 - 0.01 * (1.0 - 0.75);
        assert_abs_diff_eq!(d[6], expected, epsilon = 1e-15);
    }
}
