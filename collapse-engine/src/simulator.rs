//! Cascade simulation: trajectories, shock injection and threshold sweeps.

use crate::dynamics::CascadeDynamics;
use crate::error::{CollapseError, Result};
use crate::harmony::{
    clamp_state, k_index, k_series, HarmonyMatrix, HarmonyState, STATE_CEILING, STATE_FLOOR,
};
use crate::integrator::{solve, IntegrationMethod, IntegrationStatus, SolverOptions};
use crate::params::CascadeParameters;
use nalgebra::{Dyn, U7};
use serde::{Deserialize, Serialize};

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::prelude::*;

/// Default shock window length
pub const DEFAULT_SHOCK_DURATION: f64 = 10.0;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Integration scheme
    pub method: IntegrationMethod,
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Accepted-step budget per integration
    pub max_steps: usize,
    /// Span of each threshold-sweep simulation, starting at t = 0
    pub sweep_horizon: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let solver = SolverOptions::default();
        Self {
            method: IntegrationMethod::default(),
            rtol: solver.rtol,
            atol: solver.atol,
            max_steps: solver.max_steps,
            sweep_horizon: 100.0,
        }
    }
}

impl SimulatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(CollapseError::ConfigError(
                "tolerances must be positive".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(CollapseError::ConfigError("max_steps must be positive".into()));
        }
        if !(self.sweep_horizon.is_finite() && self.sweep_horizon > 0.0) {
            return Err(CollapseError::ConfigError(
                "sweep_horizon must be positive".into(),
            ));
        }
        Ok(())
    }

    fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            rtol: self.rtol,
            atol: self.atol,
            max_steps: self.max_steps,
        }
    }
}

/// A simulated trajectory with states clipped to [0.01, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub time: Vec<f64>,
    /// 7 × M, one column per time point
    pub states: HarmonyMatrix,
    /// K-index per time point
    pub k: Vec<f64>,
    pub status: IntegrationStatus,
}

impl Trajectory {
    /// Clips raw integrator states into a trajectory
    fn from_raw(time: Vec<f64>, raw: &[HarmonyState], status: IntegrationStatus) -> Self {
        let states = HarmonyMatrix::from_fn_generic(U7, Dyn(raw.len()), |r, c| {
            raw[c][r].clamp(STATE_FLOOR, STATE_CEILING)
        });
        let k = k_series(&states);
        Self { time, states, k, status }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn final_state(&self) -> Option<HarmonyState> {
        let n = self.states.ncols();
        (n > 0).then(|| self.states.column(n - 1).into_owned())
    }

    pub fn final_k(&self) -> Option<f64> {
        self.k.last().copied()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A temporary change of the external shock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShockWindow {
    pub onset: f64,
    pub magnitude: f64,
    #[serde(default = "default_shock_duration")]
    pub duration: f64,
}

fn default_shock_duration() -> f64 {
    DEFAULT_SHOCK_DURATION
}

impl ShockWindow {
    pub fn new(onset: f64, magnitude: f64) -> Self {
        Self {
            onset,
            magnitude,
            duration: DEFAULT_SHOCK_DURATION,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }
}

/// One point of a shock sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSample {
    pub shock: f64,
    pub final_k: f64,
    pub collapsed: bool,
    pub status: IntegrationStatus,
}

/// Integrates the cascade dynamics for a fixed parameter set.
///
/// All methods take `&self`; shock magnitudes are passed to the dynamics
/// directly, so one simulator can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct CascadeSimulator {
    params: CascadeParameters,
    config: SimulatorConfig,
}

impl CascadeSimulator {
    pub fn new(params: CascadeParameters) -> Self {
        Self::with_config(params, SimulatorConfig::default())
    }

    pub fn with_config(params: CascadeParameters, config: SimulatorConfig) -> Self {
        Self { params, config }
    }

    pub fn params(&self) -> &CascadeParameters {
        &self.params
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn integrate(
        &self,
        h0: &HarmonyState,
        t_span: (f64, f64),
        t_eval: Option<&[f64]>,
        method: IntegrationMethod,
        shock: f64,
    ) -> Result<(Vec<f64>, Vec<HarmonyState>, IntegrationStatus)> {
        let field = CascadeDynamics::new(&self.params, shock);
        let sol = solve(&field, t_span, h0, t_eval, method, &self.config.solver_options())?;
        Ok((sol.t, sol.y, sol.status))
    }

    /// Integrate from `h0` over `t_span` under the baseline shock.
    ///
    /// If the integrator gives up, the trajectory up to that point is
    /// returned with a non-success `status`.
    pub fn simulate(
        &self,
        h0: &HarmonyState,
        t_span: (f64, f64),
        t_eval: Option<&[f64]>,
        method: IntegrationMethod,
    ) -> Result<Trajectory> {
        let shock = self.params.external_shock;
        let (t, y, status) = self.integrate(h0, t_span, t_eval, method, shock)?;
        Ok(Trajectory::from_raw(t, &y, status))
    }

    /// Simulate with the shock raised to `shock.magnitude` over
    /// `[onset, onset + duration]`.
    ///
    /// Runs three segments, each starting from the previous segment's final
    /// (unclipped) state; the shared boundary points appear once. The shock
    /// window is truncated at the end of the span.
    pub fn simulate_with_shock(
        &self,
        h0: &HarmonyState,
        t_span: (f64, f64),
        shock: ShockWindow,
    ) -> Result<Trajectory> {
        let (t0, t_end) = t_span;
        if !(shock.onset.is_finite() && shock.onset >= t0 && shock.onset <= t_end) {
            return Err(CollapseError::InvalidParameter(format!(
                "shock onset {} outside [{}, {}]",
                shock.onset, t0, t_end
            )));
        }
        if !(shock.duration.is_finite() && shock.duration >= 0.0) {
            return Err(CollapseError::InvalidParameter(format!(
                "shock duration must be non-negative, got {}",
                shock.duration
            )));
        }
        if !shock.magnitude.is_finite() {
            return Err(CollapseError::InvalidParameter("shock magnitude must be finite".into()));
        }

        let shock_end = (shock.onset + shock.duration).min(t_end);
        let baseline = self.params.external_shock;
        let segments = [
            (t0, shock.onset, baseline),
            (shock.onset, shock_end, shock.magnitude),
            (shock_end, t_end, baseline),
        ];

        let method = self.config.method;
        let mut time = Vec::new();
        let mut columns = Vec::new();
        let mut state = *h0;
        let mut status = IntegrationStatus::Success;

        for (i, &(start, end, magnitude)) in segments.iter().enumerate() {
            let (t, y, seg_status) = self.integrate(&state, (start, end), None, method, magnitude)?;
            let skip = usize::from(i > 0);
            time.extend(t.into_iter().skip(skip));
            columns.extend(y.iter().skip(skip).copied());
            if let Some(last) = y.last() {
                state = *last;
            }
            if !seg_status.is_success() {
                status = seg_status;
                break;
            }
        }

        log::debug!(
            "shock {:.3} over [{}, {}]: {} points",
            shock.magnitude,
            shock.onset,
            shock_end,
            time.len()
        );

        Ok(Trajectory::from_raw(time, &columns, status))
    }

    /// Sweep the shock magnitude linearly over `shock_range` and classify
    /// each run by whether its final K falls below `k_threshold`.
    ///
    /// Each sample integrates over `(0, sweep_horizon)`. Samples are
    /// returned in sweep order.
    pub fn find_collapse_threshold(
        &self,
        h0: &HarmonyState,
        shock_range: (f64, f64),
        n_samples: usize,
        k_threshold: f64,
    ) -> Result<Vec<ThresholdSample>> {
        if n_samples == 0 {
            return Err(CollapseError::InvalidParameter(
                "n_samples must be positive".into(),
            ));
        }
        let (lo, hi) = shock_range;
        if !(lo.is_finite() && hi.is_finite()) {
            return Err(CollapseError::InvalidParameter("shock range must be finite".into()));
        }

        let shocks = linspace(lo, hi, n_samples);
        let horizon = (0.0, self.config.sweep_horizon);
        let method = self.config.method;

        let run = |&shock: &f64| -> Result<ThresholdSample> {
            let (_, y, status) = self.integrate(h0, horizon, None, method, shock)?;
            let last = y.last().copied().unwrap_or(*h0);
            let final_k = k_index(&clamp_state(&last));
            Ok(ThresholdSample {
                shock,
                final_k,
                collapsed: final_k < k_threshold,
                status,
            })
        };

        #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
        let samples: Result<Vec<_>> = shocks.par_iter().map(run).collect();
        #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
        let samples: Result<Vec<_>> = shocks.iter().map(run).collect();
        let samples = samples?;

        log::debug!(
            "collapse sweep over [{}, {}]: {}/{} samples collapsed",
            lo,
            hi,
            samples.iter().filter(|s| s.collapsed).count(),
            samples.len()
        );

        Ok(samples)
    }

    /// Smallest swept shock that collapses the system, if any
    pub fn critical_shock(samples: &[ThresholdSample]) -> Option<f64> {
        samples.iter().find(|s| s.collapsed).map(|s| s.shock)
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
        .collect()
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
    fn test_states_within_bounds() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let extreme = harmony_state(&[1.0, 0.01, 0.05, 1.0, 0.02, 0.9, 0.01]).unwrap();
        let traj = sim
            .simulate(&extreme, (0.0, 80.0), None, IntegrationMethod::Rk45)
            .unwrap();
        assert!(traj
            .states
            .iter()
            .all(|&v| (STATE_FLOOR..=STATE_CEILING).contains(&v)));
    }

    #[test]
    fn test_k_is_geometric_mean() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let traj = sim
            .simulate(&stable(), (0.0, 40.0), None, IntegrationMethod::Rk45)
            .unwrap();
        assert_eq!(traj.k.len(), traj.states.ncols());
        for (c, k) in traj.states.column_iter().zip(traj.k.iter()) {
            let expected = c.iter().product::<f64>().powf(1.0 / 7.0);
            assert_abs_diff_eq!(*k, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_eval_times_respected() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let te: Vec<f64> = (0..=20).map(|i| i as f64).collect();
        let traj = sim
            .simulate(&stable(), (0.0, 20.0), Some(&te), IntegrationMethod::Rk23)
            .unwrap();
        assert_eq!(traj.time, te);
        assert_eq!(traj.states.ncols(), 21);
        assert!(traj.status.is_success());
    }

    #[test]
    fn test_zero_shock_is_no_op() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let plain = sim
            .simulate(&stable(), (0.0, 50.0), None, IntegrationMethod::Rk45)
            .unwrap();
        let shocked = sim
            .simulate_with_shock(&stable(), (0.0, 50.0), ShockWindow::new(10.0, 0.0))
            .unwrap();

        assert_eq!(shocked.time.first(), Some(&0.0));
        assert_eq!(shocked.time.last(), Some(&50.0));
        let a = plain.final_state().unwrap();
        let b = shocked.final_state().unwrap();
        for i in 0..7 {
            assert_abs_diff_eq!(a[i], b[i], epsilon = 5e-3);
        }
    }

    #[test]
    fn test_shock_times_strictly_increasing() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let window = ShockWindow::new(20.0, 0.8).with_duration(15.0);
        let traj = sim
            .simulate_with_shock(&stable(), (0.0, 60.0), window)
            .unwrap();
        assert!(traj.time.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(traj.time.len(), traj.k.len());
    }

    #[test]
    fn test_shock_lowers_trust() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let plain = sim
            .simulate(&stable(), (0.0, 30.0), None, IntegrationMethod::Rk45)
            .unwrap();
        let window = ShockWindow::new(5.0, 1.0).with_duration(25.0);
        let shocked = sim
            .simulate_with_shock(&stable(), (0.0, 30.0), window)
            .unwrap();
        assert!(shocked.final_state().unwrap()[2] < plain.final_state().unwrap()[2]);
    }

    #[test]
    fn test_shock_window_truncated_at_span_end() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let window = ShockWindow::new(15.0, 0.5).with_duration(50.0);
        let traj = sim
            .simulate_with_shock(&stable(), (0.0, 20.0), window)
            .unwrap();
        assert_eq!(traj.time.last(), Some(&20.0));
    }

    #[test]
    fn test_shock_onset_validated() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let negative = ShockWindow::new(5.0, 0.5).with_duration(-1.0);
        assert!(matches!(
            sim.simulate_with_shock(&stable(), (0.0, 20.0), ShockWindow::new(25.0, 0.5)),
            Err(CollapseError::InvalidParameter(_))
        ));
        assert!(matches!(
            sim.simulate_with_shock(&stable(), (0.0, 20.0), negative),
            Err(CollapseError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_params_untouched() {
        let params = CascadeParameters::default().with_external_shock(0.05);
        let sim = CascadeSimulator::new(params.clone());
        sim.simulate_with_shock(&stable(), (0.0, 30.0), ShockWindow::new(5.0, 0.9))
            .unwrap();
        sim.find_collapse_threshold(&stable(), (0.0, 1.0), 3, 0.3).unwrap();
        assert_eq!(sim.params(), &params);
    }

    #[test]
    fn test_sweep_order_and_classification() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        let samples = sim
            .find_collapse_threshold(&stable(), (0.0, 2.0), 5, 0.3)
            .unwrap();

        let shocks: Vec<f64> = samples.iter().map(|s| s.shock).collect();
        assert_eq!(shocks, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        for s in &samples {
            assert_eq!(s.collapsed, s.final_k < 0.3);
        }
        assert!(samples[4].final_k <= samples[0].final_k);
    }

    #[test]
    fn test_sweep_matches_direct_simulation() {
        let params = CascadeParameters::default();
        let sim = CascadeSimulator::new(params.clone());
        let samples = sim.find_collapse_threshold(&stable(), (0.4, 0.4), 1, 0.3).unwrap();

        let direct = CascadeSimulator::new(params.with_external_shock(0.4))
            .simulate(&stable(), (0.0, 100.0), None, IntegrationMethod::Rk45)
            .unwrap();
        assert_abs_diff_eq!(samples[0].final_k, direct.final_k().unwrap(), epsilon = 1e-12);
        assert_abs_diff_eq!(
            direct.final_k().unwrap(),
            k_index(&direct.final_state().unwrap()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_samples_rejected() {
        let sim = CascadeSimulator::new(CascadeParameters::default());
        assert!(sim.find_collapse_threshold(&stable(), (0.0, 1.0), 0, 0.3).is_err());
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_config_from_json() {
        let config = SimulatorConfig::from_json(r#"{"method": "RK23", "rtol": 1e-6}"#).unwrap();
        assert_eq!(config.method, IntegrationMethod::Rk23);
        assert_eq!(config.rtol, 1e-6);
        assert_eq!(config.max_steps, 100_000);
        assert!(SimulatorConfig::from_json(r#"{"sweep_horizon": -1}"#).is_err());
    }
}
