//! Adaptive explicit Runge-Kutta integration.
//!
//! Embedded pairs with error control:
//! - `RK45`: Dormand–Prince 5(4)
//! - `RK23`: Bogacki–Shampine 3(2)
//!
//! Step-size control, initial step selection and tolerances follow the
//! usual scientific-computing defaults (rtol 1e-3, atol 1e-6, safety 0.9,
//! step factor clamped to [0.2, 10]). When evaluation times are requested
//! the solution between accepted steps is recovered by cubic Hermite
//! interpolation.
//!
//! Failure to converge is not an error: the trajectory computed so far is
//! returned together with a non-success [`IntegrationStatus`].

use crate::dynamics::VectorField;
use crate::error::{CollapseError, Result};
use crate::harmony::{HarmonyState, N_HARMONIES};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Integration scheme selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Dormand–Prince 5(4)
    #[default]
    #[serde(rename = "RK45")]
    Rk45,
    /// Bogacki–Shampine 3(2)
    #[serde(rename = "RK23")]
    Rk23,
}

impl IntegrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationMethod::Rk45 => "RK45",
            IntegrationMethod::Rk23 => "RK23",
        }
    }

    fn tableau(&self) -> &'static Tableau {
        match self {
            IntegrationMethod::Rk45 => &DORMAND_PRINCE,
            IntegrationMethod::Rk23 => &BOGACKI_SHAMPINE,
        }
    }
}

impl FromStr for IntegrationMethod {
    type Err = CollapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RK45" => Ok(IntegrationMethod::Rk45),
            "RK23" => Ok(IntegrationMethod::Rk23),
            other => Err(CollapseError::ConfigError(format!(
                "Unsupported integration method: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an integration run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationStatus {
    /// Reached the end of the span
    Success,
    /// Required step fell below floating-point resolution
    StepSizeTooSmall,
    /// Step budget exhausted before the end of the span
    MaxStepsExceeded,
}

impl IntegrationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, IntegrationStatus::Success)
    }
}

/// Error-control settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_steps: 100_000,
        }
    }
}

/// Raw integrator output (unclamped states)
#[derive(Debug, Clone)]
pub struct Solution {
    pub t: Vec<f64>,
    pub y: Vec<HarmonyState>,
    pub status: IntegrationStatus,
    pub n_steps: usize,
    pub n_evaluations: usize,
}

struct Tableau {
    c: &'static [f64],
    a: &'static [&'static [f64]],
    b: &'static [f64],
    /// Error weights over all stages including the FSAL stage
    e: &'static [f64],
    error_order: i32,
}

static DORMAND_PRINCE: Tableau = Tableau {
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
    ],
    b: &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
    e: &[
        -71.0 / 57600.0,
        0.0,
        71.0 / 16695.0,
        -71.0 / 1920.0,
        17253.0 / 339200.0,
        -22.0 / 525.0,
        1.0 / 40.0,
    ],
    error_order: 4,
};

static BOGACKI_SHAMPINE: Tableau = Tableau {
    c: &[0.0, 1.0 / 2.0, 3.0 / 4.0],
    a: &[&[], &[1.0 / 2.0], &[0.0, 3.0 / 4.0]],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
    e: &[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0],
    error_order: 2,
};

#[inline]
fn rms(v: &HarmonyState) -> f64 {
    (v.iter().map(|x| x * x).sum::<f64>() / N_HARMONIES as f64).sqrt()
}

fn scaled_rms(v: &HarmonyState, scale: &HarmonyState) -> f64 {
    rms(&v.component_div(scale))
}

// Smallest step distinguishable from t.
#[inline]
fn min_step_at(t: f64) -> f64 {
    (10.0 * f64::EPSILON * t.abs()).max(f64::MIN_POSITIVE)
}

struct Stepper<'f, F: VectorField> {
    field: &'f F,
    tableau: &'static Tableau,
    options: SolverOptions,
    n_evaluations: usize,
}

impl<'f, F: VectorField> Stepper<'f, F> {
    fn eval(&mut self, t: f64, y: &HarmonyState) -> HarmonyState {
        self.n_evaluations += 1;
        self.field.derivative(t, y)
    }

    fn scale(&self, y: &HarmonyState, y_new: &HarmonyState) -> HarmonyState {
        y.zip_map(y_new, |a, b| self.options.atol + a.abs().max(b.abs()) * self.options.rtol)
    }

    fn initial_step(&mut self, t0: f64, y0: &HarmonyState, f0: &HarmonyState, span: f64) -> f64 {
        let scale = y0.map(|y| self.options.atol + y.abs() * self.options.rtol);
        let d0 = scaled_rms(y0, &scale);
        let d1 = scaled_rms(f0, &scale);

        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(span);

        let y1 = y0 + f0 * h0;
        let f1 = self.eval(t0 + h0, &y1);
        let d2 = scaled_rms(&(f1 - f0), &scale) / h0;

        let order = self.tableau.error_order as f64;
        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / (order + 1.0))
        };

        (100.0 * h0).min(h1).min(span)
    }

    /// One trial step. Returns (y_new, f_new, error estimate).
    fn step(
        &mut self,
        t: f64,
        y: &HarmonyState,
        f: &HarmonyState,
        h: f64,
    ) -> (HarmonyState, HarmonyState, HarmonyState) {
        let tab = self.tableau;
        let n_stages = tab.b.len();
        let mut k: Vec<HarmonyState> = Vec::with_capacity(n_stages + 1);
        k.push(*f);

        for s in 1..n_stages {
            let mut dy = HarmonyState::zeros();
            for (j, a) in tab.a[s].iter().enumerate() {
                dy += k[j] * *a;
            }
            let ks = self.eval(t + tab.c[s] * h, &(y + dy * h));
            k.push(ks);
        }

        let mut incr = HarmonyState::zeros();
        for (kj, b) in k.iter().zip(tab.b.iter()) {
            incr += kj * *b;
        }
        let y_new = y + incr * h;
        let f_new = self.eval(t + h, &y_new);
        k.push(f_new);

        let mut err = HarmonyState::zeros();
        for (kj, e) in k.iter().zip(tab.e.iter()) {
            err += kj * *e;
        }
        (y_new, f_new, err * h)
    }
}

/// Cubic Hermite interpolant on [t0, t0 + h]
fn hermite(
    t0: f64,
    h: f64,
    y0: &HarmonyState,
    f0: &HarmonyState,
    y1: &HarmonyState,
    f1: &HarmonyState,
    t: f64,
) -> HarmonyState {
    let s = (t - t0) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    y0 * h00 + f0 * (h10 * h) + y1 * h01 + f1 * (h11 * h)
}

fn check_span(t_span: (f64, f64)) -> Result<()> {
    let (start, end) = t_span;
    if !start.is_finite() || !end.is_finite() || end < start {
        return Err(CollapseError::InvalidTimeSpan { start, end });
    }
    Ok(())
}

fn check_eval_times(t_eval: &[f64], t_span: (f64, f64)) -> Result<()> {
    if t_eval.windows(2).any(|w| w[1] < w[0]) {
        return Err(CollapseError::InvalidTimeAxis(
            "evaluation times must be sorted".into(),
        ));
    }
    if t_eval
        .iter()
        .any(|&t| !t.is_finite() || t < t_span.0 || t > t_span.1)
    {
        return Err(CollapseError::InvalidTimeAxis(format!(
            "evaluation times must lie within [{}, {}]",
            t_span.0, t_span.1
        )));
    }
    Ok(())
}

/// Integrate `field` from `y0` over `t_span`.
///
/// Without `t_eval` every accepted step is reported (including the initial
/// point); with `t_eval` exactly those times are reported, as far as the
/// integration got.
pub fn solve<F: VectorField>(
    field: &F,
    t_span: (f64, f64),
    y0: &HarmonyState,
    t_eval: Option<&[f64]>,
    method: IntegrationMethod,
    options: &SolverOptions,
) -> Result<Solution> {
    check_span(t_span)?;
    if let Some(te) = t_eval {
        check_eval_times(te, t_span)?;
    }
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(CollapseError::InvalidParameter(
            "initial state must be finite".into(),
        ));
    }

    let (t0, t1) = t_span;
    let mut stepper = Stepper {
        field,
        tableau: method.tableau(),
        options: *options,
        n_evaluations: 0,
    };

    let mut out_t = Vec::new();
    let mut out_y = Vec::new();
    let mut next_eval = 0;

    match t_eval {
        None => {
            out_t.push(t0);
            out_y.push(*y0);
        }
        Some(te) => {
            while next_eval < te.len() && te[next_eval] <= t0 {
                out_t.push(te[next_eval]);
                out_y.push(*y0);
                next_eval += 1;
            }
        }
    }

    let mut t = t0;
    let mut y = *y0;
    let mut f = stepper.eval(t, &y);
    let mut n_steps = 0;
    let mut status = IntegrationStatus::Success;

    let exponent = -1.0 / (stepper.tableau.error_order as f64 + 1.0);
    let mut h_abs = if t1 > t0 {
        stepper.initial_step(t0, &y, &f, t1 - t0)
    } else {
        0.0
    };

    'outer: while t < t1 {
        if n_steps >= options.max_steps {
            status = IntegrationStatus::MaxStepsExceeded;
            break;
        }

        let min_step = min_step_at(t);
        let mut step_rejected = false;

        let (t_new, y_new, f_new) = loop {
            if h_abs < min_step {
                status = IntegrationStatus::StepSizeTooSmall;
                break 'outer;
            }

            let t_new = (t + h_abs).min(t1);
            let h = t_new - t;
            let (y_new, f_new, err) = stepper.step(t, &y, &f, h);
            let error_norm = scaled_rms(&err, &stepper.scale(&y, &y_new));

            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * error_norm.powf(exponent)).min(MAX_FACTOR)
                };
                if step_rejected {
                    factor = factor.min(1.0);
                }
                h_abs = h * factor;
                break (t_new, y_new, f_new);
            }

            h_abs = h * (SAFETY * error_norm.powf(exponent)).max(MIN_FACTOR);
            step_rejected = true;
        };

        match t_eval {
            None => {
                out_t.push(t_new);
                out_y.push(y_new);
            }
            Some(te) => {
                while next_eval < te.len() && te[next_eval] <= t_new {
                    let at = te[next_eval];
                    out_t.push(at);
                    out_y.push(hermite(t, t_new - t, &y, &f, &y_new, &f_new, at));
                    next_eval += 1;
                }
            }
        }

        t = t_new;
        y = y_new;
        f = f_new;
        n_steps += 1;
    }

    if !status.is_success() {
        log::warn!(
            "{} integration stopped at t={:.4} of {:.4}: {:?}",
            method,
            t,
            t1,
            status
        );
    }
    log::debug!(
        "{} integration over ({}, {}): {} steps, {} evaluations",
        method,
        t0,
        t1,
        n_steps,
        stepper.n_evaluations
    );

    Ok(Solution {
        t: out_t,
        y: out_y,
        status,
        n_steps,
        n_evaluations: stepper.n_evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// dy/dt = -y, exact solution y0·e^{-t}
    struct Decay;

    impl VectorField for Decay {
        fn derivative(&self, _t: f64, h: &HarmonyState) -> HarmonyState {
            -h
        }
    }

    /// Blows up in finite time: dy/dt = y²
    struct Blowup;

    impl VectorField for Blowup {
        fn derivative(&self, _t: f64, h: &HarmonyState) -> HarmonyState {
            h.component_mul(h)
        }
    }

    fn solve_default<F: VectorField>(
        field: &F,
        t_span: (f64, f64),
        y0: &HarmonyState,
        t_eval: Option<&[f64]>,
        method: IntegrationMethod,
    ) -> crate::Result<Solution> {
        solve(field, t_span, y0, t_eval, method, &SolverOptions::default())
    }

    #[test]
    fn test_exponential_decay_rk45() {
        let y0 = HarmonyState::repeat(1.0);
        let sol = solve_default(&Decay, (0.0, 2.0), &y0, None, IntegrationMethod::Rk45).unwrap();
        assert!(sol.status.is_success());
        assert_eq!(sol.t[0], 0.0);
        assert_eq!(*sol.t.last().unwrap(), 2.0);
        let y_end = sol.y.last().unwrap();
        assert_abs_diff_eq!(y_end[0], (-2.0f64).exp(), epsilon = 1e-3);
    }

    #[test]
    fn test_exponential_decay_rk23() {
        let y0 = HarmonyState::repeat(0.5);
        let sol = solve_default(&Decay, (0.0, 1.0), &y0, None, IntegrationMethod::Rk23).unwrap();
        assert!(sol.status.is_success());
        assert_abs_diff_eq!(sol.y.last().unwrap()[3], 0.5 * (-1.0f64).exp(), epsilon = 1e-3);
    }

    #[test]
    fn test_eval_times_reported_exactly() {
        let y0 = HarmonyState::repeat(1.0);
        let te: Vec<f64> = (0..=10).map(|i| i as f64 * 0.3).collect();
        let sol =
            solve_default(&Decay, (0.0, 3.0), &y0, Some(&te), IntegrationMethod::Rk45).unwrap();
        assert_eq!(sol.t, te);
        for (t, y) in sol.t.iter().zip(sol.y.iter()) {
            assert_abs_diff_eq!(y[0], (-t).exp(), epsilon = 2e-3);
        }
    }

    #[test]
    fn test_zero_length_span() {
        let y0 = HarmonyState::repeat(0.4);
        let sol = solve_default(&Decay, (5.0, 5.0), &y0, None, IntegrationMethod::Rk45).unwrap();
        assert_eq!(sol.t, vec![5.0]);
        assert_eq!(sol.n_steps, 0);
    }

    #[test]
    fn test_backwards_span_rejected() {
        let y0 = HarmonyState::repeat(0.4);
        assert!(matches!(
            solve_default(&Decay, (1.0, 0.0), &y0, None, IntegrationMethod::Rk45),
            Err(CollapseError::InvalidTimeSpan { .. })
        ));
    }

    #[test]
    fn test_eval_times_outside_span_rejected() {
        let y0 = HarmonyState::repeat(0.4);
        assert!(matches!(
            solve_default(&Decay, (0.0, 1.0), &y0, Some(&[0.5, 2.0]), IntegrationMethod::Rk45),
            Err(CollapseError::InvalidTimeAxis(_))
        ));
    }

    #[test]
    fn test_step_budget_reports_partial_trajectory() {
        let y0 = HarmonyState::repeat(1.0);
        let options = SolverOptions {
            max_steps: 3,
            ..Default::default()
        };
        let sol =
            solve(&Decay, (0.0, 100.0), &y0, None, IntegrationMethod::Rk45, &options).unwrap();
        assert_eq!(sol.status, IntegrationStatus::MaxStepsExceeded);
        assert_eq!(sol.t.len(), 4);
        assert!(*sol.t.last().unwrap() < 100.0);
    }

    #[test]
    fn test_finite_time_blowup_flagged() {
        let y0 = HarmonyState::repeat(1.0);
        let sol = solve_default(&Blowup, (0.0, 2.0), &y0, None, IntegrationMethod::Rk45).unwrap();
        assert!(!sol.status.is_success());
        assert!(*sol.t.last().unwrap() < 1.0 + 1e-6);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("rk45".parse::<IntegrationMethod>().unwrap(), IntegrationMethod::Rk45);
        assert_eq!("RK23".parse::<IntegrationMethod>().unwrap(), IntegrationMethod::Rk23);
        assert!("LSODA".parse::<IntegrationMethod>().is_err());
    }
}
