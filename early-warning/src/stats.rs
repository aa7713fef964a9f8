//! Descriptive statistics over scalar series
//!
//! Moments, lag-1 autocorrelation, linear detrending, finite-difference
//! gradients and Pearson correlation with a two-sided p-value.
//!
//! Statistics that are undefined for degenerate input (constant windows,
//! fewer than three points) return `None` instead of NaN.

use crate::error::{Result, SignalError};

/// Standard deviation below which a series is treated as constant
pub const DEGENERATE_STD: f64 = 1e-10;

/// Arithmetic mean (0.0 for an empty slice)
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        0.0
    } else {
        x.iter().sum::<f64>() / x.len() as f64
    }
}

/// Population variance (divides by n)
pub fn variance(x: &[f64]) -> f64 {
    central_moment(x, 2)
}

/// Population standard deviation
pub fn std_dev(x: &[f64]) -> f64 {
    variance(x).sqrt()
}

fn central_moment(x: &[f64], order: i32) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(order)).sum::<f64>() / x.len() as f64
}

// Second moment too small relative to the mean to divide by.
fn is_degenerate(x: &[f64], m2: f64) -> bool {
    let scale = f64::EPSILON * mean(x).abs();
    m2 <= scale * scale
}

/// Biased sample skewness m3 / m2^1.5
pub fn skewness(x: &[f64]) -> Option<f64> {
    let m2 = central_moment(x, 2);
    if x.is_empty() || is_degenerate(x, m2) {
        return None;
    }
    Some(central_moment(x, 3) / m2.powf(1.5))
}

/// Biased excess kurtosis m4 / m2² − 3
pub fn excess_kurtosis(x: &[f64]) -> Option<f64> {
    let m2 = central_moment(x, 2);
    if x.is_empty() || is_degenerate(x, m2) {
        return None;
    }
    Some(central_moment(x, 4) / (m2 * m2) - 3.0)
}

/// Pearson r, `None` when either side has ~zero spread.
///
/// Callers guarantee equal lengths.
fn pearson_r(x: &[f64], y: &[f64]) -> Option<f64> {
    debug_assert_eq!(x.len(), y.len());
    let (mx, my) = (mean(x), mean(y));

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let n = x.len() as f64;
    if (sxx / n).sqrt() < DEGENERATE_STD || (syy / n).sqrt() < DEGENERATE_STD {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Lag-1 autocorrelation (AR(1) coefficient estimate).
///
/// Correlation between `x[..n-1]` and `x[1..]`. Undefined for fewer than
/// three points or when the lagged series is flat.
pub fn lag1_autocorrelation(x: &[f64]) -> Option<f64> {
    if x.len() < 3 {
        return None;
    }
    let lag = &x[..x.len() - 1];
    let lead = &x[1..];
    if std_dev(lag) < DEGENERATE_STD {
        return None;
    }
    pearson_r(lag, lead)
}

/// Remove the least-squares line fitted against the sample index.
pub fn detrend_linear(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let n_f = n as f64;
    let t_mean = (n_f - 1.0) / 2.0;
    let x_mean = mean(x);

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &v) in x.iter().enumerate() {
        let dt = i as f64 - t_mean;
        num += dt * (v - x_mean);
        den += dt * dt;
    }
    let slope = num / den;

    x.iter()
        .enumerate()
        .map(|(i, &v)| v - (x_mean + slope * (i as f64 - t_mean)))
        .collect()
}

/// Finite-difference gradient with unit sample spacing.
///
/// Central differences in the interior, one-sided at the ends.
pub fn gradient(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    x[1] - x[0]
                } else if i == n - 1 {
                    x[n - 1] - x[n - 2]
                } else {
                    (x[i + 1] - x[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Finite-difference gradient against an explicit, possibly uneven, axis.
///
/// Interior points use the second-order non-uniform stencil; the ends are
/// one-sided first-order differences.
pub fn gradient_with_axis(x: &[f64], axis: &[f64]) -> Result<Vec<f64>> {
    if x.len() != axis.len() {
        return Err(SignalError::LengthMismatch {
            expected: x.len(),
            got: axis.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }

    let mut out = Vec::with_capacity(n);
    out.push((x[1] - x[0]) / (axis[1] - axis[0]));
    for i in 1..n - 1 {
        let hs = axis[i] - axis[i - 1];
        let hd = axis[i + 1] - axis[i];
        let num = hs * hs * x[i + 1] + (hd * hd - hs * hs) * x[i] - hd * hd * x[i - 1];
        out.push(num / (hs * hd * (hd + hs)));
    }
    out.push((x[n - 1] - x[n - 2]) / (axis[n - 1] - axis[n - 2]));
    Ok(out)
}

/// Pearson correlation with its two-sided p-value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Pearson correlation between two equal-length samples.
///
/// Returns `Ok(None)` when either sample is constant. With exactly two
/// points the correlation is ±1 and the p-value is 1.
pub fn correlation(x: &[f64], y: &[f64]) -> Result<Option<Correlation>> {
    if x.len() != y.len() {
        return Err(SignalError::LengthMismatch {
            expected: x.len(),
            got: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(SignalError::SeriesTooShort { min: 1, got: x.len() });
    }

    let n = x.len();
    Ok(pearson_r(x, y).map(|r| {
        let p_value = if n == 2 {
            1.0
        } else {
            let df = (n - 2) as f64;
            // P(|T| > t) for T ~ t(df) reduces to I_{1-r²}(df/2, 1/2)
            regularized_incomplete_beta(df / 2.0, 0.5, 1.0 - r * r)
        };
        Correlation { r, p_value, n }
    }))
}

/// Regularized incomplete beta function I_x(a, b).
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = libm::lgamma(a + b) - libm::lgamma(a) - libm::lgamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // Continued fraction converges fastest on this side of the mode
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-16;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}
