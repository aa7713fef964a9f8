//! Resampling of window-indexed statistics onto the full sample axis.
//!
//! Window statistics live at window-centre indices; the stress index needs
//! a value at every original sample. Values are linearly interpolated
//! between knots and held flat beyond the first and last knot. An undefined
//! knot leaves every interval it bounds undefined.

/// Linearly interpolate `values` (at increasing `knots`) onto `0..len`.
///
/// A sample that lands exactly on a knot takes that knot's value. A sample
/// strictly between two knots is `None` when either knot is `None`.
pub fn resample_linear(knots: &[usize], values: &[Option<f64>], len: usize) -> Vec<Option<f64>> {
    let points: Vec<(f64, Option<f64>)> = knots
        .iter()
        .zip(values.iter())
        .map(|(&k, &v)| (k as f64, v))
        .collect();

    if points.is_empty() {
        return vec![None; len];
    }

    let mut out = Vec::with_capacity(len);
    let mut seg = 0;
    for i in 0..len {
        let x = i as f64;
        while seg + 1 < points.len() && points[seg + 1].0 <= x {
            seg += 1;
        }
        out.push(interpolate_at(&points, seg, x));
    }
    out
}

/// Same as [`resample_linear`] for series without gaps.
pub fn resample_dense(knots: &[usize], values: &[f64], len: usize) -> Vec<f64> {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    resample_linear(knots, &wrapped, len)
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect()
}

fn interpolate_at(points: &[(f64, Option<f64>)], seg: usize, x: f64) -> Option<f64> {
    let (x0, y0) = points[seg];
    if x <= x0 {
        return y0;
    }
    match points.get(seg + 1) {
        Some(&(x1, y1)) => {
            let (y0, y1) = (y0?, y1?);
            Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
        }
        None => y0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_interpolates_between_knots() {
        let out = resample_dense(&[2, 4], &[1.0, 3.0], 7);
        let expected = [1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exact_at_knots() {
        let out = resample_dense(&[1, 3, 5], &[0.2, 0.8, 0.4], 6);
        assert_abs_diff_eq!(out[1], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(out[3], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(out[5], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(out[4], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_undefined_knot_spreads_to_its_intervals() {
        let out = resample_linear(&[1, 3, 5, 7], &[Some(0.0), None, Some(1.0), Some(2.0)], 9);
        assert_eq!(out[0], Some(0.0));
        assert_eq!(out[1], Some(0.0));
        // (1, 3) and (3, 5) both touch the undefined knot
        assert!(out[2..5].iter().all(Option::is_none));
        assert_eq!(out[5], Some(1.0));
        assert_abs_diff_eq!(out[6].unwrap(), 1.5, epsilon = 1e-12);
        assert_eq!(out[8], Some(2.0));
    }

    #[test]
    fn test_undefined_end_knot_not_extended() {
        let out = resample_linear(&[2, 4], &[Some(0.4), None], 7);
        assert_eq!(out[..3], [Some(0.4); 3]);
        assert!(out[3..].iter().all(Option::is_none));
    }

    #[test]
    fn test_all_undefined_stays_undefined() {
        let out = resample_linear(&[0, 1], &[None, None], 4);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn test_single_knot_is_flat() {
        let out = resample_dense(&[3], &[0.7], 5);
        assert!(out.iter().all(|&v| (v - 0.7).abs() < 1e-12));
    }
}
