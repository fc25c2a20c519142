//! Rolling-window and summary statistics
//!
//! Rolling outputs follow one convention: `None` until the window is full, and
//! `None` whenever any input inside the window is missing or non-finite.

use ordered_float::OrderedFloat;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator); 0 for fewer than two values
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Population standard deviation (n denominator)
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Quantile with linear interpolation between closest ranks
///
/// `q` is in [0, 1]. Non-finite values are ignored; `None` if nothing is left.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by_key(|v| OrderedFloat(*v));
    Some(quantile_sorted(&sorted, q))
}

/// Linear-interpolated quantile of an already sorted, non-empty slice
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Shift a series forward by `periods`, so `out[t] = values[t - periods]`
pub fn lag(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= periods { values[i - periods] } else { None })
        .collect()
}

/// Rolling mean over the trailing `period` observations (inclusive of t)
pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_apply(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling sample standard deviation over the trailing `period` observations
pub fn rolling_std(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_apply(values, period, std_dev)
}

/// Rolling linear-interpolated quantile over the trailing `period` observations
pub fn rolling_quantile(values: &[Option<f64>], period: usize, q: f64) -> Vec<Option<f64>> {
    rolling_apply(values, period, |w| {
        let mut sorted = w.to_vec();
        sorted.sort_by_key(|v| OrderedFloat(*v));
        quantile_sorted(&sorted, q)
    })
}

fn rolling_apply<F>(values: &[Option<f64>], period: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut result = Vec::with_capacity(values.len());
    let mut window: Vec<f64> = Vec::with_capacity(period);

    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            result.push(None);
            continue;
        }
        window.clear();
        let complete = values[i + 1 - period..=i].iter().all(|v| match v {
            Some(x) if x.is_finite() => {
                window.push(*x);
                true
            }
            _ => false,
        });
        result.push(if complete { Some(f(&window)) } else { None });
    }

    result
}

/// Compounded equity curve `Π (1 + r)`, implicitly starting from 1.0
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

/// Drop non-finite values, keeping order
pub fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Wrap a dense series as the optional form used by the rolling helpers
pub fn to_optional(values: &[f64]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|&v| if v.is_finite() { Some(v) } else { None })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&v, 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile(&v, 0.05).unwrap(), 1.2);
        assert_relative_eq!(quantile(&v, 1.0).unwrap(), 5.0);
        assert!(quantile(&[f64::NAN], 0.5).is_none());
    }

    #[test]
    fn test_std_dev_sample() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(population_std(&v), 2.0);
        assert_relative_eq!(std_dev(&v), (32.0_f64 / 7.0).sqrt());
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_rolling_std_warmup_and_gaps() {
        let v = to_optional(&[1.0, 2.0, 3.0, f64::NAN, 5.0, 6.0, 7.0]);
        let out = rolling_std(&v, 3);
        assert!(out[0].is_none() && out[1].is_none());
        assert_relative_eq!(out[2].unwrap(), 1.0);
        // window touching the gap stays empty
        assert!(out[3].is_none() && out[4].is_none() && out[5].is_none());
        assert_relative_eq!(out[6].unwrap(), 1.0);
    }

    #[test]
    fn test_lag_shifts_forward() {
        let v = vec![Some(1.0), Some(2.0), Some(3.0)];
        assert_eq!(lag(&v, 1), vec![None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_equity_curve_compounds() {
        let eq = equity_curve(&[0.1, -0.5]);
        assert_relative_eq!(eq[0], 1.1);
        assert_relative_eq!(eq[1], 0.55);
    }

    #[test]
    fn test_rolling_quantile_matches_static() {
        let raw: Vec<f64> = (1..=10).map(f64::from).collect();
        let out = rolling_quantile(&to_optional(&raw), 5, 0.33);
        assert_relative_eq!(out[9].unwrap(), quantile(&raw[5..], 0.33).unwrap());
    }
}
