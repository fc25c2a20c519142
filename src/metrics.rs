//! Annualised performance metrics shared by every driver

use crate::indicators;
use crate::types::PerformanceMetrics;

pub const TRADING_DAYS: f64 = 252.0;

/// Guard added to volatility in the Sharpe denominator
const SHARPE_EPS: f64 = 1e-8;

/// Metrics from a return series and its equity curve
///
/// `equity` must be the compounded curve of `returns` (same length). Empty
/// input yields all-zero metrics.
pub fn compute_metrics(returns: &[f64], equity: &[f64]) -> PerformanceMetrics {
    let Some(&final_equity) = equity.last() else {
        return PerformanceMetrics::default();
    };
    let n = equity.len() as f64;

    let annual_return = final_equity.powf(TRADING_DAYS / n) - 1.0;
    let annual_volatility = indicators::std_dev(returns) * TRADING_DAYS.sqrt();
    let sharpe_ratio = annual_return / (annual_volatility + SHARPE_EPS);

    PerformanceMetrics {
        annual_return,
        annual_volatility,
        sharpe_ratio,
        max_drawdown: max_drawdown(equity),
        observations: returns.len(),
    }
}

/// Compound `returns` and compute metrics over the result
pub fn metrics_from_returns(returns: &[f64]) -> PerformanceMetrics {
    compute_metrics(returns, &indicators::equity_curve(returns))
}

/// Largest peak-to-trough decline, as a non-positive fraction
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.min(e / peak - 1.0);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn drawdown_from_peak() {
        assert_relative_eq!(max_drawdown(&[1.0, 1.2, 0.9, 1.3, 1.0]), 0.9 / 1.2 - 1.0);
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.2]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn zero_volatility_sharpe_is_finite() {
        let flat = metrics_from_returns(&[0.0; 300]);
        assert_eq!(flat.annual_volatility, 0.0);
        assert_eq!(flat.annual_return, 0.0);
        assert_eq!(flat.sharpe_ratio, 0.0);

        // 0.125 is exact in binary, so every deviation from the mean is exactly 0
        let constant = metrics_from_returns(&[0.125; 300]);
        assert_eq!(constant.annual_volatility, 0.0);
        assert!(constant.sharpe_ratio.is_finite());
        assert!(constant.sharpe_ratio > 0.0);
    }

    #[test]
    fn annualisation() {
        let returns = [0.01, -0.005, 0.002, 0.004];
        let m = metrics_from_returns(&returns);
        let final_equity: f64 = returns.iter().map(|r| 1.0 + r).product();
        assert_relative_eq!(m.annual_return, final_equity.powf(252.0 / 4.0) - 1.0);
        assert_relative_eq!(m.annual_volatility, indicators::std_dev(&returns) * 252f64.sqrt());
        assert_eq!(m.observations, 4);
    }

    #[test]
    fn empty_series_is_default() {
        assert_eq!(metrics_from_returns(&[]), PerformanceMetrics::default());
    }
}
