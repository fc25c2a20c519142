//! Multi-asset portfolio backtests
//!
//! The baseline holds inverse-volatility weights over dates where every asset
//! trades. The regime-aware variant scales each asset's inverse-volatility
//! weight by its regime multiplier, falls back to equal weight on thin days,
//! and finally passes the portfolio return through the risk allocator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::allocator::{self, AllocatedSeries, AllocatorConfig, RiskSummary};
use crate::error::{PipelineError, Result};
use crate::indicators;
use crate::metrics;
use crate::regime::{self, RegimeConfig};
use crate::types::{EquityPoint, PerformanceMetrics, ReturnPanel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub tickers: Vec<String>,
    /// Rolling window of the volatility estimate used for weights
    pub vol_window: usize,
    /// Fewest valid assets for regime weights; below this the day is equal-weighted
    pub min_valid_assets: usize,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            tickers: [
                "INFY.NS",
                "TCS.NS",
                "RELIANCE.NS",
                "HDFCBANK.NS",
                "ICICIBANK.NS",
                "LT.NS",
                "ITC.NS",
                "SBIN.NS",
                "AXISBANK.NS",
                "HINDUNILVR.NS",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            vol_window: 60,
            min_valid_assets: 2,
        }
    }
}

/// Dated portfolio returns with their equity curve and metrics
#[derive(Debug, Clone)]
pub struct PortfolioResult {
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
    pub equity: Vec<f64>,
    pub metrics: PerformanceMetrics,
}

impl PortfolioResult {
    fn from_returns(dates: Vec<NaiveDate>, returns: Vec<f64>) -> Self {
        let equity = indicators::equity_curve(&returns);
        let metrics = metrics::compute_metrics(&returns, &equity);
        PortfolioResult {
            dates,
            returns,
            equity,
            metrics,
        }
    }

    pub fn points(&self) -> Vec<EquityPoint> {
        self.dates
            .iter()
            .zip(self.returns.iter().zip(self.equity.iter()))
            .map(|(date, (ret, equity))| EquityPoint {
                date: *date,
                ret: *ret,
                equity: *equity,
            })
            .collect()
    }
}

/// Regime-aware portfolio after risk allocation
#[derive(Debug, Clone)]
pub struct RegimePortfolioResult {
    pub allocated: AllocatedSeries,
    pub risk: RiskSummary,
    pub metrics: PerformanceMetrics,
    /// Days that used the equal-weight fallback
    pub fallback_days: usize,
}

/// Lagged rolling volatility per column
fn lagged_volatility(panel: &ReturnPanel, window: usize) -> Vec<Vec<Option<f64>>> {
    (0..panel.n_assets())
        .map(|j| indicators::lag(&indicators::rolling_std(&panel.column(j), window), 1))
        .collect()
}

/// Inverse-volatility portfolio over dates where every asset has a return
pub fn run_baseline_portfolio(panel: &ReturnPanel, config: &PortfolioConfig) -> Result<PortfolioResult> {
    let complete = panel.complete_rows();
    if complete.len() <= config.vol_window {
        return Err(PipelineError::insufficient(
            "baseline portfolio",
            config.vol_window + 1,
            complete.len(),
        ));
    }
    let vols = lagged_volatility(&complete, config.vol_window);

    let mut dates = Vec::new();
    let mut returns = Vec::new();
    for (t, row) in complete.values.iter().enumerate() {
        let inv: Option<Vec<f64>> = vols
            .iter()
            .map(|col| col[t].filter(|v| *v > 0.0).map(|v| 1.0 / v))
            .collect();
        let Some(inv) = inv else {
            continue;
        };
        let total: f64 = inv.iter().sum();
        let port: f64 = inv
            .iter()
            .zip(row.iter())
            .map(|(w, r)| w / total * r.unwrap_or(0.0))
            .sum();
        if port.is_finite() {
            dates.push(complete.dates[t]);
            returns.push(port);
        }
    }

    info!(
        assets = panel.n_assets(),
        days = returns.len(),
        "Baseline portfolio computed"
    );
    Ok(PortfolioResult::from_returns(dates, returns))
}

/// Regime-scaled inverse-volatility portfolio with equal-weight fallback
pub fn run_regime_portfolio(
    panel: &ReturnPanel,
    config: &PortfolioConfig,
    regime_config: &RegimeConfig,
    allocator_config: &AllocatorConfig,
) -> Result<RegimePortfolioResult> {
    if panel.is_empty() {
        return Err(PipelineError::insufficient("regime portfolio", 1, 0));
    }
    let vols = lagged_volatility(panel, config.vol_window);
    let multipliers: Vec<Vec<f64>> = vols
        .iter()
        .map(|col| {
            regime::detect_volatility_regime(col, regime_config)
                .iter()
                .map(|r| r.multiplier())
                .collect()
        })
        .collect();

    let mut dates = Vec::new();
    let mut raw = Vec::new();
    let mut fallback_days = 0;
    for (t, row) in panel.values.iter().enumerate() {
        // regime-adjusted inverse-vol weight and return, for assets with both
        let valid: Vec<(f64, f64)> = row
            .iter()
            .enumerate()
            .filter_map(|(j, r)| {
                let r = (*r)?;
                let vol = vols[j][t].filter(|v| *v > 0.0)?;
                Some((multipliers[j][t] / vol, r))
            })
            .collect();
        let weight_sum: f64 = valid.iter().map(|(w, _)| w).sum();

        let port = if valid.len() >= config.min_valid_assets && weight_sum > 0.0 {
            valid.iter().map(|(w, r)| w / weight_sum * r).sum::<f64>()
        } else {
            let available: Vec<f64> = row.iter().flatten().copied().collect();
            let Some(mean) = indicators::mean(&available) else {
                continue;
            };
            fallback_days += 1;
            mean
        };
        dates.push(panel.dates[t]);
        raw.push(port);
    }

    debug!(days = raw.len(), fallback_days, "Regime portfolio returns");
    let (allocated, risk) = allocator::apply_risk_allocator(&dates, &raw, allocator_config);
    let metrics = metrics::compute_metrics(&allocated.adjusted_returns, &allocated.adjusted_equity);

    Ok(RegimePortfolioResult {
        allocated,
        risk,
        metrics,
        fallback_days,
    })
}

/// One metric compared across the two portfolios
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    #[serde(rename = "Metric")]
    pub metric: &'static str,
    #[serde(rename = "Baseline")]
    pub baseline: f64,
    #[serde(rename = "Regime-Aware")]
    pub regime_aware: f64,
}

pub fn compare_portfolios(baseline: &PerformanceMetrics, regime: &PerformanceMetrics) -> Vec<ComparisonRow> {
    let pick = |m: &PerformanceMetrics| {
        [
            m.annual_return,
            m.annual_volatility,
            m.sharpe_ratio,
            m.max_drawdown,
        ]
    };
    ["Annual Return", "Annual Volatility", "Sharpe Ratio", "Max Drawdown"]
        .into_iter()
        .zip(pick(baseline).into_iter().zip(pick(regime)))
        .map(|(metric, (baseline, regime_aware))| ComparisonRow {
            metric,
            baseline,
            regime_aware,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReturnSeries, Ticker};
    use approx::assert_relative_eq;
    use chrono::Days;

    fn series(name: &str, start: u64, returns: Vec<f64>) -> ReturnSeries {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = (0..returns.len() as u64).map(|i| d0 + Days::new(start + i)).collect();
        ReturnSeries::new(Ticker::new(name), dates, returns).unwrap()
    }

    fn wave(n: usize, amp: f64, phase: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amp * if (i + phase) % 3 == 0 { -1.0 } else { 0.8 })
            .collect()
    }

    fn config(window: usize) -> PortfolioConfig {
        PortfolioConfig {
            tickers: vec!["A".into(), "B".into()],
            vol_window: window,
            min_valid_assets: 2,
        }
    }

    #[test]
    fn baseline_weights_favour_low_volatility() {
        let a = series("A", 0, wave(40, 0.01, 0));
        let b = series("B", 0, wave(40, 0.03, 0));
        let panel = ReturnPanel::from_series(&[&a, &b]);
        let result = run_baseline_portfolio(&panel, &config(10)).unwrap();

        // first row with a lagged window is index 10
        assert_eq!(result.dates[0], panel.dates[10]);
        // vol ratio 1:3 gives weights 0.75 / 0.25
        let r = &panel.values[10];
        let expected = 0.75 * r[0].unwrap() + 0.25 * r[1].unwrap();
        assert_relative_eq!(result.returns[0], expected, epsilon = 1e-12);
        assert_eq!(result.equity.len(), result.returns.len());
    }

    #[test]
    fn baseline_needs_more_than_one_window() {
        let a = series("A", 0, wave(10, 0.01, 0));
        let panel = ReturnPanel::from_series(&[&a]);
        assert!(run_baseline_portfolio(&panel, &config(10)).is_err());
    }

    #[test]
    fn regime_portfolio_falls_back_when_thin() {
        // B starts late, so early days have one asset and use the fallback
        let a = series("A", 0, wave(80, 0.01, 0));
        let b = series("B", 30, wave(50, 0.02, 1));
        let panel = ReturnPanel::from_series(&[&a, &b]);
        let result = run_regime_portfolio(
            &panel,
            &config(10),
            &RegimeConfig {
                window: 5,
                ..Default::default()
            },
            &AllocatorConfig::default(),
        )
        .unwrap();

        assert_eq!(result.allocated.dates.len(), panel.len());
        assert!(result.fallback_days > 0);
        // first day is a single-asset equal-weight day
        assert_relative_eq!(
            result.allocated.raw_returns[0],
            panel.values[0][0].unwrap()
        );
        assert!(result.risk.scale >= 0.3 && result.risk.scale <= 1.0);
        assert!(result.allocated.adjusted_equity.iter().all(|e| e.is_finite()));
    }

    #[test]
    fn comparison_has_four_metrics() {
        let rows = compare_portfolios(&PerformanceMetrics::default(), &PerformanceMetrics::default());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].metric, "Sharpe Ratio");
    }
}
