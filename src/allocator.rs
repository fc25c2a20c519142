//! Risk-constrained capital scaling
//!
//! One scale factor is computed from the historical VaR and ES of a portfolio
//! return series and applied uniformly to every return in it. The scale is
//! bounded by `[min_scale, max_scale]` with `max_scale ≤ 1`, so the allocator
//! never adds leverage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators;
use crate::types::EquityPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    pub confidence_level: f64,
    /// Daily VaR budget
    pub max_var: f64,
    /// Daily ES budget
    pub max_es: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            confidence_level: 0.95,
            max_var: 0.02,
            max_es: 0.03,
            min_scale: 0.3,
            max_scale: 1.0,
        }
    }
}

/// Scale decision and the risk measures behind it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskSummary {
    #[serde(rename = "Portfolio_VaR")]
    pub var: f64,
    #[serde(rename = "Portfolio_ES")]
    pub es: f64,
    #[serde(rename = "Risk_Scale")]
    pub scale: f64,
}

/// Historical VaR and ES as positive loss magnitudes
///
/// Non-finite returns are ignored; an empty series gives `(0, 0)`.
pub fn compute_portfolio_var_es(returns: &[f64], confidence_level: f64) -> (f64, f64) {
    let clean = indicators::finite(returns);
    let Some(cutoff) = indicators::quantile(&clean, 1.0 - confidence_level) else {
        return (0.0, 0.0);
    };
    let var = cutoff.abs();

    let tail: Vec<f64> = clean.iter().copied().filter(|r| *r <= -var).collect();
    let es = indicators::mean(&tail).map_or(var, f64::abs);
    (var, es)
}

/// Scale factor bounding both VaR and ES within budget
pub fn risk_constrained_scale(returns: &[f64], config: &AllocatorConfig) -> RiskSummary {
    let (var, es) = compute_portfolio_var_es(returns, config.confidence_level);
    let scale = if var <= 0.0 || es <= 0.0 {
        config.max_scale
    } else {
        (config.max_var / var)
            .min(config.max_es / es)
            .clamp(config.min_scale, config.max_scale)
    };
    RiskSummary { var, es, scale }
}

/// Raw portfolio returns after allocator scaling
#[derive(Debug, Clone, Default)]
pub struct AllocatedSeries {
    pub dates: Vec<NaiveDate>,
    pub raw_returns: Vec<f64>,
    pub adjusted_returns: Vec<f64>,
    pub adjusted_equity: Vec<f64>,
}

impl AllocatedSeries {
    pub fn points(&self) -> Vec<EquityPoint> {
        self.dates
            .iter()
            .zip(self.adjusted_returns.iter().zip(self.adjusted_equity.iter()))
            .map(|(date, (ret, equity))| EquityPoint {
                date: *date,
                ret: *ret,
                equity: *equity,
            })
            .collect()
    }
}

/// Scale a dated return series and compound it
///
/// Non-finite rows are dropped before compounding so they cannot poison the
/// equity curve.
pub fn apply_risk_allocator(
    dates: &[NaiveDate],
    returns: &[f64],
    config: &AllocatorConfig,
) -> (AllocatedSeries, RiskSummary) {
    let (dates, raw_returns): (Vec<NaiveDate>, Vec<f64>) = dates
        .iter()
        .zip(returns.iter())
        .filter(|(_, r)| r.is_finite())
        .map(|(d, r)| (*d, *r))
        .unzip();

    let summary = risk_constrained_scale(&raw_returns, config);
    let adjusted_returns: Vec<f64> = raw_returns.iter().map(|r| r * summary.scale).collect();
    let adjusted_equity = indicators::equity_curve(&adjusted_returns);

    info!(
        var = summary.var,
        es = summary.es,
        scale = summary.scale,
        "Risk allocator applied"
    );

    (
        AllocatedSeries {
            dates,
            raw_returns,
            adjusted_returns,
            adjusted_equity,
        },
        summary,
    )
}
