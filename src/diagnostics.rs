//! Post-hoc diagnostics over backtest output

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::allocator::RiskSummary;
use crate::indicators;
use crate::metrics::{self, TRADING_DAYS};
use crate::regime::RegimeLabel;
use crate::types::MetricRow;

/// Named inclusive date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisWindow {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CrisisWindow {
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        CrisisWindow {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Regimes with fewer observations are left out of the performance table
    pub min_regime_observations: usize,
    pub crisis_windows: Vec<CrisisWindow>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        DiagnosticsConfig {
            min_regime_observations: 50,
            crisis_windows: vec![
                CrisisWindow::new("COVID-19", date(2020, 2, 1), date(2020, 5, 1)),
                CrisisWindow::new("Rate Hikes", date(2022, 1, 1), date(2022, 10, 1)),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimePerformance {
    #[serde(rename = "Regime")]
    pub regime: RegimeLabel,
    #[serde(rename = "Annual Return")]
    pub annual_return: f64,
    #[serde(rename = "Annual Volatility")]
    pub annual_volatility: f64,
    #[serde(rename = "Sharpe")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "Observations")]
    pub observations: usize,
}

/// Strategy metrics per regime, each regime compounded on its own days
pub fn regime_performance(
    regimes: &[RegimeLabel],
    strategy_returns: &[f64],
    min_observations: usize,
) -> Vec<RegimePerformance> {
    RegimeLabel::ALL
        .iter()
        .filter_map(|label| {
            let returns: Vec<f64> = regimes
                .iter()
                .zip(strategy_returns.iter())
                .filter(|(r, _)| *r == label)
                .map(|(_, ret)| *ret)
                .collect();
            if returns.len() < min_observations {
                return None;
            }
            let m = metrics::metrics_from_returns(&returns);
            Some(RegimePerformance {
                regime: *label,
                annual_return: m.annual_return,
                annual_volatility: m.annual_volatility,
                sharpe_ratio: m.sharpe_ratio,
                max_drawdown: m.max_drawdown,
                observations: m.observations,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AllocatorStats {
    pub scale: f64,
    pub var: f64,
    pub es: f64,
    /// The allocator cut exposure below full size
    pub active: bool,
}

impl AllocatorStats {
    pub fn to_rows(&self) -> Vec<MetricRow> {
        vec![
            MetricRow::new("Risk_Scale", self.scale),
            MetricRow::new("Portfolio_VaR", self.var),
            MetricRow::new("Portfolio_ES", self.es),
            MetricRow::new("Allocator_Active", self.active),
        ]
    }
}

pub fn allocator_stats(summary: &RiskSummary) -> AllocatorStats {
    AllocatorStats {
        scale: summary.scale,
        var: summary.var,
        es: summary.es,
        active: summary.scale < 1.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisResult {
    #[serde(rename = "Crisis")]
    pub name: String,
    #[serde(rename = "Start")]
    pub start: NaiveDate,
    #[serde(rename = "End")]
    pub end: NaiveDate,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "Volatility")]
    pub volatility: f64,
    #[serde(rename = "Observations")]
    pub observations: usize,
}

/// Drawdown and annualised volatility of the strategy inside `window`
pub fn crisis_window(dates: &[NaiveDate], strategy_returns: &[f64], window: &CrisisWindow) -> CrisisResult {
    let returns: Vec<f64> = dates
        .iter()
        .zip(strategy_returns.iter())
        .filter(|(d, _)| window.contains(**d))
        .map(|(_, r)| *r)
        .collect();
    let equity = indicators::equity_curve(&returns);
    CrisisResult {
        name: window.name.clone(),
        start: window.start,
        end: window.end,
        max_drawdown: metrics::max_drawdown(&equity),
        volatility: indicators::std_dev(&returns) * TRADING_DAYS.sqrt(),
        observations: returns.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Days;

    #[test]
    fn thin_regimes_are_dropped() {
        let mut regimes = vec![RegimeLabel::Low; 60];
        regimes.extend(vec![RegimeLabel::High; 10]);
        let returns = vec![0.001; 70];
        let table = regime_performance(&regimes, &returns, 50);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].regime, RegimeLabel::Low);
        assert_eq!(table[0].observations, 60);
    }

    #[test]
    fn allocator_active_below_full_scale() {
        let stats = allocator_stats(&RiskSummary {
            var: 0.03,
            es: 0.04,
            scale: 0.66,
        });
        assert!(stats.active);
        assert_eq!(stats.to_rows()[3].value, "true");
        let idle = allocator_stats(&RiskSummary {
            var: 0.01,
            es: 0.01,
            scale: 1.0,
        });
        assert!(!idle.active);
    }

    #[test]
    fn crisis_range_is_inclusive() {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 30).unwrap();
        let dates: Vec<NaiveDate> = (0..10).map(|i| d0 + Days::new(i)).collect();
        let returns = vec![0.0, 0.0, 0.1, -0.5, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0];
        let window = CrisisWindow::new(
            "test",
            NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 3).unwrap(),
        );
        let result = crisis_window(&dates, &returns, &window);
        assert_eq!(result.observations, 3);
        assert_relative_eq!(result.max_drawdown, -0.5);
    }

    #[test]
    fn default_crisis_windows() {
        let config = DiagnosticsConfig::default();
        assert_eq!(config.crisis_windows.len(), 2);
        assert_eq!(config.crisis_windows[0].name, "COVID-19");
        assert!(config.crisis_windows[1].contains(NaiveDate::from_ymd_opt(2022, 10, 1).unwrap()));
    }
}
