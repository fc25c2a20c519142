//! Single-asset volatility-targeted strategy
//!
//! One model is fitted on the full return history. Sizing uses the previous
//! day's conditional volatility scaled by its regime multiplier, and the entry
//! signal is the previous day's return-to-volatility ratio.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::indicators;
use crate::metrics;
use crate::models::{self, FittedModel, ModelConfig, ModelFamily};
use crate::regime::{self, RegimeConfig, RegimeLabel};
use crate::strategy::{self, PositionLimits};
use crate::types::{PerformanceMetrics, ReturnSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleAssetConfig {
    pub ticker: String,
    pub family: ModelFamily,
    #[serde(flatten)]
    pub limits: PositionLimits,
    /// Rolling window of the expected-return estimate
    pub return_vol_lookback: usize,
    pub signal_clip: f64,
}

impl Default for SingleAssetConfig {
    fn default() -> Self {
        SingleAssetConfig {
            ticker: "INFY.NS".to_string(),
            family: ModelFamily::Egarch,
            limits: PositionLimits::default(),
            return_vol_lookback: 20,
            signal_clip: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleAssetRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    pub log_return: f64,
    #[serde(rename = "Forecasted_Volatility")]
    pub forecast_volatility: f64,
    #[serde(rename = "Vol_Lag")]
    pub vol_lag: f64,
    #[serde(rename = "Vol_Regime")]
    pub regime: RegimeLabel,
    #[serde(rename = "Regime_Multiplier")]
    pub regime_multiplier: f64,
    #[serde(rename = "Position_Size")]
    pub position_size: f64,
    #[serde(rename = "RV_Signal")]
    pub rv_signal: f64,
    #[serde(rename = "Signal")]
    pub signal: f64,
    #[serde(rename = "Strategy_Return")]
    pub strategy_return: f64,
    #[serde(rename = "Buy_Hold_Return")]
    pub buy_hold_return: f64,
    #[serde(rename = "Strategy_Equity")]
    pub strategy_equity: f64,
    #[serde(rename = "Buy_Hold_Equity")]
    pub buy_hold_equity: f64,
}

#[derive(Debug, Clone)]
pub struct SingleAssetResult {
    pub model: FittedModel,
    pub rows: Vec<SingleAssetRow>,
    pub strategy: PerformanceMetrics,
    pub buy_hold: PerformanceMetrics,
}

impl SingleAssetResult {
    /// Observation count per regime label
    pub fn regime_counts(&self) -> Vec<(RegimeLabel, usize)> {
        RegimeLabel::ALL
            .iter()
            .map(|label| (*label, self.rows.iter().filter(|r| r.regime == *label).count()))
            .collect()
    }
}

/// Fit the configured family on the finite returns of `series` and backtest
pub fn run_single_asset(
    series: &ReturnSeries,
    config: &SingleAssetConfig,
    models_config: &ModelConfig,
    regime_config: &RegimeConfig,
) -> Result<SingleAssetResult> {
    let finite: Vec<(NaiveDate, f64)> = series
        .dates
        .iter()
        .zip(series.returns.iter())
        .filter(|(_, r)| r.is_finite())
        .map(|(d, r)| (*d, *r))
        .collect();
    let (dates, returns): (Vec<NaiveDate>, Vec<f64>) = finite.into_iter().unzip();

    let model = models::fit(&returns, &models_config.spec_for(config.family), models_config)?;
    info!(
        ticker = %series.ticker,
        model = %model.family(),
        aic = model.aic,
        "Single-asset model fitted"
    );
    run_single_asset_backtest(&dates, &returns, model, config, regime_config)
}

/// Backtest against an already fitted model
///
/// The model's volatility path is aligned to the tail of `returns`.
pub fn run_single_asset_backtest(
    dates: &[NaiveDate],
    returns: &[f64],
    model: FittedModel,
    config: &SingleAssetConfig,
    regime_config: &RegimeConfig,
) -> Result<SingleAssetResult> {
    let n = returns.len();
    let vol = indicators::finite(&model.conditional_volatility);
    let tail = &vol[vol.len().saturating_sub(n)..];
    let offset = n - tail.len();
    let forecast: Vec<Option<f64>> = (0..n).map(|i| i.checked_sub(offset).map(|j| tail[j])).collect();

    let vol_lag = indicators::lag(&forecast, 1);
    let regimes = regime::detect_volatility_regime(&vol_lag, regime_config);
    let rv = strategy::return_vol_signal(returns, &forecast, config.return_vol_lookback, config.signal_clip);
    let signals = strategy::lagged_positive(&rv);

    let mut rows = Vec::with_capacity(n);
    for t in 0..n {
        let (Some(fv), Some(lagged), Some(rv_t)) = (forecast[t], vol_lag[t], rv[t]) else {
            continue;
        };
        let Some(base) = strategy::volatility_target_position(Some(lagged), &config.limits) else {
            continue;
        };
        let multiplier = regimes[t].multiplier();
        let position = base * multiplier;
        let strategy_return = signals[t] * position * returns[t];
        if !strategy_return.is_finite() {
            continue;
        }
        rows.push(SingleAssetRow {
            date: dates[t],
            log_return: returns[t],
            forecast_volatility: fv,
            vol_lag: lagged,
            regime: regimes[t],
            regime_multiplier: multiplier,
            position_size: position,
            rv_signal: rv_t,
            signal: signals[t],
            strategy_return,
            buy_hold_return: returns[t],
            strategy_equity: 0.0,
            buy_hold_equity: 0.0,
        });
    }

    if rows.is_empty() {
        return Err(PipelineError::insufficient("single-asset backtest", 1, 0));
    }

    let strategy_returns: Vec<f64> = rows.iter().map(|r| r.strategy_return).collect();
    let buy_hold_returns: Vec<f64> = rows.iter().map(|r| r.buy_hold_return).collect();
    let strategy_equity = indicators::equity_curve(&strategy_returns);
    let buy_hold_equity = indicators::equity_curve(&buy_hold_returns);
    for (row, (s, b)) in rows
        .iter_mut()
        .zip(strategy_equity.iter().zip(buy_hold_equity.iter()))
    {
        row.strategy_equity = *s;
        row.buy_hold_equity = *b;
    }

    Ok(SingleAssetResult {
        strategy: metrics::compute_metrics(&strategy_returns, &strategy_equity),
        buy_hold: metrics::compute_metrics(&buy_hold_returns, &buy_hold_equity),
        model,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::simulate_garch;
    use crate::models::OptimizerConfig;
    use crate::types::Ticker;
    use chrono::Days;

    #[test]
    fn sizing_uses_lagged_volatility_and_regime() {
        let n = 600;
        let d0 = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..n as u64).map(|i| d0 + Days::new(i)).collect();
        let returns = simulate_garch(n, 2e-6, 0.08, 0.9, 21);
        let series = ReturnSeries::new(Ticker::new("INFY.NS"), dates, returns).unwrap();

        let config = SingleAssetConfig {
            family: ModelFamily::Garch,
            ..Default::default()
        };
        let models_config = ModelConfig {
            optimizer: OptimizerConfig {
                max_evaluations: 600,
                ..Default::default()
            },
            ..Default::default()
        };
        let result =
            run_single_asset(&series, &config, &models_config, &RegimeConfig::default()).unwrap();

        // the return/vol window needs 20 observations; row t needs t ≥ 19
        assert_eq!(result.rows.len(), n - 19);
        for pair in result.rows.windows(2) {
            // today's lagged vol is yesterday's forecast
            assert_eq!(pair[1].vol_lag, pair[0].forecast_volatility);
        }
        for row in &result.rows {
            let base = (0.01 / row.vol_lag).clamp(0.1, 2.0);
            approx::assert_relative_eq!(row.position_size, base * row.regime.multiplier());
        }
        let counts: usize = result.regime_counts().iter().map(|(_, c)| c).sum();
        assert_eq!(counts, result.rows.len());
        assert!(result.strategy.max_drawdown <= 0.0);
    }
}
