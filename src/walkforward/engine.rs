//! Walk-forward evaluation with per-window model refits
//!
//! Every window refits all candidate families on its training slice only,
//! selects one, sizes positions from the selected model's volatility and
//! trades a lagged momentum signal over the test slice. Windows are
//! independent, so they run in parallel and are reassembled in window order.

use chrono::NaiveDate;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::indicators;
use crate::metrics;
use crate::models::{ModelConfig, ModelFamily};
use crate::selector;
use crate::strategy::{self, PositionLimits};
use crate::types::{EquityPoint, ReturnSeries, Ticker};

use super::windows::{generate_rolling_windows, RollingWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub ticker: String,
    pub train_years: u32,
    pub test_months: u32,
    #[serde(flatten)]
    pub limits: PositionLimits,
    /// Minimum raw training observations
    pub min_train_obs: usize,
    pub min_test_obs: usize,
    /// Minimum training observations after dropping non-finite values
    pub min_clean_train_obs: usize,
    /// Candidate families, in tie-break order
    pub families: Vec<ModelFamily>,
    pub parallel: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig {
            ticker: "INFY.NS".to_string(),
            train_years: 3,
            test_months: 3,
            limits: PositionLimits::default(),
            min_train_obs: 500,
            min_test_obs: 20,
            min_clean_train_obs: 300,
            families: ModelFamily::ALL.to_vec(),
            parallel: true,
        }
    }
}

/// One out-of-sample observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Ticker")]
    pub ticker: Ticker,
    pub log_return: f64,
    #[serde(rename = "Forecasted_Volatility")]
    pub forecast_volatility: f64,
    #[serde(rename = "Selected_Model")]
    pub selected_model: ModelFamily,
    #[serde(rename = "Position_Size")]
    pub position_size: f64,
    #[serde(rename = "Signal")]
    pub signal: f64,
    #[serde(rename = "Strategy_Return")]
    pub strategy_return: f64,
    #[serde(rename = "Window_ID")]
    pub window_id: usize,
}

/// Per-window record of the model choice and its out-of-sample result
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    #[serde(rename = "Window_ID")]
    pub window_id: usize,
    #[serde(rename = "Train_Start")]
    pub train_start: NaiveDate,
    #[serde(rename = "Train_End")]
    pub train_end: NaiveDate,
    #[serde(rename = "Test_Start")]
    pub test_start: NaiveDate,
    #[serde(rename = "Test_End")]
    pub test_end: NaiveDate,
    #[serde(rename = "Selected_Model")]
    pub selected_model: ModelFamily,
    #[serde(rename = "AIC")]
    pub aic: f64,
    #[serde(rename = "Persistence")]
    pub persistence: Option<f64>,
    #[serde(rename = "Train_Obs")]
    pub train_obs: usize,
    #[serde(rename = "Test_Obs")]
    pub test_obs: usize,
    #[serde(rename = "Annual Return")]
    pub annual_return: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
}

#[derive(Debug, Clone)]
struct WindowResult {
    rows: Vec<WalkForwardRow>,
    summary: WindowSummary,
}

/// Concatenated out-of-sample result for one ticker
#[derive(Debug, Clone)]
pub struct WalkForwardResult {
    pub ticker: Ticker,
    pub rows: Vec<WalkForwardRow>,
    pub windows: Vec<WindowSummary>,
    pub skipped: usize,
}

impl WalkForwardResult {
    pub fn strategy_returns(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.strategy_return).collect()
    }

    /// Compounded equity of the concatenated strategy returns
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        let equity = indicators::equity_curve(&self.strategy_returns());
        self.rows
            .iter()
            .zip(equity)
            .map(|(row, equity)| EquityPoint {
                date: row.date,
                ret: row.strategy_return,
                equity,
            })
            .collect()
    }
}

pub struct WalkForwardEngine<'a> {
    config: &'a WalkForwardConfig,
    models: &'a ModelConfig,
}

impl<'a> WalkForwardEngine<'a> {
    pub fn new(config: &'a WalkForwardConfig, models: &'a ModelConfig) -> Self {
        WalkForwardEngine { config, models }
    }

    /// Run every window of one ticker
    ///
    /// Skipped windows are logged; the run fails only if none is accepted.
    pub fn run(&self, series: &ReturnSeries) -> Result<WalkForwardResult> {
        let windows: Vec<RollingWindow> = generate_rolling_windows(
            &series.dates,
            self.config.train_years,
            self.config.test_months,
        )
        .collect();

        info!(
            ticker = %series.ticker,
            windows = windows.len(),
            "Starting walk-forward"
        );

        let outcomes: Vec<Result<WindowResult>> = if self.config.parallel {
            windows
                .par_iter()
                .map(|w| self.run_window(series, w))
                .collect()
        } else {
            windows.iter().map(|w| self.run_window(series, w)).collect()
        };

        let mut rows = Vec::new();
        let mut summaries = Vec::new();
        let mut skipped = 0;
        for (window, outcome) in windows.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    rows.extend(result.rows);
                    summaries.push(result.summary);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(
                        ticker = %series.ticker,
                        window = window.id,
                        error = %e,
                        "Window skipped"
                    );
                }
            }
        }

        if summaries.is_empty() {
            return Err(PipelineError::NoValidWindows {
                ticker: series.ticker.to_string(),
                skipped,
            });
        }

        info!(
            ticker = %series.ticker,
            accepted = summaries.len(),
            skipped,
            observations = rows.len(),
            "Walk-forward complete"
        );

        Ok(WalkForwardResult {
            ticker: series.ticker.clone(),
            rows,
            windows: summaries,
            skipped,
        })
    }

    /// Run several tickers, in input order
    pub fn run_many(
        &self,
        series: &[&ReturnSeries],
        progress: Option<&ProgressBar>,
    ) -> Vec<Result<WalkForwardResult>> {
        let run_one = |s: &&ReturnSeries| {
            let result = self.run(s);
            if let Some(pb) = progress {
                pb.inc(1);
            }
            result
        };
        if self.config.parallel {
            series.par_iter().map(run_one).collect()
        } else {
            series.iter().map(run_one).collect()
        }
    }

    fn run_window(&self, series: &ReturnSeries, window: &RollingWindow) -> Result<WindowResult> {
        let train = series.range_indices(window.train_start, window.train_end);
        let test = series.range_indices(window.test_start, window.test_end);

        if train.len() < self.config.min_train_obs {
            return Err(PipelineError::insufficient(
                format!("training window {}", window.id),
                self.config.min_train_obs,
                train.len(),
            ));
        }
        if test.len() < self.config.min_test_obs {
            return Err(PipelineError::insufficient(
                format!("test window {}", window.id),
                self.config.min_test_obs,
                test.len(),
            ));
        }

        let clean_train = indicators::finite(&series.returns[train.clone()]);
        if clean_train.len() < self.config.min_clean_train_obs {
            return Err(PipelineError::insufficient(
                format!("cleaned training window {}", window.id),
                self.config.min_clean_train_obs,
                clean_train.len(),
            ));
        }

        let model = selector::fit_and_select(&clean_train, &self.config.families, self.models)?;
        debug!(
            ticker = %series.ticker,
            window = window.id,
            model = %model.family(),
            aic = model.aic,
            "Model selected"
        );

        // tail of the in-sample path stands in for the test-period forecast
        let vol = indicators::finite(&model.conditional_volatility);
        let n_test = test.len();
        let tail = &vol[vol.len().saturating_sub(n_test)..];
        let offset = n_test - tail.len();

        let test_returns = &series.returns[test.clone()];
        let previous = test.start.checked_sub(1).map(|i| series.returns[i]);
        let signals = strategy::momentum_signal(test_returns, previous);

        let mut rows = Vec::with_capacity(n_test);
        for (k, idx) in test.enumerate() {
            let log_return = series.returns[idx];
            let Some(forecast_volatility) = k.checked_sub(offset).map(|j| tail[j]) else {
                continue;
            };
            let Some(position) =
                strategy::volatility_target_position(Some(forecast_volatility), &self.config.limits)
            else {
                continue;
            };
            let strategy_return = signals[k] * position * log_return;
            if !strategy_return.is_finite() {
                continue;
            }
            rows.push(WalkForwardRow {
                date: series.dates[idx],
                ticker: series.ticker.clone(),
                log_return,
                forecast_volatility,
                selected_model: model.family(),
                position_size: position,
                signal: signals[k],
                strategy_return,
                window_id: window.id,
            });
        }

        let window_returns: Vec<f64> = rows.iter().map(|r| r.strategy_return).collect();
        let window_metrics = metrics::metrics_from_returns(&window_returns);
        let summary = WindowSummary {
            window_id: window.id,
            train_start: window.train_start,
            train_end: window.train_end,
            test_start: window.test_start,
            test_end: window.test_end,
            selected_model: model.family(),
            aic: model.aic,
            persistence: model.persistence,
            train_obs: clean_train.len(),
            test_obs: window_metrics.observations,
            annual_return: window_metrics.annual_return,
            sharpe_ratio: window_metrics.sharpe_ratio,
            max_drawdown: window_metrics.max_drawdown,
        };

        Ok(WindowResult { rows, summary })
    }
}
