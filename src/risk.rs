//! Risk analytics: VaR/ES, stress scenarios and capital adequacy
//!
//! VaR and ES figures in [`VarEsReport`] are signed return thresholds (losses
//! are negative), matching how they are compared against realised returns.
//! Capital figures are positive loss magnitudes.

use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::error::{PipelineError, Result};
use crate::indicators;
use crate::metrics::TRADING_DAYS;
use crate::types::{MetricRow, ReturnPanel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub confidence_level: f64,
    /// Tail probability of the volatility shock
    pub stress_quantile: f64,
    pub stress_multiplier: f64,
    pub stress_days: u32,
    /// Capital available to absorb losses, as a fraction of equity
    pub available_capital: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            confidence_level: 0.95,
            stress_quantile: 0.01,
            stress_multiplier: 3.0,
            stress_days: 5,
            available_capital: 0.30,
        }
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| PipelineError::Data(e.to_string()))
}

/// Historical, parametric and model-based VaR/ES of one return series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarEsReport {
    pub confidence_level: f64,
    pub historical_var: f64,
    pub parametric_var: f64,
    /// Mean of the time-varying model VaR
    pub model_var: f64,
    /// Share of days with a return below the model VaR
    pub violation_rate: f64,
    pub historical_es: f64,
    pub parametric_es: f64,
    /// Mean of the model ES, built on the previous day's volatility
    pub model_es: f64,
    /// Share of days with a return below the model ES
    pub breach_rate: f64,
    pub observations: usize,
}

impl VarEsReport {
    pub fn to_rows(&self) -> Vec<MetricRow> {
        vec![
            MetricRow::new("Historical VaR", self.historical_var),
            MetricRow::new("Parametric VaR", self.parametric_var),
            MetricRow::new("Model VaR", self.model_var),
            MetricRow::new("VaR Violation Rate", self.violation_rate),
            MetricRow::new("Historical ES", self.historical_es),
            MetricRow::new("Parametric ES", self.parametric_es),
            MetricRow::new("Model ES", self.model_es),
            MetricRow::new("ES Breach Rate", self.breach_rate),
        ]
    }
}

/// VaR and ES of `returns` using `volatility` for the model-based figures
///
/// Both inputs are aligned on their common tail.
pub fn compute_var_es(returns: &[f64], volatility: &[f64], confidence_level: f64) -> Result<VarEsReport> {
    let returns = indicators::finite(returns);
    let n = returns.len().min(volatility.len());
    if n < 2 {
        return Err(PipelineError::insufficient("VaR/ES", 2, n));
    }
    let returns = &returns[returns.len() - n..];
    let vol = &volatility[volatility.len() - n..];

    let normal = standard_normal()?;
    let alpha = 1.0 - confidence_level;
    let z = normal.inverse_cdf(alpha);
    let tail_factor = normal.pdf(z) / alpha;

    let mu = indicators::mean(returns).unwrap_or(0.0);
    let sigma = indicators::population_std(returns);

    let historical_var = indicators::quantile(returns, alpha)
        .ok_or_else(|| PipelineError::insufficient("VaR/ES", 2, 0))?;
    let breaches: Vec<f64> = returns.iter().copied().filter(|r| *r <= historical_var).collect();
    let historical_es = indicators::mean(&breaches).unwrap_or(historical_var);

    let model_var: Vec<f64> = vol.iter().map(|v| mu + v * z).collect();
    let violations = returns
        .iter()
        .zip(model_var.iter())
        .filter(|(r, v)| r < v)
        .count();

    // ES on day t uses volatility known at t - 1
    let model_es: Vec<f64> = vol[..n - 1].iter().map(|v| mu - v * tail_factor).collect();
    let es_breaches = returns[1..]
        .iter()
        .zip(model_es.iter())
        .filter(|(r, es)| r < es)
        .count();

    Ok(VarEsReport {
        confidence_level,
        historical_var,
        parametric_var: mu + sigma * z,
        model_var: indicators::mean(&model_var).unwrap_or(0.0),
        violation_rate: violations as f64 / n as f64,
        historical_es,
        parametric_es: mu - sigma * tail_factor,
        model_es: indicators::mean(&model_es).unwrap_or(0.0),
        breach_rate: es_breaches as f64 / model_es.len() as f64,
        observations: n,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StressReport {
    pub worst_daily_loss: f64,
    /// One-day loss under a multiplied volatility shock
    pub volatility_shock: f64,
    /// The shock scaled to the stress horizon
    pub multi_day_shock: f64,
    pub stress_days: u32,
}

impl StressReport {
    pub fn to_rows(&self) -> Vec<MetricRow> {
        vec![
            MetricRow::new("Worst Historical Day", self.worst_daily_loss),
            MetricRow::new("Volatility Shock (1-Day)", self.volatility_shock),
            MetricRow::new(
                format!("Volatility Shock ({}-Day)", self.stress_days),
                self.multi_day_shock,
            ),
        ]
    }
}

/// Worst realised day and a volatility shock off the latest model volatility
pub fn run_stress_tests(returns: &[f64], volatility: &[f64], config: &RiskConfig) -> Result<StressReport> {
    let returns = indicators::finite(returns);
    let worst = returns
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if !worst.is_finite() {
        return Err(PipelineError::insufficient("stress test", 1, 0));
    }
    let latest_vol = volatility
        .iter()
        .rev()
        .copied()
        .find(|v| v.is_finite())
        .ok_or_else(|| PipelineError::insufficient("stress test volatility", 1, 0))?;

    let z = standard_normal()?.inverse_cdf(config.stress_quantile);
    let volatility_shock = (z * latest_vol * config.stress_multiplier).abs();

    Ok(StressReport {
        worst_daily_loss: worst.abs(),
        volatility_shock,
        multi_day_shock: (config.stress_days as f64).sqrt() * volatility_shock,
        stress_days: config.stress_days,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapitalStatus {
    #[serde(rename = "SAFE")]
    Safe,
    #[serde(rename = "UNDER-CAPITALIZED")]
    UnderCapitalized,
}

impl fmt::Display for CapitalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapitalStatus::Safe => f.write_str("SAFE"),
            CapitalStatus::UnderCapitalized => f.write_str("UNDER-CAPITALIZED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapitalAdequacy {
    pub var: f64,
    pub es: f64,
    pub stress_one_day: f64,
    pub stress_multi_day: f64,
    pub capital_required: f64,
    pub available_capital: f64,
    pub status: CapitalStatus,
}

impl CapitalAdequacy {
    pub fn to_rows(&self) -> Vec<MetricRow> {
        vec![
            MetricRow::new("VaR", self.var),
            MetricRow::new("Expected Shortfall", self.es),
            MetricRow::new("Stress Loss (1-Day)", self.stress_one_day),
            MetricRow::new("Stress Loss (Multi-Day)", self.stress_multi_day),
            MetricRow::new("Capital Required", self.capital_required),
            MetricRow::new("Available Capital", self.available_capital),
            MetricRow::new("Risk Status", self.status),
        ]
    }
}

/// Capital needed to cover the larger of model ES and the multi-day shock
pub fn capital_adequacy(var_es: &VarEsReport, stress: &StressReport, available_capital: f64) -> CapitalAdequacy {
    let es = var_es.model_es.abs();
    let capital_required = es.max(stress.multi_day_shock);
    CapitalAdequacy {
        var: var_es.model_var.abs(),
        es,
        stress_one_day: stress.volatility_shock,
        stress_multi_day: stress.multi_day_shock,
        capital_required,
        available_capital,
        status: if available_capital >= capital_required {
            CapitalStatus::Safe
        } else {
            CapitalStatus::UnderCapitalized
        },
    }
}

/// Equal-weight portfolio tail risk and diversification benefit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioRisk {
    pub var_95: f64,
    pub es_95: f64,
    pub var_99: f64,
    pub es_99: f64,
    pub annual_var: f64,
    pub annual_es: f64,
    /// `1 − VaR95 / mean(single-asset VaR95)`
    pub diversification_benefit: f64,
}

impl PortfolioRisk {
    pub fn to_rows(&self) -> Vec<MetricRow> {
        vec![
            MetricRow::new("Portfolio VaR (95%)", self.var_95),
            MetricRow::new("Portfolio ES (95%)", self.es_95),
            MetricRow::new("Portfolio VaR (99%)", self.var_99),
            MetricRow::new("Portfolio ES (99%)", self.es_99),
            MetricRow::new("Annual VaR (95%)", self.annual_var),
            MetricRow::new("Annual ES (95%)", self.annual_es),
            MetricRow::new("Diversification Benefit", self.diversification_benefit),
        ]
    }
}

fn loss_var_es(returns: &[f64], confidence_level: f64) -> Option<(f64, f64)> {
    let var = indicators::quantile(returns, 1.0 - confidence_level)?.abs();
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= -var).collect();
    let es = indicators::mean(&tail).map_or(var, f64::abs);
    Some((var, es))
}

/// Risk of the equal-weight portfolio over dates where every asset trades
pub fn compute_portfolio_risk(panel: &ReturnPanel) -> Result<PortfolioRisk> {
    let complete = panel.complete_rows();
    let portfolio: Vec<f64> = complete
        .values
        .iter()
        .map(|row| row.iter().flatten().sum::<f64>() / row.len() as f64)
        .collect();

    let (var_95, es_95) =
        loss_var_es(&portfolio, 0.95).ok_or_else(|| PipelineError::insufficient("portfolio risk", 1, 0))?;
    let (var_99, es_99) =
        loss_var_es(&portfolio, 0.99).ok_or_else(|| PipelineError::insufficient("portfolio risk", 1, 0))?;

    let individual: Vec<f64> = (0..panel.n_assets())
        .filter_map(|j| {
            let col: Vec<f64> = panel.column(j).into_iter().flatten().collect();
            indicators::quantile(&col, 0.05).map(f64::abs)
        })
        .collect();
    let mean_individual = indicators::mean(&individual).unwrap_or(0.0);
    let diversification_benefit = if mean_individual > 0.0 {
        1.0 - var_95 / mean_individual
    } else {
        0.0
    };

    Ok(PortfolioRisk {
        var_95,
        es_95,
        var_99,
        es_99,
        annual_var: var_95 * TRADING_DAYS.sqrt(),
        annual_es: es_95 * TRADING_DAYS.sqrt(),
        diversification_benefit,
    })
}
