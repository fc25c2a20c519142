//! Conditional volatility models
//!
//! Four families share one estimation path: a constant mean, Gaussian
//! innovations, an exponentially weighted backcast for pre-sample variance, and
//! a Nelder–Mead search over the negative log-likelihood. Each family only
//! contributes its variance recursion through [`VarianceProcess`].

pub mod egarch;
pub mod figarch;
pub mod garch;
pub mod optimizer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
pub use egarch::{EgarchOrder, EgarchProcess};
pub use figarch::{FigarchOrder, FigarchProcess};
pub use garch::{GarchOrder, GarchProcess, GjrOrder};
pub use optimizer::OptimizerConfig;

pub(crate) const LN_2PI: f64 = 1.837_877_066_409_345_3; // ln(2*pi)

/// Observations used by the exponential backcast
const BACKCAST_OBS: usize = 75;
const BACKCAST_DECAY: f64 = 0.94;

/// Volatility model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "GARCH")]
    Garch,
    #[serde(rename = "EGARCH")]
    Egarch,
    #[serde(rename = "GJR-GARCH", alias = "GJR")]
    GjrGarch,
    #[serde(rename = "FIGARCH")]
    Figarch,
}

impl ModelFamily {
    /// Candidate order used when refitting every family
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::Garch,
        ModelFamily::Egarch,
        ModelFamily::GjrGarch,
        ModelFamily::Figarch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::Garch => "GARCH",
            ModelFamily::Egarch => "EGARCH",
            ModelFamily::GjrGarch => "GJR-GARCH",
            ModelFamily::Figarch => "FIGARCH",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "GARCH" => Ok(ModelFamily::Garch),
            "EGARCH" => Ok(ModelFamily::Egarch),
            "GJR" | "GJR-GARCH" | "GJRGARCH" => Ok(ModelFamily::GjrGarch),
            "FIGARCH" => Ok(ModelFamily::Figarch),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown model family '{other}'"
            ))),
        }
    }
}

/// A model family together with its own order parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum ModelSpec {
    #[serde(rename = "GARCH")]
    Garch(GarchOrder),
    #[serde(rename = "EGARCH")]
    Egarch(EgarchOrder),
    #[serde(rename = "GJR-GARCH")]
    GjrGarch(GjrOrder),
    #[serde(rename = "FIGARCH")]
    Figarch(FigarchOrder),
}

impl ModelSpec {
    /// First-order specification of a family
    pub fn default_for(family: ModelFamily, figarch_truncation: usize) -> Self {
        match family {
            ModelFamily::Garch => ModelSpec::Garch(GarchOrder::default()),
            ModelFamily::Egarch => ModelSpec::Egarch(EgarchOrder::default()),
            ModelFamily::GjrGarch => ModelSpec::GjrGarch(GjrOrder::default()),
            ModelFamily::Figarch => ModelSpec::Figarch(FigarchOrder {
                truncation: figarch_truncation,
                ..FigarchOrder::default()
            }),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelSpec::Garch(_) => ModelFamily::Garch,
            ModelSpec::Egarch(_) => ModelFamily::Egarch,
            ModelSpec::GjrGarch(_) => ModelFamily::GjrGarch,
            ModelSpec::Figarch(_) => ModelFamily::Figarch,
        }
    }
}

/// Estimation settings shared by every family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Candidates at or above this persistence are filtered by the selector
    pub persistence_threshold: f64,
    /// Shortest series a fit accepts
    pub min_observations: usize,
    /// Lag truncation of the FIGARCH ARCH(∞) expansion
    pub figarch_truncation: usize,
    pub optimizer: OptimizerConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            persistence_threshold: 0.98,
            min_observations: 300,
            figarch_truncation: 1000,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl ModelConfig {
    pub fn spec_for(&self, family: ModelFamily) -> ModelSpec {
        ModelSpec::default_for(family, self.figarch_truncation)
    }
}

/// Variance equation of one family
///
/// `params` excludes the mean. `sigma2` may be one element longer than
/// `resids`, in which case the last element is the one-step-ahead forecast.
pub trait VarianceProcess {
    fn family(&self) -> ModelFamily;

    fn parameter_names(&self) -> Vec<String>;

    fn starting_values(&self, sample_variance: f64) -> Vec<f64>;

    fn is_feasible(&self, params: &[f64]) -> bool;

    fn backcast(&self, resids: &[f64]) -> f64 {
        backcast(resids)
    }

    fn variance(&self, params: &[f64], resids: &[f64], backcast: f64, sigma2: &mut [f64]);

    fn persistence(&self, params: &[f64]) -> Option<f64>;
}

/// Immutable result of fitting one family to one contiguous series
#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    pub spec: ModelSpec,
    /// Named parameters in estimation order, mean first
    pub params: Vec<(String, f64)>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub n_obs: usize,
    /// In-sample conditional volatility, index-aligned with the input
    #[serde(skip)]
    pub conditional_volatility: Vec<f64>,
    pub persistence: Option<f64>,
    /// Variance forecast for the first observation after the sample
    pub one_step_variance: f64,
    pub converged: bool,
    pub evaluations: usize,
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        self.spec.family()
    }

    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    fn is_garch_type(&self) -> bool {
        matches!(self.spec, ModelSpec::Garch(_) | ModelSpec::GjrGarch(_))
    }

    /// Unconditional volatility `sqrt(ω / (1 − persistence))` for GARCH-type fits
    pub fn long_run_volatility(&self) -> Option<f64> {
        if !self.is_garch_type() {
            return None;
        }
        let omega = self.param("omega")?;
        let persistence = self.persistence?;
        if persistence >= 1.0 {
            return None;
        }
        Some((omega / (1.0 - persistence)).sqrt())
    }

    /// Variance forecasts for horizons 1..=h
    ///
    /// Multi-step forecasts mean-revert at the persistence rate, so only the
    /// GARCH-type families support them.
    pub fn forecast_variance(&self, horizon: usize) -> Option<Vec<f64>> {
        if !self.is_garch_type() {
            return None;
        }
        let omega = self.param("omega")?;
        let persistence = self.persistence?;
        let mut out = Vec::with_capacity(horizon);
        let mut current = self.one_step_variance;
        for _ in 0..horizon {
            out.push(current);
            current = omega + persistence * current;
        }
        Some(out)
    }
}

/// Fit one family to a finite return series
pub fn fit(returns: &[f64], spec: &ModelSpec, config: &ModelConfig) -> Result<FittedModel> {
    let family = spec.family();
    if returns.len() < config.min_observations {
        return Err(PipelineError::insufficient(
            format!("{family} fit"),
            config.min_observations,
            returns.len(),
        ));
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(PipelineError::model_fit(family, "input contains non-finite values"));
    }

    match spec {
        ModelSpec::Garch(order) => estimate(&GarchProcess::garch(*order)?, *spec, returns, config),
        ModelSpec::GjrGarch(order) => estimate(&GarchProcess::gjr(*order)?, *spec, returns, config),
        ModelSpec::Egarch(order) => estimate(&EgarchProcess::new(*order)?, *spec, returns, config),
        ModelSpec::Figarch(order) => {
            estimate(&FigarchProcess::new(*order)?, *spec, returns, config)
        }
    }
}

fn estimate<P: VarianceProcess>(
    process: &P,
    spec: ModelSpec,
    returns: &[f64],
    config: &ModelConfig,
) -> Result<FittedModel> {
    let family = process.family();
    let n = returns.len();
    let mu0 = returns.iter().sum::<f64>() / n as f64;
    let resids0: Vec<f64> = returns.iter().map(|r| r - mu0).collect();
    let sample_variance = resids0.iter().map(|e| e * e).sum::<f64>() / n as f64;
    if sample_variance <= 0.0 {
        return Err(PipelineError::model_fit(family, "series has zero variance"));
    }
    let backcast = process.backcast(&resids0);

    let mut x0 = vec![mu0];
    x0.extend(process.starting_values(sample_variance));

    let objective = |x: &[f64]| -> f64 {
        let (mu, vol) = x.split_at(1);
        if !process.is_feasible(vol) {
            return optimizer::PENALTY;
        }
        let resids: Vec<f64> = returns.iter().map(|r| r - mu[0]).collect();
        let mut sigma2 = vec![0.0; n];
        process.variance(vol, &resids, backcast, &mut sigma2);
        match gaussian_loglik(&resids, &sigma2) {
            Some(ll) => -ll,
            None => optimizer::PENALTY,
        }
    };

    let minimum = optimizer::minimize(objective, &x0, &config.optimizer);
    if minimum.value >= optimizer::PENALTY {
        return Err(PipelineError::model_fit(family, "non-finite likelihood"));
    }
    if !minimum.converged {
        warn!(
            model = %family,
            evaluations = minimum.evaluations,
            "Optimizer reached evaluation cap, keeping best point"
        );
    }

    let (mu, vol) = minimum.x.split_at(1);
    let resids: Vec<f64> = returns.iter().map(|r| r - mu[0]).collect();
    let mut sigma2 = vec![0.0; n + 1];
    process.variance(vol, &resids, backcast, &mut sigma2);
    let log_likelihood = gaussian_loglik(&resids, &sigma2[..n])
        .ok_or_else(|| PipelineError::model_fit(family, "non-finite likelihood"))?;
    let one_step_variance = sigma2[n];

    let mut params = vec![("mu".to_string(), mu[0])];
    params.extend(process.parameter_names().into_iter().zip(vol.iter().copied()));
    let k = params.len() as f64;

    debug!(
        model = %family,
        log_likelihood,
        evaluations = minimum.evaluations,
        "Fitted volatility model"
    );

    Ok(FittedModel {
        spec,
        persistence: process.persistence(vol),
        aic: 2.0 * k - 2.0 * log_likelihood,
        bic: k * (n as f64).ln() - 2.0 * log_likelihood,
        log_likelihood,
        n_obs: n,
        conditional_volatility: sigma2[..n].iter().map(|v| v.sqrt()).collect(),
        one_step_variance,
        params,
        converged: minimum.converged,
        evaluations: minimum.evaluations,
    })
}

/// Exponentially weighted mean of the leading squared residuals
pub fn backcast(resids: &[f64]) -> f64 {
    let tau = resids.len().min(BACKCAST_OBS);
    if tau == 0 {
        return 0.0;
    }
    let mut weight = 1.0_f64;
    let mut weighted = 0.0_f64;
    let mut total = 0.0_f64;
    for e in &resids[..tau] {
        weighted += weight * e * e;
        total += weight;
        weight *= BACKCAST_DECAY;
    }
    weighted / total
}

/// Gaussian log-likelihood, `None` if any variance is non-positive or non-finite
pub fn gaussian_loglik(resids: &[f64], sigma2: &[f64]) -> Option<f64> {
    let mut ll = 0.0_f64;
    for (e, s2) in resids.iter().zip(sigma2.iter()) {
        if !(s2.is_finite() && *s2 > 0.0) {
            return None;
        }
        ll -= 0.5 * (LN_2PI + s2.ln() + e * e / s2);
    }
    ll.is_finite().then_some(ll)
}
