//! Model selection across candidate families
//!
//! Candidates at or above the persistence threshold are excluded unless that
//! would leave nothing, in which case the full set is used. The lowest AIC
//! wins; ties go to the earlier candidate.

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::models::{self, FittedModel, ModelConfig, ModelFamily, ModelSpec};

/// Outcome of fitting one family, kept even when the fit failed
#[derive(Debug)]
pub struct FitAttempt {
    pub family: ModelFamily,
    pub result: Result<FittedModel>,
}

/// Fit every family in order on the same training series
pub fn refit_all_models(
    returns: &[f64],
    families: &[ModelFamily],
    config: &ModelConfig,
) -> Vec<FitAttempt> {
    let specs: Vec<ModelSpec> = families.iter().map(|&f| config.spec_for(f)).collect();
    refit_specs(returns, &specs, config)
}

/// Fit explicit specifications in order
pub fn refit_specs(returns: &[f64], specs: &[ModelSpec], config: &ModelConfig) -> Vec<FitAttempt> {
    specs
        .iter()
        .map(|spec| FitAttempt {
            family: spec.family(),
            result: models::fit(returns, spec, config),
        })
        .collect()
}

/// Index of the winning candidate given `(persistence, aic)` pairs
///
/// A `None` persistence is never filtered. Returns `None` only for an empty
/// candidate list.
pub fn select_index(candidates: &[(Option<f64>, f64)], threshold: f64) -> Option<usize> {
    let stable: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, (persistence, _))| persistence.map_or(true, |p| p < threshold))
        .map(|(i, _)| i)
        .collect();

    let pool: Vec<usize> = if stable.is_empty() {
        (0..candidates.len()).collect()
    } else {
        stable
    };

    pool.into_iter().fold(None, |best: Option<usize>, i| match best {
        Some(b) if candidates[b].1 <= candidates[i].1 => Some(b),
        _ => Some(i),
    })
}

/// Pick the best of already fitted models
pub fn select_best_model(candidates: Vec<FittedModel>, threshold: f64) -> Result<FittedModel> {
    let keys: Vec<(Option<f64>, f64)> = candidates
        .iter()
        .map(|m| (m.persistence, m.aic))
        .collect();
    let winner = select_index(&keys, threshold).ok_or(PipelineError::NoCandidates)?;
    if keys.iter().all(|(p, _)| p.is_some_and(|p| p >= threshold)) {
        debug!(threshold, "All candidates persistence-unstable, using full set");
    }
    candidates
        .into_iter()
        .nth(winner)
        .ok_or(PipelineError::NoCandidates)
}

/// Refit all families and select, tolerating per-family failures
pub fn fit_and_select(
    returns: &[f64],
    families: &[ModelFamily],
    config: &ModelConfig,
) -> Result<FittedModel> {
    select_from_attempts(refit_all_models(returns, families, config), config.persistence_threshold)
}

/// Select among the successful attempts, logging the failures
pub fn select_from_attempts(attempts: Vec<FitAttempt>, threshold: f64) -> Result<FittedModel> {
    let mut fitted = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        match attempt.result {
            Ok(model) => fitted.push(model),
            Err(e) => warn!(model = %attempt.family, error = %e, "Candidate dropped"),
        }
    }
    select_best_model(fitted, threshold)
}
