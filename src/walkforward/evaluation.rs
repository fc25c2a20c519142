//! Aggregate evaluation of a walk-forward run

use crate::error::{PipelineError, Result};
use crate::indicators;
use crate::metrics;
use crate::types::PerformanceMetrics;

use super::engine::WalkForwardResult;

/// Fewest out-of-sample returns worth evaluating
pub const MIN_EVALUATION_OBS: usize = 50;

/// Metrics over the concatenated out-of-sample strategy returns
pub fn evaluate_walkforward(result: &WalkForwardResult) -> Result<PerformanceMetrics> {
    let returns = indicators::finite(&result.strategy_returns());
    if returns.len() < MIN_EVALUATION_OBS {
        return Err(PipelineError::insufficient(
            format!("walk-forward evaluation of {}", result.ticker),
            MIN_EVALUATION_OBS,
            returns.len(),
        ));
    }
    Ok(metrics::metrics_from_returns(&returns))
}
