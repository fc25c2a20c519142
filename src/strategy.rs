//! Position sizing and trading signals
//!
//! Every signal here is consumed lagged: the value used on day t is computed
//! from data up to t − 1.

use serde::{Deserialize, Serialize};

use crate::indicators;

/// Volatility-targeting band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionLimits {
    pub target_vol: f64,
    pub min_position: f64,
    pub max_position: f64,
}

impl Default for PositionLimits {
    fn default() -> Self {
        PositionLimits {
            target_vol: 0.01,
            min_position: 0.1,
            max_position: 2.0,
        }
    }
}

/// `target_vol / volatility` clipped to the band
///
/// `None` for a missing, zero, negative or non-finite volatility.
pub fn volatility_target_position(volatility: Option<f64>, limits: &PositionLimits) -> Option<f64> {
    let vol = volatility.filter(|v| v.is_finite() && *v > 0.0)?;
    let position = limits.target_vol / vol;
    position
        .is_finite()
        .then(|| position.clamp(limits.min_position, limits.max_position))
}

/// 1 when the previous day's return was positive, otherwise 0
///
/// `previous` is the return observed before `returns[0]`, if any.
pub fn momentum_signal(returns: &[f64], previous: Option<f64>) -> Vec<f64> {
    std::iter::once(previous)
        .chain(returns.iter().map(|r| Some(*r)))
        .take(returns.len())
        .map(|prev| match prev {
            Some(r) if r > 0.0 => 1.0,
            _ => 0.0,
        })
        .collect()
}

/// Rolling mean return over forecast volatility, clipped to `±clip`
///
/// Undefined until the rolling window fills or where volatility is missing.
pub fn return_vol_signal(
    returns: &[f64],
    volatility: &[Option<f64>],
    lookback: usize,
    clip: f64,
) -> Vec<Option<f64>> {
    let expected = indicators::rolling_mean(&indicators::to_optional(returns), lookback);
    expected
        .iter()
        .zip(volatility.iter())
        .map(|(mean, vol)| {
            let ratio = (*mean)? / (*vol)?;
            ratio.is_finite().then(|| ratio.clamp(-clip, clip))
        })
        .collect()
}

/// Binary signal from the previous day's return/vol ratio
pub fn lagged_positive(signal: &[Option<f64>]) -> Vec<f64> {
    indicators::lag(signal, 1)
        .into_iter()
        .map(|s| if s.is_some_and(|v| v > 0.0) { 1.0 } else { 0.0 })
        .collect()
}
