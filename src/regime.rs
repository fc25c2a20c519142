//! Volatility regime classification
//!
//! Labels come from trailing quantiles of the volatility series, inclusive of
//! the current value. Callers pass lagged volatility so a label never uses
//! same-day information.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::indicators;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegimeLabel {
    Low,
    Medium,
    High,
}

impl RegimeLabel {
    pub const ALL: [RegimeLabel; 3] = [RegimeLabel::Low, RegimeLabel::Medium, RegimeLabel::High];

    /// Position multiplier applied by the regime-aware strategies
    pub fn multiplier(&self) -> f64 {
        match self {
            RegimeLabel::Low => 1.2,
            RegimeLabel::Medium => 1.0,
            RegimeLabel::High => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeLabel::Low => "LOW",
            RegimeLabel::Medium => "MEDIUM",
            RegimeLabel::High => "HIGH",
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RegimeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(RegimeLabel::Low),
            "MEDIUM" => Ok(RegimeLabel::Medium),
            "HIGH" => Ok(RegimeLabel::High),
            other => Err(format!("unknown regime label '{other}'")),
        }
    }
}

/// Multiplier for a label in text form; anything unrecognised means no exposure
pub fn regime_position_multiplier(label: &str) -> f64 {
    label.parse::<RegimeLabel>().map_or(0.0, |r| r.multiplier())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Trailing observations in the quantile window
    pub window: usize,
    pub low_quantile: f64,
    pub high_quantile: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            window: 60,
            low_quantile: 0.33,
            high_quantile: 0.66,
        }
    }
}

/// Label every observation of a volatility series
///
/// MEDIUM whenever the trailing window is incomplete or touches a missing value.
pub fn detect_volatility_regime(volatility: &[Option<f64>], config: &RegimeConfig) -> Vec<RegimeLabel> {
    let low = indicators::rolling_quantile(volatility, config.window, config.low_quantile);
    let high = indicators::rolling_quantile(volatility, config.window, config.high_quantile);

    volatility
        .iter()
        .zip(low.iter().zip(high.iter()))
        .map(|(v, (l, h))| match (v, l, h) {
            (Some(v), Some(l), Some(_)) if v < l => RegimeLabel::Low,
            (Some(v), Some(_), Some(h)) if v < h => RegimeLabel::Medium,
            (Some(_), Some(_), Some(_)) => RegimeLabel::High,
            _ => RegimeLabel::Medium,
        })
        .collect()
}
