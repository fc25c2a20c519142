//! Configuration management
//!
//! One JSON file configures every stage. All sections are optional and fall
//! back to their defaults, so a partial file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::allocator::AllocatorConfig;
use crate::backtest::{PortfolioConfig, SingleAssetConfig};
use crate::diagnostics::DiagnosticsConfig;
use crate::error::PipelineError;
use crate::models::ModelConfig;
use crate::regime::RegimeConfig;
use crate::risk::RiskConfig;
use crate::strategy::PositionLimits;
use crate::walkforward::WalkForwardConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub walkforward: WalkForwardConfig,
    pub models: ModelConfig,
    pub regime: RegimeConfig,
    pub allocator: AllocatorConfig,
    pub portfolio: PortfolioConfig,
    pub single_asset: SingleAssetConfig,
    pub risk: RiskConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Long-format CSV with `Date`, `Ticker`, `log_return`
    pub returns_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            returns_path: PathBuf::from("data/processed/returns.csv"),
            output_dir: PathBuf::from("outputs/final"),
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config = serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when `path` does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Point every single-ticker stage at `ticker`
    pub fn set_ticker(&mut self, ticker: &str) {
        self.walkforward.ticker = ticker.to_string();
        self.single_asset.ticker = ticker.to_string();
    }

    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        let a = &self.allocator;
        if a.min_scale > a.max_scale {
            return invalid(format!(
                "allocator min_scale {} exceeds max_scale {}",
                a.min_scale, a.max_scale
            ));
        }
        if a.max_scale > 1.0 || a.min_scale <= 0.0 {
            return invalid("allocator scale band must lie in (0, 1]".to_string());
        }
        if a.max_var <= 0.0 || a.max_es <= 0.0 {
            return invalid("allocator VaR and ES budgets must be positive".to_string());
        }

        for (name, cl) in [
            ("allocator", a.confidence_level),
            ("risk", self.risk.confidence_level),
        ] {
            if !(cl > 0.5 && cl < 1.0) {
                return invalid(format!("{name} confidence level {cl} outside (0.5, 1)"));
            }
        }

        let r = &self.regime;
        if r.window == 0 {
            return invalid("regime window must be positive".to_string());
        }
        if !(0.0 < r.low_quantile && r.low_quantile < r.high_quantile && r.high_quantile < 1.0) {
            return invalid(format!(
                "regime quantiles out of order: {} / {}",
                r.low_quantile, r.high_quantile
            ));
        }

        validate_limits("walkforward", &self.walkforward.limits)?;
        validate_limits("single_asset", &self.single_asset.limits)?;

        let wf = &self.walkforward;
        if wf.train_years == 0 || wf.test_months == 0 {
            return invalid("walk-forward train and test spans must be positive".to_string());
        }
        if wf.families.is_empty() {
            return invalid("walk-forward needs at least one candidate family".to_string());
        }

        if self.portfolio.vol_window < 2 {
            return invalid("portfolio vol_window must be at least 2".to_string());
        }
        if self.single_asset.return_vol_lookback == 0 {
            return invalid("single_asset return_vol_lookback must be positive".to_string());
        }
        if !(self.models.persistence_threshold > 0.0) {
            return invalid("persistence threshold must be positive".to_string());
        }
        if self.risk.stress_days == 0 {
            return invalid("stress horizon must be at least one day".to_string());
        }
        Ok(())
    }
}

fn validate_limits(section: &str, limits: &PositionLimits) -> std::result::Result<(), PipelineError> {
    if limits.target_vol <= 0.0 || limits.min_position < 0.0 || limits.min_position > limits.max_position {
        return Err(PipelineError::InvalidConfig(format!(
            "{section} position limits inconsistent: target {} band {}..{}",
            limits.target_vol, limits.min_position, limits.max_position
        )));
    }
    Ok(())
}
