//! Command implementations

pub mod diagnostics;
pub mod pipeline;
pub mod portfolio;
pub mod risk;
pub mod single_asset;
pub mod walkforward;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use volatility_walkforward::data::{self, ReturnDataset};
use volatility_walkforward::{Config, PerformanceMetrics};

/// Values given on the command line that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ticker: Option<String>,
    pub data: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Load the configuration file (or defaults) and apply overrides
pub fn load_config(config_path: Option<&str>, overrides: &Overrides) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded configuration from: {}", path);
            config
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(ticker) = &overrides.ticker {
        info!("Overriding ticker to: {}", ticker);
        config.set_ticker(ticker);
    }
    if let Some(data) = &overrides.data {
        info!("Overriding returns data to: {}", data.display());
        config.data.returns_path = data.clone();
    }
    if let Some(output) = &overrides.output {
        info!("Overriding output directory to: {}", output.display());
        config.data.output_dir = output.clone();
    }

    config.validate()?;
    Ok(config)
}

pub fn load_dataset(config: &Config) -> Result<ReturnDataset> {
    let path = &config.data.returns_path;
    data::load_returns(path).with_context(|| format!("Failed to load returns from {}", path.display()))
}

/// Write one CSV artefact into the output directory
pub fn write_output<T: serde::Serialize>(config: &Config, name: &str, rows: &[T]) -> Result<PathBuf> {
    let path = output_path(&config.data.output_dir, name);
    data::write_csv(&path, rows).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved {}", path.display());
    Ok(path)
}

fn output_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

pub fn print_banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

pub fn print_metrics(label: &str, metrics: &PerformanceMetrics) {
    println!("{label}");
    println!("  Annual Return:      {:>8.2}%", metrics.annual_return * 100.0);
    println!("  Annual Volatility:  {:>8.2}%", metrics.annual_volatility * 100.0);
    println!("  Sharpe Ratio:       {:>8.2}", metrics.sharpe_ratio);
    println!("  Max Drawdown:       {:>8.2}%", metrics.max_drawdown * 100.0);
    println!("  Observations:       {:>8}", metrics.observations);
}
