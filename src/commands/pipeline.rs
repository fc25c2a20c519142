//! Full pipeline: every stage in order over one loaded dataset

use anyhow::{Context, Result};
use tracing::info;
use volatility_walkforward::data::ReturnDataset;
use volatility_walkforward::Config;

pub fn run(config: &Config, dataset: &ReturnDataset) -> Result<()> {
    info!("Starting full pipeline");

    super::walkforward::run(config, dataset, false).context("Walk-forward stage failed")?;
    let single_asset = super::single_asset::run(config, dataset).context("Single-asset stage failed")?;
    let portfolio = super::portfolio::run(config, dataset).context("Portfolio stage failed")?;
    super::risk::run(config, dataset).context("Risk stage failed")?;
    super::diagnostics::run(config, dataset, Some(&single_asset), Some(portfolio.risk))
        .context("Diagnostics stage failed")?;

    info!(
        "Pipeline completed, results saved in {}",
        config.data.output_dir.display()
    );
    Ok(())
}
