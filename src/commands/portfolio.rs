//! Portfolio backtest command implementation

use anyhow::Result;
use tracing::info;
use volatility_walkforward::backtest::{
    compare_portfolios, run_baseline_portfolio, run_regime_portfolio, RegimePortfolioResult,
};
use volatility_walkforward::data::ReturnDataset;
use volatility_walkforward::{Config, MetricRow};

use super::{print_banner, print_metrics, write_output};

/// Baseline and regime-aware portfolios over the configured tickers
pub fn run(config: &Config, dataset: &ReturnDataset) -> Result<RegimePortfolioResult> {
    let panel = dataset.panel(&config.portfolio.tickers)?;
    info!(
        "Portfolio panel: {} tickers, {} dates",
        panel.n_assets(),
        panel.len()
    );

    let baseline = run_baseline_portfolio(&panel, &config.portfolio)?;
    write_output(config, "portfolio_baseline.csv", &baseline.points())?;

    let regime = run_regime_portfolio(&panel, &config.portfolio, &config.regime, &config.allocator)?;
    write_output(config, "portfolio_regime_risk_adjusted.csv", &regime.allocated.points())?;
    write_output(
        config,
        "portfolio_regime_risk_allocator.csv",
        &[
            MetricRow::new("Portfolio_VaR", regime.risk.var),
            MetricRow::new("Portfolio_ES", regime.risk.es),
            MetricRow::new("Risk_Scale", regime.risk.scale),
        ],
    )?;

    let comparison = compare_portfolios(&baseline.metrics, &regime.metrics);
    write_output(config, "portfolio_comparison.csv", &comparison)?;

    print_banner("PORTFOLIO COMPARISON");
    print_metrics("Baseline (inverse volatility)", &baseline.metrics);
    print_metrics("Regime-aware + risk allocator", &regime.metrics);
    println!("Risk scale:         {:.3}", regime.risk.scale);
    println!("Equal-weight days:  {}", regime.fallback_days);

    Ok(regime)
}
