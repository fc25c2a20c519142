//! Single-asset backtest command implementation

use anyhow::Result;
use serde::Serialize;
use tracing::info;
use volatility_walkforward::backtest::{run_single_asset, SingleAssetResult};
use volatility_walkforward::data::ReturnDataset;
use volatility_walkforward::{Config, PerformanceMetrics};

use super::{print_banner, print_metrics, write_output};

#[derive(Debug, Serialize)]
struct StrategyVsBenchmark {
    #[serde(rename = "Metric")]
    metric: &'static str,
    #[serde(rename = "Strategy")]
    strategy: f64,
    #[serde(rename = "Buy_Hold")]
    buy_hold: f64,
}

fn comparison(strategy: &PerformanceMetrics, buy_hold: &PerformanceMetrics) -> Vec<StrategyVsBenchmark> {
    let row = |metric, pick: fn(&PerformanceMetrics) -> f64| StrategyVsBenchmark {
        metric,
        strategy: pick(strategy),
        buy_hold: pick(buy_hold),
    };
    vec![
        row("Annual Return", |m| m.annual_return),
        row("Annual Volatility", |m| m.annual_volatility),
        row("Sharpe Ratio", |m| m.sharpe_ratio),
        row("Max Drawdown", |m| m.max_drawdown),
    ]
}

pub fn run(config: &Config, dataset: &ReturnDataset) -> Result<SingleAssetResult> {
    let cfg = &config.single_asset;
    let series = dataset.get(&cfg.ticker)?;
    info!("Running single-asset backtest for {} ({})", cfg.ticker, cfg.family);

    let result = run_single_asset(series, cfg, &config.models, &config.regime)?;

    write_output(config, "single_asset_backtest.csv", &result.rows)?;
    write_output(
        config,
        "single_asset_metrics.csv",
        &comparison(&result.strategy, &result.buy_hold),
    )?;

    print_banner(&format!("SINGLE ASSET: {} ({})", cfg.ticker, result.model.family()));
    println!("AIC:                {:.2}", result.model.aic);
    if let Some(p) = result.model.persistence {
        println!("Persistence:        {:.4}", p);
    }
    for (label, count) in result.regime_counts() {
        println!("{:<8} regime days: {}", label, count);
    }
    print_metrics("Strategy", &result.strategy);
    print_metrics("Buy & Hold", &result.buy_hold);

    Ok(result)
}
