//! Walk-forward command implementation

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use volatility_walkforward::data::ReturnDataset;
use volatility_walkforward::walkforward::{evaluate_walkforward, WalkForwardEngine, WalkForwardResult};
use volatility_walkforward::{Config, MetricRow, ReturnSeries};

use super::{print_banner, print_metrics, write_output};

/// Walk-forward on the configured ticker, or on every portfolio ticker with `all`
pub fn run(config: &Config, dataset: &ReturnDataset, all: bool) -> Result<Vec<WalkForwardResult>> {
    let engine = WalkForwardEngine::new(&config.walkforward, &config.models);

    if !all {
        let series = dataset.get(&config.walkforward.ticker)?;
        let result = engine.run(series)?;
        report(config, &result, "walkforward")?;
        return Ok(vec![result]);
    }

    let series: Vec<&ReturnSeries> = config
        .portfolio
        .tickers
        .iter()
        .map(|t| dataset.get(t))
        .collect::<volatility_walkforward::Result<_>>()?;

    let pb = ProgressBar::new(series.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] {msg}")?
            .progress_chars("█░ "),
    );
    let outcomes = engine.run_many(&series, Some(&pb));
    pb.finish_and_clear();

    let mut results = Vec::new();
    for (s, outcome) in series.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                let stem = format!("walkforward_{}", s.ticker.as_str().replace('.', "_"));
                report(config, &result, &stem)?;
                results.push(result);
            }
            Err(e) => warn!(ticker = %s.ticker, error = %e, "Walk-forward failed"),
        }
    }
    if results.is_empty() {
        anyhow::bail!("Walk-forward produced no result for any ticker");
    }
    Ok(results)
}

fn report(config: &Config, result: &WalkForwardResult, stem: &str) -> Result<()> {
    write_output(config, &format!("{stem}_results.csv"), &result.rows)?;
    write_output(config, &format!("{stem}_windows.csv"), &result.windows)?;
    write_output(config, &format!("{stem}_equity.csv"), &result.equity_curve())?;

    print_banner(&format!("WALK-FORWARD: {}", result.ticker));
    println!("Windows accepted:   {}", result.windows.len());
    println!("Windows skipped:    {}", result.skipped);

    match evaluate_walkforward(result) {
        Ok(metrics) => {
            print_metrics("Out-of-sample strategy", &metrics);
            let mut rows = metrics.to_rows();
            rows.push(MetricRow::new("Windows", result.windows.len()));
            rows.push(MetricRow::new("Skipped Windows", result.skipped));
            write_output(config, &format!("{stem}_metrics.csv"), &rows)?;
        }
        Err(e) => warn!(ticker = %result.ticker, error = %e, "Evaluation skipped"),
    }

    info!(ticker = %result.ticker, "Walk-forward completed");
    Ok(())
}
