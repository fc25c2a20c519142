//! Diagnostics command implementation

use anyhow::Result;
use tracing::info;
use volatility_walkforward::allocator::RiskSummary;
use volatility_walkforward::backtest::SingleAssetResult;
use volatility_walkforward::data::ReturnDataset;
use volatility_walkforward::diagnostics::{allocator_stats, crisis_window, regime_performance};
use volatility_walkforward::regime::RegimeLabel;
use volatility_walkforward::Config;

use super::{print_banner, write_output};

/// Regime, allocator and crisis diagnostics
///
/// Results of earlier stages are reused when given and recomputed otherwise.
pub fn run(
    config: &Config,
    dataset: &ReturnDataset,
    single_asset: Option<&SingleAssetResult>,
    allocator: Option<RiskSummary>,
) -> Result<()> {
    let computed;
    let backtest = match single_asset {
        Some(result) => result,
        None => {
            computed = super::single_asset::run(config, dataset)?;
            &computed
        }
    };
    let risk = match allocator {
        Some(risk) => risk,
        None => super::portfolio::run(config, dataset)?.risk,
    };

    let regimes: Vec<RegimeLabel> = backtest.rows.iter().map(|r| r.regime).collect();
    let returns: Vec<f64> = backtest.rows.iter().map(|r| r.strategy_return).collect();
    let dates: Vec<_> = backtest.rows.iter().map(|r| r.date).collect();

    print_banner("DIAGNOSTICS");

    let by_regime = regime_performance(&regimes, &returns, config.diagnostics.min_regime_observations);
    write_output(config, "diagnostic_regime_performance.csv", &by_regime)?;
    println!("Regime-wise performance");
    for r in &by_regime {
        println!(
            "  {:<8} return {:>7.2}%  sharpe {:>6.2}  maxdd {:>7.2}%  n={}",
            r.regime,
            r.annual_return * 100.0,
            r.sharpe_ratio,
            r.max_drawdown * 100.0,
            r.observations
        );
    }

    let stats = allocator_stats(&risk);
    write_output(config, "diagnostic_allocator_stats.csv", &stats.to_rows())?;
    println!(
        "Risk allocator: scale {:.3}, active {}",
        stats.scale, stats.active
    );

    let crises: Vec<_> = config
        .diagnostics
        .crisis_windows
        .iter()
        .map(|w| crisis_window(&dates, &returns, w))
        .collect();
    write_output(config, "diagnostic_crisis_analysis.csv", &crises)?;
    for c in &crises {
        println!(
            "  {:<12} maxdd {:>7.2}%  vol {:>7.2}%  n={}",
            c.name,
            c.max_drawdown * 100.0,
            c.volatility * 100.0,
            c.observations
        );
    }

    info!("Diagnostics completed");
    Ok(())
}
