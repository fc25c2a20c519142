//! Risk analytics command implementation

use anyhow::Result;
use tracing::info;
use volatility_walkforward::data::ReturnDataset;
use volatility_walkforward::models;
use volatility_walkforward::risk::{
    capital_adequacy, compute_portfolio_risk, compute_var_es, run_stress_tests, CapitalAdequacy,
};
use volatility_walkforward::Config;

use super::{print_banner, write_output};

/// VaR/ES, stress tests and capital adequacy for the single-asset ticker,
/// then tail risk of the equal-weight portfolio
pub fn run(config: &Config, dataset: &ReturnDataset) -> Result<CapitalAdequacy> {
    let cfg = &config.single_asset;
    let series = dataset.get(&cfg.ticker)?;
    let returns = series.finite_returns();

    let model = models::fit(&returns, &config.models.spec_for(cfg.family), &config.models)?;
    info!("Risk model {} fitted on {} returns", model.family(), returns.len());

    let var_es = compute_var_es(&returns, &model.conditional_volatility, config.risk.confidence_level)?;
    write_output(config, "risk_var_es.csv", &var_es.to_rows())?;

    let stress = run_stress_tests(&returns, &model.conditional_volatility, &config.risk)?;
    write_output(config, "risk_stress_tests.csv", &stress.to_rows())?;

    let capital = capital_adequacy(&var_es, &stress, config.risk.available_capital);
    write_output(config, "risk_capital_adequacy.csv", &capital.to_rows())?;

    let panel = dataset.panel(&config.portfolio.tickers)?;
    let portfolio = compute_portfolio_risk(&panel)?;
    write_output(config, "portfolio_risk.csv", &portfolio.to_rows())?;

    print_banner(&format!("RISK: {}", cfg.ticker));
    println!("Historical VaR:     {:>8.4}", var_es.historical_var);
    println!("Model VaR:          {:>8.4}", var_es.model_var);
    println!("VaR violations:     {:>8.2}%", var_es.violation_rate * 100.0);
    println!("Model ES:           {:>8.4}", var_es.model_es);
    println!("Worst day:          {:>8.4}", stress.worst_daily_loss);
    println!("{}-day shock:        {:>8.4}", stress.stress_days, stress.multi_day_shock);
    println!(
        "Capital required:   {:>8.4} of {:.2} -> {}",
        capital.capital_required, capital.available_capital, capital.status
    );
    println!("Portfolio VaR 95%:  {:>8.4}", portfolio.var_95);
    println!("Diversification:    {:>8.2}%", portfolio.diversification_benefit * 100.0);

    Ok(capital)
}
