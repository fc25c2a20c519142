//! Integration tests for the volatility walk-forward pipeline
//!
//! These tests verify that all components work together correctly.

use std::io::Write;

use approx::assert_relative_eq;
use chrono::{Datelike, Days, NaiveDate};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

use volatility_walkforward::allocator::{apply_risk_allocator, risk_constrained_scale, AllocatorConfig};
use volatility_walkforward::backtest::{run_baseline_portfolio, run_regime_portfolio, PortfolioConfig};
use volatility_walkforward::data;
use volatility_walkforward::metrics;
use volatility_walkforward::models::{ModelConfig, OptimizerConfig};
use volatility_walkforward::regime::{
    detect_volatility_regime, regime_position_multiplier, RegimeConfig, RegimeLabel,
};
use volatility_walkforward::selector::select_index;
use volatility_walkforward::walkforward::{
    evaluate_walkforward, generate_rolling_windows, WalkForwardConfig, WalkForwardEngine,
};
use volatility_walkforward::{ModelFamily, PipelineError, ReturnPanel, ReturnSeries, Ticker};

// =============================================================================
// Test Utilities
// =============================================================================

fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut d = start;
    while dates.len() < n {
        if d.weekday().num_days_from_monday() < 5 {
            dates.push(d);
        }
        d = d + Days::new(1);
    }
    dates
}

/// GARCH(1,1) returns with Gaussian innovations
fn simulate_garch(n: usize, omega: f64, alpha: f64, beta: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut var = omega / (1.0 - alpha - beta);
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let r = var.sqrt() * rng.sample(normal);
        out.push(r);
        var = omega + alpha * r * r + beta * var;
    }
    out
}

fn normal_returns(n: usize, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sd).unwrap();
    (0..n).map(|_| rng.sample(normal)).collect()
}

fn fast_models() -> ModelConfig {
    ModelConfig {
        optimizer: OptimizerConfig {
            max_evaluations: 400,
            ..Default::default()
        },
        ..Default::default()
    }
}

// =============================================================================
// Rolling Window Tests
// =============================================================================

proptest! {
    #[test]
    fn windows_are_contiguous_and_bounded(
        year in 2000i32..2015,
        month in 1u32..=12,
        day in 1u32..=31,
        span_days in 0u64..6000,
        train_years in 1u32..5,
        test_months in 1u32..13,
    ) {
        let start = NaiveDate::from_ymd_opt(year, month, day);
        prop_assume!(start.is_some());
        let start = start.unwrap();
        let dates = vec![start, start + Days::new(span_days)];
        let windows: Vec<_> = generate_rolling_windows(&dates, train_years, test_months).collect();

        for (i, w) in windows.iter().enumerate() {
            prop_assert_eq!(w.id, i);
            prop_assert_eq!(w.train_end, w.test_start);
            prop_assert!(w.train_start < w.train_end);
            prop_assert!(w.test_start < w.test_end);
            prop_assert!(w.test_end <= dates[1]);
        }
        for pair in windows.windows(2) {
            // test periods tile the timeline without gaps or overlap
            prop_assert_eq!(pair[0].test_end, pair[1].test_start);
        }
    }
}

#[test]
fn test_windows_empty_for_short_history() {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let dates = business_days(start, 300);
    assert_eq!(generate_rolling_windows(&dates, 3, 3).count(), 0);
    assert_eq!(generate_rolling_windows(&[], 3, 3).count(), 0);
}

// =============================================================================
// Model Selection Tests
// =============================================================================

#[test]
fn test_selector_excludes_persistent_candidates() {
    let candidates = [(Some(0.99), 100.0), (Some(0.95), 200.0), (Some(0.97), 150.0)];
    assert_eq!(select_index(&candidates, 0.98), Some(2));
}

#[test]
fn test_selector_falls_back_when_all_unstable() {
    let candidates = [(Some(0.99), 300.0), (Some(0.995), 250.0)];
    assert_eq!(select_index(&candidates, 0.98), Some(1));
}

#[test]
fn test_selector_keeps_long_memory_candidates() {
    let candidates = [(Some(0.99), 100.0), (None, 120.0)];
    assert_eq!(select_index(&candidates, 0.98), Some(1));
    assert_eq!(select_index(&[], 0.98), None);
}

// =============================================================================
// Regime Tests
// =============================================================================

#[test]
fn test_regime_multipliers() {
    assert_eq!(regime_position_multiplier("LOW"), 1.2);
    assert_eq!(regime_position_multiplier("MEDIUM"), 1.0);
    assert_eq!(regime_position_multiplier("HIGH"), 0.5);
    assert_eq!(regime_position_multiplier("EXTREME"), 0.0);
}

#[test]
fn test_regime_labels_cover_every_observation() {
    let vol: Vec<Option<f64>> = normal_returns(500, 0.002, 11)
        .into_iter()
        .map(|x| Some(0.015 + x))
        .collect();
    let labels = detect_volatility_regime(&vol, &RegimeConfig::default());
    assert_eq!(labels.len(), vol.len());
    assert!(labels[..59].iter().all(|l| *l == RegimeLabel::Medium));
    for label in RegimeLabel::ALL {
        assert!(labels[59..].contains(&label));
    }
}

// =============================================================================
// Risk Allocator Tests
// =============================================================================

#[test]
fn test_allocator_scale_within_band() {
    let returns = normal_returns(1000, 0.01, 42);
    let config = AllocatorConfig::default();
    let summary = risk_constrained_scale(&returns, &config);

    assert!(summary.scale >= 0.3 && summary.scale <= 1.0);
    assert!(summary.var > 0.0);
    assert!(summary.es >= summary.var);
}

#[test]
fn test_allocator_cuts_exposure_for_riskier_series() {
    let config = AllocatorConfig::default();
    let calm = risk_constrained_scale(&normal_returns(1000, 0.01, 42), &config);
    let wild = risk_constrained_scale(&normal_returns(1000, 0.03, 42), &config);
    assert!(wild.scale < calm.scale);
    assert!(wild.scale >= config.min_scale);
}

#[test]
fn test_allocator_equity_is_scaled_and_finite() {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let dates = business_days(start, 500);
    let mut returns = normal_returns(500, 0.03, 7);
    returns[10] = f64::NAN;

    let (series, summary) = apply_risk_allocator(&dates, &returns, &AllocatorConfig::default());
    assert_eq!(series.dates.len(), 499);
    assert!(series.adjusted_equity.iter().all(|e| e.is_finite()));
    for (raw, adj) in series.raw_returns.iter().zip(series.adjusted_returns.iter()) {
        assert_relative_eq!(*adj, raw * summary.scale);
    }
}

#[test]
fn test_allocator_equity_monotone_in_scale() {
    let dates = business_days(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 250);
    let gains: Vec<f64> = normal_returns(250, 0.01, 3).iter().map(|r| r.abs()).collect();
    let equity_at = |scale: f64| {
        let config = AllocatorConfig {
            min_scale: scale,
            max_scale: scale,
            ..Default::default()
        };
        apply_risk_allocator(&dates, &gains, &config).0.adjusted_equity
    };

    let low = equity_at(0.4);
    let high = equity_at(0.9);
    for (a, b) in low.iter().zip(high.iter()) {
        assert!(a <= b);
    }
    assert_relative_eq!(low[0], 1.0 + 0.4 * gains[0]);
}

#[test]
fn test_allocator_empty_series_keeps_full_scale() {
    let summary = risk_constrained_scale(&[], &AllocatorConfig::default());
    assert_eq!(summary.var, 0.0);
    assert_eq!(summary.scale, 1.0);
}

// =============================================================================
// Metrics Tests
// =============================================================================

#[test]
fn test_max_drawdown_never_positive() {
    for seed in 0..5 {
        let m = metrics::metrics_from_returns(&normal_returns(300, 0.02, seed));
        assert!(m.max_drawdown <= 0.0);
        assert!(m.sharpe_ratio.is_finite());
    }
}

#[test]
fn test_sharpe_finite_at_zero_volatility() {
    let m = metrics::metrics_from_returns(&[0.0; 100]);
    assert_eq!(m.annual_volatility, 0.0);
    assert_eq!(m.sharpe_ratio, 0.0);
}

// =============================================================================
// Walk-Forward Tests
// =============================================================================

#[test]
fn test_walkforward_ten_years_is_gap_free() {
    let n = 10 * 261;
    let dates = business_days(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(), n);
    let returns = simulate_garch(n, 2e-6, 0.08, 0.9, 2024);
    let series = ReturnSeries::new(Ticker::new("INFY.NS"), dates, returns).unwrap();

    let config = WalkForwardConfig {
        families: vec![ModelFamily::Garch],
        ..Default::default()
    };
    let models = fast_models();
    let result = WalkForwardEngine::new(&config, &models).run(&series).unwrap();

    assert_eq!(result.skipped, 0);
    let first = result.windows[0].test_start;
    let last = result.windows[result.windows.len() - 1].test_end;
    let expected: Vec<NaiveDate> = series
        .dates
        .iter()
        .copied()
        .filter(|d| *d >= first && *d < last)
        .collect();
    let got: Vec<NaiveDate> = result.rows.iter().map(|r| r.date).collect();
    assert_eq!(got, expected);

    for row in &result.rows {
        assert!(row.position_size >= 0.1 && row.position_size <= 2.0);
        assert!(row.signal == 1.0 || row.signal == 0.0);
        assert!(row.strategy_return.is_finite());
    }

    let metrics = evaluate_walkforward(&result).unwrap();
    assert!(metrics.max_drawdown <= 0.0);
    assert_eq!(metrics.observations, result.rows.len());
}

#[test]
fn test_walkforward_fails_without_valid_windows() {
    let dates = business_days(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 200);
    let series = ReturnSeries::new(Ticker::new("X"), dates, normal_returns(200, 0.01, 1)).unwrap();
    let config = WalkForwardConfig::default();
    let models = fast_models();
    assert!(matches!(
        WalkForwardEngine::new(&config, &models).run(&series),
        Err(PipelineError::NoValidWindows { .. })
    ));
}

// =============================================================================
// Portfolio Tests
// =============================================================================

#[test]
fn test_baseline_and_regime_portfolios() {
    let dates = business_days(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), 400);
    let series: Vec<ReturnSeries> = (0..3)
        .map(|k| {
            ReturnSeries::new(
                Ticker::new(format!("S{k}")),
                dates.clone(),
                normal_returns(400, 0.01 * (k + 1) as f64, 50 + k as u64),
            )
            .unwrap()
        })
        .collect();
    let refs: Vec<&ReturnSeries> = series.iter().collect();
    let panel = ReturnPanel::from_series(&refs);
    let config = PortfolioConfig {
        tickers: vec!["S0".into(), "S1".into(), "S2".into()],
        ..Default::default()
    };

    let baseline = run_baseline_portfolio(&panel, &config).unwrap();
    assert_eq!(baseline.returns.len(), 400 - config.vol_window);
    assert!(baseline.metrics.max_drawdown <= 0.0);

    let regime = run_regime_portfolio(
        &panel,
        &config,
        &RegimeConfig::default(),
        &AllocatorConfig::default(),
    )
    .unwrap();
    assert_eq!(regime.allocated.dates.len(), 400);
    assert!(regime.risk.scale >= 0.3 && regime.risk.scale <= 1.0);
}

// =============================================================================
// Data Loading Tests
// =============================================================================

#[test]
fn test_load_returns_and_build_panel() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Date,Ticker,log_return").unwrap();
    writeln!(file, "2021-01-04,A,").unwrap();
    writeln!(file, "2021-01-05,A,0.01").unwrap();
    writeln!(file, "2021-01-06,A,-0.02").unwrap();
    writeln!(file, "2021-01-05,B,0.03").unwrap();
    writeln!(file, "2021-01-07,B,0.01").unwrap();
    file.flush().unwrap();

    let dataset = data::load_returns(file.path()).unwrap();
    let panel = dataset.panel(&["A".to_string(), "B".to_string()]).unwrap();

    assert_eq!(panel.len(), 3);
    assert_eq!(panel.values[0], vec![Some(0.01), Some(0.03)]);
    assert_eq!(panel.values[1], vec![Some(-0.02), None]);
    assert_eq!(panel.complete_rows().len(), 1);

    assert!(matches!(
        dataset.panel(&["A".to_string(), "C".to_string()]),
        Err(PipelineError::UnknownTicker(_))
    ));
}
