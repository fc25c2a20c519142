//! Single-asset and portfolio backtest drivers

pub mod portfolio;
pub mod single_asset;

pub use portfolio::{
    compare_portfolios, run_baseline_portfolio, run_regime_portfolio, ComparisonRow,
    PortfolioConfig, PortfolioResult, RegimePortfolioResult,
};
pub use single_asset::{
    run_single_asset, run_single_asset_backtest, SingleAssetConfig, SingleAssetResult,
    SingleAssetRow,
};
