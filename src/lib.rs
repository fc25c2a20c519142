//! Volatility Walk-Forward
//!
//! Research pipeline for conditional-volatility models on daily equity
//! returns: rolling walk-forward refits of GARCH-family models with
//! persistence-aware selection, volatility-targeted and regime-aware
//! strategies, a risk-constrained capital allocator, and VaR/ES analytics.

pub mod allocator;
pub mod backtest;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod models;
pub mod regime;
pub mod risk;
pub mod selector;
pub mod strategy;
pub mod types;
pub mod walkforward;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use models::{FittedModel, ModelFamily};
pub use types::*;
