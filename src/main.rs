//! Volatility walk-forward research - main entry point
//!
//! Subcommands:
//! - walkforward: Rolling refits with model selection and out-of-sample trading
//! - single-asset: Regime-aware volatility-targeted backtest on one ticker
//! - portfolio: Baseline vs regime-aware portfolio with risk allocator
//! - risk: VaR/ES, stress tests and capital adequacy
//! - diagnostics: Regime, allocator and crisis-window diagnostics
//! - pipeline: All of the above in order

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::Overrides;

#[derive(Parser, Debug)]
#[command(name = "volatility-walkforward")]
#[command(about = "Walk-forward volatility modelling, regime-aware portfolios and risk analytics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Ticker for the single-ticker stages (overrides config file)
    #[arg(short, long, global = true)]
    ticker: Option<String>,

    /// Returns CSV (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Output directory (overrides config file)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rolling walk-forward with per-window model refits
    Walkforward {
        /// Run every portfolio ticker instead of the configured one
        #[arg(long)]
        all: bool,

        /// Run windows sequentially instead of in parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Single-asset regime-aware backtest
    SingleAsset,

    /// Baseline and regime-aware portfolio backtests
    Portfolio,

    /// Single-asset and portfolio risk analytics
    Risk,

    /// Regime, allocator and crisis diagnostics
    Diagnostics,

    /// Run every stage in order
    Pipeline,
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Walkforward { .. } => "walkforward",
        Commands::SingleAsset => "single_asset",
        Commands::Portfolio => "portfolio",
        Commands::Risk => "risk",
        Commands::Diagnostics => "diagnostics",
        Commands::Pipeline => "pipeline",
    };

    setup_logging(cli.verbose, command_name)?;

    let overrides = Overrides {
        ticker: cli.ticker,
        data: cli.data,
        output: cli.output,
    };
    let mut config = commands::load_config(cli.config.as_deref(), &overrides)?;
    let dataset = commands::load_dataset(&config)?;

    match cli.command {
        Commands::Walkforward { all, sequential } => {
            if sequential {
                config.walkforward.parallel = false;
            }
            commands::walkforward::run(&config, &dataset, all).map(|_| ())
        }
        Commands::SingleAsset => commands::single_asset::run(&config, &dataset).map(|_| ()),
        Commands::Portfolio => commands::portfolio::run(&config, &dataset).map(|_| ()),
        Commands::Risk => commands::risk::run(&config, &dataset).map(|_| ()),
        Commands::Diagnostics => commands::diagnostics::run(&config, &dataset, None, None),
        Commands::Pipeline => commands::pipeline::run(&config, &dataset),
    }
}
