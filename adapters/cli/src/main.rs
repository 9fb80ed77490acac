#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that generates price curves for price-chart rounds.

mod config;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::RoundArgs;
use price_curve_core::seeded_rng;
use price_curve_series::MultiPeriodGenerator;
use price_curve_system_hump::generate_series;
use price_curve_system_planner::PeriodPlanner;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "price-curve",
    version,
    about = "Generate synthetic price curves for price-chart rounds"
)]
struct Cli {
    /// Log generator stages at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a complete multi-period series
    Generate {
        #[command(flatten)]
        round: RoundArgs,

        /// Emit only the combined daily prices
        #[arg(long)]
        prices_only: bool,
    },
    /// Generate a single hump of `days_count` values
    Hump {
        #[command(flatten)]
        round: RoundArgs,
    },
    /// Plan the humps of the trading window
    Plan {
        #[command(flatten)]
        round: RoundArgs,
    },
}

/// Entry point for the price curve command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Generate { round, prices_only } => {
            let config = round.resolve()?;
            let seed = config.rng_seed();
            let generator = MultiPeriodGenerator::new(config.tuning);
            let series = generator
                .generate(&config.curve, &config.trading, &mut seeded_rng(seed))
                .context("failed to generate price series")?;
            info!(
                seed,
                days = series.combined_prices.len(),
                periods = series.periods.len(),
                "generated price series"
            );
            if prices_only {
                emit(&series.combined_prices)
            } else {
                emit(&series)
            }
        }
        Command::Hump { round } => {
            let config = round.resolve()?;
            let seed = config.rng_seed();
            let series = generate_series(&config.curve, &mut seeded_rng(seed))
                .context("failed to generate hump")?;
            info!(seed, days = series.prices.len(), "generated hump");
            emit(&series)
        }
        Command::Plan { round } => {
            let config = round.resolve()?;
            let seed = config.rng_seed();
            let days = config.planning_days()?;
            let plan = PeriodPlanner::new(config.tuning.planner)
                .plan(
                    config.curve.total_area,
                    config.trading.min_sell_price,
                    config.trading.start_day,
                    days,
                    &mut seeded_rng(seed),
                )
                .context("failed to plan periods")?;
            info!(seed, humps = plan.hump_count, "planned periods");
            emit(&plan)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value).context("failed to encode json output")?;
    writeln!(handle).context("failed to write json output")?;
    Ok(())
}
