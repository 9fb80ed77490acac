//! Round descriptions loaded from TOML files and command-line overrides.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Args;
use price_curve_core::{derive_round_seed, CurveParams, TradingParams};
use price_curve_series::SeriesTuning;
use serde::Deserialize;

/// A single generation round.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RoundConfig {
    /// Global seed of the generator.
    pub(crate) seed: u64,
    /// Round number mixed into the seed when present.
    pub(crate) round: Option<u64>,
    /// Curve shape and area budget.
    pub(crate) curve: CurveParams,
    /// Trading window and floor.
    pub(crate) trading: TradingParams,
    /// Pipeline tuning.
    pub(crate) tuning: SeriesTuning,
}

impl RoundConfig {
    /// Reads and parses a round description from disk.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read round config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid round config at {}", path.display()))
    }

    /// Parses a round description from TOML contents.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse round config toml contents")
    }

    /// Seed handed to the generator.
    pub(crate) fn rng_seed(&self) -> u64 {
        match self.round {
            Some(round) => derive_round_seed(self.seed, round),
            None => self.seed,
        }
    }

    /// Days of the trading window that fall inside the series.
    pub(crate) fn planning_days(&self) -> Result<usize> {
        self.trading
            .validate(self.curve.total_days)
            .context("invalid trading window")?;
        Ok(self.trading.end_day(self.curve.total_days) - self.trading.start_day + 1)
    }
}

/// Round selection shared by every subcommand.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct RoundArgs {
    /// TOML file describing the round
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Global seed
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Round number combined with the seed
    #[arg(long)]
    pub(crate) round: Option<u64>,

    /// Area the humps should carry
    #[arg(long)]
    pub(crate) total_area: Option<f64>,

    /// Length of the composed series
    #[arg(long)]
    pub(crate) total_days: Option<usize>,

    /// Length of a single hump (hump subcommand)
    #[arg(long)]
    pub(crate) days: Option<usize>,

    /// Beta curves layered into each hump
    #[arg(long)]
    pub(crate) curves: Option<u32>,

    /// Noise level in percent
    #[arg(long)]
    pub(crate) noise: Option<f64>,

    /// First day of the trading window
    #[arg(long)]
    pub(crate) start_day: Option<usize>,

    /// Days in the trading window
    #[arg(long)]
    pub(crate) sell_duration: Option<usize>,

    /// Price at day zero
    #[arg(long)]
    pub(crate) start_price: Option<f64>,

    /// Price floor of the trading window
    #[arg(long)]
    pub(crate) min_sell_price: Option<f64>,

    /// Final price of the series
    #[arg(long)]
    pub(crate) post_tail_end_price: Option<f64>,
}

impl RoundArgs {
    /// Loads the configured file, if any, and applies the flag overrides.
    pub(crate) fn resolve(&self) -> Result<RoundConfig> {
        let config = match &self.config {
            Some(path) => RoundConfig::load(path)?,
            None => RoundConfig::default(),
        };
        Ok(self.apply(config))
    }

    fn apply(&self, mut config: RoundConfig) -> RoundConfig {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.round.is_some() {
            config.round = self.round;
        }

        let curve = &mut config.curve;
        if let Some(total_area) = self.total_area {
            curve.total_area = total_area;
        }
        if let Some(total_days) = self.total_days {
            curve.total_days = total_days;
        }
        if let Some(days) = self.days {
            curve.days_count = days;
        }
        if let Some(curves) = self.curves {
            curve.curve_count = curves;
        }
        if let Some(noise) = self.noise {
            curve.noise_level = noise;
        }
        if self.post_tail_end_price.is_some() {
            curve.post_tail_end_price = self.post_tail_end_price;
        }

        let trading = &mut config.trading;
        if let Some(start_day) = self.start_day {
            trading.start_day = start_day;
        }
        if let Some(sell_duration) = self.sell_duration {
            trading.sell_duration = sell_duration;
        }
        if let Some(start_price) = self.start_price {
            trading.start_price = start_price;
        }
        if let Some(min_sell_price) = self.min_sell_price {
            trading.min_sell_price = min_sell_price;
        }
        config
    }
}
