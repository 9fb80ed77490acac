#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the price-curve engine.
//!
//! This crate defines the data model that flows between the generator
//! systems and the orchestrator. Callers describe a round through
//! [`CurveParams`] and [`TradingParams`], the systems produce
//! [`PriceSeries`], [`Period`] and [`Segment`] values, and the orchestrator
//! assembles them into a [`MultiPeriodSeries`]. Every generator consumes an
//! explicit random source; [`seeded_rng`] and [`derive_round_seed`] build the
//! canonical one so any round can be replayed from its seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Canonical seedable generator threaded through every system.
pub type CurveRng = ChaCha8Rng;

/// Domain label mixed into round seeds so they never collide with other streams.
pub const RNG_STREAM_ROUND: &str = "price-curve/round";

/// Relative tolerance used when two segments meet on a shared day.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Errors surfaced by the generation entry points.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GenerationError {
    /// A caller supplied a malformed or out-of-range parameter.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human readable explanation of the violated constraint.
        reason: String,
    },
    /// Two adjoining segments disagree on the price of a shared day.
    #[error("segments disagree on day {day}: existing {existing}, incoming {incoming}")]
    SegmentMismatch {
        /// Day index shared by both segments.
        day: usize,
        /// Price already written for the day.
        existing: f64,
        /// Price the incoming segment attempted to write.
        incoming: f64,
    },
}

impl GenerationError {
    /// Builds a [`GenerationError::InvalidParameter`] value.
    #[must_use]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Shape and budget parameters for Beta-composed curves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    /// Number of Beta curves layered into each hump.
    pub curve_count: u32,
    /// Lower bound of the alpha shape parameter.
    pub min_alpha: f64,
    /// Upper bound of the alpha shape parameter.
    pub max_alpha: f64,
    /// Lower bound of the beta shape parameter.
    pub min_beta: f64,
    /// Upper bound of the beta shape parameter.
    pub max_beta: f64,
    /// Multiplicative Gaussian noise, expressed in percent of each value.
    pub noise_level: f64,
    /// Target sum of the generated series.
    pub total_area: f64,
    /// Length of a single generated series.
    pub days_count: usize,
    /// Length of the composed multi-period series.
    pub total_days: usize,
    /// Pins the final price of the trailing tail when present.
    pub post_tail_end_price: Option<f64>,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            curve_count: 3,
            min_alpha: 2.0,
            max_alpha: 5.0,
            min_beta: 2.0,
            max_beta: 5.0,
            noise_level: 0.0,
            total_area: 100.0,
            days_count: 30,
            total_days: 100,
            post_tail_end_price: None,
        }
    }
}

impl CurveParams {
    /// Validates the parameters consumed by single-series generation.
    pub fn validate_for_series(&self) -> Result<(), GenerationError> {
        self.validate_shape()?;
        if self.days_count == 0 {
            return Err(GenerationError::invalid(
                "days_count",
                "at least one day is required",
            ));
        }
        Ok(())
    }

    /// Validates the parameters consumed by multi-period generation.
    pub fn validate_for_multi_period(&self) -> Result<(), GenerationError> {
        self.validate_shape()?;
        if self.total_days == 0 {
            return Err(GenerationError::invalid(
                "total_days",
                "at least one day is required",
            ));
        }
        if let Some(price) = self.post_tail_end_price {
            ensure_non_negative("post_tail_end_price", price)?;
        }
        Ok(())
    }

    fn validate_shape(&self) -> Result<(), GenerationError> {
        if self.curve_count == 0 {
            return Err(GenerationError::invalid(
                "curve_count",
                "at least one curve is required",
            ));
        }
        ensure_positive("min_alpha", self.min_alpha)?;
        ensure_positive("max_alpha", self.max_alpha)?;
        ensure_positive("min_beta", self.min_beta)?;
        ensure_positive("max_beta", self.max_beta)?;
        if self.min_alpha > self.max_alpha {
            return Err(GenerationError::invalid(
                "min_alpha",
                format!("{} exceeds max_alpha {}", self.min_alpha, self.max_alpha),
            ));
        }
        if self.min_beta > self.max_beta {
            return Err(GenerationError::invalid(
                "min_beta",
                format!("{} exceeds max_beta {}", self.min_beta, self.max_beta),
            ));
        }
        ensure_non_negative("noise_level", self.noise_level)?;
        ensure_non_negative("total_area", self.total_area)?;
        Ok(())
    }
}

/// Placement of the trading window and its price floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingParams {
    /// First day of the trading window.
    pub start_day: usize,
    /// Number of days in the trading window.
    pub sell_duration: usize,
    /// Price at day zero.
    pub start_price: f64,
    /// Minimum reference price; areas are measured net of this floor.
    pub min_sell_price: f64,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            start_day: 10,
            sell_duration: 80,
            start_price: 1.0,
            min_sell_price: 1.0,
        }
    }
}

impl TradingParams {
    /// Validates the window against the composed series length.
    pub fn validate(&self, total_days: usize) -> Result<(), GenerationError> {
        if self.sell_duration == 0 {
            return Err(GenerationError::invalid(
                "sell_duration",
                "the trading window needs at least one day",
            ));
        }
        if self.start_day >= total_days {
            return Err(GenerationError::invalid(
                "start_day",
                format!("day {} lies outside a {total_days}-day series", self.start_day),
            ));
        }
        ensure_non_negative("start_price", self.start_price)?;
        ensure_positive("min_sell_price", self.min_sell_price)?;
        Ok(())
    }

    /// Last day of the trading window clamped to the series length.
    #[must_use]
    pub fn end_day(&self, total_days: usize) -> usize {
        let window_end = self
            .start_day
            .saturating_add(self.sell_duration)
            .saturating_sub(1);
        window_end.min(total_days.saturating_sub(1))
    }
}

fn ensure_positive(name: &'static str, value: f64) -> Result<(), GenerationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GenerationError::invalid(
            name,
            format!("expected a finite positive value, found {value}"),
        ));
    }
    Ok(())
}

fn ensure_non_negative(name: &'static str, value: f64) -> Result<(), GenerationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(GenerationError::invalid(
            name,
            format!("expected a finite non-negative value, found {value}"),
        ));
    }
    Ok(())
}

/// Weighted Beta density layered into a hump.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BetaCurve {
    alpha: f64,
    beta: f64,
    weight: f64,
}

impl BetaCurve {
    /// Creates a curve from its shape parameters and weight.
    #[must_use]
    pub const fn new(alpha: f64, beta: f64, weight: f64) -> Self {
        Self {
            alpha,
            beta,
            weight,
        }
    }

    /// Alpha shape parameter.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Beta shape parameter.
    #[must_use]
    pub const fn beta(&self) -> f64 {
        self.beta
    }

    /// Relative weight of the curve within its hump.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Sum of the shape parameters, used to order curves from sharp to broad.
    #[must_use]
    pub fn concentration(&self) -> f64 {
        self.alpha + self.beta
    }
}

/// Summary statistics of a price sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    /// Sum of every value.
    pub total_area: f64,
    /// Smallest value.
    pub min_price: f64,
    /// Largest value.
    pub max_price: f64,
    /// Arithmetic mean.
    pub mean_price: f64,
    /// Index of the first occurrence of the largest value.
    pub peak_day: usize,
}

impl SeriesStats {
    /// Computes statistics for the provided prices; empty input yields zeros.
    #[must_use]
    pub fn from_prices(prices: &[f64]) -> Self {
        if prices.is_empty() {
            return Self::default();
        }

        let mut total_area = 0.0;
        let mut min_price = f64::INFINITY;
        let mut max_price = f64::NEG_INFINITY;
        let mut peak_day = 0;
        for (day, &price) in prices.iter().enumerate() {
            total_area += price;
            min_price = min_price.min(price);
            if price > max_price {
                max_price = price;
                peak_day = day;
            }
        }

        Self {
            total_area,
            min_price,
            max_price,
            mean_price: total_area / prices.len() as f64,
            peak_day,
        }
    }
}

/// A generated series together with the curves that shaped it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Non-negative daily values.
    pub prices: Vec<f64>,
    /// Summary statistics of `prices`.
    pub stats: SeriesStats,
    /// Curves composed into the series, ordered from sharp to broad.
    pub curves: Vec<BetaCurve>,
}

impl PriceSeries {
    /// Wraps prices and curves, computing the summary statistics.
    #[must_use]
    pub fn new(prices: Vec<f64>, curves: Vec<BetaCurve>) -> Self {
        let stats = SeriesStats::from_prices(&prices);
        Self {
            prices,
            stats,
            curves,
        }
    }

    /// Number of days in the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Reports whether the series holds no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// A hump placed inside the trading window, expressed in absolute prices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// Absolute prices of the hump.
    pub series: PriceSeries,
    /// First day occupied by the hump.
    pub day_offset: usize,
    /// Share of the total area assigned to the hump.
    pub weight: f64,
    /// Days left empty between this hump and the next one.
    pub gap_after: usize,
    /// Number of days covered by the hump.
    pub length: usize,
    /// Area the hump should carry above the floor.
    pub target_area_above_floor: f64,
    /// Area the hump actually carries above the floor.
    pub actual_area_above_floor: f64,
    /// Area underneath the floor across the hump's days.
    pub floor_area: f64,
}

impl Period {
    /// Last day occupied by the hump.
    #[must_use]
    pub fn end_day(&self) -> usize {
        self.day_offset + self.length.saturating_sub(1)
    }
}

/// A boundary-pinned connective run of prices (valley or tail).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Daily prices; the first and last entries equal the pinned boundaries.
    pub prices: Vec<f64>,
    /// First day covered by the segment.
    pub start_day: usize,
    /// Last day covered by the segment.
    pub end_day: usize,
    /// Smallest price in the segment.
    pub lowest_value: f64,
    /// Largest price in the segment.
    pub highest_value: f64,
}

impl Segment {
    /// Wraps prices starting at `start_day`, computing the extrema.
    #[must_use]
    pub fn new(start_day: usize, prices: Vec<f64>) -> Self {
        let stats = SeriesStats::from_prices(&prices);
        Self {
            start_day,
            end_day: start_day + prices.len().saturating_sub(1),
            lowest_value: stats.min_price,
            highest_value: stats.max_price,
            prices,
        }
    }

    /// Number of days covered by the segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Reports whether the segment holds no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Condensed description used by the statistics feed.
    #[must_use]
    pub fn summary(&self) -> SegmentSummary {
        SegmentSummary {
            start_day: self.start_day,
            end_day: self.end_day,
            length: self.prices.len(),
            lowest_value: self.lowest_value,
            highest_value: self.highest_value,
        }
    }
}

/// Condensed description of a valley or tail.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// First day covered.
    pub start_day: usize,
    /// Last day covered.
    pub end_day: usize,
    /// Number of days covered.
    pub length: usize,
    /// Smallest price.
    pub lowest_value: f64,
    /// Largest price.
    pub highest_value: f64,
}

/// Hump layout decided by the period planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodPlan {
    /// First day of the trading window the plan was made for.
    pub trading_start_day: usize,
    /// Length of the trading window the plan was made for.
    pub trading_duration: usize,
    /// Number of humps placed inside the trading window.
    pub hump_count: usize,
    /// Shortest permitted hump.
    pub min_length: usize,
    /// Longest permitted hump.
    pub max_length: usize,
    /// Smallest gap reserved between adjacent humps.
    pub min_gap: usize,
    /// Largest gap allowed between adjacent humps.
    pub max_gap: usize,
    /// Days the humps should cover in total.
    pub target_days_above_floor: usize,
    /// Days the area could keep the price at the floor.
    pub max_possible_days: usize,
    /// Average window value relative to the floor.
    pub area_ratio: f64,
    /// Planning attempts consumed before a feasible plan was found.
    pub attempts: u32,
    /// Whether the guaranteed-feasible single-hump plan was used.
    pub fallback: bool,
}

/// Aggregated statistics of a composed multi-period series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPeriodStats {
    /// Sum of the hump prices in absolute space.
    pub total_return: f64,
    /// Area the caller asked for.
    pub target_return: f64,
    /// `total_return - target_return`.
    pub return_error: f64,
    /// Sum of the combined prices inside the trading window.
    pub window_area: f64,
    /// Smallest combined price.
    pub min_price: f64,
    /// Largest combined price.
    pub max_price: f64,
    /// Absolute area carried by each hump.
    pub period_returns: Vec<f64>,
    /// Area share of each hump.
    pub period_weights: Vec<f64>,
    /// Length of each hump.
    pub period_lengths: Vec<usize>,
    /// Gap following each hump.
    pub gaps: Vec<usize>,
    /// Summaries of every valley.
    pub valleys: Vec<SegmentSummary>,
    /// Summaries of every tail.
    pub tails: Vec<SegmentSummary>,
    /// Days inside the trading window priced above the floor.
    pub days_above_floor: usize,
    /// Number of days inside the trading window.
    pub window_days: usize,
    /// `days_above_floor / window_days`.
    pub floor_coverage: f64,
    /// Area above the floor inside the trading window.
    pub area_above_floor: f64,
}

/// Layout metadata of a composed multi-period series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPeriodMetadata {
    /// First day of every hump.
    pub offsets: Vec<usize>,
    /// Gap following every hump.
    pub gaps: Vec<usize>,
    /// Area share of every hump.
    pub weights: Vec<f64>,
    /// Length of every hump.
    pub lengths: Vec<usize>,
    /// Days between the window start and the first hump.
    pub initial_gap: usize,
    /// First day of the trading window.
    pub trading_start_day: usize,
    /// Last day of the trading window.
    pub trading_end_day: usize,
    /// Planner output the layout was built from.
    pub plan: Option<PeriodPlan>,
}

/// Final output handed to the rendering layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiPeriodSeries {
    /// Humps in day order.
    pub periods: Vec<Period>,
    /// Connective segments inside the trading window.
    pub valleys: Vec<Segment>,
    /// Boundary segments outside the trading window.
    pub tails: Vec<Segment>,
    /// Canonical composed series, one price per day.
    pub combined_prices: Vec<f64>,
    /// Summary feed.
    pub stats: MultiPeriodStats,
    /// Layout feed.
    pub metadata: MultiPeriodMetadata,
}

/// Replaces non-finite values with zero and clamps negatives to zero.
#[must_use]
pub fn sanitize_price(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Builds the canonical generator from a seed.
#[must_use]
pub fn seeded_rng(seed: u64) -> CurveRng {
    CurveRng::seed_from_u64(seed)
}

/// Derives the seed of a single round from a global seed.
#[must_use]
pub fn derive_round_seed(global_seed: u64, round: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(RNG_STREAM_ROUND.as_bytes());
    hasher.update(global_seed.to_le_bytes());
    hasher.update(round.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
