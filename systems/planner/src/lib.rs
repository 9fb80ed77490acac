#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Period planner deciding how many humps fit a trading window.
//!
//! The planner samples a hump count from the area budget and derives length
//! and gap bounds from the remaining capacity. Infeasible bounds are relaxed
//! over a fixed number of attempts, first by dropping humps and then by
//! loosening the minimum lengths and gaps, before falling back to a single
//! hump that always fits.

use price_curve_core::{GenerationError, PeriodPlan};
use price_curve_system_distribution::rand_between;
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tuning knobs of the period planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerTuning {
    /// Lowest share of the available days the humps should cover.
    pub min_days_fraction: f64,
    /// Highest share of the available days the humps should cover.
    pub max_days_fraction: f64,
    /// Area ratios below this value always produce a single hump.
    pub single_hump_area_ratio: f64,
    /// Relative odds of drawing one, two, three or the maximum number of humps.
    pub hump_count_weights: [f64; 4],
    /// Absolute cap on the hump count.
    pub max_humps: usize,
    /// Trading days each hump needs at minimum when computing the cap.
    pub days_per_hump: usize,
    /// Humps allowed per unit of area ratio when computing the cap.
    pub humps_per_area_ratio: f64,
    /// Relative spread of hump lengths around their average.
    pub length_spread: f64,
    /// Shortest hump before relaxation.
    pub min_length: usize,
    /// Smallest gap before relaxation.
    pub min_gap: usize,
    /// Smallest gap as a share of the trading window before relaxation.
    pub min_gap_fraction: f64,
    /// Planning attempts before the single-hump fallback is used.
    pub max_attempts: u32,
    /// Factor applied to the minimum length and gap on every relaxation.
    pub relaxation: f64,
}

impl Default for PlannerTuning {
    fn default() -> Self {
        Self {
            min_days_fraction: 0.3,
            max_days_fraction: 0.7,
            single_hump_area_ratio: 0.3,
            hump_count_weights: [0.30, 0.30, 0.25, 0.15],
            max_humps: 4,
            days_per_hump: 20,
            humps_per_area_ratio: 4.0,
            length_spread: 0.4,
            min_length: 3,
            min_gap: 2,
            min_gap_fraction: 0.05,
            max_attempts: 8,
            relaxation: 0.75,
        }
    }
}

/// Plans hump layouts for trading windows.
#[derive(Clone, Debug, Default)]
pub struct PeriodPlanner {
    tuning: PlannerTuning,
}

impl PeriodPlanner {
    /// Creates a planner with the provided tuning.
    #[must_use]
    pub fn new(tuning: PlannerTuning) -> Self {
        Self { tuning }
    }

    /// Returns the active tuning.
    #[must_use]
    pub fn tuning(&self) -> &PlannerTuning {
        &self.tuning
    }

    /// Plans the humps for a trading window.
    ///
    /// Always terminates; infeasible inputs end in the single-hump fallback.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        total_area: f64,
        min_sell_price: f64,
        trading_start_day: usize,
        trading_duration: usize,
        rng: &mut R,
    ) -> Result<PeriodPlan, GenerationError> {
        validate(total_area, min_sell_price, trading_duration)?;

        let max_possible_days = whole_days(total_area / min_sell_price);
        let available = max_possible_days.min(trading_duration);
        let coverage = rand_between(
            rng,
            self.tuning.min_days_fraction,
            self.tuning.max_days_fraction,
        );
        let target_days = whole_days(available as f64 * coverage);
        let area_ratio = (total_area / trading_duration as f64) / min_sell_price;

        let mut frame = PlanFrame {
            trading_start_day,
            trading_duration,
            target_days,
            max_possible_days,
            area_ratio,
        };
        let mut hump_count = self.sample_hump_count(area_ratio, trading_duration, rng);
        let mut relax = 1.0;

        for attempt in 1..=self.tuning.max_attempts.max(1) {
            if let Some(plan) = self.derive_bounds(&frame, hump_count, relax, attempt) {
                debug!(
                    hump_count = plan.hump_count,
                    min_length = plan.min_length,
                    max_length = plan.max_length,
                    target_days = plan.target_days_above_floor,
                    attempt,
                    "planned periods"
                );
                return Ok(plan);
            }
            if hump_count > 1 {
                hump_count -= 1;
            } else {
                relax *= self.tuning.relaxation;
            }
        }

        frame.target_days = frame.target_days.max(1).min(trading_duration);
        warn!(
            total_area,
            min_sell_price,
            trading_duration,
            attempts = self.tuning.max_attempts,
            "period planning exhausted its attempts; using a single hump"
        );
        Ok(self.fallback(&frame))
    }

    fn sample_hump_count<R: Rng + ?Sized>(
        &self,
        area_ratio: f64,
        trading_duration: usize,
        rng: &mut R,
    ) -> usize {
        if area_ratio < self.tuning.single_hump_area_ratio {
            return 1;
        }

        let by_duration = trading_duration / self.tuning.days_per_hump.max(1);
        let by_area = whole_days(area_ratio * self.tuning.humps_per_area_ratio);
        let max_humps = self.tuning.max_humps.min(by_duration).min(by_area).max(1);

        let Ok(index) = WeightedIndex::new(self.tuning.hump_count_weights) else {
            return 1;
        };
        let drawn = match index.sample(rng) {
            0 => 1,
            1 => 2,
            2 => 3,
            _ => max_humps,
        };
        drawn.clamp(1, max_humps)
    }

    fn derive_bounds(
        &self,
        frame: &PlanFrame,
        hump_count: usize,
        relax: f64,
        attempt: u32,
    ) -> Option<PeriodPlan> {
        if hump_count == 0 || frame.target_days < hump_count {
            return None;
        }

        let duration = frame.trading_duration;
        let min_gap = if hump_count > 1 {
            let fixed = (self.tuning.min_gap as f64 * relax).floor();
            let scaled = (duration as f64 * self.tuning.min_gap_fraction * relax).floor();
            fixed.max(scaled) as usize
        } else {
            0
        };
        let gap_reserve = min_gap * (hump_count - 1);
        if gap_reserve >= duration {
            return None;
        }

        let average = frame.target_days as f64 / hump_count as f64;
        let spread = self.tuning.length_spread.clamp(0.0, 1.0);
        let min_length = ((self.tuning.min_length as f64 * relax).ceil() as usize)
            .max((average * (1.0 - spread)).floor() as usize)
            .max(1);
        let max_length = ((average * (1.0 + spread)).ceil() as usize)
            .min((duration - gap_reserve) / hump_count);
        if max_length < min_length {
            return None;
        }

        let max_gap = (duration - hump_count * min_length) / (hump_count - 1).max(1);
        Some(PeriodPlan {
            trading_start_day: frame.trading_start_day,
            trading_duration: duration,
            hump_count,
            min_length,
            max_length,
            min_gap,
            max_gap: max_gap.max(min_gap),
            target_days_above_floor: frame.target_days,
            max_possible_days: frame.max_possible_days,
            area_ratio: frame.area_ratio,
            attempts: attempt,
            fallback: false,
        })
    }

    fn fallback(&self, frame: &PlanFrame) -> PeriodPlan {
        let duration = frame.trading_duration;
        PeriodPlan {
            trading_start_day: frame.trading_start_day,
            trading_duration: duration,
            hump_count: 1,
            min_length: 1,
            max_length: frame.target_days.clamp(1, duration),
            min_gap: 0,
            max_gap: duration - 1,
            target_days_above_floor: frame.target_days,
            max_possible_days: frame.max_possible_days,
            area_ratio: frame.area_ratio,
            attempts: self.tuning.max_attempts,
            fallback: true,
        }
    }
}

struct PlanFrame {
    trading_start_day: usize,
    trading_duration: usize,
    target_days: usize,
    max_possible_days: usize,
    area_ratio: f64,
}

/// Plans hump layouts with default tuning.
pub fn calculate_period_parameters<R: Rng + ?Sized>(
    total_area: f64,
    min_sell_price: f64,
    trading_start_day: usize,
    trading_duration: usize,
    rng: &mut R,
) -> Result<PeriodPlan, GenerationError> {
    PeriodPlanner::default().plan(
        total_area,
        min_sell_price,
        trading_start_day,
        trading_duration,
        rng,
    )
}

fn validate(
    total_area: f64,
    min_sell_price: f64,
    trading_duration: usize,
) -> Result<(), GenerationError> {
    if !total_area.is_finite() || total_area < 0.0 {
        return Err(GenerationError::invalid(
            "total_area",
            format!("expected a finite non-negative value, found {total_area}"),
        ));
    }
    if !min_sell_price.is_finite() || min_sell_price <= 0.0 {
        return Err(GenerationError::invalid(
            "min_sell_price",
            format!("expected a finite positive value, found {min_sell_price}"),
        ));
    }
    if trading_duration == 0 {
        return Err(GenerationError::invalid(
            "sell_duration",
            "the trading window needs at least one day",
        ));
    }
    Ok(())
}

/// Floors a non-negative day count, saturating instead of overflowing.
fn whole_days(value: f64) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.floor().min(usize::MAX as f64) as usize
}
