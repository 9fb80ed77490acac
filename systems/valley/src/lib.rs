#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Boundary-pinned random walks connecting two price levels.
//!
//! Tails are unbounded above and only reflect off a soft floor. Valleys add a
//! ceiling envelope that pulls the walk down to the price floor between two
//! humps. Both walk forward from the start and backward from the end toward a
//! shared midpoint, blend the seam, and pin their boundaries exactly. The
//! zero-return path produces a whole series that decays below the floor.

use price_curve_core::{GenerationError, Segment};
use price_curve_system_distribution::{chance, rand_between, rand_normal};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tuning knobs shared by every boundary-pinned walk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkTuning {
    /// Share of the previous step carried into the next one.
    pub momentum: f64,
    /// Share of the remaining distance to the target applied every step.
    pub target_bias: f64,
    /// Probability that a step's volatility spikes.
    pub spike_chance: f64,
    /// Smallest spike multiplier.
    pub spike_min: f64,
    /// Largest spike multiplier.
    pub spike_max: f64,
    /// Share of an overshoot mirrored back when a bound is crossed.
    pub reflection_damping: f64,
    /// Seam smoothing window as a share of the segment length.
    pub smoothing_fraction: f64,
    /// Smallest seam smoothing window in days.
    pub min_smoothing_window: usize,
    /// Soft floor as a share of the minimum sell price.
    pub floor_fraction: f64,
    /// Soft floor used when no minimum sell price is known.
    pub default_floor: f64,
    /// Lowest valley bottom as a share of the minimum sell price.
    pub valley_bottom_min: f64,
    /// Highest valley bottom as a share of the minimum sell price.
    pub valley_bottom_max: f64,
    /// Decay length of the valley ceiling envelope as a share of its length.
    pub valley_envelope_fraction: f64,
    /// Zero-return ceiling as a share of the minimum sell price.
    pub zero_return_ceiling: f64,
    /// Zero-return hard floor as a share of the minimum sell price.
    pub zero_return_floor: f64,
    /// Lowest zero-return end value as a share of the minimum sell price.
    pub zero_return_end_min: f64,
    /// Highest zero-return end value as a share of the minimum sell price.
    pub zero_return_end_max: f64,
    /// Exponential decay rate of the zero-return drift.
    pub zero_return_decay: f64,
}

impl Default for WalkTuning {
    fn default() -> Self {
        Self {
            momentum: 0.3,
            target_bias: 0.1,
            spike_chance: 0.15,
            spike_min: 1.0,
            spike_max: 3.0,
            reflection_damping: 0.5,
            smoothing_fraction: 0.05,
            min_smoothing_window: 2,
            floor_fraction: 0.05,
            default_floor: 0.01,
            valley_bottom_min: 0.5,
            valley_bottom_max: 0.9,
            valley_envelope_fraction: 0.1,
            zero_return_ceiling: 0.9,
            zero_return_floor: 0.1,
            zero_return_end_min: 0.2,
            zero_return_end_max: 0.6,
            zero_return_decay: 3.0,
        }
    }
}

/// Direction a tail drifts when no end value is supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TailDirection {
    /// The tail ends at twice its start value.
    Up,
    /// The tail ends at half its start value.
    Down,
}

impl TailDirection {
    fn default_end(self, start_value: f64) -> f64 {
        match self {
            Self::Up => start_value * 2.0,
            Self::Down => start_value * 0.5,
        }
    }
}

/// Describes a tail running from `start_day` to `end_day` inclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct TailRequest {
    /// First day of the tail.
    pub start_day: usize,
    /// Last day of the tail.
    pub end_day: usize,
    /// Price pinned on the first day.
    pub start_value: f64,
    /// Price pinned on the last day; derived from `direction` when absent.
    pub end_value: Option<f64>,
    /// Minimum sell price the soft floor is derived from.
    pub min_sell_price: Option<f64>,
    /// Drift used when `end_value` is absent.
    pub direction: TailDirection,
    /// Step volatility as a share of the current price.
    pub volatility: f64,
}

/// Describes a valley running from `start_day` to `end_day` inclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct ValleyRequest {
    /// First day of the valley.
    pub start_day: usize,
    /// Last day of the valley.
    pub end_day: usize,
    /// Price pinned on the first day.
    pub start_value: f64,
    /// Price pinned on the last day.
    pub end_value: f64,
    /// Price floor the valley settles toward.
    pub min_sell_price: f64,
    /// Step volatility as a share of the current price.
    pub volatility: f64,
}

/// Describes a whole zero-return series.
#[derive(Clone, Debug, PartialEq)]
pub struct ZeroReturnRequest {
    /// Length of the series.
    pub total_days: usize,
    /// Requested price on day zero.
    pub start_price: f64,
    /// Price floor the series stays below.
    pub min_sell_price: f64,
    /// Step volatility as a share of the current price.
    pub volatility: f64,
}

/// Generates tails, valleys and zero-return series with shared tuning.
#[derive(Clone, Debug, Default)]
pub struct SegmentGenerator {
    tuning: WalkTuning,
}

impl SegmentGenerator {
    /// Creates a generator with the provided tuning.
    #[must_use]
    pub fn new(tuning: WalkTuning) -> Self {
        Self { tuning }
    }

    /// Returns the active tuning.
    #[must_use]
    pub fn tuning(&self) -> &WalkTuning {
        &self.tuning
    }

    /// Generates an unbounded tail whose boundaries equal the requested values.
    pub fn tail<R: Rng + ?Sized>(
        &self,
        request: &TailRequest,
        rng: &mut R,
    ) -> Result<Segment, GenerationError> {
        validate_span(request.start_day, request.end_day)?;
        validate_price("start_value", request.start_value)?;
        if let Some(end_value) = request.end_value {
            validate_price("end_value", end_value)?;
        }
        if let Some(min_sell_price) = request.min_sell_price {
            validate_price("min_sell_price", min_sell_price)?;
        }
        validate_price("volatility", request.volatility)?;

        let length = request.end_day - request.start_day + 1;
        if length <= 1 {
            return Ok(Segment::new(request.start_day, vec![request.start_value]));
        }

        let end_value = request
            .end_value
            .unwrap_or_else(|| request.direction.default_end(request.start_value));
        let floor = match request.min_sell_price {
            Some(price) if price > 0.0 => price * self.tuning.floor_fraction,
            _ => self.tuning.default_floor,
        };
        let bounds = Bounds {
            floor,
            ceiling: None,
            damping: self.tuning.reflection_damping,
        };
        let midpoint = (request.start_value + end_value) / 2.0;
        let prices = self.two_pass(
            rng,
            &bounds,
            request.start_value,
            end_value,
            midpoint,
            length,
            request.volatility,
        );

        debug!(
            start_day = request.start_day,
            end_day = request.end_day,
            start = request.start_value,
            end = end_value,
            "generated tail"
        );
        Ok(Segment::new(request.start_day, prices))
    }

    /// Generates a valley that settles near or below the price floor.
    pub fn valley<R: Rng + ?Sized>(
        &self,
        request: &ValleyRequest,
        rng: &mut R,
    ) -> Result<Segment, GenerationError> {
        validate_span(request.start_day, request.end_day)?;
        validate_price("start_value", request.start_value)?;
        validate_price("end_value", request.end_value)?;
        validate_floor(request.min_sell_price)?;
        validate_price("volatility", request.volatility)?;

        let length = request.end_day - request.start_day + 1;
        if length <= 1 {
            return Ok(Segment::new(request.start_day, vec![request.start_value]));
        }

        let ceiling = self.valley_envelope(request, length);
        let bounds = Bounds {
            floor: request.min_sell_price * self.tuning.floor_fraction,
            ceiling: Some(&ceiling),
            damping: self.tuning.reflection_damping,
        };
        let bottom = request.min_sell_price
            * rand_between(
                rng,
                self.tuning.valley_bottom_min,
                self.tuning.valley_bottom_max,
            );
        let prices = self.two_pass(
            rng,
            &bounds,
            request.start_value,
            request.end_value,
            bottom,
            length,
            request.volatility,
        );

        debug!(
            start_day = request.start_day,
            end_day = request.end_day,
            bottom,
            "generated valley"
        );
        Ok(Segment::new(request.start_day, prices))
    }

    /// Generates a whole series for a round whose target return is zero.
    ///
    /// Day zero starts at the requested price clamped into the band, and the
    /// walk decays toward a random end value while staying inside
    /// `[zero_return_floor, zero_return_ceiling]` times the minimum sell price.
    pub fn zero_return<R: Rng + ?Sized>(
        &self,
        request: &ZeroReturnRequest,
        rng: &mut R,
    ) -> Result<Segment, GenerationError> {
        if request.total_days == 0 {
            return Err(GenerationError::invalid(
                "total_days",
                "at least one day is required",
            ));
        }
        validate_price("start_price", request.start_price)?;
        validate_floor(request.min_sell_price)?;
        validate_price("volatility", request.volatility)?;

        let ceiling = request.min_sell_price * self.tuning.zero_return_ceiling;
        let floor = request.min_sell_price * self.tuning.zero_return_floor;
        let start = request.start_price.clamp(floor, ceiling);
        if request.total_days == 1 {
            return Ok(Segment::new(0, vec![start]));
        }

        let end = request.min_sell_price
            * rand_between(
                rng,
                self.tuning.zero_return_end_min,
                self.tuning.zero_return_end_max,
            );
        let last = request.total_days - 1;
        let mut prices = Vec::with_capacity(request.total_days);
        prices.push(start);
        let mut price = start;
        let mut previous_step = 0.0;
        for day in 1..request.total_days {
            let progress = day as f64 / last as f64;
            let target = end + (start - end) * (-self.tuning.zero_return_decay * progress).exp();
            let step = self.step(rng, price, target, previous_step, floor, request.volatility);
            let mut next = price + step;
            if !next.is_finite() {
                next = floor;
            }
            if next > ceiling {
                next = ceiling - (next - ceiling) * self.tuning.reflection_damping;
            }
            let next = next.clamp(floor, ceiling);
            previous_step = next - price;
            price = next;
            prices.push(next);
        }
        prices[last] = end;

        debug!(days = request.total_days, start, end, "generated zero-return series");
        Ok(Segment::new(0, prices))
    }

    #[allow(clippy::too_many_arguments)]
    fn two_pass<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: &Bounds<'_>,
        start: f64,
        end: f64,
        midpoint: f64,
        length: usize,
        volatility: f64,
    ) -> Vec<f64> {
        let mid = length / 2;
        let mut prices = self.walk_half(rng, bounds, start, midpoint, mid, |step| step, volatility);
        let backward = self.walk_half(
            rng,
            bounds,
            end,
            midpoint,
            length - mid,
            |step| length - 1 - step,
            volatility,
        );
        prices.extend(backward.into_iter().rev());

        self.smooth_seam(&mut prices, mid);
        prices[0] = start;
        prices[length - 1] = end;
        prices
    }

    /// Walks `count` values from `from` toward `to`; `index_at` maps a step to its day.
    #[allow(clippy::too_many_arguments)]
    fn walk_half<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: &Bounds<'_>,
        from: f64,
        to: f64,
        count: usize,
        index_at: impl Fn(usize) -> usize,
        volatility: f64,
    ) -> Vec<f64> {
        let mut values = Vec::with_capacity(count);
        if count == 0 {
            return values;
        }
        values.push(from);

        let mut price = from;
        let mut previous_step = 0.0;
        for step_index in 1..count {
            let progress = step_index as f64 / count as f64;
            let target = from + (to - from) * progress;
            let step = self.step(rng, price, target, previous_step, bounds.floor, volatility);
            let next = bounds.reflect(index_at(step_index), price + step);
            previous_step = next - price;
            price = next;
            values.push(next);
        }
        values
    }

    fn step<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        price: f64,
        target: f64,
        previous_step: f64,
        floor: f64,
        volatility: f64,
    ) -> f64 {
        let mut scale = volatility * price.abs().max(floor);
        if chance(rng, self.tuning.spike_chance) {
            scale *= rand_between(rng, self.tuning.spike_min, self.tuning.spike_max);
        }
        let shock = rand_normal(rng, 0.0, scale);
        self.tuning.momentum * previous_step + self.tuning.target_bias * (target - price) + shock
    }

    /// Blends values around `mid` half-and-half with a triangular moving average.
    fn smooth_seam(&self, prices: &mut [f64], mid: usize) {
        let length = prices.len();
        if length < 3 {
            return;
        }

        let scaled = (length as f64 * self.tuning.smoothing_fraction).round() as usize;
        let window = scaled.max(self.tuning.min_smoothing_window).max(1);
        let snapshot = prices.to_vec();
        let low = mid.saturating_sub(window).max(1);
        let high = (mid + window).min(length - 2);

        for index in low..=high {
            let from = index.saturating_sub(window);
            let to = (index + window).min(length - 1);
            let mut total = 0.0;
            let mut weights = 0.0;
            for (offset, value) in snapshot[from..=to].iter().enumerate() {
                let weight = (window + 1 - index.abs_diff(from + offset)) as f64;
                total += value * weight;
                weights += weight;
            }
            prices[index] = 0.5 * snapshot[index] + 0.5 * total / weights;
        }
    }

    /// Ceiling that starts at each boundary's excess over the floor and decays to the floor.
    fn valley_envelope(&self, request: &ValleyRequest, length: usize) -> Vec<f64> {
        let base = request.min_sell_price;
        let start_excess = (request.start_value - base).max(0.0);
        let end_excess = (request.end_value - base).max(0.0);
        let decay = (length as f64 * self.tuning.valley_envelope_fraction).max(1.0);
        (0..length)
            .map(|index| {
                let from_start = index as f64 / decay;
                let from_end = (length - 1 - index) as f64 / decay;
                base + start_excess * (-from_start).exp() + end_excess * (-from_end).exp()
            })
            .collect()
    }
}

struct Bounds<'a> {
    floor: f64,
    ceiling: Option<&'a [f64]>,
    damping: f64,
}

impl Bounds<'_> {
    /// Mirrors overshoots back inside the band instead of clipping them flat.
    fn reflect(&self, index: usize, price: f64) -> f64 {
        let mut price = if price.is_finite() { price } else { self.floor };
        let ceiling = self
            .ceiling
            .and_then(|ceiling| ceiling.get(index).copied());
        if let Some(ceiling) = ceiling {
            if price > ceiling {
                price = ceiling - (price - ceiling) * self.damping;
            }
        }
        if price < self.floor {
            price = self.floor + (self.floor - price) * self.damping;
        }
        match ceiling {
            Some(ceiling) => price.min(ceiling.max(self.floor)),
            None => price,
        }
    }
}

/// Generates a tail with default tuning.
pub fn generate_tail<R: Rng + ?Sized>(
    request: &TailRequest,
    rng: &mut R,
) -> Result<Segment, GenerationError> {
    SegmentGenerator::default().tail(request, rng)
}

/// Generates a valley with default tuning.
pub fn generate_valley<R: Rng + ?Sized>(
    request: &ValleyRequest,
    rng: &mut R,
) -> Result<Segment, GenerationError> {
    SegmentGenerator::default().valley(request, rng)
}

/// Generates a zero-return series with default tuning.
pub fn generate_zero_return_series<R: Rng + ?Sized>(
    request: &ZeroReturnRequest,
    rng: &mut R,
) -> Result<Segment, GenerationError> {
    SegmentGenerator::default().zero_return(request, rng)
}

fn validate_span(start_day: usize, end_day: usize) -> Result<(), GenerationError> {
    if end_day < start_day {
        return Err(GenerationError::invalid(
            "end_day",
            format!("day {end_day} precedes start day {start_day}"),
        ));
    }
    Ok(())
}

fn validate_price(name: &'static str, value: f64) -> Result<(), GenerationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(GenerationError::invalid(
            name,
            format!("expected a finite non-negative value, found {value}"),
        ));
    }
    Ok(())
}

fn validate_floor(min_sell_price: f64) -> Result<(), GenerationError> {
    if !min_sell_price.is_finite() || min_sell_price <= 0.0 {
        return Err(GenerationError::invalid(
            "min_sell_price",
            format!("expected a finite positive value, found {min_sell_price}"),
        ));
    }
    Ok(())
}
