#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Multi-period orchestrator assembling humps, valleys and tails into a series.
//!
//! A generation call plans the humps of the trading window, lays them out with
//! gaps, shapes each hump in above-floor space, connects neighbours with
//! valleys, attaches tails that run to both ends of the series and finally
//! merges every piece through [`compose_segments`].

mod compose;
mod stats;

pub use compose::{compose_segments, SeriesSegment};

use price_curve_core::{
    CurveParams, GenerationError, MultiPeriodSeries, Period, PeriodPlan, Segment, TradingParams,
};
use price_curve_system_distribution::{chance, rand_between, rand_index};
use price_curve_system_hump::{generate_series, Hump};
use price_curve_system_planner::{PeriodPlanner, PlannerTuning};
use price_curve_system_valley::{
    SegmentGenerator, TailDirection, TailRequest, ValleyRequest, WalkTuning, ZeroReturnRequest,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Every adjustable knob of the multi-period pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesTuning {
    /// Trimming of humps that touch the edges of the trading window.
    pub trim: TrimTuning,
    /// Density correction of generated humps.
    pub density: DensityTuning,
    /// Weights, initial gap and spike guard of the hump layout.
    pub layout: LayoutTuning,
    /// Tails, valleys and the zero-return walk.
    pub tail: TailTuning,
    /// Random walk shared by every connective segment.
    pub walk: WalkTuning,
    /// Period planner.
    pub planner: PlannerTuning,
}

/// Edge trimming of the first and last hump.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimTuning {
    /// Smallest share cut from the left of a hump starting on the window start.
    pub left_min_fraction: f64,
    /// Largest share cut from the left of a hump starting on the window start.
    pub left_max_fraction: f64,
    /// Probability of cutting a last hump that overruns the window end.
    pub right_trim_chance: f64,
}

impl Default for TrimTuning {
    fn default() -> Self {
        Self {
            left_min_fraction: 0.1,
            left_max_fraction: 0.9,
            right_trim_chance: 0.7,
        }
    }
}

/// Density correction applied after trimming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityTuning {
    /// Density ratio above which a hump is lengthened.
    pub lengthen_ratio: f64,
    /// Density ratio above which a hump is shortened.
    pub shorten_ratio: f64,
    /// Largest growth factor of a lengthened hump.
    pub max_lengthen_factor: f64,
    /// Length kept by a shortened hump, as a share of its length.
    pub shorten_factor: f64,
    /// Peak-over-mean rise under which a hump counts as flat.
    pub flat_rise: f64,
}

impl Default for DensityTuning {
    fn default() -> Self {
        Self {
            lengthen_ratio: 1.25,
            shorten_ratio: 2.0,
            max_lengthen_factor: 2.0,
            shorten_factor: 0.4,
            flat_rise: 0.05,
        }
    }
}

/// Placement of humps inside the trading window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutTuning {
    /// Average hump value, in floors, above which only one hump is placed.
    pub spike_floor_multiple: f64,
    /// Probability of leaving a gap before the first hump.
    pub initial_gap_chance: f64,
    /// Shortest initial gap in days.
    pub min_initial_gap: usize,
    /// Largest share of the free days the initial gap may take.
    pub max_initial_gap_share: f64,
    /// Lowest raw area weight drawn per hump.
    pub weight_min: f64,
    /// Highest raw area weight drawn per hump.
    pub weight_max: f64,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            spike_floor_multiple: 10.0,
            initial_gap_chance: 0.4,
            min_initial_gap: 5,
            max_initial_gap_share: 0.5,
            weight_min: 0.2,
            weight_max: 1.0,
        }
    }
}

/// Connective segments around and between humps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailTuning {
    /// Walk volatility of tails.
    pub tail_volatility: f64,
    /// Walk volatility of valleys.
    pub valley_volatility: f64,
    /// Walk volatility of zero-return rounds.
    pub zero_return_volatility: f64,
    /// Probability that a trailing tail without an override drifts up.
    pub up_chance: f64,
    /// Smallest end multiple of a rising trailing tail.
    pub up_min: f64,
    /// Largest end multiple of a rising trailing tail.
    pub up_max: f64,
    /// Smallest end multiple of a falling trailing tail.
    pub down_min: f64,
    /// Largest end multiple of a falling trailing tail.
    pub down_max: f64,
    /// Lowest price, in floors, where a valley meets a window edge.
    pub edge_min: f64,
    /// Highest price, in floors, where a valley meets a window edge.
    pub edge_max: f64,
}

impl Default for TailTuning {
    fn default() -> Self {
        Self {
            tail_volatility: 0.08,
            valley_volatility: 0.05,
            zero_return_volatility: 0.05,
            up_chance: 0.5,
            up_min: 1.2,
            up_max: 3.0,
            down_min: 0.07,
            down_max: 0.2,
            edge_min: 0.6,
            edge_max: 1.0,
        }
    }
}

/// Trading window resolved against the series length.
#[derive(Clone, Copy, Debug)]
struct Window {
    start: usize,
    end: usize,
    floor: f64,
    total_days: usize,
}

impl Window {
    fn days(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Mutable hump layout; offsets are derived from lengths and gaps.
#[derive(Debug)]
struct Layout {
    weights: Vec<f64>,
    lengths: Vec<usize>,
    gaps: Vec<usize>,
    initial_gap: usize,
}

impl Layout {
    fn offset(&self, window_start: usize, index: usize) -> usize {
        window_start
            + self.initial_gap
            + self.lengths[..index].iter().sum::<usize>()
            + self.gaps[..index].iter().sum::<usize>()
    }

    /// First day after the last hump.
    fn end(&self, window_start: usize) -> usize {
        let last = self.lengths.len() - 1;
        self.offset(window_start, last) + self.lengths[last]
    }
}

/// Area a single hump is responsible for.
#[derive(Clone, Copy, Debug)]
struct HumpBudget {
    planned_length: usize,
    target_above_floor: f64,
    total: f64,
}

impl HumpBudget {
    /// Area left above the floor once `length` days of floor are paid for.
    fn above_floor(&self, length: usize, floor: f64) -> f64 {
        (self.total - length as f64 * floor).max(0.0)
    }

    fn planned_density(&self) -> f64 {
        self.target_above_floor / self.planned_length.max(1) as f64
    }
}

/// Bounds on how far density correction may move a hump.
#[derive(Clone, Copy, Debug)]
struct DensityLimits {
    max_length: usize,
    /// Free days between the hump's end and the window end.
    room: usize,
    floor: f64,
    /// Share of the rise cut from a hump opening the window.
    lead: f64,
}

/// Day and price at both ends of the in-window run.
#[derive(Clone, Copy, Debug)]
struct Span {
    first_day: usize,
    first_value: f64,
    last_day: usize,
    last_value: f64,
}

/// Composes multi-period price series.
#[derive(Clone, Debug, Default)]
pub struct MultiPeriodGenerator {
    tuning: SeriesTuning,
    segments: SegmentGenerator,
    planner: PeriodPlanner,
}

impl MultiPeriodGenerator {
    /// Creates a generator with the provided tuning.
    #[must_use]
    pub fn new(tuning: SeriesTuning) -> Self {
        Self {
            segments: SegmentGenerator::new(tuning.walk.clone()),
            planner: PeriodPlanner::new(tuning.planner.clone()),
            tuning,
        }
    }

    /// Returns the active tuning.
    #[must_use]
    pub fn tuning(&self) -> &SeriesTuning {
        &self.tuning
    }

    /// Generates a complete series of `curve.total_days` prices.
    ///
    /// Inputs are validated before any randomness is consumed. A zero area
    /// produces a zero-return walk without humps.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        curve: &CurveParams,
        trading: &TradingParams,
        rng: &mut R,
    ) -> Result<MultiPeriodSeries, GenerationError> {
        curve.validate_for_multi_period()?;
        trading.validate(curve.total_days)?;
        let window = Window {
            start: trading.start_day,
            end: trading.end_day(curve.total_days),
            floor: trading.min_sell_price,
            total_days: curve.total_days,
        };

        if curve.total_area == 0.0 {
            return self.zero_return(trading, &window, rng);
        }

        let plan = self.plan(curve.total_area, &window, rng)?;
        let mut layout = self.layout(&plan, &window, rng);
        debug!(
            humps = layout.lengths.len(),
            initial_gap = layout.initial_gap,
            lengths = ?layout.lengths,
            gaps = ?layout.gaps,
            "laid out humps"
        );

        let periods = self.place_humps(curve, &plan, &window, &mut layout, rng)?;
        let valleys = self.valleys(&periods, &window, rng)?;
        let tails = self.tails(curve, trading, &window, &periods, &valleys, rng)?;

        let mut pieces = Vec::with_capacity(periods.len() + valleys.len() + tails.len());
        let (leading, trailing): (Vec<&Segment>, Vec<&Segment>) =
            tails.iter().partition(|tail| tail.start_day < window.start);
        pieces.extend(
            leading
                .iter()
                .map(|tail| SeriesSegment::new(tail.start_day, &tail.prices)),
        );
        pieces.extend(
            periods
                .iter()
                .map(|period| SeriesSegment::new(period.day_offset, &period.series.prices)),
        );
        pieces.extend(
            valleys
                .iter()
                .map(|valley| SeriesSegment::new(valley.start_day, &valley.prices)),
        );
        pieces.extend(
            trailing
                .iter()
                .map(|tail| SeriesSegment::new(tail.start_day, &tail.prices)),
        );
        let combined_prices = compose_segments(window.total_days, &pieces)?;
        debug!(
            days = window.total_days,
            periods = periods.len(),
            valleys = valleys.len(),
            tails = tails.len(),
            "composed series"
        );

        let stats = stats::summarize(
            curve.total_area,
            &window,
            &combined_prices,
            &periods,
            &valleys,
            &tails,
        );
        let metadata = stats::metadata(&window, Some(plan), layout.initial_gap, &periods);
        Ok(MultiPeriodSeries {
            periods,
            valleys,
            tails,
            combined_prices,
            stats,
            metadata,
        })
    }

    fn zero_return<R: Rng + ?Sized>(
        &self,
        trading: &TradingParams,
        window: &Window,
        rng: &mut R,
    ) -> Result<MultiPeriodSeries, GenerationError> {
        let request = ZeroReturnRequest {
            total_days: window.total_days,
            start_price: trading.start_price,
            min_sell_price: window.floor,
            volatility: self.tuning.tail.zero_return_volatility,
        };
        let walk = self.segments.zero_return(&request, rng)?;
        debug!(days = window.total_days, "generated zero-return series");

        let stats = stats::summarize(0.0, window, &walk.prices, &[], &[], &[]);
        Ok(MultiPeriodSeries {
            periods: Vec::new(),
            valleys: Vec::new(),
            tails: Vec::new(),
            combined_prices: walk.prices,
            stats,
            metadata: stats::metadata(window, None, 0, &[]),
        })
    }

    /// Runs the planner and collapses spiky multi-hump plans into one hump.
    fn plan<R: Rng + ?Sized>(
        &self,
        total_area: f64,
        window: &Window,
        rng: &mut R,
    ) -> Result<PeriodPlan, GenerationError> {
        let plan = self
            .planner
            .plan(total_area, window.floor, window.start, window.days(), rng)?;
        let average = total_area / plan.target_days_above_floor.max(1) as f64;
        if plan.hump_count <= 1
            || average <= window.floor * self.tuning.layout.spike_floor_multiple
        {
            return Ok(plan);
        }

        let days = window.days();
        let span = plan.max_length * plan.hump_count + plan.min_gap * (plan.hump_count - 1);
        let max_length = span.min(days).max(plan.min_length);
        debug!(
            average,
            humps = plan.hump_count,
            max_length,
            "forcing a single hump"
        );
        Ok(PeriodPlan {
            hump_count: 1,
            max_length,
            min_gap: 0,
            max_gap: days.saturating_sub(plan.min_length),
            ..plan
        })
    }

    fn layout<R: Rng + ?Sized>(&self, plan: &PeriodPlan, window: &Window, rng: &mut R) -> Layout {
        let tuning = &self.tuning.layout;
        let count = plan.hump_count.max(1);

        let raw: Vec<f64> = (0..count)
            .map(|_| rand_between(rng, tuning.weight_min, tuning.weight_max))
            .collect();
        let raw_total: f64 = raw.iter().sum();
        let weights = if raw_total > 0.0 {
            raw.iter().map(|weight| weight / raw_total).collect()
        } else {
            vec![1.0 / count as f64; count]
        };

        let mut lengths: Vec<usize> = (0..count)
            .map(|_| rand_index(rng, plan.min_length, plan.max_length.max(plan.min_length)))
            .collect();
        let days = window.days();
        let reserve = plan.min_gap * (count - 1);
        let room = days.saturating_sub(reserve).max(count);
        while lengths.iter().sum::<usize>() > room {
            match lengths.iter_mut().max() {
                Some(longest) if *longest > 1 => *longest -= 1,
                _ => break,
            }
        }

        let used: usize = lengths.iter().sum::<usize>() + reserve;
        let free = days.saturating_sub(used);
        let mut initial_gap = 0;
        if chance(rng, tuning.initial_gap_chance) {
            let upper = ((free as f64 * tuning.max_initial_gap_share).floor() as usize)
                .max(tuning.min_initial_gap);
            let wanted = rand_index(rng, tuning.min_initial_gap, upper);
            // The last hump must still start inside the window.
            let limit = free + lengths[count - 1] - 1;
            if wanted.min(limit) >= tuning.min_initial_gap.max(1) {
                initial_gap = wanted.min(limit);
            }
        }

        let spare = free.saturating_sub(initial_gap);
        let gaps = (1..count)
            .map(|_| {
                let extra = (spare as f64 * rand_between(rng, 0.0, 1.0) / (count - 1) as f64)
                    .floor() as usize;
                (plan.min_gap + extra).min(plan.max_gap.max(plan.min_gap))
            })
            .collect();

        Layout {
            weights,
            lengths,
            gaps,
            initial_gap,
        }
    }

    fn place_humps<R: Rng + ?Sized>(
        &self,
        curve: &CurveParams,
        plan: &PeriodPlan,
        window: &Window,
        layout: &mut Layout,
        rng: &mut R,
    ) -> Result<Vec<Period>, GenerationError> {
        let floor = window.floor;
        let floor_total: f64 = layout
            .lengths
            .iter()
            .map(|length| *length as f64 * floor)
            .sum();
        let distributable = (curve.total_area - floor_total).max(0.0);
        let count = layout.lengths.len();

        let mut periods = Vec::with_capacity(count);
        for index in 0..count {
            let planned_length = layout.lengths[index];
            let target_above_floor = layout.weights[index] * distributable;
            let budget = HumpBudget {
                planned_length,
                target_above_floor,
                total: target_above_floor + planned_length as f64 * floor,
            };
            let offset = layout.offset(window.start, index);

            let shaped = self.shape(curve, planned_length, target_above_floor, rng)?;
            let (mut hump, lead) = if index == 0 && offset == window.start {
                self.trim_first(shaped, &budget, floor, rng)
            } else {
                (shaped, 0.0)
            };
            if index + 1 == count {
                hump = self.trim_last(hump, offset, &budget, window, rng);
            }
            layout.lengths[index] = hump.len();

            let room = (window.end + 1).saturating_sub(layout.end(window.start));
            let limits = DensityLimits {
                max_length: plan.max_length,
                room,
                floor,
                lead,
            };
            hump = self.correct_density(curve, hump, &budget, &limits, rng)?;
            layout.lengths[index] = hump.len();

            let actual_above_floor = hump.area();
            let length = hump.len();
            trace!(
                index,
                offset,
                planned_length,
                length,
                target_above_floor,
                actual_above_floor,
                "placed hump"
            );
            periods.push(Period {
                series: hump.shifted(floor).into_series(),
                day_offset: offset,
                weight: layout.weights[index],
                gap_after: 0,
                length,
                target_area_above_floor: target_above_floor,
                actual_area_above_floor: actual_above_floor,
                floor_area: length as f64 * floor,
            });
        }

        for index in 1..periods.len() {
            let previous_end = periods[index - 1].day_offset + periods[index - 1].length;
            periods[index - 1].gap_after = periods[index].day_offset - previous_end;
        }
        Ok(periods)
    }

    /// Generates a hump of `days` values carrying `area` above the floor.
    fn shape<R: Rng + ?Sized>(
        &self,
        curve: &CurveParams,
        days: usize,
        area: f64,
        rng: &mut R,
    ) -> Result<Hump, GenerationError> {
        let params = CurveParams {
            days_count: days,
            total_area: area,
            ..curve.clone()
        };
        let hump = Hump::from_series(generate_series(&params, rng)?);
        if hump.area() > 0.0 {
            Ok(hump)
        } else {
            Ok(hump.rescale_to_area(area))
        }
    }

    /// Cuts the rise of a hump that opens the window.
    ///
    /// Returns the trimmed hump and the share of days removed, so a later
    /// regeneration can start the same way into its rise.
    fn trim_first<R: Rng + ?Sized>(
        &self,
        hump: Hump,
        budget: &HumpBudget,
        floor: f64,
        rng: &mut R,
    ) -> (Hump, f64) {
        if hump.len() < 2 {
            return (hump, 0.0);
        }
        let fraction = rand_between(
            rng,
            self.tuning.trim.left_min_fraction,
            self.tuning.trim.left_max_fraction,
        );
        let removed = ((hump.len() as f64 * fraction).floor() as usize).min(hump.len() - 1);
        if removed == 0 {
            return (hump, 0.0);
        }

        let lead = removed as f64 / hump.len() as f64;
        let trimmed = hump.trim_left(removed);
        debug!(removed, length = trimmed.len(), "trimmed first hump");
        let area = budget.above_floor(trimmed.len(), floor);
        (trimmed.rescale_to_area(area), lead)
    }

    fn trim_last<R: Rng + ?Sized>(
        &self,
        hump: Hump,
        offset: usize,
        budget: &HumpBudget,
        window: &Window,
        rng: &mut R,
    ) -> Hump {
        let end = offset + hump.len() - 1;
        if end <= window.end {
            return hump;
        }
        let last_day = if chance(rng, self.tuning.trim.right_trim_chance) {
            window.end
        } else {
            end.min(window.total_days - 1)
        };
        if last_day == end {
            return hump;
        }

        let trimmed = hump.trim_right(last_day - offset + 1);
        debug!(
            removed = end - last_day,
            length = trimmed.len(),
            "trimmed last hump"
        );
        let area = budget.above_floor(trimmed.len(), window.floor);
        trimmed.rescale_to_area(area)
    }

    fn correct_density<R: Rng + ?Sized>(
        &self,
        curve: &CurveParams,
        hump: Hump,
        budget: &HumpBudget,
        limits: &DensityLimits,
        rng: &mut R,
    ) -> Result<Hump, GenerationError> {
        let tuning = &self.tuning.density;
        let current = hump.len();
        let planned = budget.planned_density();
        let ratio = if planned > 0.0 {
            hump.area() / current as f64 / planned
        } else {
            1.0
        };

        let length = if hump.is_flat(tuning.flat_rise) || ratio > tuning.shorten_ratio {
            ((current as f64 * tuning.shorten_factor).round() as usize).max(1)
        } else if ratio > tuning.lengthen_ratio {
            let stretched = (current as f64 * ratio.min(tuning.max_lengthen_factor)).ceil() as usize;
            let affordable = (budget.total / limits.floor).floor() as usize;
            stretched
                .min(limits.max_length.max(current))
                .min(current + limits.room)
                .min(affordable.max(current))
        } else {
            current
        };
        if length == current {
            return Ok(hump);
        }

        debug!(ratio, from = current, to = length, "corrected hump density");
        let area = budget.above_floor(length, limits.floor);
        self.reshape(curve, length, area, limits.lead, rng)
    }

    /// Regenerates a hump of `length` days that opens `lead` of the way into
    /// its rise.
    fn reshape<R: Rng + ?Sized>(
        &self,
        curve: &CurveParams,
        length: usize,
        area: f64,
        lead: f64,
        rng: &mut R,
    ) -> Result<Hump, GenerationError> {
        if !(lead > 0.0 && lead < 1.0) {
            return self.shape(curve, length, area, rng);
        }
        let full = ((length as f64 / (1.0 - lead)).round() as usize).max(length + 1);
        let hump = self.shape(curve, full, area, rng)?;
        Ok(hump.trim_left(full - length).rescale_to_area(area))
    }

    fn valleys<R: Rng + ?Sized>(
        &self,
        periods: &[Period],
        window: &Window,
        rng: &mut R,
    ) -> Result<Vec<Segment>, GenerationError> {
        let mut valleys = Vec::with_capacity(periods.len() + 1);
        let (Some(first), Some(last)) = (periods.first(), periods.last()) else {
            return Ok(valleys);
        };

        if first.day_offset > window.start {
            let edge = self.edge_value(window, rng);
            let entry = first_price(&first.series.prices, edge);
            valleys.push(self.valley(window.start, first.day_offset, edge, entry, window, rng)?);
        }
        for pair in periods.windows(2) {
            let exit = last_price(&pair[0].series.prices, window.floor);
            let entry = first_price(&pair[1].series.prices, window.floor);
            valleys.push(self.valley(
                pair[0].end_day(),
                pair[1].day_offset,
                exit,
                entry,
                window,
                rng,
            )?);
        }
        if last.end_day() < window.end {
            let exit = last_price(&last.series.prices, window.floor);
            let edge = self.edge_value(window, rng);
            valleys.push(self.valley(last.end_day(), window.end, exit, edge, window, rng)?);
        }
        Ok(valleys)
    }

    fn valley<R: Rng + ?Sized>(
        &self,
        start_day: usize,
        end_day: usize,
        start_value: f64,
        end_value: f64,
        window: &Window,
        rng: &mut R,
    ) -> Result<Segment, GenerationError> {
        let request = ValleyRequest {
            start_day,
            end_day,
            start_value,
            end_value,
            min_sell_price: window.floor,
            volatility: self.tuning.tail.valley_volatility,
        };
        self.segments.valley(&request, rng)
    }

    fn edge_value<R: Rng + ?Sized>(&self, window: &Window, rng: &mut R) -> f64 {
        window.floor * rand_between(rng, self.tuning.tail.edge_min, self.tuning.tail.edge_max)
    }

    fn tails<R: Rng + ?Sized>(
        &self,
        curve: &CurveParams,
        trading: &TradingParams,
        window: &Window,
        periods: &[Period],
        valleys: &[Segment],
        rng: &mut R,
    ) -> Result<Vec<Segment>, GenerationError> {
        let mut tails = Vec::with_capacity(2);
        let Some(span) = in_window_span(periods, valleys) else {
            return Ok(tails);
        };
        let tuning = &self.tuning.tail;

        if span.first_day > 0 {
            let direction = if span.first_value >= trading.start_price {
                TailDirection::Up
            } else {
                TailDirection::Down
            };
            tails.push(self.segments.tail(
                &TailRequest {
                    start_day: 0,
                    end_day: span.first_day,
                    start_value: trading.start_price,
                    end_value: Some(span.first_value),
                    min_sell_price: Some(window.floor),
                    direction,
                    volatility: tuning.tail_volatility,
                },
                rng,
            )?);
        }

        let last_day = window.total_days - 1;
        if span.last_day < last_day {
            let (end_value, direction) = match curve.post_tail_end_price {
                Some(price) if price >= span.last_value => (price, TailDirection::Up),
                Some(price) => (price, TailDirection::Down),
                None if chance(rng, tuning.up_chance) => (
                    span.last_value * rand_between(rng, tuning.up_min, tuning.up_max),
                    TailDirection::Up,
                ),
                None => (
                    span.last_value * rand_between(rng, tuning.down_min, tuning.down_max),
                    TailDirection::Down,
                ),
            };
            tails.push(self.segments.tail(
                &TailRequest {
                    start_day: span.last_day,
                    end_day: last_day,
                    start_value: span.last_value,
                    end_value: Some(end_value),
                    min_sell_price: Some(window.floor),
                    direction,
                    volatility: tuning.tail_volatility,
                },
                rng,
            )?);
        }

        debug!(tails = tails.len(), "generated tails");
        Ok(tails)
    }
}

/// Generates a complete multi-period series with default tuning.
pub fn generate_multi_period_series<R: Rng + ?Sized>(
    curve: &CurveParams,
    trading: &TradingParams,
    rng: &mut R,
) -> Result<MultiPeriodSeries, GenerationError> {
    MultiPeriodGenerator::default().generate(curve, trading, rng)
}

fn first_price(prices: &[f64], fallback: f64) -> f64 {
    prices.first().copied().unwrap_or(fallback)
}

fn last_price(prices: &[f64], fallback: f64) -> f64 {
    prices.last().copied().unwrap_or(fallback)
}

fn in_window_span(periods: &[Period], valleys: &[Segment]) -> Option<Span> {
    let runs = periods
        .iter()
        .map(|period| (period.day_offset, period.series.prices.as_slice()))
        .chain(
            valleys
                .iter()
                .map(|valley| (valley.start_day, valley.prices.as_slice())),
        )
        .filter(|(_, prices)| !prices.is_empty());

    let mut span: Option<Span> = None;
    for (start, prices) in runs {
        let end = start + prices.len() - 1;
        let current = span.get_or_insert(Span {
            first_day: start,
            first_value: prices[0],
            last_day: end,
            last_value: prices[prices.len() - 1],
        });
        if start < current.first_day {
            current.first_day = start;
            current.first_value = prices[0];
        }
        if end > current.last_day {
            current.last_day = end;
            current.last_value = prices[prices.len() - 1];
        }
    }
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_curve_core::seeded_rng;

    fn curve() -> CurveParams {
        CurveParams {
            total_area: 400.0,
            total_days: 120,
            ..CurveParams::default()
        }
    }

    fn trading() -> TradingParams {
        TradingParams {
            start_day: 15,
            sell_duration: 90,
            start_price: 2.0,
            min_sell_price: 1.0,
        }
    }

    #[test]
    fn layout_offsets_follow_lengths_and_gaps() {
        let layout = Layout {
            weights: vec![0.5, 0.5],
            lengths: vec![4, 6],
            gaps: vec![3],
            initial_gap: 2,
        };
        assert_eq!(layout.offset(10, 0), 12);
        assert_eq!(layout.offset(10, 1), 19);
        assert_eq!(layout.end(10), 25);
    }

    #[test]
    fn budget_pays_for_the_floor_first() {
        let budget = HumpBudget {
            planned_length: 10,
            target_above_floor: 30.0,
            total: 40.0,
        };
        assert_eq!(budget.above_floor(10, 1.0), 30.0);
        assert_eq!(budget.above_floor(4, 1.0), 36.0);
        assert_eq!(budget.above_floor(50, 1.0), 0.0);
        assert_eq!(budget.planned_density(), 3.0);
    }

    #[test]
    fn span_covers_humps_and_valleys() {
        let valley = Segment::new(3, vec![0.5, 0.7, 2.0]);
        let period = Period {
            series: price_curve_core::PriceSeries::new(vec![2.0, 4.0, 1.5], Vec::new()),
            day_offset: 5,
            weight: 1.0,
            gap_after: 0,
            length: 3,
            target_area_above_floor: 4.5,
            actual_area_above_floor: 4.5,
            floor_area: 3.0,
        };
        let span = in_window_span(&[period], &[valley]).expect("non-empty");
        assert_eq!(span.first_day, 3);
        assert_eq!(span.first_value, 0.5);
        assert_eq!(span.last_day, 7);
        assert_eq!(span.last_value, 1.5);
        assert!(in_window_span(&[], &[]).is_none());
    }

    #[test]
    fn layout_fits_inside_the_window() {
        let generator = MultiPeriodGenerator::default();
        let window = Window {
            start: 15,
            end: 104,
            floor: 1.0,
            total_days: 120,
        };
        for seed in 0..200 {
            let mut rng = seeded_rng(seed);
            let plan = generator.plan(400.0, &window, &mut rng).expect("valid plan");
            let layout = generator.layout(&plan, &window, &mut rng);
            let last = layout.lengths.len() - 1;
            assert!(layout.offset(window.start, last) <= window.end, "seed {seed}");
            assert!((layout.weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(layout.gaps.iter().all(|gap| *gap >= plan.min_gap));
        }
    }

    #[test]
    fn spiky_areas_collapse_into_one_hump() {
        let generator = MultiPeriodGenerator::default();
        let window = Window {
            start: 0,
            end: 99,
            floor: 1.0,
            total_days: 100,
        };
        for seed in 0..100 {
            let plan = generator
                .plan(50_000.0, &window, &mut seeded_rng(seed))
                .expect("valid plan");
            assert_eq!(plan.hump_count, 1, "seed {seed}");
            assert!(plan.max_length <= window.days());
        }
    }

    #[test]
    fn periods_carry_their_area_above_the_floor() {
        let generator = MultiPeriodGenerator::default();
        for seed in 0..50 {
            let series = generator
                .generate(&curve(), &trading(), &mut seeded_rng(seed))
                .expect("valid inputs");
            for period in &series.periods {
                let absolute: f64 = period.series.prices.iter().sum();
                let expected = period.actual_area_above_floor + period.floor_area;
                assert!((absolute - expected).abs() <= expected.max(1.0) * 1e-9);
                assert!(period
                    .series
                    .prices
                    .iter()
                    .all(|price| *price >= trading().min_sell_price));
            }
        }
    }

    fn hump(prices: &[f64]) -> Hump {
        Hump::from_series(price_curve_core::PriceSeries::new(prices.to_vec(), Vec::new()))
    }

    fn fixed_trim(left_fraction: f64, right_trim_chance: f64) -> MultiPeriodGenerator {
        MultiPeriodGenerator::new(SeriesTuning {
            trim: TrimTuning {
                left_min_fraction: left_fraction,
                left_max_fraction: left_fraction,
                right_trim_chance,
            },
            ..SeriesTuning::default()
        })
    }

    fn limits(lead: f64) -> DensityLimits {
        DensityLimits {
            max_length: 40,
            room: 100,
            floor: 1.0,
            lead,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= expected.abs().max(1.0) * 1e-9,
            "expected {expected}, found {actual}"
        );
    }

    #[test]
    fn first_hump_trim_cuts_into_the_rise() {
        let generator = fixed_trim(0.5, 0.7);
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let budget = HumpBudget {
            planned_length: 10,
            target_above_floor: 55.0,
            total: 65.0,
        };
        let (trimmed, lead) =
            generator.trim_first(hump(&values), &budget, 1.0, &mut seeded_rng(3));
        assert_eq!(trimmed.len(), 5);
        assert_eq!(lead, 0.5);
        assert_close(trimmed.area(), budget.above_floor(5, 1.0));
        assert_close(trimmed.prices()[0] / trimmed.prices()[4], 0.6);

        let single = hump(&[3.0]);
        let (kept, lead) = generator.trim_first(single.clone(), &budget, 1.0, &mut seeded_rng(3));
        assert_eq!(kept, single);
        assert_eq!(lead, 0.0);
    }

    #[test]
    fn first_hump_trim_stays_within_its_fraction_range() {
        let generator = MultiPeriodGenerator::default();
        let values = vec![2.0; 20];
        let budget = HumpBudget {
            planned_length: 20,
            target_above_floor: 40.0,
            total: 60.0,
        };
        for seed in 0..100 {
            let (trimmed, lead) =
                generator.trim_first(hump(&values), &budget, 1.0, &mut seeded_rng(seed));
            assert!((3..=18).contains(&trimmed.len()), "seed {seed}: {}", trimmed.len());
            assert!((0.1..0.9).contains(&lead), "seed {seed}: {lead}");
        }
    }

    #[test]
    fn overrunning_last_hump_ends_on_the_window_end() {
        let window = Window {
            start: 0,
            end: 9,
            floor: 1.0,
            total_days: 20,
        };
        let values: Vec<f64> = (1..=6).map(f64::from).collect();
        let budget = HumpBudget {
            planned_length: 6,
            target_above_floor: 21.0,
            total: 27.0,
        };

        let always = fixed_trim(0.5, 1.0);
        let trimmed = always.trim_last(hump(&values), 7, &budget, &window, &mut seeded_rng(1));
        assert_eq!(7 + trimmed.len() - 1, window.end);
        assert_close(trimmed.area(), budget.above_floor(3, 1.0));

        let inside = always.trim_last(hump(&values), 2, &budget, &window, &mut seeded_rng(1));
        assert_eq!(inside, hump(&values));

        let never = fixed_trim(0.5, 0.0);
        let kept = never.trim_last(hump(&values), 7, &budget, &window, &mut seeded_rng(1));
        assert_eq!(kept, hump(&values));

        let clipped = never.trim_last(hump(&values), 17, &budget, &window, &mut seeded_rng(1));
        assert_eq!(17 + clipped.len() - 1, window.total_days - 1);
    }

    #[test]
    fn dense_humps_shorten() {
        let generator = MultiPeriodGenerator::default();
        let dense = hump(&[5.0, 10.0, 15.0, 20.0, 25.0, 25.0, 20.0, 15.0, 10.0, 5.0]);
        let budget = HumpBudget {
            planned_length: 10,
            target_above_floor: 30.0,
            total: 40.0,
        };
        let corrected = generator
            .correct_density(&curve(), dense, &budget, &limits(0.0), &mut seeded_rng(4))
            .expect("valid hump");
        assert_eq!(corrected.len(), 4);
        assert_close(corrected.area(), budget.above_floor(4, 1.0));
    }

    #[test]
    fn flat_humps_shorten() {
        let generator = MultiPeriodGenerator::default();
        let budget = HumpBudget {
            planned_length: 10,
            target_above_floor: 50.0,
            total: 60.0,
        };
        let corrected = generator
            .correct_density(&curve(), hump(&[5.0; 10]), &budget, &limits(0.0), &mut seeded_rng(5))
            .expect("valid hump");
        assert_eq!(corrected.len(), 4);
        assert_close(corrected.area(), budget.above_floor(4, 1.0));
    }

    #[test]
    fn thin_density_is_left_alone() {
        let generator = MultiPeriodGenerator::default();
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let budget = HumpBudget {
            planned_length: 10,
            target_above_floor: 30.0,
            total: 40.0,
        };
        let corrected = generator
            .correct_density(&curve(), hump(&values), &budget, &limits(0.0), &mut seeded_rng(6))
            .expect("valid hump");
        assert_eq!(corrected, hump(&values));
    }

    #[test]
    fn concentrated_humps_lengthen_within_their_limits() {
        let generator = MultiPeriodGenerator::default();
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let budget = HumpBudget {
            planned_length: 16,
            target_above_floor: 30.0,
            total: 46.0,
        };

        let stretched = generator
            .correct_density(&curve(), hump(&values), &budget, &limits(0.0), &mut seeded_rng(7))
            .expect("valid hump");
        assert_eq!(stretched.len(), 16);
        assert_close(stretched.area(), budget.above_floor(16, 1.0));

        let capped = DensityLimits {
            max_length: 12,
            ..limits(0.0)
        };
        let by_plan = generator
            .correct_density(&curve(), hump(&values), &budget, &capped, &mut seeded_rng(7))
            .expect("valid hump");
        assert_eq!(by_plan.len(), 12);

        let cramped = DensityLimits {
            room: 3,
            ..limits(0.0)
        };
        let by_room = generator
            .correct_density(&curve(), hump(&values), &budget, &cramped, &mut seeded_rng(7))
            .expect("valid hump");
        assert_eq!(by_room.len(), 13);
    }

    #[test]
    fn regenerated_humps_keep_their_lead() {
        let generator = MultiPeriodGenerator::default();
        let dense = hump(&[5.0, 10.0, 15.0, 20.0, 25.0, 25.0, 20.0, 15.0, 10.0, 5.0]);
        let budget = HumpBudget {
            planned_length: 10,
            target_above_floor: 30.0,
            total: 40.0,
        };

        let fresh = generator
            .correct_density(&curve(), dense.clone(), &budget, &limits(0.0), &mut seeded_rng(8))
            .expect("valid hump");
        assert_eq!(fresh.prices()[0], 0.0);

        let led = generator
            .correct_density(&curve(), dense, &budget, &limits(0.5), &mut seeded_rng(8))
            .expect("valid hump");
        assert_eq!(led.len(), 4);
        assert!(led.prices()[0] > 0.0);
        assert_close(led.area(), budget.above_floor(4, 1.0));
    }

    #[test]
    fn first_hump_opens_above_the_floor() {
        let mut tuning = SeriesTuning::default();
        tuning.layout.initial_gap_chance = 0.0;
        tuning.trim.left_min_fraction = 0.5;
        tuning.trim.left_max_fraction = 0.5;
        let generator = MultiPeriodGenerator::new(tuning);
        for seed in 0..64 {
            let series = generator
                .generate(&curve(), &trading(), &mut seeded_rng(seed))
                .expect("valid inputs");
            let first = &series.periods[0];
            assert_eq!(first.day_offset, trading().start_day);
            assert!(
                first.series.prices[0] > trading().min_sell_price,
                "seed {seed}: {}",
                first.series.prices[0]
            );
        }
    }

    #[test]
    fn tuning_is_exposed() {
        let tuning = SeriesTuning {
            trim: TrimTuning {
                right_trim_chance: 1.0,
                ..TrimTuning::default()
            },
            ..SeriesTuning::default()
        };
        let generator = MultiPeriodGenerator::new(tuning.clone());
        assert_eq!(generator.tuning(), &tuning);
    }
}
