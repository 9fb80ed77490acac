//! Summary and layout feeds derived from a composed series.

use crate::Window;
use price_curve_core::{
    MultiPeriodMetadata, MultiPeriodStats, Period, PeriodPlan, Segment, SeriesStats,
};

/// Aggregates the statistics feed of a composed series.
pub(crate) fn summarize(
    target_return: f64,
    window: &Window,
    combined: &[f64],
    periods: &[Period],
    valleys: &[Segment],
    tails: &[Segment],
) -> MultiPeriodStats {
    let period_returns: Vec<f64> = periods
        .iter()
        .map(|period| period.series.stats.total_area)
        .collect();
    let total_return: f64 = period_returns.iter().sum();
    let overall = SeriesStats::from_prices(combined);

    let in_window = combined.get(window.start..=window.end).unwrap_or(&[]);
    let window_days = in_window.len();
    let days_above_floor = in_window
        .iter()
        .filter(|price| **price > window.floor)
        .count();
    let floor_coverage = if window_days > 0 {
        days_above_floor as f64 / window_days as f64
    } else {
        0.0
    };

    MultiPeriodStats {
        total_return,
        target_return,
        return_error: total_return - target_return,
        window_area: in_window.iter().sum(),
        min_price: overall.min_price,
        max_price: overall.max_price,
        period_returns,
        period_weights: periods.iter().map(|period| period.weight).collect(),
        period_lengths: periods.iter().map(|period| period.length).collect(),
        gaps: periods.iter().map(|period| period.gap_after).collect(),
        valleys: valleys.iter().map(Segment::summary).collect(),
        tails: tails.iter().map(Segment::summary).collect(),
        days_above_floor,
        window_days,
        floor_coverage,
        area_above_floor: in_window
            .iter()
            .map(|price| (price - window.floor).max(0.0))
            .sum(),
    }
}

/// Collects the layout feed of the placed humps.
pub(crate) fn metadata(
    window: &Window,
    plan: Option<PeriodPlan>,
    initial_gap: usize,
    periods: &[Period],
) -> MultiPeriodMetadata {
    MultiPeriodMetadata {
        offsets: periods.iter().map(|period| period.day_offset).collect(),
        gaps: periods.iter().map(|period| period.gap_after).collect(),
        weights: periods.iter().map(|period| period.weight).collect(),
        lengths: periods.iter().map(|period| period.length).collect(),
        initial_gap,
        trading_start_day: window.start,
        trading_end_day: window.end,
        plan,
    }
}
