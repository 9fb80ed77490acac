#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hump generation from layered Beta densities.
//!
//! [`generate_series`] produces a bounded-length series whose sum matches a
//! target area. [`Hump`] wraps such a series as an immutable value so the
//! orchestrator can trim, rescale and translate it one step at a time.

use price_curve_core::{sanitize_price, BetaCurve, CurveParams, GenerationError, PriceSeries};
use price_curve_system_distribution::{beta_pdf, rand_between, rand_normal};
use rand::Rng;
use tracing::trace;

const MIN_CURVE_WEIGHT: f64 = 0.2;
const MAX_CURVE_WEIGHT: f64 = 1.0;
const LATE_CURVE_DAMPING: f64 = 0.5;

/// Draws the weighted Beta curves layered into a hump.
///
/// Curve `i` samples its shapes from the lower `(i + 1) / count` share of the
/// configured ranges, so later curves may reach broader shapes. Later curves
/// are also weighted down. The result is sorted by `alpha + beta` ascending.
pub fn generate_beta_curves<R: Rng + ?Sized>(params: &CurveParams, rng: &mut R) -> Vec<BetaCurve> {
    let count = params.curve_count.max(1);
    let mut curves = Vec::with_capacity(count as usize);
    for index in 0..count {
        let progress = f64::from(index + 1) / f64::from(count);
        let alpha_ceiling = params.min_alpha + (params.max_alpha - params.min_alpha) * progress;
        let beta_ceiling = params.min_beta + (params.max_beta - params.min_beta) * progress;
        let alpha = rand_between(rng, params.min_alpha, alpha_ceiling);
        let beta = rand_between(rng, params.min_beta, beta_ceiling);
        let damping = 1.0 - (f64::from(index) / f64::from(count)) * LATE_CURVE_DAMPING;
        let weight = rand_between(rng, MIN_CURVE_WEIGHT, MAX_CURVE_WEIGHT) * damping;
        curves.push(BetaCurve::new(alpha, beta, weight));
    }

    curves.sort_by(|left, right| left.concentration().total_cmp(&right.concentration()));
    curves
}

/// Generates `days_count` values whose sum equals `total_area`.
///
/// The exact sum holds whenever the composed densities are not all zero;
/// an all-zero composition is returned unscaled.
pub fn generate_series<R: Rng + ?Sized>(
    params: &CurveParams,
    rng: &mut R,
) -> Result<PriceSeries, GenerationError> {
    params.validate_for_series()?;

    let curves = generate_beta_curves(params, rng);
    let days = params.days_count;
    let noise_ratio = params.noise_level / 100.0;

    let mut prices = Vec::with_capacity(days);
    for day in 0..days {
        let t = if days > 1 {
            day as f64 / (days - 1) as f64
        } else {
            0.0
        };
        let mut value = curves
            .iter()
            .map(|curve| sanitize_price(curve.weight() * beta_pdf(t, curve.alpha(), curve.beta())))
            .sum::<f64>();
        if params.noise_level > 0.0 {
            value = (value + rand_normal(rng, 0.0, noise_ratio * value)).max(0.0);
        }
        prices.push(value);
    }

    let sum: f64 = prices.iter().sum();
    let scale = if sum > 0.0 {
        params.total_area / sum
    } else {
        1.0
    };
    for price in &mut prices {
        *price = sanitize_price(*price * scale);
    }

    trace!(days, curves = curves.len(), raw_sum = sum, scale, "generated series");
    Ok(PriceSeries::new(prices, curves))
}

/// Immutable hump values moving through the trim and rescale pipeline.
///
/// Every transformation returns a new hump and leaves its input untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Hump {
    prices: Vec<f64>,
    curves: Vec<BetaCurve>,
}

impl Hump {
    /// Wraps a generated series.
    #[must_use]
    pub fn from_series(series: PriceSeries) -> Self {
        Self {
            prices: series.prices,
            curves: series.curves,
        }
    }

    /// Daily values of the hump.
    #[must_use]
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Curves the hump was composed from.
    #[must_use]
    pub fn curves(&self) -> &[BetaCurve] {
        &self.curves
    }

    /// Number of days covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Reports whether the hump covers no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Sum of the daily values.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.prices.iter().sum()
    }

    /// Drops `days` values from the left edge, always keeping at least one.
    #[must_use]
    pub fn trim_left(&self, days: usize) -> Self {
        let start = days.min(self.prices.len().saturating_sub(1));
        Self {
            prices: self.prices[start..].to_vec(),
            curves: self.curves.clone(),
        }
    }

    /// Keeps the first `length` values, always keeping at least one.
    #[must_use]
    pub fn trim_right(&self, length: usize) -> Self {
        let end = length.clamp(1, self.prices.len().max(1)).min(self.prices.len());
        Self {
            prices: self.prices[..end].to_vec(),
            curves: self.curves.clone(),
        }
    }

    /// Scales the hump so its values sum to `area`.
    ///
    /// A hump without area is filled evenly instead.
    #[must_use]
    pub fn rescale_to_area(&self, area: f64) -> Self {
        let area = sanitize_price(area);
        let current = self.area();
        let prices = if current > 0.0 {
            let scale = area / current;
            self.prices
                .iter()
                .map(|price| sanitize_price(price * scale))
                .collect()
        } else if self.prices.is_empty() {
            Vec::new()
        } else {
            let even = area / self.prices.len() as f64;
            vec![even; self.prices.len()]
        };
        Self {
            prices,
            curves: self.curves.clone(),
        }
    }

    /// Adds `offset` to every value.
    #[must_use]
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            prices: self
                .prices
                .iter()
                .map(|price| sanitize_price(price + offset))
                .collect(),
            curves: self.curves.clone(),
        }
    }

    /// Reports whether the hump lacks a visible rise.
    ///
    /// A hump is flat when its peak does not exceed its mean by `relative_rise`.
    #[must_use]
    pub fn is_flat(&self, relative_rise: f64) -> bool {
        if self.prices.len() < 3 {
            return false;
        }
        let peak = self.prices.iter().copied().fold(0.0_f64, f64::max);
        let mean = self.area() / self.prices.len() as f64;
        peak <= 0.0 || peak <= mean * (1.0 + relative_rise)
    }

    /// Converts the hump back into a series with fresh statistics.
    #[must_use]
    pub fn into_series(self) -> PriceSeries {
        PriceSeries::new(self.prices, self.curves)
    }
}
