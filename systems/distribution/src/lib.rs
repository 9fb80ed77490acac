#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Probability primitives shared by the curve generators.
//!
//! Every sampler takes the random source explicitly so a whole round can be
//! replayed from a single seed.

use rand::Rng;
use rand_distr::{Distribution, Open01};

const TWO_PI: f64 = std::f64::consts::PI * 2.0;
const SQRT_TWO_PI: f64 = 2.506_628_274_631_000_5;
const LANCZOS_SERIES_BASE: f64 = 1.000_000_000_190_015;
const LANCZOS_COEFFICIENTS: [f64; 6] = [
    76.180_091_729_471_46,
    -86.505_320_329_416_77,
    24.014_098_240_830_91,
    -1.231_739_572_450_155,
    0.120_865_097_386_617_9e-2,
    -0.539_523_938_495_3e-5,
];

/// Natural logarithm of the gamma function.
///
/// Uses a seven-term Lanczos series. Arguments below one half are reflected
/// through `ln(pi) - ln(sin(pi z)) - ln_gamma(1 - z)` where the series loses
/// accuracy.
#[must_use]
pub fn log_gamma(z: f64) -> f64 {
    if z < 0.5 {
        let pi = std::f64::consts::PI;
        return pi.ln() - (pi * z).sin().ln() - log_gamma(1.0 - z);
    }

    let mut tmp = z + 5.5;
    tmp -= (z + 0.5) * tmp.ln();
    let mut series = LANCZOS_SERIES_BASE;
    let mut denominator = z;
    for coefficient in LANCZOS_COEFFICIENTS {
        denominator += 1.0;
        series += coefficient / denominator;
    }
    -tmp + (SQRT_TWO_PI * series / z).ln()
}

/// Beta function `B(a, b)` evaluated through [`log_gamma`].
#[must_use]
pub fn beta_function(alpha: f64, beta: f64) -> f64 {
    (log_gamma(alpha) + log_gamma(beta) - log_gamma(alpha + beta)).exp()
}

/// Beta probability density at `t`; zero outside `[0, 1]`.
///
/// Shapes below one diverge at the interval edges; callers that sum
/// densities must sanitize non-finite values.
#[must_use]
pub fn beta_pdf(t: f64, alpha: f64, beta: f64) -> f64 {
    if !(0.0..=1.0).contains(&t) {
        return 0.0;
    }
    t.powf(alpha - 1.0) * (1.0 - t).powf(beta - 1.0) / beta_function(alpha, beta)
}

/// Gaussian sample via the Box–Muller transform.
///
/// The radial uniform is drawn from the open interval `(0, 1)` so its
/// logarithm is always finite.
pub fn rand_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = Open01.sample(rng);
    let u2: f64 = rng.gen();
    let radius = (-2.0 * u1.ln()).sqrt();
    let z0 = radius * (TWO_PI * u2).cos();
    mean + std_dev * z0
}

/// Uniform sample on `[min, max)`; returns `min` when the range is empty.
pub fn rand_between<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if !(max > min) {
        return min;
    }
    let unit: f64 = rng.gen();
    min + (max - min) * unit
}

/// Uniform integer sample on `[min, max]`; returns `min` when the range is empty.
pub fn rand_index<R: Rng + ?Sized>(rng: &mut R, min: usize, max: usize) -> usize {
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

/// Returns `true` with probability `probability`, clamped to `[0, 1]`.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    let unit: f64 = rng.gen();
    unit < probability.clamp(0.0, 1.0)
}
