//! Ordered merge of day-indexed segments into one series.

use price_curve_core::{GenerationError, BOUNDARY_TOLERANCE};

/// Prices covering the half-open day range `[start_day, start_day + prices.len())`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesSegment<'a> {
    /// First day covered.
    pub start_day: usize,
    /// Daily prices.
    pub prices: &'a [f64],
}

impl<'a> SeriesSegment<'a> {
    /// Places `prices` starting at `start_day`.
    #[must_use]
    pub const fn new(start_day: usize, prices: &'a [f64]) -> Self {
        Self { start_day, prices }
    }

    /// First day after the segment.
    #[must_use]
    pub const fn end_day(&self) -> usize {
        self.start_day + self.prices.len()
    }
}

/// Writes `segments` in order into a zero-filled series of `total_days`.
///
/// Days written by more than one segment must agree within a relative
/// tolerance of [`BOUNDARY_TOLERANCE`]; the later segment wins. Days beyond
/// the series are dropped.
pub fn compose_segments(
    total_days: usize,
    segments: &[SeriesSegment<'_>],
) -> Result<Vec<f64>, GenerationError> {
    let mut combined = vec![0.0_f64; total_days];
    let mut written = vec![false; total_days];

    for segment in segments {
        for (day, &incoming) in (segment.start_day..total_days).zip(segment.prices) {
            if written[day] {
                let existing = combined[day];
                let scale = existing.abs().max(incoming.abs()).max(1.0);
                if (existing - incoming).abs() > BOUNDARY_TOLERANCE * scale {
                    return Err(GenerationError::SegmentMismatch {
                        day,
                        existing,
                        incoming,
                    });
                }
            }
            combined[day] = incoming;
            written[day] = true;
        }
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_segments_sharing_a_boundary() {
        let left = [1.0, 2.0, 3.0];
        let right = [3.0, 4.0];
        let combined = compose_segments(
            5,
            &[SeriesSegment::new(0, &left), SeriesSegment::new(2, &right)],
        )
        .expect("boundaries agree");
        assert_eq!(combined, vec![1.0, 2.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn rejects_disagreeing_boundaries() {
        let left = [1.0, 2.0];
        let right = [2.5, 4.0];
        let error = compose_segments(
            4,
            &[SeriesSegment::new(0, &left), SeriesSegment::new(1, &right)],
        )
        .expect_err("boundary differs");
        assert_eq!(
            error,
            GenerationError::SegmentMismatch {
                day: 1,
                existing: 2.0,
                incoming: 2.5,
            }
        );
    }

    #[test]
    fn tolerates_rounding_noise_on_boundaries() {
        let left = [10.0, 1_000.0];
        let right = [1_000.0 + 1e-10, 5.0];
        let combined = compose_segments(
            3,
            &[SeriesSegment::new(0, &left), SeriesSegment::new(1, &right)],
        )
        .expect("within tolerance");
        assert_eq!(combined[2], 5.0);
    }

    #[test]
    fn drops_days_past_the_end() {
        let prices = [1.0, 2.0, 3.0];
        let segment = SeriesSegment::new(2, &prices);
        assert_eq!(segment.end_day(), 5);
        let combined = compose_segments(3, &[segment]).expect("no overlap");
        assert_eq!(combined, vec![0.0, 0.0, 1.0]);
    }
}
