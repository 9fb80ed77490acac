use price_curve_core::{seeded_rng, CurveParams, GenerationError, MultiPeriodSeries, TradingParams};
use price_curve_series::{generate_multi_period_series, MultiPeriodGenerator, SeriesTuning};
use proptest::prelude::*;

prop_compose! {
    fn round()(
        total_days in 1usize..260,
        start_fraction in 0.0f64..1.0,
        sell_duration in 1usize..260,
        total_area in prop_oneof![Just(0.0), 0.01f64..5_000.0],
        min_sell_price in 0.1f64..20.0,
        start_price in 0.0f64..50.0,
        curve_count in 1u32..=5,
        min_alpha in 1.1f64..4.0,
        min_beta in 1.1f64..4.0,
        noise_level in 0.0f64..30.0,
    ) -> (CurveParams, TradingParams) {
        let start_day = ((total_days as f64 * start_fraction) as usize).min(total_days - 1);
        let curve = CurveParams {
            curve_count,
            min_alpha,
            max_alpha: min_alpha + 2.0,
            min_beta,
            max_beta: min_beta + 2.0,
            noise_level,
            total_area,
            total_days,
            ..CurveParams::default()
        };
        let trading = TradingParams {
            start_day,
            sell_duration,
            start_price,
            min_sell_price,
        };
        (curve, trading)
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]

    #[test]
    fn combined_series_is_complete_and_non_negative(
        (curve, trading) in round(),
        seed in any::<u64>(),
    ) {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        prop_assert_eq!(series.combined_prices.len(), curve.total_days);
        prop_assert!(series
            .combined_prices
            .iter()
            .all(|price| price.is_finite() && *price >= 0.0));
    }

    #[test]
    fn periods_never_overlap(
        (curve, trading) in round(),
        seed in any::<u64>(),
    ) {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        let offsets = &series.metadata.offsets;
        let lengths = &series.metadata.lengths;
        for index in 1..offsets.len() {
            prop_assert!(offsets[index - 1] + lengths[index - 1] <= offsets[index]);
        }
        if let Some(last) = series.periods.last() {
            prop_assert!(last.end_day() < curve.total_days);
        }
        if let Some(first) = series.periods.first() {
            prop_assert!(first.day_offset >= trading.start_day);
        }
    }

    #[test]
    fn segments_match_the_combined_series(
        (curve, trading) in round(),
        seed in any::<u64>(),
    ) {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        for period in &series.periods {
            for (day, price) in (period.day_offset..).zip(&period.series.prices) {
                prop_assert_eq!(series.combined_prices[day], *price);
            }
            prop_assert!(period.series.prices.iter().all(|price| *price >= trading.min_sell_price));
        }
        for segment in series.valleys.iter().chain(&series.tails) {
            let first = series.combined_prices[segment.start_day];
            let last = series.combined_prices[segment.end_day];
            prop_assert_eq!(first, segment.prices[0]);
            prop_assert_eq!(last, segment.prices[segment.len() - 1]);
        }
    }
}

#[test]
fn zero_area_round_stays_under_the_floor() {
    let curve = CurveParams {
        total_area: 0.0,
        total_days: 50,
        ..CurveParams::default()
    };
    let trading = TradingParams {
        start_day: 0,
        sell_duration: 50,
        start_price: 1.0,
        min_sell_price: 10.0,
    };
    for seed in 0..32 {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        assert_eq!(series.combined_prices.len(), 50);
        assert!(series.periods.is_empty());
        assert!(series.valleys.is_empty());
        assert!(series
            .combined_prices
            .iter()
            .all(|price| *price <= 9.0 * (1.0 + 1e-12)));
        assert_eq!(series.stats.total_return, 0.0);
        assert_eq!(series.stats.days_above_floor, 0);
        assert!(series.metadata.plan.is_none());
    }
}

fn standard_round() -> (CurveParams, TradingParams) {
    let curve = CurveParams {
        curve_count: 4,
        noise_level: 5.0,
        total_area: 600.0,
        total_days: 150,
        ..CurveParams::default()
    };
    let trading = TradingParams {
        start_day: 20,
        sell_duration: 100,
        start_price: 3.0,
        min_sell_price: 2.0,
    };
    (curve, trading)
}

#[test]
fn identical_seeds_replay_identically() {
    let (curve, trading) = standard_round();
    let first = generate_multi_period_series(&curve, &trading, &mut seeded_rng(4242))
        .expect("valid round");
    let second = generate_multi_period_series(&curve, &trading, &mut seeded_rng(4242))
        .expect("valid round");
    assert_eq!(first, second);
}

#[test]
fn tails_reach_both_ends_of_the_series() {
    let (mut curve, trading) = standard_round();
    curve.post_tail_end_price = Some(0.75);
    for seed in 0..32 {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        assert_eq!(series.combined_prices[0], trading.start_price);
        assert_eq!(series.combined_prices[149], 0.75);
        assert_eq!(series.tails.len(), 2);
        assert_eq!(series.tails[0].start_day, 0);
        assert_eq!(series.tails[1].end_day, 149);
        assert_eq!(series.metadata.trading_end_day, 119);
    }
}

#[test]
fn stats_agree_with_the_periods() {
    let (curve, trading) = standard_round();
    for seed in 0..32 {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        let stats = &series.stats;
        let summed: f64 = series
            .periods
            .iter()
            .map(|period| period.series.prices.iter().sum::<f64>())
            .sum();
        assert!((stats.total_return - summed).abs() <= summed * 1e-12);
        assert_eq!(stats.target_return, curve.total_area);
        assert_eq!(stats.return_error, stats.total_return - stats.target_return);
        assert_eq!(stats.window_days, 100);
        assert_eq!(stats.period_lengths, series.metadata.lengths);
        assert_eq!(stats.valleys.len(), series.valleys.len());
        assert!((stats.period_weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(stats.floor_coverage > 0.0 && stats.floor_coverage <= 1.0);
        let plan = series.metadata.plan.as_ref().expect("humps were planned");
        assert_eq!(plan.hump_count, series.periods.len());
    }
}

#[test]
fn window_clipped_by_the_series_end_keeps_every_day() {
    let curve = CurveParams {
        total_area: 300.0,
        total_days: 60,
        ..CurveParams::default()
    };
    let trading = TradingParams {
        start_day: 40,
        sell_duration: 80,
        start_price: 1.0,
        min_sell_price: 1.0,
    };
    for seed in 0..32 {
        let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        assert_eq!(series.combined_prices.len(), 60);
        assert_eq!(series.metadata.trading_end_day, 59);
        assert!(series.periods.iter().all(|period| period.end_day() <= 59));
    }
}

#[test]
fn custom_tuning_forces_an_initial_gap() {
    let mut tuning = SeriesTuning::default();
    tuning.layout.initial_gap_chance = 1.0;
    tuning.layout.min_initial_gap = 1;
    let generator = MultiPeriodGenerator::new(tuning);
    let (curve, trading) = standard_round();
    for seed in 0..32 {
        let series = generator
            .generate(&curve, &trading, &mut seeded_rng(seed))
            .expect("valid round");
        assert!(series.metadata.initial_gap >= 1, "seed {seed}");
        assert_eq!(series.valleys[0].start_day, trading.start_day);
        assert_eq!(series.valleys[0].end_day, series.metadata.offsets[0]);
    }
}

#[test]
fn invalid_rounds_are_rejected() {
    let (curve, trading) = standard_round();
    let mut rng = seeded_rng(1);

    let no_days = CurveParams {
        total_days: 0,
        ..curve.clone()
    };
    assert!(matches!(
        generate_multi_period_series(&no_days, &trading, &mut rng),
        Err(GenerationError::InvalidParameter {
            name: "total_days",
            ..
        })
    ));

    let free_floor = TradingParams {
        min_sell_price: 0.0,
        ..trading.clone()
    };
    assert!(matches!(
        generate_multi_period_series(&curve, &free_floor, &mut rng),
        Err(GenerationError::InvalidParameter {
            name: "min_sell_price",
            ..
        })
    ));

    let late_start = TradingParams {
        start_day: 150,
        ..trading.clone()
    };
    assert!(matches!(
        generate_multi_period_series(&curve, &late_start, &mut rng),
        Err(GenerationError::InvalidParameter {
            name: "start_day",
            ..
        })
    ));

    let inverted = CurveParams {
        min_alpha: 6.0,
        max_alpha: 2.0,
        ..curve
    };
    assert!(matches!(
        generate_multi_period_series(&inverted, &trading, &mut rng),
        Err(GenerationError::InvalidParameter {
            name: "min_alpha",
            ..
        })
    ));
}

#[test]
fn output_serializes_for_the_rendering_layer() {
    let (curve, trading) = standard_round();
    let series = generate_multi_period_series(&curve, &trading, &mut seeded_rng(9))
        .expect("valid round");
    let json = serde_json::to_string(&series).expect("serializable");
    let decoded: MultiPeriodSeries = serde_json::from_str(&json).expect("deserializable");
    assert_eq!(decoded.combined_prices.len(), series.combined_prices.len());
    assert_eq!(decoded.metadata.offsets, series.metadata.offsets);
}
