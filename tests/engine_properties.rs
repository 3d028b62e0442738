//! End-to-end scoring scenarios and property tests over the public API

use chrono::{Duration, NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use vitals_engine::{
    ActivityRecord, DailyRecord, Granularity, Metric, PeriodRange, ScoringConfig, VitalsEngine,
};

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

fn activity(external_id: &str, start: &str) -> ActivityRecord {
    ActivityRecord {
        user_id: "u1".to_string(),
        external_id: external_id.to_string(),
        name: None,
        activity_type: None,
        start_time: NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap(),
        end_time: None,
        duration_seconds: None,
        distance_meters: None,
        calories: None,
        avg_hr: None,
        max_hr: None,
        aerobic_training_effect: None,
        anaerobic_training_effect: None,
        hr_zones: Default::default(),
        moderate_intensity_minutes: None,
        vigorous_intensity_minutes: None,
        strain_score: 0.0,
    }
}

fn all_factor_record() -> DailyRecord {
    let mut r = DailyRecord::new("u1", day(14));
    r.resting_heart_rate = Some(55.0);
    r.vo2_max = Some(47.0);
    r.sleep_seconds = Some(27_000); // 7.5h
    r.steps = Some(11_000);
    r.moderate_intensity_minutes = Some(20.0);
    r.vigorous_intensity_minutes = Some(10.0);
    r
}

#[test]
fn scenario_a_all_factors_favorable() {
    let scored = VitalsEngine::default().score_day(&all_factor_record(), 40.0);
    let derived = &scored.derived;

    let bio_age = derived.biological_age.unwrap();
    assert!(bio_age < 40.0);
    assert_eq!(bio_age, 37.4);

    assert_eq!(derived.factor_impacts.present_count(), 5);
    for (factor, years) in derived.factor_impacts.iter() {
        let years = years.unwrap();
        assert!(years <= 0.0, "{factor} attributed {years}");
    }
    assert!((derived.factor_impacts.total() - (bio_age - 40.0)).abs() <= 0.5);
}

#[test]
fn scenario_b_two_unfavorable_factors() {
    let mut r = DailyRecord::new("u1", day(14));
    r.resting_heart_rate = Some(80.0);
    r.steps = Some(1500);

    let scored = VitalsEngine::default().score_day(&r, 30.0);
    let derived = &scored.derived;

    assert_eq!(derived.biological_age, Some(38.0));
    assert_eq!(derived.factor_impacts.present_count(), 2);
    assert_eq!(derived.factor_impacts.rhr, Some(4.0));
    assert_eq!(derived.factor_impacts.steps, Some(4.0));
    assert_eq!(derived.factor_impacts.vo2, None);
    assert!((derived.factor_impacts.total() - (38.0 - 30.0)).abs() < 1e-9);
}

#[test]
fn scenario_c_activity_strain_without_zones() {
    let mut a = activity("run-1", "2024-01-15 07:00:00");
    a.aerobic_training_effect = Some(3.0);
    a.anaerobic_training_effect = Some(1.0);
    a.duration_seconds = Some(3600.0);

    let scored = VitalsEngine::default().score_activity(&a);
    assert_eq!(scored.strain_score, 8.0);
}

#[test]
fn scenario_d_recovery_renormalizes_missing_sleep() {
    let week: Vec<DailyRecord> = (0..7)
        .map(|i| {
            let mut r = DailyRecord::new("u1", day(i));
            r.body_battery_high = Some(80.0);
            r.resting_heart_rate = Some(60.0); // 85
            if i < 4 {
                r.sleep_seconds = Some(8 * 3600); // 100
            }
            r
        })
        .collect();

    let scored = VitalsEngine::default().score_days_at_age(&week, 35.0);
    let recovery: Vec<Option<u8>> = scored.iter().map(|r| r.derived.recovery_score).collect();

    // Full: 0.4*80 + 0.3*85 + 0.3*100 = 87.5
    // Without sleep: 4/7*80 + 3/7*85 = 82.14
    assert_eq!(
        recovery,
        vec![Some(87), Some(87), Some(87), Some(87), Some(82), Some(82), Some(82)]
    );
}

#[test]
fn single_factor_yields_no_biological_age() {
    let mut r = DailyRecord::new("u1", day(0));
    r.resting_heart_rate = Some(58.0);
    r.body_battery_high = Some(70.0);

    let scored = VitalsEngine::default().score_day(&r, 35.0);
    assert_eq!(scored.derived.biological_age, None);
    assert!(scored.derived.factor_impacts.is_empty());
    assert!(scored.derived.recovery_score.is_some());
}

#[test]
fn rescoring_overwrites_derived_fields() {
    let engine = VitalsEngine::default();
    let first = engine.score_day(&all_factor_record(), 40.0);

    let mut changed = first.clone();
    changed.resting_heart_rate = None;
    changed.vo2_max = None;
    changed.sleep_seconds = None;
    changed.moderate_intensity_minutes = None;
    changed.vigorous_intensity_minutes = None;

    let rescored = engine.score_day(&changed, 40.0);
    assert_eq!(rescored.derived.biological_age, None);
    assert!(rescored.derived.factor_impacts.is_empty());
}

#[test]
fn custom_config_changes_bounds() {
    let config = ScoringConfig::from_toml_str("[bio_age]\nmax_years = 4.0\n").unwrap();
    let engine = VitalsEngine::new(config).unwrap();

    let mut r = DailyRecord::new("u1", day(0));
    r.resting_heart_rate = Some(80.0);
    r.steps = Some(1500);

    assert_eq!(engine.score_day(&r, 30.0).derived.biological_age, Some(34.0));
}

#[test]
fn aggregate_mean_ignores_absent_values() {
    let mut records: Vec<DailyRecord> = (0..3).map(|i| DailyRecord::new("u1", day(i))).collect();
    records[0].steps = Some(8000);
    records[2].steps = Some(10_000);

    let range = PeriodRange::custom(day(0), day(2)).unwrap();
    let window = VitalsEngine::default().aggregate(&records, &[], &range);

    assert_eq!(window.count, 3);
    assert_eq!(window.mean(Metric::Steps), Some(9000.0));
    assert_eq!(window.total(Metric::Steps), Some(18_000.0));
}

#[test]
fn monthly_comparison_across_year_boundary() {
    let records: Vec<DailyRecord> = (0..120)
        .map(|i| {
            let mut r = DailyRecord::new("u1", day(-60 + i));
            r.steps = Some(5000 + i * 10);
            r
        })
        .collect();
    let mut run = activity("a1", "2023-12-24 09:00:00");
    run.duration_seconds = Some(1800.0);

    let engine = VitalsEngine::default();
    let scored_activities = engine.score_activities(&[run]);
    let today = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
    let comparison = engine
        .compare_periods(&records, &scored_activities, Granularity::Month, 0, today)
        .unwrap();

    assert_eq!(comparison.current.label, "2024-01");
    let labels: Vec<&str> = comparison.previous.iter().map(|w| w.label.as_str()).collect();
    assert_eq!(labels, vec!["2023-12", "2023-11", "2023-10"]);

    assert_eq!(comparison.current.count, 31);
    assert_eq!(comparison.previous[0].count, 31);
    assert_eq!(comparison.previous[0].activities.count, 1);
    assert_eq!(comparison.previous[1].count, 29); // records start 2023-11-02
    assert_eq!(comparison.previous[2].count, 0);
}

#[test]
fn trend_reports_pace_of_aging() {
    let engine = VitalsEngine::default();
    let series: Vec<DailyRecord> = (0..14)
        .map(|i| {
            let mut r = DailyRecord::new("u1", day(i));
            r.resting_heart_rate = Some(if i < 7 { 60.0 } else { 70.0 });
            r.steps = Some(8000);
            r
        })
        .collect();
    let scored = engine.score_days_at_age(&series, 40.0);

    let report = engine.trend(&scored, 14).unwrap();
    let pace = report.pace_of_aging.unwrap();

    // RHR impact 0.0 -> 0.5, steps -0.2: bio age 39.2 -> 41.2
    assert!((pace.delta_years - 2.0).abs() < 1e-9);
    assert!((pace.annualized - 2.0 / 7.0 * 365.0).abs() < 1e-6);
    assert!(engine.trend(&scored, 15).is_none());
}

fn record_strategy() -> impl Strategy<Value = DailyRecord> {
    (
        (
            prop::option::of(-10.0f64..150.0),
            prop::option::of(-5.0f64..90.0),
            prop::option::of(-3_600i64..16 * 3_600),
            prop::option::of(-100i64..40_000),
        ),
        (
            prop::option::of(0.0f64..300.0),
            prop::option::of(0.0f64..300.0),
            prop::option::of(-10.0f64..120.0),
            prop::option::of(0.0f64..5_000.0),
            prop::option::of(0.0f64..100.0),
        ),
        (
            prop::option::of(0i64..4 * 3_600),
            prop::option::of(0i64..4 * 3_600),
        ),
    )
        .prop_map(
            |(
                (rhr, vo2, sleep, steps),
                (moderate, vigorous, body_battery, active_calories, stress),
                (deep, rem),
            )| {
                let mut r = DailyRecord::new("u1", day(0));
                r.resting_heart_rate = rhr;
                r.vo2_max = vo2;
                r.sleep_seconds = sleep;
                r.steps = steps;
                r.moderate_intensity_minutes = moderate;
                r.vigorous_intensity_minutes = vigorous;
                r.body_battery_high = body_battery;
                r.active_calories = active_calories;
                r.stress_avg = stress;
                r.deep_sleep_seconds = deep;
                r.rem_sleep_seconds = rem;
                r
            },
        )
}

proptest! {
    #[test]
    fn prop_scores_stay_in_range(record in record_strategy(), age in 18.0f64..90.0) {
        let scored = VitalsEngine::default().score_day(&record, age);
        let d = &scored.derived;

        if let Some(recovery) = d.recovery_score {
            prop_assert!(recovery <= 100);
        }
        if let Some(sleep) = d.sleep_performance {
            prop_assert!(sleep <= 100);
        }
        prop_assert!((0.0..=21.0).contains(&d.strain_score));
        for (_, years) in d.factor_impacts.iter() {
            if let Some(years) = years {
                prop_assert!(years.abs() <= 8.0 + 1e-9);
            }
        }
    }

    #[test]
    fn prop_attribution_reconciles_with_delta(record in record_strategy(), age in 18.0f64..90.0) {
        let scored = VitalsEngine::default().score_day(&record, age);
        let d = &scored.derived;
        let present = d.factor_impacts.present_count();

        match d.biological_age {
            Some(bio_age) => {
                prop_assert!(present >= 2);
                let tolerance = 0.1 * present as f64 + 1e-9;
                prop_assert!((d.factor_impacts.total() - (bio_age - age)).abs() <= tolerance);
            }
            None => prop_assert_eq!(present, 0),
        }
    }

    #[test]
    fn prop_scoring_is_idempotent(record in record_strategy(), age in 18.0f64..90.0) {
        let engine = VitalsEngine::default();
        let once = engine.score_day(&record, age);
        let twice = engine.score_day(&once, age);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_lower_rhr_never_raises_bio_age(record in record_strategy(), age in 18.0f64..90.0) {
        let engine = VitalsEngine::default();
        let mut high = record.clone();
        high.resting_heart_rate = Some(70.0);
        let mut low = record;
        low.resting_heart_rate = Some(50.0);

        let high = engine.score_day(&high, age).derived.biological_age;
        let low = engine.score_day(&low, age).derived.biological_age;
        if let (Some(high), Some(low)) = (high, low) {
            prop_assert!(low <= high);
        }
    }

    #[test]
    fn prop_more_steps_never_raise_bio_age(record in record_strategy(), age in 18.0f64..90.0) {
        let engine = VitalsEngine::default();
        let mut few = record.clone();
        few.steps = Some(2000);
        let mut many = record;
        many.steps = Some(12_000);

        let few = engine.score_day(&few, age).derived.biological_age;
        let many = engine.score_day(&many, age).derived.biological_age;
        if let (Some(few), Some(many)) = (few, many) {
            prop_assert!(many <= few);
        }
    }

    #[test]
    fn prop_pace_of_aging_matches_steady_rate(
        gaps in prop::collection::vec(1i64..15, 2..30),
        rate_per_day in -0.05f64..0.05,
    ) {
        let mut offset = 0;
        let series: Vec<DailyRecord> = gaps
            .iter()
            .map(|gap| {
                offset += gap;
                let mut r = DailyRecord::new("u1", day(offset));
                r.derived.biological_age = Some(40.0 + rate_per_day * offset as f64);
                r
            })
            .collect();

        let pace = VitalsEngine::default()
            .trend(&series, series.len())
            .unwrap()
            .pace_of_aging
            .unwrap();
        prop_assert!((pace.annualized - rate_per_day * 365.0).abs() < 1e-6);
    }

    #[test]
    fn prop_aggregate_counts_records_in_range(
        days in prop::collection::vec((0i64..90, prop::option::of(1i64..30_000)), 0..60),
        start in 0i64..60,
        len in 0i64..30,
    ) {
        let records: Vec<DailyRecord> = days
            .iter()
            .map(|(offset, steps)| {
                let mut r = DailyRecord::new("u1", day(*offset));
                r.steps = *steps;
                r
            })
            .collect();
        let range = PeriodRange::custom(day(start), day(start + len)).unwrap();
        let window = VitalsEngine::default().aggregate(&records, &[], &range);

        let expected = records.iter().filter(|r| r.date >= range.start && r.date <= range.end).count();
        prop_assert_eq!(window.count, expected);

        let with_steps: Vec<f64> = records
            .iter()
            .filter(|r| range.contains(r.date))
            .filter_map(|r| r.steps.map(|s| s as f64))
            .collect();
        match window.mean(Metric::Steps) {
            Some(mean) => {
                let expected_mean = with_steps.iter().sum::<f64>() / with_steps.len() as f64;
                prop_assert!((mean - expected_mean).abs() < 1e-6);
            }
            None => prop_assert!(with_steps.is_empty()),
        }
    }
}
