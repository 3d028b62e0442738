//! Date-range bucketing and rollups
//!
//! Every dashboard period (day, Monday-aligned week, calendar month, calendar
//! year) is reduced to a canonical [`PeriodRange`] by [`period_range`], which
//! takes a granularity and an integer offset from the current period (0 =
//! current, negative = further past). Rollups average each metric over the
//! days where it is present, so a day missing one metric still counts toward
//! the others.

use crate::error::ComputeError;
use crate::types::{round1, ActivityRecord, DailyRecord};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Number of earlier periods returned for comparison
pub const COMPARISON_PERIODS: usize = 3;

/// Period size for bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            other => Err(ComputeError::InvalidWindow(format!("unknown granularity: {other}"))),
        }
    }
}

/// Inclusive date range with a display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl PeriodRange {
    /// Arbitrary inclusive range
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, ComputeError> {
        if start > end {
            return Err(ComputeError::InvalidWindow(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(Self {
            start,
            end,
            label: format!("{start}..{end}"),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days in the range
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Canonical range for the period `offset` steps away from the one containing `today`
pub fn period_range(
    granularity: Granularity,
    offset: i32,
    today: NaiveDate,
) -> Result<PeriodRange, ComputeError> {
    let offset = i64::from(offset);
    match granularity {
        Granularity::Day => {
            let day = shift_days(today, offset)?;
            Ok(PeriodRange {
                start: day,
                end: day,
                label: day.format("%Y-%m-%d").to_string(),
            })
        }
        Granularity::Week => {
            let monday = shift_days(today, -i64::from(today.weekday().num_days_from_monday()))?;
            let start = shift_days(monday, offset * 7)?;
            let end = shift_days(start, 6)?;
            let iso = start.iso_week();
            Ok(PeriodRange {
                start,
                end,
                label: format!("{}-W{:02}", iso.year(), iso.week()),
            })
        }
        Granularity::Month => {
            let (year, month) = shift_month(today.year(), today.month(), offset)?;
            let start = ymd(year, month, 1)?;
            let (next_year, next_month) = shift_month(year, month, 1)?;
            let end = ymd(next_year, next_month, 1)?
                .pred_opt()
                .ok_or_else(|| out_of_range(year, month))?;
            Ok(PeriodRange {
                start,
                end,
                label: format!("{year:04}-{month:02}"),
            })
        }
        Granularity::Year => {
            let year = i64::from(today.year()) + offset;
            let year = i32::try_from(year).map_err(|_| out_of_range(year, 1))?;
            Ok(PeriodRange {
                start: ymd(year, 1, 1)?,
                end: ymd(year, 12, 31)?,
                label: format!("{year:04}"),
            })
        }
    }
}

/// The `count` periods immediately before `offset`, most recent first
pub fn preceding_periods(
    granularity: Granularity,
    offset: i32,
    today: NaiveDate,
    count: usize,
) -> Result<Vec<PeriodRange>, ComputeError> {
    (1..=count)
        .map(|step| {
            let step = i32::try_from(step)
                .map_err(|_| ComputeError::InvalidWindow(format!("too many periods: {count}")))?;
            period_range(granularity, offset - step, today)
        })
        .collect()
}

fn shift_days(date: NaiveDate, days: i64) -> Result<NaiveDate, ComputeError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| ComputeError::InvalidDate(format!("{date} shifted by {days} days")))
}

fn shift_month(year: i32, month: u32, offset: i64) -> Result<(i32, u32), ComputeError> {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + offset;
    let shifted_year = index.div_euclid(12);
    let shifted_month = index.rem_euclid(12) + 1;
    let shifted_year =
        i32::try_from(shifted_year).map_err(|_| out_of_range(shifted_year, shifted_month as u32))?;
    Ok((shifted_year, shifted_month as u32))
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, ComputeError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ComputeError::InvalidDate(format!("{year:04}-{month:02}-{day:02}")))
}

fn out_of_range(year: impl fmt::Display, month: u32) -> ComputeError {
    ComputeError::InvalidDate(format!("{year}-{month:02}"))
}

/// Daily metrics that can be rolled up
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RestingHeartRate,
    Vo2Max,
    HrvLastNight,
    SleepHours,
    DeepSleepHours,
    RemSleepHours,
    Steps,
    ActiveCalories,
    TotalCalories,
    DistanceKm,
    ModerateIntensityMinutes,
    VigorousIntensityMinutes,
    StressAvg,
    BodyBatteryHigh,
    Spo2Avg,
    RespirationAvg,
    RecoveryScore,
    StrainScore,
    SleepPerformance,
    BiologicalAge,
}

impl Metric {
    pub const ALL: [Metric; 20] = [
        Metric::RestingHeartRate,
        Metric::Vo2Max,
        Metric::HrvLastNight,
        Metric::SleepHours,
        Metric::DeepSleepHours,
        Metric::RemSleepHours,
        Metric::Steps,
        Metric::ActiveCalories,
        Metric::TotalCalories,
        Metric::DistanceKm,
        Metric::ModerateIntensityMinutes,
        Metric::VigorousIntensityMinutes,
        Metric::StressAvg,
        Metric::BodyBatteryHigh,
        Metric::Spo2Avg,
        Metric::RespirationAvg,
        Metric::RecoveryScore,
        Metric::StrainScore,
        Metric::SleepPerformance,
        Metric::BiologicalAge,
    ];

    /// The metric's value for one day, `None` when absent
    pub fn value(&self, record: &DailyRecord) -> Option<f64> {
        let hours = |secs: Option<i64>| secs.map(|s| s as f64 / 3600.0);
        match self {
            Metric::RestingHeartRate => record.valid_resting_hr(),
            Metric::Vo2Max => record.valid_vo2_max(),
            Metric::HrvLastNight => record.hrv_last_night,
            Metric::SleepHours => record.sleep_hours(),
            Metric::DeepSleepHours => hours(record.deep_sleep_seconds),
            Metric::RemSleepHours => hours(record.rem_sleep_seconds),
            Metric::Steps => record.valid_steps().map(|s| s as f64),
            Metric::ActiveCalories => record.active_calories,
            Metric::TotalCalories => record.total_calories,
            Metric::DistanceKm => record.distance_meters.map(|m| m / 1000.0),
            Metric::ModerateIntensityMinutes => record.moderate_intensity_minutes,
            Metric::VigorousIntensityMinutes => record.vigorous_intensity_minutes,
            Metric::StressAvg => record.stress_avg,
            Metric::BodyBatteryHigh => record.body_battery_high,
            Metric::Spo2Avg => record.spo2_avg,
            Metric::RespirationAvg => record.respiration_avg,
            Metric::RecoveryScore => record.derived.recovery_score.map(f64::from),
            Metric::StrainScore => Some(record.derived.strain_score),
            Metric::SleepPerformance => record.derived.sleep_performance.map(f64::from),
            Metric::BiologicalAge => record.derived.biological_age,
        }
    }
}

/// Mean and total of one metric over the days where it was present
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRollup {
    pub mean: f64,
    pub total: f64,
    /// Days that contributed a value
    pub count: usize,
}

/// Session totals within a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRollup {
    pub count: usize,
    pub total_strain: f64,
    pub mean_strain: Option<f64>,
    pub total_duration_minutes: f64,
    pub total_distance_km: f64,
    pub total_calories: f64,
}

/// Rollup of daily and activity records over one date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
    /// Daily records whose date falls in the range
    pub count: usize,
    pub metrics: BTreeMap<Metric, MetricRollup>,
    pub activities: ActivityRollup,
}

impl AggregateWindow {
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).map(|r| r.mean)
    }

    pub fn total(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).map(|r| r.total)
    }
}

/// A period alongside the periods immediately before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub granularity: Granularity,
    pub current: AggregateWindow,
    /// Most recent first
    pub previous: Vec<AggregateWindow>,
}

/// Rollup engine over a fixed set of metrics
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    metrics: Vec<Metric>,
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::new(Metric::ALL.to_vec())
    }
}

impl WindowAggregator {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }

    /// Roll up the records that fall inside `range`
    pub fn aggregate(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        range: &PeriodRange,
    ) -> AggregateWindow {
        let in_range: Vec<&DailyRecord> = records.iter().filter(|r| range.contains(r.date)).collect();

        let mut metrics = BTreeMap::new();
        for metric in &self.metrics {
            let values: Vec<f64> = in_range.iter().filter_map(|r| metric.value(r)).collect();
            if values.is_empty() {
                continue;
            }
            let total: f64 = values.iter().sum();
            metrics.insert(
                *metric,
                MetricRollup {
                    mean: total / values.len() as f64,
                    total,
                    count: values.len(),
                },
            );
        }

        let sessions: Vec<&ActivityRecord> =
            activities.iter().filter(|a| range.contains(a.date())).collect();
        let activity_rollup = rollup_activities(&sessions);

        debug!(
            label = %range.label,
            days = in_range.len(),
            activities = activity_rollup.count,
            "aggregated window"
        );

        AggregateWindow {
            start: range.start,
            end: range.end,
            label: range.label.clone(),
            count: in_range.len(),
            metrics,
            activities: activity_rollup,
        }
    }

    /// Roll up one canonical period
    pub fn aggregate_period(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        granularity: Granularity,
        offset: i32,
        today: NaiveDate,
    ) -> Result<AggregateWindow, ComputeError> {
        let range = period_range(granularity, offset, today)?;
        Ok(self.aggregate(records, activities, &range))
    }

    /// Roll up a period and the three periods before it
    pub fn compare(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        granularity: Granularity,
        offset: i32,
        today: NaiveDate,
    ) -> Result<PeriodComparison, ComputeError> {
        let current = self.aggregate_period(records, activities, granularity, offset, today)?;
        let previous = preceding_periods(granularity, offset, today, COMPARISON_PERIODS)?
            .iter()
            .map(|range| self.aggregate(records, activities, range))
            .collect();

        Ok(PeriodComparison {
            granularity,
            current,
            previous,
        })
    }

    /// Consecutive periods ending with the current one, oldest first
    pub fn series(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        granularity: Granularity,
        periods: usize,
        today: NaiveDate,
    ) -> Result<Vec<AggregateWindow>, ComputeError> {
        let mut ranges = preceding_periods(granularity, 1, today, periods)?;
        ranges.reverse();
        Ok(ranges
            .iter()
            .map(|range| self.aggregate(records, activities, range))
            .collect())
    }
}

fn rollup_activities(sessions: &[&ActivityRecord]) -> ActivityRollup {
    if sessions.is_empty() {
        return ActivityRollup::default();
    }

    let total_strain: f64 = sessions.iter().map(|a| a.strain_score).sum();
    ActivityRollup {
        count: sessions.len(),
        total_strain: round1(total_strain),
        mean_strain: Some(round1(total_strain / sessions.len() as f64)),
        total_duration_minutes: sessions
            .iter()
            .filter_map(|a| a.duration_seconds)
            .map(|s| s / 60.0)
            .sum(),
        total_distance_km: sessions
            .iter()
            .filter_map(|a| a.distance_meters)
            .map(|m| m / 1000.0)
            .sum(),
        total_calories: sessions.iter().filter_map(|a| a.calories).sum(),
    }
}
