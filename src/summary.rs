//! Recent-period summary
//!
//! Dashboard headline for the last `days` days: how many days had data, the
//! mean of each headline score over the days that have it, and the latest
//! record in the range.

use crate::error::ComputeError;
use crate::types::{round1, DailyRecord};
use crate::window::{AggregateWindow, Metric, PeriodRange, WindowAggregator};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Headline means, each rounded to one decimal and absent without data
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryAverages {
    pub recovery: Option<f64>,
    pub strain: Option<f64>,
    pub sleep_performance: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub biological_age: Option<f64>,
}

impl SummaryAverages {
    fn from_window(window: &AggregateWindow) -> Self {
        let mean = |metric| window.mean(metric).map(round1);
        Self {
            recovery: mean(Metric::RecoveryScore),
            strain: mean(Metric::StrainScore),
            sleep_performance: mean(Metric::SleepPerformance),
            sleep_hours: mean(Metric::SleepHours),
            biological_age: mean(Metric::BiologicalAge),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_with_data: usize,
    pub averages: SummaryAverages,
    /// Most recent record in the range
    pub latest: Option<DailyRecord>,
}

/// Summarize `[today - days, today]`, both ends inclusive
pub fn summarize_recent(
    records: &[DailyRecord],
    today: NaiveDate,
    days: u32,
) -> Result<PeriodSummary, ComputeError> {
    let start = today
        .checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| ComputeError::InvalidDate(format!("{today} minus {days} days")))?;
    let range = PeriodRange::custom(start, today)?;

    let window = WindowAggregator::new(vec![
        Metric::RecoveryScore,
        Metric::StrainScore,
        Metric::SleepPerformance,
        Metric::SleepHours,
        Metric::BiologicalAge,
    ])
    .aggregate(records, &[], &range);

    let latest = records
        .iter()
        .filter(|r| range.contains(r.date))
        .max_by_key(|r| r.date)
        .cloned();

    Ok(PeriodSummary {
        start,
        end: today,
        days_with_data: window.count,
        averages: SummaryAverages::from_window(&window),
        latest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn scored(d: u32, recovery: Option<u8>, strain: f64, sleep_seconds: Option<i64>) -> DailyRecord {
        let mut r = DailyRecord::new("u1", date(d));
        r.derived.recovery_score = recovery;
        r.derived.strain_score = strain;
        r.sleep_seconds = sleep_seconds;
        r
    }

    #[test]
    fn test_summary_over_last_week() {
        let records = vec![
            scored(1, Some(10), 20.0, None), // outside the range
            scored(8, Some(70), 5.0, Some(7 * 3600)),
            scored(10, None, 8.0, None),
            scored(15, Some(81), 6.5, Some(8 * 3600)),
        ];

        let summary = summarize_recent(&records, date(15), 7).unwrap();

        assert_eq!(summary.start, date(8));
        assert_eq!(summary.end, date(15));
        assert_eq!(summary.days_with_data, 3);
        assert_eq!(
            summary.averages,
            SummaryAverages {
                recovery: Some(75.5),
                strain: Some(6.5),
                sleep_performance: None,
                sleep_hours: Some(7.5),
                biological_age: None,
            }
        );
        assert_eq!(summary.latest.map(|r| r.date), Some(date(15)));
    }

    #[test]
    fn test_summary_without_data() {
        let summary = summarize_recent(&[], date(15), 7).unwrap();
        assert_eq!(summary.days_with_data, 0);
        assert_eq!(summary.averages, SummaryAverages::default());
        assert!(summary.latest.is_none());
    }
}
