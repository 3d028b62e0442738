//! Trend analysis
//!
//! Splits the most recent `window_days` records into an older and a recent half
//! and reports, per metric, how the recent mean moved relative to the older one.
//! Pace of aging annualizes the biological-age movement between the two halves
//! as a daily rate times 365. The rate is taken over the calendar days between
//! the mean dates of the two halves' biological-age readings, so odd windows and
//! gaps in the series are measured by their real spacing.

use crate::types::DailyRecord;
use crate::window::{AggregateWindow, Metric};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const DAYS_PER_YEAR: f64 = 365.0;

/// Deltas below this magnitude are reported as flat
const FLAT_TOLERANCE: f64 = 1e-9;

/// Sign of a metric's movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(delta: f64) -> Self {
        if delta > FLAT_TOLERANCE {
            Direction::Up
        } else if delta < -FLAT_TOLERANCE {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

/// Movement of one metric between two spans
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub older: f64,
    pub recent: f64,
    /// `recent - older`
    pub delta: f64,
    pub direction: Direction,
}

impl MetricDelta {
    fn between(older: f64, recent: f64) -> Self {
        let delta = recent - older;
        Self {
            older,
            recent,
            delta,
            direction: Direction::of(delta),
        }
    }
}

/// Annualized biological-age movement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaceOfAging {
    pub older_bio_age: f64,
    pub recent_bio_age: f64,
    /// Raw difference between the half-window means
    pub delta_years: f64,
    /// Calendar days between the mean dates of the two halves
    pub span_days: f64,
    /// Years of biological age gained per calendar year
    pub annualized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub window_days: usize,
    pub half_window_days: usize,
    pub per_metric_delta: BTreeMap<Metric, MetricDelta>,
    pub pace_of_aging: Option<PaceOfAging>,
}

#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    metrics: Vec<Metric>,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(Metric::ALL.to_vec())
    }
}

impl TrendAnalyzer {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }

    /// Trend over the last `window_days` records of `series`.
    ///
    /// Records are ordered by date first. Returns `None` when the window is
    /// shorter than two days or the series has fewer than `window_days` records.
    pub fn trend(&self, series: &[DailyRecord], window_days: usize) -> Option<TrendReport> {
        if window_days < 2 || series.len() < window_days {
            debug!(
                window_days,
                available = series.len(),
                "not enough days for trend"
            );
            return None;
        }

        let mut ordered: Vec<&DailyRecord> = series.iter().collect();
        ordered.sort_by_key(|r| r.date);
        let window = &ordered[ordered.len() - window_days..];

        let half = window_days / 2;
        let older = &window[..half];
        let recent = &window[window.len() - half..];

        let mut per_metric_delta = BTreeMap::new();
        for metric in &self.metrics {
            if let (Some(o), Some(r)) = (half_mean(older, *metric), half_mean(recent, *metric)) {
                per_metric_delta.insert(*metric, MetricDelta::between(o, r));
            }
        }

        let pace_of_aging = pace_between(older, recent);

        Some(TrendReport {
            window_days,
            half_window_days: half,
            per_metric_delta,
            pace_of_aging,
        })
    }

    /// Metric movement between two rollup windows, for metrics present in both
    pub fn compare_windows(
        &self,
        previous: &AggregateWindow,
        current: &AggregateWindow,
    ) -> BTreeMap<Metric, MetricDelta> {
        self.metrics
            .iter()
            .filter_map(|metric| {
                let older = previous.mean(*metric)?;
                let recent = current.mean(*metric)?;
                Some((*metric, MetricDelta::between(older, recent)))
            })
            .collect()
    }
}

fn pace_between(older: &[&DailyRecord], recent: &[&DailyRecord]) -> Option<PaceOfAging> {
    let (older_day, older_bio_age) = bio_age_centre(older)?;
    let (recent_day, recent_bio_age) = bio_age_centre(recent)?;

    let span_days = recent_day - older_day;
    if span_days <= 0.0 {
        debug!(span_days, "halves share their dates; no pace of aging");
        return None;
    }

    let delta_years = recent_bio_age - older_bio_age;
    Some(PaceOfAging {
        older_bio_age,
        recent_bio_age,
        delta_years,
        span_days,
        annualized: delta_years / span_days * DAYS_PER_YEAR,
    })
}

/// Mean day number and mean biological age over the records that have one
fn bio_age_centre(records: &[&DailyRecord]) -> Option<(f64, f64)> {
    let readings: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| {
            let age = r.derived.biological_age?;
            Some((f64::from(r.date.num_days_from_ce()), age))
        })
        .collect();
    if readings.is_empty() {
        return None;
    }

    let n = readings.len() as f64;
    let day = readings.iter().map(|(d, _)| d).sum::<f64>() / n;
    let age = readings.iter().map(|(_, a)| a).sum::<f64>() / n;
    Some((day, age))
}

fn half_mean(records: &[&DailyRecord], metric: Metric) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| metric.value(r)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
