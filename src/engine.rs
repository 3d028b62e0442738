//! Engine orchestration
//!
//! This module provides the public API for the vitals engine. It wires the
//! calculators together from one validated [`ScoringConfig`] and runs them over
//! batches of records, from raw vendor JSON to scored records and rollups.
//!
//! Scoring never mutates its input: every call returns fresh records whose
//! derived fields are overwritten, so re-running a date range is idempotent.

use crate::activity::ActivityStrainCalculator;
use crate::adapters::{GarminAdapter, VendorPayloadAdapter};
use crate::bio_age::BiologicalAgeEstimator;
use crate::config::ScoringConfig;
use crate::error::ComputeError;
use crate::impact::FactorImpactCalculator;
use crate::scores::DailyScoreCalculator;
use crate::summary::{summarize_recent, PeriodSummary};
use crate::trend::{TrendAnalyzer, TrendReport};
use crate::types::{ActivityRecord, DailyRecord, DerivedScores, UserProfile};
use crate::window::{AggregateWindow, Granularity, PeriodComparison, PeriodRange, WindowAggregator};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scored output of one payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredBatch {
    pub days: Vec<DailyRecord>,
    pub activities: Vec<ActivityRecord>,
}

/// Score a raw Garmin payload with the default configuration.
///
/// # Arguments
/// * `raw_json` - Bundle of Garmin Connect responses (`days` and `activities`)
/// * `user_id` - Owner of the records
/// * `chronological_age` - Age the biological-age estimate is computed against
///
/// # Example
/// ```ignore
/// let batch = score_garmin_payload(&garmin_json, "user-123", 41.0)?;
/// for day in &batch.days {
///     println!("{} {:?}", day.date, day.derived.biological_age);
/// }
/// ```
pub fn score_garmin_payload(
    raw_json: &str,
    user_id: &str,
    chronological_age: f64,
) -> Result<ScoredBatch, ComputeError> {
    VitalsEngine::default().process_payload(&GarminAdapter, raw_json, user_id, chronological_age)
}

/// Calculators bound to one configuration
#[derive(Debug, Clone)]
pub struct VitalsEngine {
    config: ScoringConfig,
    estimator: BiologicalAgeEstimator,
    scores: DailyScoreCalculator,
    activity: ActivityStrainCalculator,
    aggregator: WindowAggregator,
    trend: TrendAnalyzer,
}

impl Default for VitalsEngine {
    fn default() -> Self {
        Self::build(ScoringConfig::default())
    }
}

impl VitalsEngine {
    /// Validate the configuration and build the calculators
    pub fn new(config: ScoringConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ScoringConfig) -> Self {
        let impacts = FactorImpactCalculator::new(config.impact.clone());
        Self {
            estimator: BiologicalAgeEstimator::new(impacts, config.bio_age.clone()),
            scores: DailyScoreCalculator::new(
                config.recovery.clone(),
                config.strain.clone(),
                config.sleep.clone(),
            ),
            activity: ActivityStrainCalculator::new(config.activity.clone()),
            aggregator: WindowAggregator::default(),
            trend: TrendAnalyzer::default(),
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Recompute every derived field of one day
    pub fn score_day(&self, record: &DailyRecord, chronological_age: f64) -> DailyRecord {
        let scores = self.scores.score(record);
        let estimate = self.estimator.estimate(record, chronological_age);

        let mut scored = record.clone();
        scored.derived = DerivedScores {
            recovery_score: scores.recovery_score,
            strain_score: scores.strain_score,
            sleep_performance: scores.sleep_performance,
            chronological_age: Some(chronological_age),
            biological_age: estimate.as_ref().map(|e| e.biological_age),
            factor_impacts: estimate.map(|e| e.factor_impacts).unwrap_or_default(),
        };
        scored
    }

    /// Score a batch against one fixed chronological age
    pub fn score_days_at_age(&self, records: &[DailyRecord], chronological_age: f64) -> Vec<DailyRecord> {
        let scored: Vec<DailyRecord> = records
            .iter()
            .map(|r| self.score_day(r, chronological_age))
            .collect();
        log_batch(&scored);
        scored
    }

    /// Score a batch, resolving each day's chronological age from the profile
    pub fn score_days(&self, records: &[DailyRecord], profile: &UserProfile) -> Vec<DailyRecord> {
        let scored: Vec<DailyRecord> = records
            .iter()
            .map(|r| {
                let age = profile.chronological_age(r.date, self.config.default_age_years);
                self.score_day(r, age)
            })
            .collect();
        log_batch(&scored);
        scored
    }

    pub fn score_activity(&self, activity: &ActivityRecord) -> ActivityRecord {
        let mut scored = activity.clone();
        scored.strain_score = self.activity.strain(activity);
        scored
    }

    pub fn score_activities(&self, activities: &[ActivityRecord]) -> Vec<ActivityRecord> {
        activities.iter().map(|a| self.score_activity(a)).collect()
    }

    /// Parse a vendor payload and score everything in it
    pub fn process_payload(
        &self,
        adapter: &dyn VendorPayloadAdapter,
        raw_json: &str,
        user_id: &str,
        chronological_age: f64,
    ) -> Result<ScoredBatch, ComputeError> {
        let (days, activities) = adapter.parse(raw_json, user_id)?;
        Ok(ScoredBatch {
            days: self.score_days_at_age(&days, chronological_age),
            activities: self.score_activities(&activities),
        })
    }

    pub fn aggregate(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        range: &PeriodRange,
    ) -> AggregateWindow {
        self.aggregator.aggregate(records, activities, range)
    }

    /// A period of the given granularity and the three periods before it
    pub fn compare_periods(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        granularity: Granularity,
        offset: i32,
        today: NaiveDate,
    ) -> Result<PeriodComparison, ComputeError> {
        let comparison = self
            .aggregator
            .compare(records, activities, granularity, offset, today)?;
        info!(
            %granularity,
            current = %comparison.current.label,
            previous = comparison.previous.len(),
            "aggregated periods"
        );
        Ok(comparison)
    }

    pub fn series(
        &self,
        records: &[DailyRecord],
        activities: &[ActivityRecord],
        granularity: Granularity,
        periods: usize,
        today: NaiveDate,
    ) -> Result<Vec<AggregateWindow>, ComputeError> {
        self.aggregator
            .series(records, activities, granularity, periods, today)
    }

    pub fn trend(&self, series: &[DailyRecord], window_days: usize) -> Option<TrendReport> {
        self.trend.trend(series, window_days)
    }

    pub fn summarize(
        &self,
        records: &[DailyRecord],
        today: NaiveDate,
        days: u32,
    ) -> Result<PeriodSummary, ComputeError> {
        summarize_recent(records, today, days)
    }
}

fn log_batch(scored: &[DailyRecord]) {
    let with_bio_age = scored
        .iter()
        .filter(|r| r.derived.biological_age.is_some())
        .count();
    info!(days = scored.len(), with_bio_age, "scored daily records");
}

/// Parse records from a JSON array or newline-delimited JSON
pub fn parse_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, ComputeError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| ComputeError::ParseError(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(raw: &str) -> Result<NaiveDate, ComputeError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ComputeError::DateParseError(format!("{raw}: {e}")))
}
