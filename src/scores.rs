//! Daily score computation
//!
//! Three independent scores per day:
//! - Recovery (0-100): renormalized weighted mean of body battery, RHR and sleep duration
//! - Strain (0-21): additive load from intensity minutes, active calories and optionally stress
//! - Sleep performance (0-100): duration adequacy blended with sleep phase quality
//!
//! Recovery and sleep performance are absent when none of their components have
//! data. Strain is always defined; a day without activity data has zero strain.

use crate::config::{RecoveryConfig, SleepPerformanceConfig, StrainConfig};
use crate::types::{round1, DailyRecord};
use crate::weighted::WeightedMean;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The three daily scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyScores {
    pub recovery_score: Option<u8>,
    pub strain_score: f64,
    pub sleep_performance: Option<u8>,
}

/// Calculator for recovery, strain and sleep performance
#[derive(Debug, Clone, Default)]
pub struct DailyScoreCalculator {
    recovery: RecoveryConfig,
    strain: StrainConfig,
    sleep: SleepPerformanceConfig,
}

impl DailyScoreCalculator {
    pub fn new(recovery: RecoveryConfig, strain: StrainConfig, sleep: SleepPerformanceConfig) -> Self {
        Self {
            recovery,
            strain,
            sleep,
        }
    }

    /// Compute all three scores for one day
    pub fn score(&self, record: &DailyRecord) -> DailyScores {
        DailyScores {
            recovery_score: self.recovery_score(record),
            strain_score: self.strain_score(record),
            sleep_performance: self.sleep_performance(record),
        }
    }

    /// Recovery score, truncated to an integer
    pub fn recovery_score(&self, record: &DailyRecord) -> Option<u8> {
        let c = &self.recovery;

        let body_battery = record.body_battery_high.map(|bb| bb.clamp(0.0, 100.0));
        let rhr = record
            .valid_resting_hr()
            .map(|hr| (100.0 - (hr - c.rhr_reference_bpm) * c.rhr_points_per_bpm).clamp(0.0, 100.0));
        let sleep = record
            .sleep_hours()
            .map(|h| duration_pct(h, c.sleep_target_hours));

        let mut mean = WeightedMean::new();
        mean.push(body_battery, c.body_battery_weight)
            .push(rhr, c.rhr_weight)
            .push(sleep, c.sleep_weight);

        match mean.value() {
            Some(score) => Some(to_score(score)),
            None => {
                debug!(user_id = %record.user_id, date = %record.date, "no recovery components");
                None
            }
        }
    }

    /// Daily strain on the 0-21 scale, rounded to one decimal
    pub fn strain_score(&self, record: &DailyRecord) -> f64 {
        let c = &self.strain;

        let moderate = record.moderate_intensity_minutes.unwrap_or(0.0).max(0.0);
        let vigorous = record.vigorous_intensity_minutes.unwrap_or(0.0).max(0.0);
        let active_calories = record.active_calories.unwrap_or(0.0).max(0.0);

        let mut strain = moderate * c.moderate_per_minute
            + vigorous * c.vigorous_per_minute
            + active_calories / c.active_calories_per_point;

        if c.include_stress {
            if let Some(stress) = record.stress_avg {
                strain += (stress - c.stress_threshold).max(0.0) / c.stress_divisor;
            }
        }

        round1(strain.clamp(0.0, c.max_strain))
    }

    /// Sleep performance, truncated to an integer; absent without sleep duration
    pub fn sleep_performance(&self, record: &DailyRecord) -> Option<u8> {
        let c = &self.sleep;
        let hours = record.sleep_hours()?;
        let total_seconds = hours * 3600.0;

        let quality = match (record.deep_sleep_seconds, record.rem_sleep_seconds) {
            (Some(deep), Some(rem)) => {
                let deep_fraction = deep.max(0) as f64 / total_seconds;
                let rem_fraction = rem.max(0) as f64 / total_seconds;
                let deep_score = (deep_fraction / c.deep_target_fraction * 100.0).min(100.0);
                let rem_score = (rem_fraction / c.rem_target_fraction * 100.0).min(100.0);
                (deep_score + rem_score) / 2.0
            }
            _ => c.neutral_quality,
        };

        let mut mean = WeightedMean::new();
        mean.push(Some(duration_pct(hours, c.target_hours)), c.duration_weight)
            .push(Some(quality), c.quality_weight);

        mean.value().map(to_score)
    }
}

/// Percentage of the target duration reached, capped at 100
fn duration_pct(hours: f64, target_hours: f64) -> f64 {
    (hours / target_hours * 100.0).clamp(0.0, 100.0)
}

/// Truncate to an integer score; the epsilon absorbs float noise from renormalization
fn to_score(value: f64) -> u8 {
    (value + 1e-9).clamp(0.0, 100.0).trunc() as u8
}
