//! Report encoding
//!
//! This module turns scored records into self-describing JSON reports with
//! producer metadata and data-quality flags for the presentation layer.

use crate::config::BioAgeConfig;
use crate::error::ComputeError;
use crate::types::{round1, ActivityRecord, BioAgeFactor, DailyRecord, FactorYearImpact, QualityFlag};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Producer metadata stamped on every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSection {
    pub recovery: Option<u8>,
    pub strain: f64,
    pub sleep_performance: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioAgeSection {
    pub chronological_age: Option<f64>,
    pub estimate: Option<f64>,
    pub delta_years: Option<f64>,
    pub factors: FactorYearImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySection {
    /// Biological-age factors with data
    pub factors_available: usize,
    /// `factors_available / 5`
    pub coverage: f64,
    pub flags: Vec<QualityFlag>,
}

/// One scored day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub producer: Producer,
    pub computed_at_utc: String,
    pub user_id: String,
    pub date: String,
    pub scores: ScoreSection,
    pub biological_age: BioAgeSection,
    pub quality: QualitySection,
}

/// One scored session, shaped for activity lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub external_id: String,
    pub name: Option<String>,
    pub activity_type: Option<String>,
    pub start_time: String,
    pub duration_minutes: Option<f64>,
    pub distance_km: Option<f64>,
    pub calories: Option<f64>,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub aerobic_training_effect: Option<f64>,
    pub anaerobic_training_effect: Option<f64>,
    pub strain_score: f64,
}

/// Encoder for scored records
pub struct ReportEncoder {
    instance_id: String,
    /// Factors required before a biological age can be estimated
    min_factors: usize,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self::with_instance_id(Uuid::new_v4().to_string())
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            min_factors: BioAgeConfig::default().min_factors,
        }
    }

    /// Match the insufficient-factor flag to a configured estimator
    pub fn with_min_factors(mut self, min_factors: usize) -> Self {
        self.min_factors = min_factors;
        self
    }

    fn producer(&self) -> Producer {
        Producer {
            name: PRODUCER_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        }
    }

    pub fn encode_daily(&self, record: &DailyRecord) -> DailyReport {
        let derived = &record.derived;
        let delta_years = match (derived.biological_age, derived.chronological_age) {
            (Some(bio), Some(chrono)) => Some(round1(bio - chrono)),
            _ => None,
        };

        DailyReport {
            producer: self.producer(),
            computed_at_utc: Utc::now().to_rfc3339(),
            user_id: record.user_id.clone(),
            date: record.date.format("%Y-%m-%d").to_string(),
            scores: ScoreSection {
                recovery: derived.recovery_score,
                strain: derived.strain_score,
                sleep_performance: derived.sleep_performance,
            },
            biological_age: BioAgeSection {
                chronological_age: derived.chronological_age,
                estimate: derived.biological_age,
                delta_years,
                factors: derived.factor_impacts,
            },
            quality: build_quality(record, self.min_factors),
        }
    }

    pub fn encode_activity(&self, activity: &ActivityRecord) -> ActivityReport {
        ActivityReport {
            external_id: activity.external_id.clone(),
            name: activity.name.clone(),
            activity_type: activity.activity_type.clone(),
            start_time: activity.start_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            duration_minutes: activity.duration_seconds.map(|s| round1(s / 60.0)),
            distance_km: activity.distance_meters.map(|m| (m / 10.0).round() / 100.0),
            calories: activity.calories,
            avg_hr: activity.avg_hr,
            max_hr: activity.max_hr,
            aerobic_training_effect: activity.aerobic_training_effect,
            anaerobic_training_effect: activity.anaerobic_training_effect,
            strain_score: activity.strain_score,
        }
    }

    /// Encode a day to pretty JSON
    pub fn encode_daily_to_json(&self, record: &DailyRecord) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(&self.encode_daily(record)).map_err(ComputeError::JsonError)
    }
}

fn build_quality(record: &DailyRecord, min_factors: usize) -> QualitySection {
    let present = |factor: BioAgeFactor| match factor {
        BioAgeFactor::Rhr => record.valid_resting_hr().is_some(),
        BioAgeFactor::Vo2 => record.valid_vo2_max().is_some(),
        BioAgeFactor::Sleep => record.sleep_hours().is_some(),
        BioAgeFactor::Steps => record.valid_steps().is_some(),
        BioAgeFactor::Intensity => record.intensity_minutes().is_some(),
    };

    let mut flags = Vec::new();
    for factor in BioAgeFactor::ALL {
        if !present(factor) {
            flags.push(match factor {
                BioAgeFactor::Rhr => QualityFlag::MissingRestingHr,
                BioAgeFactor::Vo2 => QualityFlag::MissingVo2Max,
                BioAgeFactor::Sleep => QualityFlag::MissingSleepData,
                BioAgeFactor::Steps => QualityFlag::MissingSteps,
                BioAgeFactor::Intensity => QualityFlag::MissingIntensityMinutes,
            });
        }
    }
    if record.body_battery_high.is_none() {
        flags.push(QualityFlag::MissingBodyBattery);
    }

    let factors_available = BioAgeFactor::ALL.iter().filter(|f| present(**f)).count();
    if factors_available < min_factors {
        flags.push(QualityFlag::InsufficientBioAgeFactors);
    }
    QualitySection {
        factors_available,
        coverage: factors_available as f64 / BioAgeFactor::ALL.len() as f64,
        flags,
    }
}
