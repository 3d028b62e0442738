//! Core types for the vitals engine
//!
//! This module defines the records that flow through the engine: per-day
//! telemetry with its derived scores, per-session activity telemetry, and the
//! read-only user profile used to resolve chronological age.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five factors that feed the biological-age estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BioAgeFactor {
    Rhr,
    Vo2,
    Sleep,
    Steps,
    Intensity,
}

impl BioAgeFactor {
    /// All factors in attribution order
    pub const ALL: [BioAgeFactor; 5] = [
        BioAgeFactor::Rhr,
        BioAgeFactor::Vo2,
        BioAgeFactor::Sleep,
        BioAgeFactor::Steps,
        BioAgeFactor::Intensity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BioAgeFactor::Rhr => "rhr",
            BioAgeFactor::Vo2 => "vo2",
            BioAgeFactor::Sleep => "sleep",
            BioAgeFactor::Steps => "steps",
            BioAgeFactor::Intensity => "intensity",
        }
    }
}

impl fmt::Display for BioAgeFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed years each factor contributes to the biological-age delta.
///
/// `None` means the factor had no data that day ("no data", not zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorYearImpact {
    pub rhr: Option<f64>,
    pub vo2: Option<f64>,
    pub sleep: Option<f64>,
    pub steps: Option<f64>,
    pub intensity: Option<f64>,
}

impl FactorYearImpact {
    pub fn get(&self, factor: BioAgeFactor) -> Option<f64> {
        match factor {
            BioAgeFactor::Rhr => self.rhr,
            BioAgeFactor::Vo2 => self.vo2,
            BioAgeFactor::Sleep => self.sleep,
            BioAgeFactor::Steps => self.steps,
            BioAgeFactor::Intensity => self.intensity,
        }
    }

    pub fn set(&mut self, factor: BioAgeFactor, years: Option<f64>) {
        let slot = match factor {
            BioAgeFactor::Rhr => &mut self.rhr,
            BioAgeFactor::Vo2 => &mut self.vo2,
            BioAgeFactor::Sleep => &mut self.sleep,
            BioAgeFactor::Steps => &mut self.steps,
            BioAgeFactor::Intensity => &mut self.intensity,
        };
        *slot = years;
    }

    /// Iterate over `(factor, years)` for every factor, present or not
    pub fn iter(&self) -> impl Iterator<Item = (BioAgeFactor, Option<f64>)> + '_ {
        BioAgeFactor::ALL.iter().map(move |f| (*f, self.get(*f)))
    }

    /// Number of factors with a value
    pub fn present_count(&self) -> usize {
        self.iter().filter(|(_, v)| v.is_some()).count()
    }

    /// Sum of the present attributions
    pub fn total(&self) -> f64 {
        self.iter().filter_map(|(_, v)| v).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }
}

/// Seconds spent in each stress band
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StressDurations {
    pub rest: Option<i64>,
    pub low: Option<i64>,
    pub medium: Option<i64>,
    pub high: Option<i64>,
}

/// Fields written only by the engine; always recomputable from the raw fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedScores {
    /// Recovery score (0-100)
    pub recovery_score: Option<u8>,
    /// Daily strain (0.0-21.0)
    pub strain_score: f64,
    /// Sleep performance (0-100)
    pub sleep_performance: Option<u8>,
    /// Chronological age the estimate was computed against
    pub chronological_age: Option<f64>,
    /// Biological age estimate, present iff enough factors were available
    pub biological_age: Option<f64>,
    /// Per-factor attribution of `biological_age - chronological_age`
    pub factor_impacts: FactorYearImpact,
}

/// One user's telemetry for one calendar date, unique on `(user_id, date)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub user_id: String,
    pub date: NaiveDate,

    // Heart
    #[serde(default)]
    pub resting_heart_rate: Option<f64>,
    #[serde(default)]
    pub min_heart_rate: Option<f64>,
    #[serde(default)]
    pub max_heart_rate: Option<f64>,
    #[serde(default)]
    pub avg_heart_rate: Option<f64>,
    #[serde(default)]
    pub vo2_max: Option<f64>,
    #[serde(default)]
    pub hrv_last_night: Option<f64>,
    #[serde(default)]
    pub hrv_weekly_avg: Option<f64>,

    // Body battery
    #[serde(default)]
    pub body_battery_high: Option<f64>,
    #[serde(default)]
    pub body_battery_low: Option<f64>,
    #[serde(default)]
    pub body_battery_charged: Option<f64>,
    #[serde(default)]
    pub body_battery_drained: Option<f64>,

    // Sleep
    #[serde(default)]
    pub sleep_seconds: Option<i64>,
    #[serde(default)]
    pub deep_sleep_seconds: Option<i64>,
    #[serde(default)]
    pub light_sleep_seconds: Option<i64>,
    #[serde(default)]
    pub rem_sleep_seconds: Option<i64>,
    #[serde(default)]
    pub awake_seconds: Option<i64>,
    #[serde(default)]
    pub sleep_score: Option<f64>,
    #[serde(default)]
    pub sleep_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub sleep_end: Option<NaiveDateTime>,

    // Stress
    #[serde(default)]
    pub stress_avg: Option<f64>,
    #[serde(default)]
    pub stress_max: Option<f64>,
    #[serde(default)]
    pub stress_durations: StressDurations,

    // Activity
    #[serde(default)]
    pub steps: Option<i64>,
    #[serde(default)]
    pub total_calories: Option<f64>,
    #[serde(default)]
    pub active_calories: Option<f64>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub floors_ascended: Option<f64>,
    #[serde(default)]
    pub moderate_intensity_minutes: Option<f64>,
    #[serde(default)]
    pub vigorous_intensity_minutes: Option<f64>,
    #[serde(default)]
    pub active_seconds: Option<i64>,
    #[serde(default)]
    pub sedentary_seconds: Option<i64>,

    // Respiration and SpO2
    #[serde(default)]
    pub respiration_avg: Option<f64>,
    #[serde(default)]
    pub respiration_min: Option<f64>,
    #[serde(default)]
    pub respiration_max: Option<f64>,
    #[serde(default)]
    pub spo2_avg: Option<f64>,
    #[serde(default)]
    pub spo2_min: Option<f64>,

    /// Engine-owned fields, overwritten on every run
    #[serde(default)]
    pub derived: DerivedScores,
}

impl DailyRecord {
    /// Create an empty record for a user and date
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            resting_heart_rate: None,
            min_heart_rate: None,
            max_heart_rate: None,
            avg_heart_rate: None,
            vo2_max: None,
            hrv_last_night: None,
            hrv_weekly_avg: None,
            body_battery_high: None,
            body_battery_low: None,
            body_battery_charged: None,
            body_battery_drained: None,
            sleep_seconds: None,
            deep_sleep_seconds: None,
            light_sleep_seconds: None,
            rem_sleep_seconds: None,
            awake_seconds: None,
            sleep_score: None,
            sleep_start: None,
            sleep_end: None,
            stress_avg: None,
            stress_max: None,
            stress_durations: StressDurations::default(),
            steps: None,
            total_calories: None,
            active_calories: None,
            distance_meters: None,
            floors_ascended: None,
            moderate_intensity_minutes: None,
            vigorous_intensity_minutes: None,
            active_seconds: None,
            sedentary_seconds: None,
            respiration_avg: None,
            respiration_min: None,
            respiration_max: None,
            spo2_avg: None,
            spo2_min: None,
            derived: DerivedScores::default(),
        }
    }

    /// Storage key; one record per user per date
    pub fn key(&self) -> (&str, NaiveDate) {
        (self.user_id.as_str(), self.date)
    }

    /// Total sleep in hours, absent when no sleep was recorded
    pub fn sleep_hours(&self) -> Option<f64> {
        self.sleep_seconds
            .filter(|s| *s > 0)
            .map(|s| s as f64 / 3600.0)
    }

    /// Resting heart rate, absent when missing or non-positive
    pub fn valid_resting_hr(&self) -> Option<f64> {
        self.resting_heart_rate.filter(|hr| *hr > 0.0)
    }

    /// VO2 estimate, absent when missing or non-positive
    pub fn valid_vo2_max(&self) -> Option<f64> {
        self.vo2_max.filter(|v| *v > 0.0)
    }

    /// Step count, absent when missing or zero (device not worn)
    pub fn valid_steps(&self) -> Option<i64> {
        self.steps.filter(|s| *s > 0)
    }

    /// Intensity minutes as `(moderate, vigorous)`, present when either was reported
    pub fn intensity_minutes(&self) -> Option<(f64, f64)> {
        if self.moderate_intensity_minutes.is_none() && self.vigorous_intensity_minutes.is_none() {
            return None;
        }
        Some((
            self.moderate_intensity_minutes.unwrap_or(0.0).max(0.0),
            self.vigorous_intensity_minutes.unwrap_or(0.0).max(0.0),
        ))
    }
}

/// Seconds spent in each heart-rate zone during a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartRateZones {
    pub zone1: Option<f64>,
    pub zone2: Option<f64>,
    pub zone3: Option<f64>,
    pub zone4: Option<f64>,
    pub zone5: Option<f64>,
}

impl HeartRateZones {
    pub fn has_data(&self) -> bool {
        [self.zone1, self.zone2, self.zone3, self.zone4, self.zone5]
            .iter()
            .any(Option::is_some)
    }
}

/// One completed exercise session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: String,
    /// Vendor session identifier, unique across all activities
    pub external_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    pub start_time: NaiveDateTime,
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub avg_hr: Option<f64>,
    #[serde(default)]
    pub max_hr: Option<f64>,
    #[serde(default)]
    pub aerobic_training_effect: Option<f64>,
    #[serde(default)]
    pub anaerobic_training_effect: Option<f64>,
    #[serde(default)]
    pub hr_zones: HeartRateZones,
    #[serde(default)]
    pub moderate_intensity_minutes: Option<f64>,
    #[serde(default)]
    pub vigorous_intensity_minutes: Option<f64>,
    /// Session strain (0.0-21.0), written by the engine
    #[serde(default)]
    pub strain_score: f64,
}

impl ActivityRecord {
    /// Calendar date the session started on
    pub fn date(&self) -> NaiveDate {
        self.start_time.date()
    }
}

/// Read-only view of the user owned by the account collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub birth_year: Option<i32>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, birth_year: Option<i32>) -> Self {
        Self {
            user_id: user_id.into(),
            birth_year,
        }
    }

    /// Age in whole years at `reference`, or `default_age` when the birth year is unknown
    pub fn chronological_age(&self, reference: NaiveDate, default_age: f64) -> f64 {
        match self.birth_year {
            Some(year) if year <= reference.year() => f64::from(reference.year() - year),
            _ => default_age,
        }
    }
}

/// Quality flag indicating data issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    MissingSleepData,
    MissingRestingHr,
    MissingVo2Max,
    MissingSteps,
    MissingIntensityMinutes,
    MissingBodyBattery,
    InsufficientBioAgeFactors,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::MissingSleepData => "missing_sleep_data",
            QualityFlag::MissingRestingHr => "missing_resting_hr",
            QualityFlag::MissingVo2Max => "missing_vo2_max",
            QualityFlag::MissingSteps => "missing_steps",
            QualityFlag::MissingIntensityMinutes => "missing_intensity_minutes",
            QualityFlag::MissingBodyBattery => "missing_body_battery",
            QualityFlag::InsufficientBioAgeFactors => "insufficient_bio_age_factors",
        }
    }
}

/// Round to one decimal place, half away from zero
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
