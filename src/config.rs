//! Scoring configuration
//!
//! Every constant the formulas depend on lives in [`ScoringConfig`], an
//! immutable value handed to the engine at construction. Formula revisions are
//! expressed as alternative configurations rather than alternative code paths.
//!
//! Configurations load from TOML or JSON. Every section is optional, so a file
//! only needs to name the values it overrides:
//!
//! ```toml
//! default_age_years = 40.0
//!
//! [bio_age]
//! max_years = 10.0
//!
//! [strain]
//! include_stress = true
//! ```

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One breakpoint of a step function: values `>= min` map to `impact`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactBand {
    pub min: f64,
    pub impact: f64,
}

impl ImpactBand {
    pub const fn new(min: f64, impact: f64) -> Self {
        Self { min, impact }
    }
}

/// Constants for the per-factor impact functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    pub rhr_baseline_bpm: f64,
    pub rhr_span_bpm: f64,
    pub vo2_baseline: f64,
    pub vo2_span: f64,
    pub sleep_optimal_min_hours: f64,
    pub sleep_optimal_max_hours: f64,
    pub sleep_optimal_impact: f64,
    pub sleep_short_span_hours: f64,
    pub sleep_long_span_hours: f64,
    pub sleep_long_cap: f64,
    /// Descending breakpoints over daily steps
    pub step_bands: Vec<ImpactBand>,
    pub step_floor_impact: f64,
    /// Vigorous minutes count this many times toward the intensity load
    pub vigorous_multiplier: f64,
    /// Descending breakpoints over the intensity load
    pub intensity_bands: Vec<ImpactBand>,
    pub intensity_floor_impact: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            rhr_baseline_bpm: 60.0,
            rhr_span_bpm: 20.0,
            vo2_baseline: 42.0,
            vo2_span: 13.0,
            sleep_optimal_min_hours: 7.0,
            sleep_optimal_max_hours: 8.5,
            sleep_optimal_impact: -0.3,
            sleep_short_span_hours: 3.0,
            sleep_long_span_hours: 3.0,
            sleep_long_cap: 0.5,
            step_bands: vec![
                ImpactBand::new(12_000.0, -0.8),
                ImpactBand::new(10_000.0, -0.5),
                ImpactBand::new(8_000.0, -0.2),
                ImpactBand::new(6_000.0, 0.0),
                ImpactBand::new(4_000.0, 0.3),
                ImpactBand::new(2_000.0, 0.6),
            ],
            step_floor_impact: 1.0,
            vigorous_multiplier: 2.0,
            intensity_bands: vec![
                ImpactBand::new(60.0, -0.8),
                ImpactBand::new(45.0, -0.5),
                ImpactBand::new(30.0, -0.2),
                ImpactBand::new(15.0, 0.0),
                ImpactBand::new(5.0, 0.3),
            ],
            intensity_floor_impact: 0.5,
        }
    }
}

/// Constants for combining impacts into a biological age
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BioAgeConfig {
    /// Maximum deviation in years from chronological age
    pub max_years: f64,
    /// Fewest computable factors that still yield an estimate
    pub min_factors: usize,
}

impl Default for BioAgeConfig {
    fn default() -> Self {
        Self {
            max_years: 8.0,
            min_factors: 2,
        }
    }
}

/// Recovery score components and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub body_battery_weight: f64,
    pub rhr_weight: f64,
    pub sleep_weight: f64,
    /// RHR at which the RHR component scores 100
    pub rhr_reference_bpm: f64,
    /// Points lost per bpm above the reference
    pub rhr_points_per_bpm: f64,
    pub sleep_target_hours: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            body_battery_weight: 0.4,
            rhr_weight: 0.3,
            sleep_weight: 0.3,
            rhr_reference_bpm: 55.0,
            rhr_points_per_bpm: 3.0,
            sleep_target_hours: 8.0,
        }
    }
}

/// Daily strain accumulator coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainConfig {
    pub moderate_per_minute: f64,
    pub vigorous_per_minute: f64,
    /// Active calories per strain point
    pub active_calories_per_point: f64,
    pub include_stress: bool,
    pub stress_threshold: f64,
    pub stress_divisor: f64,
    pub max_strain: f64,
}

impl Default for StrainConfig {
    fn default() -> Self {
        Self {
            moderate_per_minute: 0.05,
            vigorous_per_minute: 0.15,
            active_calories_per_point: 100.0,
            include_stress: false,
            stress_threshold: 50.0,
            stress_divisor: 50.0,
            max_strain: 21.0,
        }
    }
}

/// Sleep performance components and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepPerformanceConfig {
    pub target_hours: f64,
    pub duration_weight: f64,
    pub quality_weight: f64,
    pub deep_target_fraction: f64,
    pub rem_target_fraction: f64,
    /// Phase quality used when deep or REM durations are unknown
    pub neutral_quality: f64,
}

impl Default for SleepPerformanceConfig {
    fn default() -> Self {
        Self {
            target_hours: 8.0,
            duration_weight: 0.6,
            quality_weight: 0.4,
            deep_target_fraction: 0.175,
            rem_target_fraction: 0.225,
            neutral_quality: 50.0,
        }
    }
}

/// Per-session strain coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityStrainConfig {
    pub aerobic_weight: f64,
    pub anaerobic_weight: f64,
    pub per_hour: f64,
    pub zone_weighting: bool,
    pub zone4_per_minute: f64,
    pub zone5_per_minute: f64,
    pub max_strain: f64,
}

impl Default for ActivityStrainConfig {
    fn default() -> Self {
        Self {
            aerobic_weight: 2.0,
            anaerobic_weight: 1.5,
            per_hour: 0.5,
            zone_weighting: true,
            zone4_per_minute: 0.3,
            zone5_per_minute: 0.5,
            max_strain: 21.0,
        }
    }
}

/// Complete, immutable configuration for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub impact: ImpactConfig,
    pub bio_age: BioAgeConfig,
    pub recovery: RecoveryConfig,
    pub strain: StrainConfig,
    pub sleep: SleepPerformanceConfig,
    pub activity: ActivityStrainConfig,
    /// Chronological age assumed when the user's birth year is unknown
    pub default_age_years: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            impact: ImpactConfig::default(),
            bio_age: BioAgeConfig::default(),
            recovery: RecoveryConfig::default(),
            strain: StrainConfig::default(),
            sleep: SleepPerformanceConfig::default(),
            activity: ActivityStrainConfig::default(),
            default_age_years: 35.0,
        }
    }
}

impl ScoringConfig {
    /// Parse and validate a TOML configuration
    pub fn from_toml_str(raw: &str) -> Result<Self, ComputeError> {
        let config: ScoringConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(raw: &str) -> Result<Self, ComputeError> {
        let config: ScoringConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> Result<Self, ComputeError> {
        let raw = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            Some("toml") | None => Self::from_toml_str(&raw),
            Some(other) => Err(ComputeError::InvalidConfig(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that every constant is usable by the formulas
    pub fn validate(&self) -> Result<(), ComputeError> {
        let impact = &self.impact;
        require_positive("impact.rhr_span_bpm", impact.rhr_span_bpm)?;
        require_positive("impact.vo2_span", impact.vo2_span)?;
        require_positive("impact.sleep_short_span_hours", impact.sleep_short_span_hours)?;
        require_positive("impact.sleep_long_span_hours", impact.sleep_long_span_hours)?;
        if impact.sleep_optimal_min_hours > impact.sleep_optimal_max_hours {
            return Err(ComputeError::InvalidConfig(
                "impact.sleep_optimal_min_hours exceeds sleep_optimal_max_hours".to_string(),
            ));
        }
        require_descending("impact.step_bands", &impact.step_bands)?;
        require_descending("impact.intensity_bands", &impact.intensity_bands)?;

        require_positive("bio_age.max_years", self.bio_age.max_years)?;
        if self.bio_age.min_factors == 0 {
            return Err(ComputeError::InvalidConfig(
                "bio_age.min_factors must be at least 1".to_string(),
            ));
        }

        let recovery = &self.recovery;
        require_weights(
            "recovery",
            &[recovery.body_battery_weight, recovery.rhr_weight, recovery.sleep_weight],
        )?;
        require_positive("recovery.sleep_target_hours", recovery.sleep_target_hours)?;

        require_positive("strain.active_calories_per_point", self.strain.active_calories_per_point)?;
        require_positive("strain.stress_divisor", self.strain.stress_divisor)?;
        require_positive("strain.max_strain", self.strain.max_strain)?;

        let sleep = &self.sleep;
        require_weights("sleep", &[sleep.duration_weight, sleep.quality_weight])?;
        require_positive("sleep.target_hours", sleep.target_hours)?;
        require_positive("sleep.deep_target_fraction", sleep.deep_target_fraction)?;
        require_positive("sleep.rem_target_fraction", sleep.rem_target_fraction)?;

        require_positive("activity.max_strain", self.activity.max_strain)?;

        if !(self.default_age_years.is_finite() && self.default_age_years >= 0.0) {
            return Err(ComputeError::InvalidConfig(
                "default_age_years must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), ComputeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ComputeError::InvalidConfig(format!("{name} must be positive, got {value}")))
    }
}

fn require_weights(section: &str, weights: &[f64]) -> Result<(), ComputeError> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ComputeError::InvalidConfig(format!(
            "{section} weights must be non-negative"
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(ComputeError::InvalidConfig(format!(
            "{section} weights must not all be zero"
        )));
    }
    Ok(())
}

fn require_descending(name: &str, bands: &[ImpactBand]) -> Result<(), ComputeError> {
    if bands.windows(2).all(|pair| pair[0].min > pair[1].min) {
        Ok(())
    } else {
        Err(ComputeError::InvalidConfig(format!(
            "{name} must be sorted by strictly descending min"
        )))
    }
}
