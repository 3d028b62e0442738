//! Factor impact computation
//!
//! Maps a single telemetry value to a normalized impact in `[-1, 1]`, where
//! negative means "younger" and positive means "older". Each factor is a pure
//! function of one value; whether a factor is computable at all is decided from
//! the record by [`FactorImpactCalculator::impact_for`].

use crate::config::{ImpactBand, ImpactConfig};
use crate::types::{BioAgeFactor, DailyRecord};

/// Per-factor impact functions
#[derive(Debug, Clone)]
pub struct FactorImpactCalculator {
    config: ImpactConfig,
}

impl Default for FactorImpactCalculator {
    fn default() -> Self {
        Self::new(ImpactConfig::default())
    }
}

impl FactorImpactCalculator {
    pub fn new(config: ImpactConfig) -> Self {
        Self { config }
    }

    /// Impact of a raw value for the given factor.
    ///
    /// For [`BioAgeFactor::Intensity`] the value is the intensity load
    /// (`moderate + multiplier × vigorous` minutes).
    pub fn impact(&self, factor: BioAgeFactor, value: f64) -> f64 {
        match factor {
            BioAgeFactor::Rhr => self.rhr_impact(value),
            BioAgeFactor::Vo2 => self.vo2_impact(value),
            BioAgeFactor::Sleep => self.sleep_impact(value),
            BioAgeFactor::Steps => self.steps_impact(value),
            BioAgeFactor::Intensity => self.intensity_impact(value),
        }
    }

    /// Impact of a factor for one day, `None` when the day has no data for it
    pub fn impact_for(&self, factor: BioAgeFactor, record: &DailyRecord) -> Option<f64> {
        let value = match factor {
            BioAgeFactor::Rhr => record.valid_resting_hr(),
            BioAgeFactor::Vo2 => record.valid_vo2_max(),
            BioAgeFactor::Sleep => record.sleep_hours(),
            BioAgeFactor::Steps => record.valid_steps().map(|s| s as f64),
            BioAgeFactor::Intensity => record
                .intensity_minutes()
                .map(|(moderate, vigorous)| self.intensity_load(moderate, vigorous)),
        }?;
        Some(self.impact(factor, value))
    }

    /// Every computable factor for one day, in attribution order
    pub fn impacts_for(&self, record: &DailyRecord) -> Vec<(BioAgeFactor, f64)> {
        BioAgeFactor::ALL
            .iter()
            .filter_map(|factor| self.impact_for(*factor, record).map(|i| (*factor, i)))
            .collect()
    }

    /// Linear around the baseline: higher resting HR is older
    pub fn rhr_impact(&self, bpm: f64) -> f64 {
        ((bpm - self.config.rhr_baseline_bpm) / self.config.rhr_span_bpm).clamp(-1.0, 1.0)
    }

    /// Linear around the baseline: higher VO2 is younger
    pub fn vo2_impact(&self, vo2: f64) -> f64 {
        ((self.config.vo2_baseline - vo2) / self.config.vo2_span).clamp(-1.0, 1.0)
    }

    /// Fixed bonus inside the optimal band, growing penalty either side
    pub fn sleep_impact(&self, hours: f64) -> f64 {
        let c = &self.config;
        if hours < c.sleep_optimal_min_hours {
            ((c.sleep_optimal_min_hours - hours) / c.sleep_short_span_hours).min(1.0)
        } else if hours > c.sleep_optimal_max_hours {
            ((hours - c.sleep_optimal_max_hours) / c.sleep_long_span_hours).min(c.sleep_long_cap)
        } else {
            c.sleep_optimal_impact
        }
    }

    pub fn steps_impact(&self, steps: f64) -> f64 {
        step_function(&self.config.step_bands, self.config.step_floor_impact, steps)
    }

    pub fn intensity_impact(&self, load: f64) -> f64 {
        step_function(
            &self.config.intensity_bands,
            self.config.intensity_floor_impact,
            load,
        )
    }

    /// Intensity load in moderate-equivalent minutes
    pub fn intensity_load(&self, moderate: f64, vigorous: f64) -> f64 {
        moderate + self.config.vigorous_multiplier * vigorous
    }
}

/// First band whose threshold the value reaches, else the floor
fn step_function(bands: &[ImpactBand], floor: f64, value: f64) -> f64 {
    bands
        .iter()
        .find(|band| value >= band.min)
        .map(|band| band.impact)
        .unwrap_or(floor)
        .clamp(-1.0, 1.0)
}
