//! Per-session strain
//!
//! Strain for a single exercise session from its training-effect values,
//! duration and, when present, time in the two highest heart-rate zones.
//! Missing inputs contribute nothing, so every session has a strain value.

use crate::config::ActivityStrainConfig;
use crate::types::{round1, ActivityRecord};

/// Calculator for session strain on the 0-21 scale
#[derive(Debug, Clone, Default)]
pub struct ActivityStrainCalculator {
    config: ActivityStrainConfig,
}

impl ActivityStrainCalculator {
    pub fn new(config: ActivityStrainConfig) -> Self {
        Self { config }
    }

    /// Session strain, clamped to `[0, max_strain]` and rounded to one decimal
    pub fn strain(&self, activity: &ActivityRecord) -> f64 {
        let c = &self.config;

        let aerobic = activity.aerobic_training_effect.unwrap_or(0.0).max(0.0);
        let anaerobic = activity.anaerobic_training_effect.unwrap_or(0.0).max(0.0);
        let hours = activity.duration_seconds.unwrap_or(0.0).max(0.0) / 3600.0;

        let mut strain = c.aerobic_weight * aerobic + c.anaerobic_weight * anaerobic + c.per_hour * hours;

        if c.zone_weighting && activity.hr_zones.has_data() {
            let zone4_minutes = activity.hr_zones.zone4.unwrap_or(0.0).max(0.0) / 60.0;
            let zone5_minutes = activity.hr_zones.zone5.unwrap_or(0.0).max(0.0) / 60.0;
            strain += c.zone4_per_minute * zone4_minutes + c.zone5_per_minute * zone5_minutes;
        }

        round1(strain.clamp(0.0, c.max_strain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeartRateZones;
    use chrono::NaiveDate;

    fn activity() -> ActivityRecord {
        ActivityRecord {
            user_id: "u1".to_string(),
            external_id: "123".to_string(),
            name: Some("Morning Run".to_string()),
            activity_type: Some("running".to_string()),
            start_time: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap(),
            end_time: None,
            duration_seconds: Some(3_600.0),
            distance_meters: Some(10_000.0),
            calories: Some(650.0),
            avg_hr: Some(150.0),
            max_hr: Some(175.0),
            aerobic_training_effect: Some(3.0),
            anaerobic_training_effect: Some(1.0),
            hr_zones: HeartRateZones::default(),
            moderate_intensity_minutes: None,
            vigorous_intensity_minutes: None,
            strain_score: 0.0,
        }
    }

    #[test]
    fn test_training_effect_and_duration() {
        // 2 × 3.0 + 1.5 × 1.0 + 0.5 × 1h
        assert_eq!(ActivityStrainCalculator::default().strain(&activity()), 8.0);
    }

    #[test]
    fn test_zone_weighting() {
        let mut a = activity();
        a.hr_zones = HeartRateZones {
            zone3: Some(1_200.0),
            zone4: Some(300.0),
            zone5: Some(120.0),
            ..Default::default()
        };
        // 8.0 + 0.3 × 5 + 0.5 × 2
        assert_eq!(ActivityStrainCalculator::default().strain(&a), 10.5);

        let without_zones = ActivityStrainCalculator::new(ActivityStrainConfig {
            zone_weighting: false,
            ..ActivityStrainConfig::default()
        });
        assert_eq!(without_zones.strain(&a), 8.0);
    }

    #[test]
    fn test_missing_inputs_contribute_nothing() {
        let mut a = activity();
        a.aerobic_training_effect = None;
        a.anaerobic_training_effect = None;
        a.duration_seconds = None;
        assert_eq!(ActivityStrainCalculator::default().strain(&a), 0.0);
    }

    #[test]
    fn test_clamped_to_scale() {
        let mut a = activity();
        a.aerobic_training_effect = Some(5.0);
        a.anaerobic_training_effect = Some(5.0);
        a.duration_seconds = Some(12.0 * 3600.0);
        assert_eq!(ActivityStrainCalculator::default().strain(&a), 21.0);

        a.duration_seconds = Some(-7_200.0);
        a.aerobic_training_effect = Some(-2.0);
        a.anaerobic_training_effect = None;
        assert_eq!(ActivityStrainCalculator::default().strain(&a), 0.0);
    }
}
