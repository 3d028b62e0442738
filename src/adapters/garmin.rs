//! Garmin vendor adapter
//!
//! Parses a bundle of Garmin Connect responses and maps them to raw records.
//! Each entry of `days` carries the per-day endpoint responses (daily stats,
//! sleep, max metrics, HRV, SpO2); `activities` is the activity list as returned
//! by the provider.

use crate::error::ComputeError;
use crate::types::{ActivityRecord, DailyRecord, HeartRateZones, StressDurations};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use super::VendorPayloadAdapter;

/// Local start-time format used by the activity list
const ACTIVITY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Garmin payload adapter
pub struct GarminAdapter;

impl VendorPayloadAdapter for GarminAdapter {
    fn parse(
        &self,
        raw_json: &str,
        user_id: &str,
    ) -> Result<(Vec<DailyRecord>, Vec<ActivityRecord>), ComputeError> {
        let payload: GarminPayload = serde_json::from_str(raw_json)?;

        // One record per date; a later entry for the same date replaces the earlier one
        let mut by_date: BTreeMap<NaiveDate, DailyRecord> = BTreeMap::new();
        for day in payload.days {
            let Some(date) = day_date(&day) else {
                warn!(user_id, "skipping Garmin day without a parseable date");
                continue;
            };
            if by_date.insert(date, convert_day(&day, user_id, date)).is_some() {
                debug!(user_id, %date, "duplicate Garmin day replaced");
            }
        }

        let mut seen = HashSet::new();
        let mut activities = Vec::new();
        for raw in payload.activities {
            let Some(activity) = convert_activity(&raw, user_id) else {
                continue;
            };
            if !seen.insert(activity.external_id.clone()) {
                warn!(user_id, external_id = %activity.external_id, "skipping duplicate Garmin activity");
                continue;
            }
            activities.push(activity);
        }
        activities.sort_by_key(|a| a.start_time);

        debug!(
            user_id,
            days = by_date.len(),
            activities = activities.len(),
            "parsed Garmin payload"
        );

        Ok((by_date.into_values().collect(), activities))
    }
}

fn day_date(day: &GarminDay) -> Option<NaiveDate> {
    day.date
        .as_deref()
        .or(day.summary.as_ref().and_then(|s| s.calendar_date.as_deref()))
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

fn convert_day(day: &GarminDay, user_id: &str, date: NaiveDate) -> DailyRecord {
    let mut record = DailyRecord::new(user_id, date);

    if let Some(s) = &day.summary {
        record.resting_heart_rate = s.resting_heart_rate;
        record.min_heart_rate = s.min_heart_rate;
        record.max_heart_rate = s.max_heart_rate;
        record.steps = s.total_steps.map(to_i64);
        record.total_calories = s.total_kilocalories;
        record.active_calories = s.active_kilocalories;
        record.distance_meters = s.total_distance_meters;
        record.floors_ascended = s.floors_ascended;
        record.moderate_intensity_minutes = s.moderate_intensity_minutes;
        record.vigorous_intensity_minutes = s.vigorous_intensity_minutes;
        record.active_seconds = s.active_seconds.map(to_i64);
        record.sedentary_seconds = s.sedentary_seconds.map(to_i64);
        record.stress_avg = s.average_stress_level.filter(|v| *v >= 0.0);
        record.stress_max = s.max_stress_level.filter(|v| *v >= 0.0);
        record.stress_durations = StressDurations {
            rest: s.rest_stress_duration.map(to_i64),
            low: s.low_stress_duration.map(to_i64),
            medium: s.medium_stress_duration.map(to_i64),
            high: s.high_stress_duration.map(to_i64),
        };
        record.body_battery_high = s.body_battery_highest_value;
        record.body_battery_low = s.body_battery_lowest_value;
        record.body_battery_charged = s.body_battery_charged_value;
        record.body_battery_drained = s.body_battery_drained_value;
        record.respiration_avg = s.avg_waking_respiration_value;
        record.respiration_min = s.lowest_respiration_value;
        record.respiration_max = s.highest_respiration_value;
    }

    if let Some(sleep) = day.sleep.as_ref().and_then(|s| s.daily_sleep_dto.as_ref()) {
        record.sleep_seconds = sleep.sleep_time_seconds.map(to_i64);
        record.deep_sleep_seconds = sleep.deep_sleep_seconds.map(to_i64);
        record.light_sleep_seconds = sleep.light_sleep_seconds.map(to_i64);
        record.rem_sleep_seconds = sleep.rem_sleep_seconds.map(to_i64);
        record.awake_seconds = sleep.awake_sleep_seconds.map(to_i64);
        record.sleep_score = sleep
            .sleep_scores
            .as_ref()
            .and_then(|sc| sc.overall.as_ref())
            .and_then(|o| o.value);
        record.sleep_start = sleep
            .sleep_start_timestamp_local
            .as_ref()
            .and_then(parse_local_timestamp);
        record.sleep_end = sleep
            .sleep_end_timestamp_local
            .as_ref()
            .and_then(parse_local_timestamp);
    }

    // First max-metrics entry carrying a VO2 estimate wins
    record.vo2_max = day
        .max_metrics
        .iter()
        .filter_map(|m| m.generic.as_ref().and_then(|g| g.vo2_max_value))
        .find(|v| *v > 0.0);

    if let Some(hrv) = &day.hrv {
        let summary = hrv.hrv_summary.as_ref().unwrap_or(&hrv.flat);
        record.hrv_weekly_avg = summary.weekly_avg;
        record.hrv_last_night = summary.last_night_avg;
    }

    if let Some(spo2) = &day.spo2 {
        record.spo2_avg = spo2.average_spo2;
        record.spo2_min = spo2.lowest_spo2;
    }

    record
}

fn convert_activity(raw: &GarminActivity, user_id: &str) -> Option<ActivityRecord> {
    let Some(external_id) = raw.activity_id.as_ref().and_then(id_string) else {
        warn!(user_id, "skipping Garmin activity without an id");
        return None;
    };
    let Some(start_time) = raw.start_time_local.as_deref().and_then(parse_start_time) else {
        warn!(user_id, %external_id, "skipping Garmin activity without a parseable start time");
        return None;
    };

    let end_time = raw
        .duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .and_then(|d| start_time.checked_add_signed(Duration::milliseconds((d * 1000.0) as i64)));

    Some(ActivityRecord {
        user_id: user_id.to_string(),
        external_id,
        name: raw.activity_name.clone(),
        activity_type: raw.activity_type.as_ref().and_then(|t| t.type_key.clone()),
        start_time,
        end_time,
        duration_seconds: raw.duration,
        distance_meters: raw.distance,
        calories: raw.calories,
        avg_hr: raw.average_hr,
        max_hr: raw.max_hr,
        aerobic_training_effect: raw.aerobic_training_effect,
        anaerobic_training_effect: raw.anaerobic_training_effect,
        hr_zones: HeartRateZones {
            zone1: raw.hr_time_in_zone_1,
            zone2: raw.hr_time_in_zone_2,
            zone3: raw.hr_time_in_zone_3,
            zone4: raw.hr_time_in_zone_4,
            zone5: raw.hr_time_in_zone_5,
        },
        moderate_intensity_minutes: raw.moderate_intensity_minutes,
        vigorous_intensity_minutes: raw.vigorous_intensity_minutes,
        strain_score: 0.0,
    })
}

fn to_i64(value: f64) -> i64 {
    value.round() as i64
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, ACTIVITY_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Sleep timestamps arrive either as local epoch milliseconds or as ISO strings
fn parse_local_timestamp(value: &serde_json::Value) -> Option<NaiveDateTime> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        serde_json::Value::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, ACTIVITY_TIME_FORMAT))
            .ok(),
        _ => None,
    }
}

// Garmin API response structures

#[derive(Debug, Deserialize)]
struct GarminPayload {
    #[serde(default)]
    days: Vec<GarminDay>,
    #[serde(default)]
    activities: Vec<GarminActivity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminDay {
    date: Option<String>,
    summary: Option<GarminDailySummary>,
    sleep: Option<GarminSleepData>,
    #[serde(default)]
    max_metrics: Vec<GarminMaxMetric>,
    hrv: Option<GarminHrvData>,
    spo2: Option<GarminSpo2>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminDailySummary {
    calendar_date: Option<String>,
    resting_heart_rate: Option<f64>,
    min_heart_rate: Option<f64>,
    max_heart_rate: Option<f64>,
    total_steps: Option<f64>,
    total_kilocalories: Option<f64>,
    active_kilocalories: Option<f64>,
    total_distance_meters: Option<f64>,
    floors_ascended: Option<f64>,
    moderate_intensity_minutes: Option<f64>,
    vigorous_intensity_minutes: Option<f64>,
    active_seconds: Option<f64>,
    sedentary_seconds: Option<f64>,
    average_stress_level: Option<f64>,
    max_stress_level: Option<f64>,
    rest_stress_duration: Option<f64>,
    low_stress_duration: Option<f64>,
    medium_stress_duration: Option<f64>,
    high_stress_duration: Option<f64>,
    body_battery_highest_value: Option<f64>,
    body_battery_lowest_value: Option<f64>,
    body_battery_charged_value: Option<f64>,
    body_battery_drained_value: Option<f64>,
    avg_waking_respiration_value: Option<f64>,
    lowest_respiration_value: Option<f64>,
    highest_respiration_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GarminSleepData {
    #[serde(rename = "dailySleepDTO")]
    daily_sleep_dto: Option<GarminDailySleep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminDailySleep {
    sleep_time_seconds: Option<f64>,
    deep_sleep_seconds: Option<f64>,
    light_sleep_seconds: Option<f64>,
    rem_sleep_seconds: Option<f64>,
    awake_sleep_seconds: Option<f64>,
    sleep_start_timestamp_local: Option<serde_json::Value>,
    sleep_end_timestamp_local: Option<serde_json::Value>,
    sleep_scores: Option<GarminSleepScores>,
}

#[derive(Debug, Deserialize)]
struct GarminSleepScores {
    overall: Option<GarminScoreValue>,
}

#[derive(Debug, Deserialize)]
struct GarminScoreValue {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GarminMaxMetric {
    generic: Option<GarminGenericMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminGenericMetric {
    vo2_max_value: Option<f64>,
}

/// HRV arrives either wrapped in `hrvSummary` or flattened
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminHrvData {
    hrv_summary: Option<GarminHrvSummary>,
    #[serde(flatten)]
    flat: GarminHrvSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminHrvSummary {
    weekly_avg: Option<f64>,
    last_night_avg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GarminSpo2 {
    #[serde(rename = "averageSpO2")]
    average_spo2: Option<f64>,
    #[serde(rename = "lowestSpO2")]
    lowest_spo2: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminActivity {
    activity_id: Option<serde_json::Value>,
    activity_name: Option<String>,
    activity_type: Option<GarminActivityType>,
    start_time_local: Option<String>,
    duration: Option<f64>,
    distance: Option<f64>,
    calories: Option<f64>,
    #[serde(rename = "averageHR")]
    average_hr: Option<f64>,
    #[serde(rename = "maxHR")]
    max_hr: Option<f64>,
    aerobic_training_effect: Option<f64>,
    anaerobic_training_effect: Option<f64>,
    moderate_intensity_minutes: Option<f64>,
    vigorous_intensity_minutes: Option<f64>,
    #[serde(rename = "hrTimeInZone_1")]
    hr_time_in_zone_1: Option<f64>,
    #[serde(rename = "hrTimeInZone_2")]
    hr_time_in_zone_2: Option<f64>,
    #[serde(rename = "hrTimeInZone_3")]
    hr_time_in_zone_3: Option<f64>,
    #[serde(rename = "hrTimeInZone_4")]
    hr_time_in_zone_4: Option<f64>,
    #[serde(rename = "hrTimeInZone_5")]
    hr_time_in_zone_5: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminActivityType {
    type_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_json() -> &'static str {
        r#"{
            "days": [
                {
                    "date": "2024-01-16",
                    "summary": {
                        "restingHeartRate": 80,
                        "totalSteps": 1500
                    }
                },
                {
                    "summary": {
                        "calendarDate": "2024-01-15",
                        "restingHeartRate": 55,
                        "minHeartRate": 48,
                        "maxHeartRate": 162,
                        "totalSteps": 11000,
                        "totalKilocalories": 2450.0,
                        "activeKilocalories": 650,
                        "totalDistanceMeters": 8400,
                        "moderateIntensityMinutes": 20,
                        "vigorousIntensityMinutes": 10,
                        "averageStressLevel": 32,
                        "maxStressLevel": 88,
                        "bodyBatteryHighestValue": 84,
                        "bodyBatteryLowestValue": 22,
                        "avgWakingRespirationValue": 14.5
                    },
                    "sleep": {
                        "dailySleepDTO": {
                            "sleepTimeSeconds": 27000,
                            "deepSleepSeconds": 5400,
                            "lightSleepSeconds": 14400,
                            "remSleepSeconds": 7200,
                            "awakeSleepSeconds": 900,
                            "sleepStartTimestampLocal": "2024-01-14T23:05:00.0",
                            "sleepEndTimestampLocal": 1705305600000,
                            "sleepScores": { "overall": { "value": 82 } }
                        }
                    },
                    "maxMetrics": [
                        { "generic": null },
                        { "generic": { "vo2MaxValue": 47.0 } }
                    ],
                    "hrv": { "hrvSummary": { "weeklyAvg": 52, "lastNightAvg": 58 } },
                    "spo2": { "averageSpO2": 96, "lowestSpO2": 89 }
                },
                { "date": "not-a-date" }
            ],
            "activities": [
                {
                    "activityId": 17265342123,
                    "activityName": "Evening Run",
                    "activityType": { "typeKey": "running" },
                    "startTimeLocal": "2024-01-15 18:30:00",
                    "duration": 3600.0,
                    "distance": 10250.5,
                    "calories": 712,
                    "averageHR": 151,
                    "maxHR": 178,
                    "aerobicTrainingEffect": 3.0,
                    "anaerobicTrainingEffect": 1.0,
                    "hrTimeInZone_4": 300.0,
                    "hrTimeInZone_5": 120.0
                },
                {
                    "activityId": "17265342000",
                    "startTimeLocal": "2024-01-15 07:00:00",
                    "duration": 1800.0
                },
                { "activityName": "No id", "startTimeLocal": "2024-01-15 09:00:00" },
                { "activityId": 42, "startTimeLocal": "yesterday" }
            ]
        }"#
    }

    #[test]
    fn test_parse_garmin_payload() {
        let (days, _) = GarminAdapter.parse(sample_json(), "user-1").unwrap();

        assert_eq!(days.len(), 2);
        let day = &days[0];
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(day.user_id, "user-1");
        assert_eq!(day.resting_heart_rate, Some(55.0));
        assert_eq!(day.steps, Some(11_000));
        assert_eq!(day.active_calories, Some(650.0));
        assert_eq!(day.moderate_intensity_minutes, Some(20.0));
        assert_eq!(day.body_battery_high, Some(84.0));
        assert_eq!(day.sleep_seconds, Some(27_000));
        assert_eq!(day.deep_sleep_seconds, Some(5_400));
        assert_eq!(day.sleep_score, Some(82.0));
        assert_eq!(day.vo2_max, Some(47.0));
        assert_eq!(day.hrv_last_night, Some(58.0));
        assert_eq!(day.hrv_weekly_avg, Some(52.0));
        assert_eq!(day.spo2_avg, Some(96.0));
        assert_eq!(day.spo2_min, Some(89.0));
        assert_eq!(
            day.sleep_start,
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap().and_hms_opt(23, 5, 0)
        );
        assert_eq!(
            day.sleep_end,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(8, 0, 0)
        );

        // Derived fields are left for the engine
        assert_eq!(day.derived.recovery_score, None);
        assert_eq!(days[1].vo2_max, None);
    }

    #[test]
    fn test_parse_activities() {
        let (_, activities) = GarminAdapter.parse(sample_json(), "user-1").unwrap();

        assert_eq!(activities.len(), 2);
        // Sorted by start time
        assert_eq!(activities[0].external_id, "17265342000");
        let run = &activities[1];
        assert_eq!(run.external_id, "17265342123");
        assert_eq!(run.name.as_deref(), Some("Evening Run"));
        assert_eq!(run.activity_type.as_deref(), Some("running"));
        assert_eq!(run.aerobic_training_effect, Some(3.0));
        assert_eq!(run.hr_zones.zone4, Some(300.0));
        assert_eq!(
            run.end_time,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(19, 30, 0)
        );
    }

    #[test]
    fn test_flat_hrv_and_duplicate_days() {
        let json = r#"{
            "days": [
                { "date": "2024-02-01", "summary": { "totalSteps": 4000 } },
                { "date": "2024-02-01", "summary": { "totalSteps": 9000 }, "hrv": { "lastNightAvg": 61 } }
            ]
        }"#;
        let (days, activities) = GarminAdapter.parse(json, "u").unwrap();

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].steps, Some(9_000));
        assert_eq!(days[0].hrv_last_night, Some(61.0));
        assert!(activities.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            GarminAdapter.parse("{not json", "u"),
            Err(ComputeError::JsonError(_))
        ));
    }
}
