//! FFI bindings for the vitals engine
//!
//! This module provides C-compatible functions for calling the engine from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `vitals_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::adapters::GarminAdapter;
use crate::config::ScoringConfig;
use crate::encoder::{ActivityReport, DailyReport, ReportEncoder};
use crate::engine::{ScoredBatch, VitalsEngine};
use crate::error::ComputeError;
use crate::types::ActivityRecord;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Reports for one scored payload
#[derive(Serialize)]
struct BatchReport {
    days: Vec<DailyReport>,
    activities: Vec<ActivityReport>,
}

fn encode_batch(engine: &VitalsEngine, batch: &ScoredBatch) -> Result<String, ComputeError> {
    let encoder = ReportEncoder::new().with_min_factors(engine.config().bio_age.min_factors);
    let report = BatchReport {
        days: batch.days.iter().map(|d| encoder.encode_daily(d)).collect(),
        activities: batch
            .activities
            .iter()
            .map(|a| encoder.encode_activity(a))
            .collect(),
    };
    Ok(serde_json::to_string(&report)?)
}

unsafe fn score_garmin_with(
    engine: &VitalsEngine,
    json: *const c_char,
    user_id: *const c_char,
    chronological_age: f64,
) -> *mut c_char {
    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let user_str = match cstr_to_string(user_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid user_id string pointer");
            return ptr::null_mut();
        }
    };

    if !chronological_age.is_finite() || chronological_age < 0.0 {
        set_last_error("chronological_age must be a non-negative number");
        return ptr::null_mut();
    }

    let result = engine
        .process_payload(&GarminAdapter, &json_str, &user_str, chronological_age)
        .and_then(|batch| encode_batch(engine, &batch));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a Garmin payload with the default configuration and return a JSON
/// object `{"days": [...], "activities": [...]}`.
///
/// # Safety
/// - `json` and `user_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `vitals_free_string`.
/// - Returns NULL on error; call `vitals_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn vitals_score_garmin(
    json: *const c_char,
    user_id: *const c_char,
    chronological_age: f64,
) -> *mut c_char {
    clear_last_error();
    score_garmin_with(&VitalsEngine::default(), json, user_id, chronological_age)
}

/// Strain for one activity record given as JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a negative value on error; call `vitals_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn vitals_activity_strain(json: *const c_char) -> f64 {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1.0;
        }
    };

    match serde_json::from_str::<ActivityRecord>(&json_str) {
        Ok(activity) => VitalsEngine::default().score_activity(&activity).strain_score,
        Err(e) => {
            set_last_error(&ComputeError::from(e).to_string());
            -1.0
        }
    }
}

// ============================================================================
// Configured engine API
// ============================================================================

/// Opaque handle to a configured engine
pub struct VitalsEngineHandle {
    inner: VitalsEngine,
}

/// Create an engine from a JSON configuration, or the defaults when `config_json` is NULL.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `vitals_engine_free`.
/// - Returns NULL on error; call `vitals_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn vitals_engine_new(config_json: *const c_char) -> *mut VitalsEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(ScoringConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(raw) => ScoringConfig::from_json_str(&raw),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    match config.and_then(VitalsEngine::new) {
        Ok(inner) => Box::into_raw(Box::new(VitalsEngineHandle { inner })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine handle.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `vitals_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn vitals_engine_free(engine: *mut VitalsEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Score a Garmin payload with a configured engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `vitals_engine_new`.
/// - `json` and `user_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `vitals_free_string`.
/// - Returns NULL on error; call `vitals_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn vitals_engine_score_garmin(
    engine: *const VitalsEngineHandle,
    json: *const c_char,
    user_id: *const c_char,
    chronological_age: f64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    score_garmin_with(&(*engine).inner, json, user_id, chronological_age)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by vitals functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a vitals function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn vitals_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next vitals function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn vitals_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn vitals_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_garmin_json() -> CString {
        CString::new(
            r#"{
            "days": [{
                "date": "2024-01-15",
                "summary": { "restingHeartRate": 80, "totalSteps": 1500 }
            }],
            "activities": [{
                "activityId": 77,
                "startTimeLocal": "2024-01-15 07:00:00",
                "duration": 3600.0,
                "aerobicTrainingEffect": 3.0,
                "anaerobicTrainingEffect": 1.0
            }]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_score_garmin() {
        let json = sample_garmin_json();
        let user = CString::new("user-1").unwrap();

        unsafe {
            let result = vitals_score_garmin(json.as_ptr(), user.as_ptr(), 30.0);
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let parsed: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(parsed["days"][0]["biological_age"]["estimate"], 38.0);
            assert_eq!(parsed["activities"][0]["strain_score"], 8.0);

            vitals_free_string(result);
        }
    }

    #[test]
    fn test_ffi_activity_strain() {
        let json = CString::new(
            r#"{
                "user_id": "u1",
                "external_id": "a1",
                "start_time": "2024-01-15T07:00:00",
                "duration_seconds": 3600.0,
                "aerobic_training_effect": 3.0,
                "anaerobic_training_effect": 1.0
            }"#,
        )
        .unwrap();

        unsafe {
            assert_eq!(vitals_activity_strain(json.as_ptr()), 8.0);
            assert!(vitals_last_error().is_null());

            let broken = CString::new("{").unwrap();
            assert!(vitals_activity_strain(broken.as_ptr()) < 0.0);
            assert!(!vitals_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        let config = CString::new(r#"{"bio_age": {"max_years": 4.0}}"#).unwrap();
        let json = sample_garmin_json();
        let user = CString::new("user-1").unwrap();

        unsafe {
            let engine = vitals_engine_new(config.as_ptr());
            assert!(!engine.is_null());

            let result = vitals_engine_score_garmin(engine, json.as_ptr(), user.as_ptr(), 30.0);
            assert!(!result.is_null());
            let parsed: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(parsed["days"][0]["biological_age"]["estimate"], 34.0);

            vitals_free_string(result);
            vitals_engine_free(engine);

            let defaults = vitals_engine_new(ptr::null());
            assert!(!defaults.is_null());
            vitals_engine_free(defaults);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let user = CString::new("u").unwrap();

            let result = vitals_score_garmin(invalid_json.as_ptr(), user.as_ptr(), 30.0);
            assert!(result.is_null());
            let error = vitals_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("Invalid JSON"));

            let result = vitals_score_garmin(ptr::null(), user.as_ptr(), 30.0);
            assert!(result.is_null());

            let bad_config = CString::new(r#"{"bio_age": {"min_factors": 0}}"#).unwrap();
            assert!(vitals_engine_new(bad_config.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(vitals_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
