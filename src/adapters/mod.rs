//! Vendor payload adapters
//!
//! This module provides adapters that parse raw vendor JSON payloads and map them
//! onto the engine's raw record fields. Adapters never fill derived fields.

mod garmin;

pub use garmin::GarminAdapter;

use crate::error::ComputeError;
use crate::types::{ActivityRecord, DailyRecord};

/// Trait for vendor payload adapters
pub trait VendorPayloadAdapter {
    /// Parse raw JSON into daily records sorted by date and activities sorted by start time
    fn parse(
        &self,
        raw_json: &str,
        user_id: &str,
    ) -> Result<(Vec<DailyRecord>, Vec<ActivityRecord>), ComputeError>;
}
