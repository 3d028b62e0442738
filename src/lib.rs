//! Vitals Engine - deterministic scoring for daily wearable telemetry
//!
//! The engine turns a day's raw telemetry into recovery, strain and sleep
//! performance scores plus a biological-age estimate with per-factor
//! attribution, scores exercise sessions, and rolls scored days up into
//! calendar periods, summaries and trends:
//! vendor adaptation → per-day scoring → window rollups → trend analysis
//! → report encoding.
//!
//! All computation is pure and synchronous. Missing telemetry never fails a
//! call; scores that cannot be computed are `None`.

pub mod activity;
pub mod adapters;
pub mod bio_age;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod impact;
pub mod scores;
pub mod summary;
pub mod trend;
pub mod types;
pub mod weighted;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::ScoringConfig;
pub use engine::{parse_date, parse_records, score_garmin_payload, ScoredBatch, VitalsEngine};
pub use error::ComputeError;
pub use types::{ActivityRecord, BioAgeFactor, DailyRecord, FactorYearImpact, UserProfile};
pub use window::{period_range, preceding_periods, Granularity, Metric, PeriodRange};

/// Engine version embedded in all reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "vitals-engine";
