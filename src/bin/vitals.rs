//! Vitals CLI - Command-line interface for the vitals engine
//!
//! Commands:
//! - score: Score a Garmin payload or raw records
//! - summary: Headline averages for the last N days
//! - rollup: Current period and the three periods before it
//! - trend: Half-window deltas and pace of aging
//! - periods: Print canonical period ranges
//! - doctor: Diagnose version and configuration

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitals_engine::adapters::{GarminAdapter, VendorPayloadAdapter};
use vitals_engine::encoder::ReportEncoder;
use vitals_engine::{
    parse_date, parse_records, period_range, preceding_periods, ActivityRecord, ComputeError,
    DailyRecord, Granularity, ScoringConfig, UserProfile, VitalsEngine, ENGINE_VERSION,
    PRODUCER_NAME,
};

/// Vitals - deterministic scoring for daily wearable telemetry
#[derive(Parser)]
#[command(name = "vitals")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score wearable telemetry into recovery, strain and biological age", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a payload into daily and activity records
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "garmin")]
        format: InputFormat,

        /// Extra activity records (JSON array or NDJSON), merged with any in the payload
        #[arg(long)]
        activities: Option<PathBuf>,

        /// Where to write scored activities
        #[arg(long)]
        activities_output: Option<PathBuf>,

        /// Owner of the records (Garmin input only)
        #[arg(long, default_value = "default")]
        user_id: String,

        /// Chronological age in years
        #[arg(long, conflicts_with = "birth_year")]
        age: Option<f64>,

        /// Birth year, resolved to an age per record date
        #[arg(long)]
        birth_year: Option<i32>,

        /// Scoring configuration (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit encoded reports instead of scored records
        #[arg(long)]
        reports: bool,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Averages over the last N days
    Summary {
        /// Scored daily records (JSON array or NDJSON)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "7")]
        days: u32,

        /// Reference date (YYYY-MM-DD), defaults to today (UTC)
        #[arg(long)]
        today: Option<String>,
    },

    /// Roll up a period and the three periods before it
    Rollup {
        /// Scored daily records (JSON array or NDJSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Scored activity records
        #[arg(long)]
        activities: Option<PathBuf>,

        #[arg(long, value_enum)]
        granularity: GranularityArg,

        /// 0 = current period, negative = further past
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset: i32,

        #[arg(long)]
        today: Option<String>,
    },

    /// Half-window deltas and pace of aging
    Trend {
        /// Scored daily records (JSON array or NDJSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Window size in days
        #[arg(long, default_value = "14")]
        window: usize,
    },

    /// Print canonical period ranges
    Periods {
        #[arg(long, value_enum)]
        granularity: GranularityArg,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset: i32,

        /// Number of periods, starting with the one at `offset`
        #[arg(long, default_value = "4")]
        count: usize,

        #[arg(long)]
        today: Option<String>,
    },

    /// Diagnose version and configuration
    Doctor {
        /// Check a scoring configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Garmin Connect response bundle
    Garmin,
    /// Raw daily records (JSON array or NDJSON)
    Records,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    Day,
    Week,
    Month,
    Year,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Day => Granularity::Day,
            GranularityArg::Week => Granularity::Week,
            GranularityArg::Month => Granularity::Month,
            GranularityArg::Year => Granularity::Year,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays machine-readable
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vitals_engine={level},vitals={level}")));

    let stderr_layer = fmt::layer().with_target(true).with_writer(io::stderr);

    // A subscriber may already be installed when embedded; keep the existing one
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}

fn run(cli: Cli) -> Result<(), VitalsCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            format,
            activities,
            activities_output,
            user_id,
            age,
            birth_year,
            config,
            reports,
            output_format,
        } => cmd_score(ScoreArgs {
            input,
            output,
            format,
            activities,
            activities_output,
            user_id,
            age,
            birth_year,
            config,
            reports,
            output_format,
        }),

        Commands::Summary { input, days, today } => cmd_summary(&input, days, today.as_deref()),

        Commands::Rollup {
            input,
            activities,
            granularity,
            offset,
            today,
        } => cmd_rollup(
            &input,
            activities.as_deref(),
            granularity.into(),
            offset,
            today.as_deref(),
        ),

        Commands::Trend { input, window } => cmd_trend(&input, window),

        Commands::Periods {
            granularity,
            offset,
            count,
            today,
        } => cmd_periods(granularity.into(), offset, count, today.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

struct ScoreArgs {
    input: PathBuf,
    output: PathBuf,
    format: InputFormat,
    activities: Option<PathBuf>,
    activities_output: Option<PathBuf>,
    user_id: String,
    age: Option<f64>,
    birth_year: Option<i32>,
    config: Option<PathBuf>,
    reports: bool,
    output_format: OutputFormat,
}

fn cmd_score(args: ScoreArgs) -> Result<(), VitalsCliError> {
    let config = match &args.config {
        Some(path) => ScoringConfig::from_file(path)?,
        None => ScoringConfig::default(),
    };
    let engine = VitalsEngine::new(config)?;

    let raw = read_input(&args.input)?;
    let (days, mut activities): (Vec<DailyRecord>, Vec<ActivityRecord>) = match args.format {
        InputFormat::Garmin => GarminAdapter.parse(&raw, &args.user_id)?,
        InputFormat::Records => (parse_records(&raw)?, Vec::new()),
    };
    if let Some(path) = &args.activities {
        let extra: Vec<ActivityRecord> = parse_records(&fs::read_to_string(path)?)?;
        merge_activities(&mut activities, extra);
    }

    if days.is_empty() && activities.is_empty() {
        return Err(VitalsCliError::NoRecords);
    }

    let scored_days = match (args.age, args.birth_year) {
        (Some(age), _) => engine.score_days_at_age(&days, age),
        (None, birth_year) => score_by_user(&engine, &days, birth_year),
    };
    let scored_activities = engine.score_activities(&activities);
    info!(
        days = scored_days.len(),
        activities = scored_activities.len(),
        "scoring complete"
    );

    let encoder = ReportEncoder::new().with_min_factors(engine.config().bio_age.min_factors);
    let days_out = if args.reports {
        let reports: Vec<_> = scored_days.iter().map(|d| encoder.encode_daily(d)).collect();
        format_output(&reports, &args.output_format)?
    } else {
        format_output(&scored_days, &args.output_format)?
    };
    write_output(&args.output, &days_out)?;

    if let Some(path) = &args.activities_output {
        let activities_out = if args.reports {
            let reports: Vec<_> = scored_activities
                .iter()
                .map(|a| encoder.encode_activity(a))
                .collect();
            format_output(&reports, &args.output_format)?
        } else {
            format_output(&scored_activities, &args.output_format)?
        };
        write_output(path, &activities_out)?;
    } else if !scored_activities.is_empty() {
        debug!(
            count = scored_activities.len(),
            "scored activities discarded; pass --activities-output to keep them"
        );
    }

    Ok(())
}

fn cmd_summary(input: &Path, days: u32, today: Option<&str>) -> Result<(), VitalsCliError> {
    let records: Vec<DailyRecord> = parse_records(&read_input(input)?)?;
    let summary = VitalsEngine::default().summarize(&records, resolve_today(today)?, days)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_rollup(
    input: &Path,
    activities: Option<&Path>,
    granularity: Granularity,
    offset: i32,
    today: Option<&str>,
) -> Result<(), VitalsCliError> {
    let records: Vec<DailyRecord> = parse_records(&read_input(input)?)?;
    let activities: Vec<ActivityRecord> = match activities {
        Some(path) => parse_records(&fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let comparison = VitalsEngine::default().compare_periods(
        &records,
        &activities,
        granularity,
        offset,
        resolve_today(today)?,
    )?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}

fn cmd_trend(input: &Path, window: usize) -> Result<(), VitalsCliError> {
    let records: Vec<DailyRecord> = parse_records(&read_input(input)?)?;
    let report = VitalsEngine::default()
        .trend(&records, window)
        .ok_or(VitalsCliError::InsufficientData {
            window,
            available: records.len(),
        })?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_periods(
    granularity: Granularity,
    offset: i32,
    count: usize,
    today: Option<&str>,
) -> Result<(), VitalsCliError> {
    let today = resolve_today(today)?;
    let mut ranges = vec![period_range(granularity, offset, today)?];
    ranges.extend(preceding_periods(
        granularity,
        offset,
        today,
        count.saturating_sub(1),
    )?);
    println!("{}", serde_json::to_string_pretty(&ranges)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), VitalsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("vitals-engine version {}", ENGINE_VERSION),
    });

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("Config file {} does not exist", path.display()),
        }),
        Some(path) => match ScoringConfig::from_file(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (max_years {}, min_factors {}, default age {})",
                    config.bio_age.max_years, config.bio_age.min_factors, config.default_age_years
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Vitals Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(VitalsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

/// Add activities not already present, matched on `external_id`
fn merge_activities(activities: &mut Vec<ActivityRecord>, extra: Vec<ActivityRecord>) {
    let mut seen: HashSet<String> = activities.iter().map(|a| a.external_id.clone()).collect();
    let before = activities.len();
    for activity in extra {
        if seen.insert(activity.external_id.clone()) {
            activities.push(activity);
        }
    }
    activities.sort_by_key(|a| a.start_time);
    debug!(added = activities.len() - before, "merged activity records");
}

/// Score each user's days against a profile carrying the shared birth year.
///
/// Output is grouped by user id, each group in input order.
fn score_by_user(engine: &VitalsEngine, days: &[DailyRecord], birth_year: Option<i32>) -> Vec<DailyRecord> {
    let mut by_user: BTreeMap<&str, Vec<DailyRecord>> = BTreeMap::new();
    for record in days {
        by_user
            .entry(record.user_id.as_str())
            .or_default()
            .push(record.clone());
    }

    by_user
        .into_iter()
        .flat_map(|(user_id, records)| {
            engine.score_days(&records, &UserProfile::new(user_id, birth_year))
        })
        .collect()
}

fn read_input(path: &Path) -> Result<String, VitalsCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), VitalsCliError> {
    if path.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn resolve_today(raw: Option<&str>) -> Result<NaiveDate, VitalsCliError> {
    match raw {
        Some(raw) => Ok(parse_date(raw)?),
        None => Ok(Utc::now().date_naive()),
    }
}

fn format_output<T: Serialize>(items: &[T], format: &OutputFormat) -> Result<String, VitalsCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(items)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
    }
}

// Error types

#[derive(Debug)]
enum VitalsCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    InsufficientData { window: usize, available: usize },
    DoctorFailed,
}

impl From<io::Error> for VitalsCliError {
    fn from(e: io::Error) -> Self {
        VitalsCliError::Io(e)
    }
}

impl From<ComputeError> for VitalsCliError {
    fn from(e: ComputeError) -> Self {
        VitalsCliError::Compute(e)
    }
}

impl From<serde_json::Error> for VitalsCliError {
    fn from(e: serde_json::Error) -> Self {
        VitalsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<VitalsCliError> for CliError {
    fn from(e: VitalsCliError) -> Self {
        match e {
            VitalsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            VitalsCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidConfig(_) | ComputeError::ConfigError(_) => (
                        "CONFIG_ERROR",
                        "Run 'vitals doctor --config <file>' for details",
                    ),
                    ComputeError::DateParseError(_) | ComputeError::InvalidDate(_) => {
                        ("DATE_ERROR", "Dates use the YYYY-MM-DD format")
                    }
                    ComputeError::InvalidWindow(_) => ("WINDOW_ERROR", "Check granularity and offset"),
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input is a Garmin bundle or daily records as JSON/NDJSON",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            VitalsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            VitalsCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            VitalsCliError::InsufficientData { window, available } => CliError {
                code: "INSUFFICIENT_DATA".to_string(),
                message: format!("Trend needs {} days, input has {}", window, available),
                hint: Some("Use a smaller --window (at least 2)".to_string()),
            },
            VitalsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn activity(external_id: &str, start: &str) -> ActivityRecord {
        serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "external_id": external_id,
            "start_time": NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap(),
        }))
        .unwrap()
    }

    #[test]
    fn test_merge_activities_skips_known_ids() {
        let mut activities = vec![activity("a2", "2024-01-15 18:00:00")];
        let mut duplicate = activity("a2", "2024-01-15 18:00:00");
        duplicate.calories = Some(999.0);

        merge_activities(
            &mut activities,
            vec![activity("a1", "2024-01-15 07:00:00"), duplicate],
        );

        let ids: Vec<&str> = activities.iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        assert_eq!(activities[1].calories, None);
    }

    #[test]
    fn test_score_by_user_resolves_age_per_user() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut days = Vec::new();
        for user in ["u2", "u1", "u2"] {
            let mut r = DailyRecord::new(user, date);
            r.resting_heart_rate = Some(80.0);
            r.steps = Some(1_500);
            days.push(r);
        }

        let scored = score_by_user(&VitalsEngine::default(), &days, Some(1984));
        let users: Vec<&str> = scored.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2", "u2"]);
        for r in &scored {
            assert_eq!(r.derived.chronological_age, Some(40.0));
            assert_eq!(r.derived.biological_age, Some(48.0));
        }

        let unknown = score_by_user(&VitalsEngine::default(), &days[..1], None);
        assert_eq!(unknown[0].derived.chronological_age, Some(35.0));
    }
}
