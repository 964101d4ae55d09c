//! CLI argument definitions and shared statics.

use chrono::{NaiveDateTime, NaiveTime};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pillbox_core::{AnalyticsRange, Frequency};
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pillbox", version, about = "Smart pill bottle CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON and log as JSON lines
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        global = true
    )]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FrequencyArg {
    Once,
    Twice,
    Three,
}

impl From<FrequencyArg> for Frequency {
    fn from(f: FrequencyArg) -> Self {
        match f {
            FrequencyArg::Once => Self::OnceDaily,
            FrequencyArg::Twice => Self::TwiceDaily,
            FrequencyArg::Three => Self::ThreeTimesDaily,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RangeArg {
    Week,
    Month,
    Year,
}

impl From<RangeArg> for AnalyticsRange {
    fn from(r: RangeArg) -> Self {
        match r {
            RangeArg::Week => Self::Week,
            RangeArg::Month => Self::Month,
            RangeArg::Year => Self::Year,
        }
    }
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS]` or the same with a space separator.
pub fn parse_local_datetime(s: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("expected local time as YYYY-MM-DDTHH:MM[:SS], got '{s}'"))
}

pub fn parse_clock_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("expected a time of day as HH:MM, got '{s}'"))
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new bottle for a calibrated pill
    NewBottle {
        /// State file holding the bottles (created if missing)
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        /// Medication name
        #[arg(long)]
        name: String,
        /// Weight of one pill in grams
        #[arg(long, value_name = "GRAMS")]
        unit_weight: f32,
        /// Pills in the bottle
        #[arg(long, value_name = "N", required_unless_present = "total_weight")]
        count: Option<u32>,
        /// Derive the pill count from the filled bottle's net weight
        #[arg(long, value_name = "GRAMS", conflicts_with = "count")]
        total_weight: Option<f32>,
        /// Pills per dose
        #[arg(long, value_name = "N")]
        dosage: u32,
        #[arg(long, value_enum)]
        frequency: FrequencyArg,
        /// Time of the first daily dose (once-daily schedules)
        #[arg(long, value_name = "HH:MM", value_parser = parse_clock_time, default_value = "08:00")]
        first_dose: NaiveTime,
        #[arg(long, value_name = "UUID")]
        owner: Option<Uuid>,
        #[arg(long, action = ArgAction::SetTrue)]
        safety_lock: bool,
        /// Local time to record as now
        #[arg(long, value_name = "TIME", value_parser = parse_local_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Count pills from a total weight
    Count {
        #[arg(long, value_name = "GRAMS")]
        unit_weight: f32,
        #[arg(long, value_name = "GRAMS")]
        total_weight: f32,
    },
    /// Show today's dose times, the next dose and the reminder plan
    Schedule {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        /// Bottle id; optional when the state file holds one bottle
        #[arg(long, value_name = "UUID")]
        bottle: Option<Uuid>,
        #[arg(long, value_name = "TIME", value_parser = parse_local_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Replay a weight trace through the scale session and record the dose
    Dose {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long, value_name = "UUID")]
        bottle: Option<Uuid>,
        /// Weight trace CSV (ms,event,grams)
        #[arg(long, value_name = "CSV")]
        trace: PathBuf,
        #[arg(long, value_name = "TIME", value_parser = parse_local_datetime)]
        at: Option<NaiveDateTime>,
        /// Play the trace in real time through the background event pump
        #[arg(long, action = ArgAction::SetTrue)]
        live: bool,
    },
    /// Roll every bottle's adherence windows forward to a day
    Rollover {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long, value_name = "TIME", value_parser = parse_local_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Change a bottle's schedule or correct its pill count
    Edit {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long, value_name = "UUID")]
        bottle: Option<Uuid>,
        #[arg(long, value_name = "N")]
        dosage: Option<u32>,
        #[arg(long, value_enum)]
        frequency: Option<FrequencyArg>,
        #[arg(long, value_name = "HH:MM", value_parser = parse_clock_time)]
        first_dose: Option<NaiveTime>,
        #[arg(long, value_name = "BOOL")]
        safety_lock: Option<bool>,
        /// Corrected number of pills left
        #[arg(long, value_name = "N")]
        remaining: Option<u32>,
    },
    /// Adherence totals across bottles
    Report {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long, value_enum, default_value = "week")]
        range: RangeArg,
        /// Only count bottles belonging to this owner
        #[arg(long, value_name = "UUID")]
        owner: Option<Uuid>,
        #[arg(long, value_name = "TIME", value_parser = parse_local_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Check the config and run a built-in trace through the detector
    SelfCheck,
}
