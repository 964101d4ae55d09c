//! Human-readable error descriptions and structured JSON error formatting.

use pillbox_core::error::{BuildError, PillError};
use pillbox_scale::error::ScaleError;

/// Stable short name for the error kind, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(pe) = err.downcast_ref::<PillError>() {
        return match pe {
            PillError::InvalidCalibration(_) => "InvalidCalibration",
            PillError::NoCalibratedPill => "NoCalibratedPill",
            PillError::Schedule(_) => "Schedule",
            PillError::Inventory(_) => "Inventory",
            PillError::ConnectTimeout => "ConnectTimeout",
            PillError::State(_) => "State",
            PillError::Scale(_) => "Scale",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    if err.downcast_ref::<ScaleError>().is_some() {
        return "Scale";
    }
    if is_config_error(err) {
        return "Config";
    }
    "Error"
}

fn is_config_error(err: &eyre::Report) -> bool {
    err.downcast_ref::<toml::de::Error>().is_some()
        || err.chain().any(|c| c.to_string().contains("config"))
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPill => {
                "What happened: No pill was given for the new bottle.\nLikely causes: The pill was never calibrated.\nHow to fix: Weigh a single pill and pass its weight with --unit-weight.".to_string()
            }
            BuildError::MissingSchedule => {
                "What happened: No dose schedule was given for the new bottle.\nLikely causes: Dosage or frequency was not provided.\nHow to fix: Pass --dosage and --frequency.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: The bottle could not be assembled ({msg}).\nLikely causes: A required field was left unset.\nHow to fix: Check the new-bottle arguments and rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PillError>() {
        return match pe {
            PillError::InvalidCalibration(g) => format!(
                "What happened: A pill weight of {g} g cannot be used.\nLikely causes: The scale was empty or not tared when the pill was weighed.\nHow to fix: Tare the empty scale, place exactly one pill on it and use that reading (it must be above 0 g)."
            ),
            PillError::NoCalibratedPill => {
                "What happened: No calibrated pill is available to count with.\nLikely causes: Calibration was skipped.\nHow to fix: Weigh a single pill first and pass --unit-weight.".to_string()
            }
            PillError::ConnectTimeout => {
                "What happened: The scale never connected.\nLikely causes: The trace has no 'connected' row, or the scale is off or out of range.\nHow to fix: Check the trace or the bottle, or raise runner.connect_timeout_ms in the config.".to_string()
            }
            PillError::State(msg) if msg.contains("not stable") => format!(
                "What happened: The dose could not be recorded ({msg}).\nLikely causes: The scale disconnected before the reading settled, or the trace ended too early.\nHow to fix: Keep the bottle on the scale until the reading is stable, or lower stability.required_stable_samples."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return format!(
            "What happened: {se}.\nLikely causes: The simulated scale could not use a trace row or command.\nHow to fix: Check the trace file and rerun with --log-level=debug."
        );
    }

    // String-based heuristics for errors coming from files
    let msg = err.to_string();
    let full = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    let lower = full.to_ascii_lowercase();

    if lower.contains("weight trace csv must have headers") {
        return "Invalid headers in weight trace CSV. Expected 'ms,event,grams'.".to_string();
    }

    if lower.contains("weight trace") || lower.contains("invalid csv row") {
        return format!(
            "What happened: The weight trace could not be used ({full}).\nLikely causes: Rows out of time order, missing grams on a weight row, or an unknown event.\nHow to fix: Fix the CSV; events are weight|connected|disconnected with non-decreasing ms."
        );
    }

    if is_config_error(err) {
        return format!(
            "What happened: Configuration is invalid ({full}).\nLikely causes: A misspelled key, a wrong type, or an out-of-range value.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error kind; 2 stays with clap for usage errors.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(pe) = err.downcast_ref::<PillError>() {
        return match pe {
            PillError::ConnectTimeout => 3,
            PillError::State(_) => 4,
            PillError::InvalidCalibration(_) | PillError::NoCalibratedPill => 5,
            PillError::Schedule(_) | PillError::Inventory(_) => 6,
            PillError::Scale(_) => 8,
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return 6;
    }
    if err.downcast_ref::<ScaleError>().is_some() {
        return 8;
    }
    if is_config_error(err) {
        return 7;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
