use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PillError {
    #[error("invalid calibration: unit weight must be a positive number of grams (got {0})")]
    InvalidCalibration(f32),
    #[error("no calibrated pill: capture a single pill's weight first")]
    NoCalibratedPill,
    #[error("invalid schedule: {0}")]
    Schedule(String),
    #[error("invalid inventory: {0}")]
    Inventory(String),
    #[error("timeout waiting for the scale to connect")]
    ConnectTimeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("scale error: {0}")]
    Scale(String),
}

/// Recoverable shortcut the stability detector took on its way to Ready.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    #[error("reading did not settle before the stabilization timeout")]
    SensorTimeout,
    #[error("tare did not take effect after the maximum number of retries")]
    TareExhausted,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pill")]
    MissingPill,
    #[error("missing schedule")]
    MissingSchedule,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
