#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core pill bottle logic (transport-agnostic).
//!
//! All scale interaction goes through `pillbox_traits::ScaleLink` and
//! `pillbox_traits::SensorSource`; all time comes from an injected
//! `pillbox_traits::Clock` or from event timestamps.
//!
//! ## Architecture
//!
//! - **Detector**: pure tare/stabilization state machine (`stability`) with
//!   cancellable delayed checks (`timer`)
//! - **Resolver**: weight delta → whole pills (`resolver`)
//! - **Rollup**: daily → weekly → monthly adherence windows (`rollup`)
//! - **Inventory**: applying a confirmed dose to a bottle (`inventory`)
//! - **Schedule**: dose times, next dose, schedule edits (`schedule`)
//! - **Session**: detector + timers + tare link + event channel (`session`),
//!   driven by `runner::replay` or `runner::run_live` over an `EventPump`
//!
//! Wall-clock values are local `NaiveDateTime`s; calendar days are compared
//! as `NaiveDate`s so daylight-saving shifts never skip or repeat a day.

pub mod analytics;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod inventory;
pub mod model;
pub mod pump;
pub mod reminders;
pub mod resolver;
pub mod rollup;
pub mod runner;
pub mod schedule;
pub mod session;
pub mod stability;
pub mod status;
pub mod timer;
pub mod util;

pub use analytics::{AnalyticsRange, AnalyticsSummary, summarize};
pub use calibration::{BottleCounter, PillCalibrator};
pub use config::{InventoryCfg, RunnerCfg, StabilityCfg};
pub use error::{BuildError, Degradation, PillError};
pub use inventory::{DoseRecord, apply_dose, correct_remaining};
pub use model::{Adherence, DoseSchedule, Frequency, Pill, PillBottle};
pub use reminders::ReminderRequest;
pub use resolver::pills_taken;
pub use rollup::{Rollover, advance};
pub use runner::{RunSummary, StopReason};
pub use schedule::{ScheduleEdit, apply_edit, dose_times, next_dose_after};
pub use session::{DoseSession, SessionEvent};
pub use stability::{Phase, Signal};
pub use status::TimeOfDay;
pub use timer::CancelToken;
