//! Pill and bottle entities.
//!
//! The core mutates these in memory; committing them is the caller's job.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PillError;

/// A calibrated medication type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pill {
    pub name: String,
    /// Weight of a single pill in grams. Always positive and finite.
    pub unit_weight_g: f32,
    pub calibrated_at: NaiveDateTime,
}

impl Pill {
    pub fn new(
        name: impl Into<String>,
        unit_weight_g: f32,
        calibrated_at: NaiveDateTime,
    ) -> Result<Self, PillError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(PillError::State("pill name must not be empty".into()));
        }
        crate::resolver::validate_unit(unit_weight_g)?;
        Ok(Self {
            name,
            unit_weight_g,
            calibrated_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OnceDaily,
    TwiceDaily,
    ThreeTimesDaily,
}

impl Frequency {
    pub const fn doses_per_day(self) -> u32 {
        match self {
            Self::OnceDaily => 1,
            Self::TwiceDaily => 2,
            Self::ThreeTimesDaily => 3,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OnceDaily => "once daily",
            Self::TwiceDaily => "twice daily",
            Self::ThreeTimesDaily => "three times daily",
        })
    }
}

/// How much to take and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseSchedule {
    /// Pills per dose, at least 1.
    pub dosage_amount: u32,
    pub frequency: Frequency,
    /// Only consulted for `Frequency::OnceDaily`.
    pub first_dose_time: NaiveTime,
}

impl DoseSchedule {
    pub fn new(
        dosage_amount: u32,
        frequency: Frequency,
        first_dose_time: NaiveTime,
    ) -> Result<Self, PillError> {
        let s = Self {
            dosage_amount,
            frequency,
            first_dose_time,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), PillError> {
        if self.dosage_amount == 0 {
            return Err(PillError::Schedule("dosage amount must be at least 1".into()));
        }
        Ok(())
    }
}

/// Daily tally plus the rolling daily/weekly/monthly windows.
///
/// Windows are oldest first. `daily_week_bucket` and `weekly_month_bucket`
/// accumulate until they close (7 days, 4 weeks) and are then summed into the
/// next larger window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adherence {
    pub pills_taken_today: u32,
    /// Calendar day `pills_taken_today` belongs to.
    pub tracking_date: NaiveDate,
    pub daily_last7: Vec<u32>,
    pub daily_week_bucket: Vec<u32>,
    pub weekly_last4: Vec<u32>,
    pub weekly_month_bucket: Vec<u32>,
    pub monthly_last12: Vec<u32>,
}

impl Adherence {
    pub fn starting(day: NaiveDate) -> Self {
        Self {
            pills_taken_today: 0,
            tracking_date: day,
            daily_last7: Vec::new(),
            daily_week_bucket: Vec::new(),
            weekly_last4: Vec::new(),
            weekly_month_bucket: Vec::new(),
            monthly_last12: Vec::new(),
        }
    }
}

/// One tracked medication-taking schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillBottle {
    pub id: Uuid,
    pub pill: Pill,
    #[serde(default)]
    pub owner: Option<Uuid>,
    pub initial_pill_count: u32,
    pub remaining_pill_count: u32,
    pub schedule: DoseSchedule,
    pub last_taken_at: Option<NaiveDateTime>,
    pub adherence: Adherence,
    pub safety_lock_enabled: bool,
    pub created_at: NaiveDateTime,
}

impl PillBottle {
    /// Start tracking a freshly calibrated bottle on `now`'s day.
    pub fn new(
        pill: Pill,
        initial_pill_count: u32,
        schedule: DoseSchedule,
        now: NaiveDateTime,
    ) -> Result<Self, PillError> {
        crate::resolver::validate_unit(pill.unit_weight_g)?;
        schedule.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            pill,
            owner: None,
            initial_pill_count,
            remaining_pill_count: initial_pill_count,
            schedule,
            last_taken_at: None,
            adherence: Adherence::starting(now.date()),
            safety_lock_enabled: false,
            created_at: now,
        })
    }

    /// Re-check what `new` guarantees, for bottles read back from storage.
    pub fn validate(&self) -> Result<(), PillError> {
        if self.pill.name.trim().is_empty() {
            return Err(PillError::State("pill name must not be empty".into()));
        }
        crate::resolver::validate_unit(self.pill.unit_weight_g)?;
        self.schedule.validate()?;
        if self.remaining_pill_count > self.initial_pill_count {
            return Err(PillError::Inventory(format!(
                "remaining count {} exceeds the initial count {}",
                self.remaining_pill_count, self.initial_pill_count
            )));
        }
        Ok(())
    }

    pub fn builder() -> crate::builder::BottleBuilder {
        crate::builder::BottleBuilder::default()
    }
}
