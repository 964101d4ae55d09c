//! Derived, read-only bottle status.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;

use crate::config::InventoryCfg;
use crate::model::{Frequency, PillBottle};

/// Part of the day a dose falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// 05–12 morning, 12–17 afternoon, 17–21 evening, otherwise night.
    pub fn of(t: NaiveTime) -> Self {
        match t.hour() {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        })
    }
}

impl PillBottle {
    pub fn doses_per_day(&self) -> u32 {
        self.schedule.frequency.doses_per_day()
    }

    pub fn total_daily_pills(&self) -> u32 {
        self.schedule
            .dosage_amount
            .saturating_mul(self.doses_per_day())
    }

    /// Whether the last recorded dose falls on `day`.
    pub fn has_taken_on(&self, day: NaiveDate) -> bool {
        self.last_taken_at.is_some_and(|t| t.date() == day)
    }

    pub fn is_low_stock(&self, cfg: &InventoryCfg) -> bool {
        let threshold = self
            .schedule
            .dosage_amount
            .saturating_mul(cfg.low_stock_doses)
            .max(cfg.low_stock_min_pills);
        self.remaining_pill_count <= threshold
    }

    pub fn time_of_day_badges(&self) -> Vec<TimeOfDay> {
        match self.schedule.frequency {
            Frequency::OnceDaily => vec![TimeOfDay::of(self.schedule.first_dose_time)],
            Frequency::TwiceDaily => vec![TimeOfDay::Morning, TimeOfDay::Evening],
            Frequency::ThreeTimesDaily => {
                vec![TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening]
            }
        }
    }
}
