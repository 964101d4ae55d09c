//! Applying confirmed doses and corrective edits to a bottle.

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PillError;
use crate::model::PillBottle;
use crate::resolver::{pills_taken, validate_unit};
use crate::rollup::{self, Rollover};

/// Outcome of one confirmed dose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseRecord {
    pub bottle_id: Uuid,
    pub weight_delta_g: f32,
    pub pills: u32,
    pub remaining: u32,
    pub taken_today: u32,
    pub taken_at: NaiveDateTime,
    #[serde(skip)]
    pub rollover: Rollover,
}

/// Record a dose of `weight_delta_g` grams taken at `now`.
///
/// Rolls the adherence windows forward to `now` first so the pills land on
/// the right day. An invalid calibration leaves the bottle untouched.
pub fn apply_dose(
    bottle: &mut PillBottle,
    weight_delta_g: f32,
    now: NaiveDateTime,
) -> Result<DoseRecord, PillError> {
    validate_unit(bottle.pill.unit_weight_g)?;

    let rollover = rollup::advance(&mut bottle.adherence, now.date());
    let pills = pills_taken(weight_delta_g, bottle.pill.unit_weight_g)?;

    let a = &mut bottle.adherence;
    a.pills_taken_today = a.pills_taken_today.saturating_add(pills);
    bottle.remaining_pill_count = bottle.remaining_pill_count.saturating_sub(pills);
    bottle.last_taken_at = Some(now);

    tracing::info!(
        bottle = %bottle.id,
        pill = %bottle.pill.name,
        weight_delta_g,
        pills,
        remaining = bottle.remaining_pill_count,
        "dose recorded"
    );
    if pills == 0 {
        tracing::warn!(
            bottle = %bottle.id,
            weight_delta_g,
            unit_weight_g = bottle.pill.unit_weight_g,
            "weight change is less than half a pill; nothing counted"
        );
    }

    Ok(DoseRecord {
        bottle_id: bottle.id,
        weight_delta_g,
        pills,
        remaining: bottle.remaining_pill_count,
        taken_today: bottle.adherence.pills_taken_today,
        taken_at: now,
        rollover,
    })
}

/// Overwrite the remaining count after a manual recount.
pub fn correct_remaining(bottle: &mut PillBottle, count: u32) -> Result<(), PillError> {
    if count > bottle.initial_pill_count {
        return Err(PillError::Inventory(format!(
            "remaining count {count} exceeds the initial count {}",
            bottle.initial_pill_count
        )));
    }
    tracing::info!(
        bottle = %bottle.id,
        from = bottle.remaining_pill_count,
        to = count,
        "remaining count corrected"
    );
    bottle.remaining_pill_count = count;
    Ok(())
}

impl PillBottle {
    pub fn apply_dose(
        &mut self,
        weight_delta_g: f32,
        now: NaiveDateTime,
    ) -> Result<DoseRecord, PillError> {
        apply_dose(self, weight_delta_g, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DoseSchedule, Frequency, Pill};
    use chrono::{NaiveDate, NaiveTime};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn bottle(count: u32) -> PillBottle {
        let pill = Pill::new("Metformin", 0.5, at(1, 8)).unwrap();
        let s = DoseSchedule::new(2, Frequency::TwiceDaily, NaiveTime::MIN).unwrap();
        PillBottle::new(pill, count, s, at(1, 8)).unwrap()
    }

    #[test]
    fn dose_decrements_and_tallies() {
        let mut b = bottle(30);
        let rec = apply_dose(&mut b, -0.98, at(1, 9)).unwrap();
        assert_eq!(rec.pills, 2);
        assert_eq!(b.remaining_pill_count, 28);
        assert_eq!(b.adherence.pills_taken_today, 2);
        assert_eq!(b.last_taken_at, Some(at(1, 9)));
    }

    #[test]
    fn remaining_never_underflows() {
        let mut b = bottle(1);
        apply_dose(&mut b, 2.0, at(1, 9)).unwrap();
        assert_eq!(b.remaining_pill_count, 0);
        assert_eq!(b.adherence.pills_taken_today, 4);
    }

    #[test]
    fn dose_on_a_later_day_rolls_over_first() {
        let mut b = bottle(30);
        apply_dose(&mut b, 1.0, at(1, 9)).unwrap();
        let rec = apply_dose(&mut b, 0.5, at(2, 9)).unwrap();
        assert_eq!(rec.rollover.days_passed, 1);
        assert_eq!(b.adherence.daily_last7, vec![2]);
        assert_eq!(b.adherence.pills_taken_today, 1);
    }

    #[test]
    fn invalid_calibration_mutates_nothing() {
        let mut b = bottle(30);
        b.pill.unit_weight_g = 0.0;
        let before = b.clone();
        let err = apply_dose(&mut b, 1.0, at(3, 9)).unwrap_err();
        assert!(matches!(err, PillError::InvalidCalibration(_)));
        assert_eq!(b, before);
    }

    #[test]
    fn correction_is_bounded_by_initial_count() {
        let mut b = bottle(30);
        correct_remaining(&mut b, 12).unwrap();
        assert_eq!(b.remaining_pill_count, 12);
        assert!(correct_remaining(&mut b, 31).is_err());
        assert_eq!(b.remaining_pill_count, 12);
    }
}
