//! Dose times for a calendar day and the next upcoming dose.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::PillError;
use crate::model::{DoseSchedule, Frequency, PillBottle};

const TWICE_DAILY: [(u32, u32); 2] = [(8, 0), (17, 0)];
const THREE_TIMES_DAILY: [(u32, u32); 3] = [(8, 0), (13, 0), (18, 0)];

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// Times of day a dose is due, ascending.
///
/// Once daily uses the hour and minute of `first_dose_time` (seconds are
/// dropped). Twice and three times daily use fixed slots.
pub fn dose_clock_times(schedule: &DoseSchedule) -> Vec<NaiveTime> {
    match schedule.frequency {
        Frequency::OnceDaily => {
            let t = schedule.first_dose_time;
            vec![hm(t.hour(), t.minute())]
        }
        Frequency::TwiceDaily => TWICE_DAILY.iter().map(|&(h, m)| hm(h, m)).collect(),
        Frequency::ThreeTimesDaily => THREE_TIMES_DAILY.iter().map(|&(h, m)| hm(h, m)).collect(),
    }
}

/// Every dose timestamp on `on`, ascending.
pub fn dose_times(schedule: &DoseSchedule, on: NaiveDate) -> Vec<NaiveDateTime> {
    dose_clock_times(schedule)
        .into_iter()
        .map(|t| on.and_time(t))
        .collect()
}

/// First dose strictly after `now`, looking at today and then tomorrow.
pub fn next_dose_after(schedule: &DoseSchedule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if let Some(t) = dose_times(schedule, now.date())
        .into_iter()
        .find(|t| *t > now)
    {
        return Some(t);
    }
    let tomorrow = now.date().checked_add_days(Days::new(1))?;
    dose_times(schedule, tomorrow).into_iter().next()
}

/// Partial update to a bottle's schedule settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleEdit {
    pub dosage_amount: Option<u32>,
    pub frequency: Option<Frequency>,
    pub first_dose_time: Option<NaiveTime>,
    pub safety_lock_enabled: Option<bool>,
}

impl ScheduleEdit {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply `edit` to the bottle. Nothing changes if the result would be invalid.
pub fn apply_edit(bottle: &mut PillBottle, edit: &ScheduleEdit) -> Result<(), PillError> {
    let mut next = bottle.schedule.clone();
    if let Some(d) = edit.dosage_amount {
        next.dosage_amount = d;
    }
    if let Some(f) = edit.frequency {
        next.frequency = f;
    }
    if let Some(t) = edit.first_dose_time {
        next.first_dose_time = t;
    }
    next.validate()?;

    bottle.schedule = next;
    if let Some(lock) = edit.safety_lock_enabled {
        bottle.safety_lock_enabled = lock;
    }
    tracing::info!(
        bottle = %bottle.id,
        dosage = bottle.schedule.dosage_amount,
        frequency = %bottle.schedule.frequency,
        safety_lock = bottle.safety_lock_enabled,
        "schedule updated"
    );
    Ok(())
}

impl PillBottle {
    pub fn dose_times(&self, on: NaiveDate) -> Vec<NaiveDateTime> {
        dose_times(&self.schedule, on)
    }

    pub fn next_dose_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        next_dose_after(&self.schedule, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn sched(frequency: Frequency, h: u32, m: u32) -> DoseSchedule {
        DoseSchedule {
            dosage_amount: 1,
            frequency,
            first_dose_time: NaiveTime::from_hms_opt(h, m, 42).unwrap(),
        }
    }

    #[test]
    fn three_times_daily_uses_fixed_slots() {
        let times = dose_times(&sched(Frequency::ThreeTimesDaily, 6, 0), day());
        let expect: Vec<_> = [(8, 0), (13, 0), (18, 0)]
            .iter()
            .map(|&(h, m)| day().and_hms_opt(h, m, 0).unwrap())
            .collect();
        assert_eq!(times, expect);
    }

    #[test]
    fn once_daily_drops_seconds() {
        let times = dose_times(&sched(Frequency::OnceDaily, 21, 15), day());
        assert_eq!(times, vec![day().and_hms_opt(21, 15, 0).unwrap()]);
    }

    #[rstest]
    #[case(Frequency::OnceDaily, (10, 0), (2, 9, 0))]
    #[case(Frequency::OnceDaily, (8, 59), (2, 9, 0))]
    #[case(Frequency::OnceDaily, (9, 0), (3, 9, 0))]
    #[case(Frequency::TwiceDaily, (12, 0), (2, 17, 0))]
    #[case(Frequency::TwiceDaily, (17, 0), (3, 8, 0))]
    #[case(Frequency::ThreeTimesDaily, (13, 30), (2, 18, 0))]
    #[case(Frequency::ThreeTimesDaily, (23, 59), (3, 8, 0))]
    fn next_dose_is_strictly_after_now(
        #[case] frequency: Frequency,
        #[case] now: (u32, u32),
        #[case] expect: (u32, u32, u32),
    ) {
        let s = sched(frequency, 9, 0);
        let now = day().and_hms_opt(now.0, now.1, 0).unwrap();
        let got = next_dose_after(&s, now).unwrap();
        let want = NaiveDate::from_ymd_opt(2025, 6, expect.0)
            .unwrap()
            .and_hms_opt(expect.1, expect.2, 0)
            .unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn next_dose_is_none_past_the_end_of_the_calendar() {
        let s = sched(Frequency::OnceDaily, 0, 0);
        let now = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(next_dose_after(&s, now), None);
    }
}
