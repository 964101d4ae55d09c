//! Daily reminder requests handed to the notification scheduler.

use chrono::Timelike;
use serde::Serialize;
use uuid::Uuid;

use crate::model::PillBottle;
use crate::schedule::dose_clock_times;

pub const REMINDER_TITLE: &str = "Time to take your pill";

/// One repeating daily notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderRequest {
    /// `"{bottle_id}-{index}"`, stable across reschedules.
    pub id: String,
    pub bottle_id: Uuid,
    pub hour: u32,
    pub minute: u32,
    pub repeats: bool,
    pub title: String,
    pub body: String,
}

/// Requests for every dose slot of `bottle`, in slot order.
pub fn plan(bottle: &PillBottle) -> Vec<ReminderRequest> {
    dose_clock_times(&bottle.schedule)
        .into_iter()
        .enumerate()
        .map(|(i, t)| ReminderRequest {
            id: format!("{}-{i}", bottle.id),
            bottle_id: bottle.id,
            hour: t.hour(),
            minute: t.minute(),
            repeats: true,
            title: REMINDER_TITLE.to_string(),
            body: format!("Your dose of {} is due.", bottle.pill.name),
        })
        .collect()
}

/// Ids a scheduler should withdraw before installing a fresh plan.
pub fn ids_for(bottle: &PillBottle) -> Vec<String> {
    plan(bottle).into_iter().map(|r| r.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DoseSchedule, Frequency, Pill};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn twice_daily_plans_two_requests() {
        let at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let pill = Pill::new("Omeprazole", 0.4, at).unwrap();
        let s = DoseSchedule::new(1, Frequency::TwiceDaily, NaiveTime::MIN).unwrap();
        let b = PillBottle::new(pill, 30, s, at).unwrap();
        let reqs = plan(&b);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].id, format!("{}-0", b.id));
        assert_eq!((reqs[1].hour, reqs[1].minute), (17, 0));
        assert!(reqs.iter().all(|r| r.repeats));
        assert_eq!(reqs[0].body, "Your dose of Omeprazole is due.");
        assert_eq!(ids_for(&b).len(), 2);
    }
}
