//! Builder for `PillBottle`.
//!
//! `PillBottle::new` covers the common calibration flow; the builder adds the
//! optional owner, safety lock and a fixed id for callers restoring or
//! importing bottles.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::{BuildError, Result};
use crate::model::{DoseSchedule, Pill, PillBottle};

#[derive(Debug, Default)]
pub struct BottleBuilder {
    id: Option<Uuid>,
    pill: Option<Pill>,
    schedule: Option<DoseSchedule>,
    initial_count: Option<u32>,
    owner: Option<Uuid>,
    safety_lock: bool,
    created_at: Option<NaiveDateTime>,
}

impl BottleBuilder {
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn pill(mut self, pill: Pill) -> Self {
        self.pill = Some(pill);
        self
    }

    pub fn schedule(mut self, schedule: DoseSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Pills in the bottle when tracking starts. Defaults to 1.
    pub fn initial_count(mut self, count: u32) -> Self {
        self.initial_count = Some(count);
        self
    }

    pub fn owner(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn safety_lock(mut self, enabled: bool) -> Self {
        self.safety_lock = enabled;
        self
    }

    pub fn created_at(mut self, at: NaiveDateTime) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Validate and assemble the bottle.
    pub fn try_build(self) -> Result<PillBottle> {
        let pill = self
            .pill
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPill))?;
        let schedule = self
            .schedule
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSchedule))?;
        let created_at = self.created_at.ok_or_else(|| {
            eyre::Report::new(BuildError::InvalidConfig("created_at must be set"))
        })?;
        let mut bottle =
            PillBottle::new(pill, self.initial_count.unwrap_or(1), schedule, created_at)?;
        if let Some(id) = self.id {
            bottle.id = id;
        }
        bottle.owner = self.owner;
        bottle.safety_lock_enabled = self.safety_lock;
        Ok(bottle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frequency;
    use chrono::{NaiveDate, NaiveTime};

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn missing_pill_is_reported() {
        let err = PillBottle::builder()
            .schedule(DoseSchedule::new(1, Frequency::OnceDaily, NaiveTime::MIN).unwrap())
            .created_at(at())
            .try_build()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingPill)
        ));
    }

    #[test]
    fn builder_sets_optional_fields() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        let b = PillBottle::builder()
            .id(id)
            .pill(Pill::new("Vitamin D", 0.25, at()).unwrap())
            .schedule(DoseSchedule::new(1, Frequency::OnceDaily, NaiveTime::MIN).unwrap())
            .initial_count(60)
            .owner(owner)
            .safety_lock(true)
            .created_at(at())
            .try_build()
            .unwrap();
        assert_eq!(b.id, id);
        assert_eq!(b.owner, Some(owner));
        assert!(b.safety_lock_enabled);
        assert_eq!(b.remaining_pill_count, 60);
    }
}
