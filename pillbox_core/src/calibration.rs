//! Single-pill calibration and whole-bottle counting.
//!
//! The user puts one pill on the tared scale; its weight becomes the unit
//! weight. Later a filled bottle's weight is divided by that unit weight to
//! offer an initial count.

use chrono::NaiveDateTime;

use crate::error::PillError;
use crate::model::Pill;
use crate::resolver::pills_taken;

/// Tracks the most recent reading while a pill sits on the scale.
#[derive(Debug, Default, Clone)]
pub struct PillCalibrator {
    latest_g: Option<f32>,
}

impl PillCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, grams: f32) {
        if grams.is_finite() {
            self.latest_g = Some(grams);
        }
    }

    pub fn latest(&self) -> Option<f32> {
        self.latest_g
    }

    /// Capture the latest reading as the unit weight of pill `name`.
    pub fn capture(&self, name: &str, at: NaiveDateTime) -> Result<Pill, PillError> {
        let grams = self.latest_g.ok_or(PillError::InvalidCalibration(0.0))?;
        let pill = Pill::new(name, grams, at)?;
        tracing::info!(pill = %pill.name, unit_weight_g = grams, "pill calibrated");
        Ok(pill)
    }
}

/// Counts pills in a filled bottle against a calibrated pill.
#[derive(Debug, Clone)]
pub struct BottleCounter {
    pill: Option<Pill>,
}

impl BottleCounter {
    pub fn new(pill: Option<Pill>) -> Self {
        Self { pill }
    }

    pub fn count(&self, total_weight_g: f32) -> Result<u32, PillError> {
        let pill = self.pill.as_ref().ok_or(PillError::NoCalibratedPill)?;
        pills_taken(total_weight_g, pill.unit_weight_g)
    }

    /// Count offered as the bottle's initial count; never below one.
    pub fn initial_count(&self, total_weight_g: f32) -> Result<u32, PillError> {
        Ok(self.count(total_weight_g)?.max(1))
    }
}
