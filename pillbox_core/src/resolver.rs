//! Weight delta to whole pill count.

use crate::error::PillError;

/// Reject unit weights that cannot divide a reading.
#[inline]
pub fn validate_unit(unit_g: f32) -> Result<f32, PillError> {
    if unit_g.is_finite() && unit_g > 0.0 {
        Ok(unit_g)
    } else {
        Err(PillError::InvalidCalibration(unit_g))
    }
}

/// Pills represented by `weight_g` given one pill weighs `unit_g`.
///
/// The sign of the weight is ignored (a removal reads negative after tare).
/// Rounds to nearest with ties away from zero. A non-finite weight counts as
/// no pills; counts beyond `u32::MAX` saturate.
pub fn pills_taken(weight_g: f32, unit_g: f32) -> Result<u32, PillError> {
    let unit = validate_unit(unit_g)?;
    if !weight_g.is_finite() {
        return Ok(0);
    }
    let pills = (f64::from(weight_g).abs() / f64::from(unit)).round();
    if pills >= f64::from(u32::MAX) {
        Ok(u32::MAX)
    } else if pills <= 0.0 {
        Ok(0)
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(pills as u32)
    }
}
