use crate::constants::BASE_UNIT_SEC;

/// Convert a key hold time into a whole number of base units.
///
/// `max(1, round(hold_ms / 1000 / base_unit_sec))`. Negative or non-finite
/// holds count as zero, so every recorded note lasts at least one unit.
#[inline]
pub fn quantize_hold(hold_ms: f64, base_unit_sec: f64) -> u32 {
    let hold_sec = if hold_ms.is_finite() { hold_ms.max(0.0) / 1000.0 } else { 0.0 };
    let unit = if base_unit_sec > 0.0 { base_unit_sec } else { BASE_UNIT_SEC };
    let units = (hold_sec / unit).round();
    if units >= u32::MAX as f64 {
        u32::MAX
    } else {
        (units as u32).max(1)
    }
}

/// Same as [`quantize_hold`] with the default sixteenth-note unit.
#[inline]
pub fn quantize_hold_default(hold_ms: f64) -> u32 {
    quantize_hold(hold_ms, BASE_UNIT_SEC)
}

/// Seconds spanned by `units` base units.
#[inline]
pub fn units_to_sec(units: u32, base_unit_sec: f64) -> f64 {
    units as f64 * base_unit_sec
}
