//! Certificate expiry countdown.

use super::colors::{Color, Palette};
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Whole days between `now` and `not_after`, both unix timestamps in seconds.
///
/// Rounds toward negative infinity, so a certificate that expired an hour ago
/// reports `-1`.
pub fn remaining_days(not_after: i64, now: i64) -> i64 {
    (not_after - now).div_euclid(SECONDS_PER_DAY)
}

/// Formats the remaining days, colored by urgency.
pub fn remaining_days_label(not_after: i64, now: i64, palette: &Palette) -> String {
    let days = remaining_days(not_after, now);
    let color = match days {
        d if d > 30 => Color::Green,
        d if d > 15 => Color::Yellow,
        _ => Color::Red,
    };
    palette.colorize(&format!("{} days remaining", days), color)
}

/// Current wall clock as a unix timestamp.
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
