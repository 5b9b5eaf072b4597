//! Human readable durations for the "Time Remaining" line.

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Renders a duration given in seconds, using the largest applicable unit and
/// every finer unit down to seconds. The seconds component is truncated.
///
/// Negative and non-finite inputs are treated as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };

    let days = total / DAY;
    let hours = (total % DAY) / HOUR;
    let minutes = (total % HOUR) / MINUTE;
    let secs = total % MINUTE;

    if total < MINUTE {
        format!("{secs} seconds")
    } else if total < HOUR {
        format!("{minutes} minutes and {secs} seconds")
    } else if total < DAY {
        format!("{hours} hours, {minutes} minutes, and {secs} seconds")
    } else {
        format!("{days} days, {hours} hours, {minutes} minutes, and {secs} seconds")
    }
}
