#![forbid(unsafe_code)]

//! Clock formatting for elapsed time and eta fields.

/// Format a duration in seconds as `MM:SS`, adding `Hh` and `Dd` prefixes
/// only when they are nonzero.
///
/// Negative and non-finite inputs clamp to `00:00`.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };

    let minutes = total / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let clock = format!("{:02}:{:02}", minutes % 60, total % 60);
    if days > 0 {
        format!("{days}d {}h {clock}", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {clock}")
    } else {
        clock
    }
}
