// src/config/duration.rs

use std::time::Duration;

use crate::errors::{Result, SentinelleError};
use crate::types::GracePeriod;

/// Turn a [`GracePeriod`] into a [`Duration`].
///
/// - integers and all-digit strings are milliseconds (`"300000"`).
/// - otherwise `<number><unit>`, optionally separated by whitespace, where the
///   number may have a fractional part (`"1.5s"`, `"4 seconds"`, `"5m"`).
pub fn parse_time(value: &GracePeriod) -> Result<Duration> {
    match value {
        GracePeriod::Millis(ms) => Ok(Duration::from_millis(*ms)),
        GracePeriod::Text(s) => parse_duration(s).map_err(|e| {
            SentinelleError::Config(format!("invalid duration \"{s}\": {e}"))
        }),
    }
}

fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        let ms: u64 = s
            .parse()
            .map_err(|e| format!("invalid millisecond count: {e}"))?;
        return Ok(Duration::from_millis(ms));
    }

    // Find the boundary between the number and the unit suffix.
    let idx = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let (num_part, unit_part) = s.split_at(idx);
    if num_part.is_empty() {
        return Err("duration must start with a number".to_string());
    }

    let value: f64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let unit = unit_part.trim().to_lowercase();
    let millis_per_unit = match unit.as_str() {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "" => return Err("duration missing unit suffix".to_string()),
        other => {
            return Err(format!(
                "unsupported duration unit '{other}'; expected ms, s, m, h or d"
            ));
        }
    };

    Ok(Duration::from_millis((value * millis_per_unit).round() as u64))
}
