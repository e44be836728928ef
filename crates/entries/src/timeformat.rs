//! ISO-8601 timestamp printing and parsing.
//!
//! The entry table stores instants as `YYYY-MM-DDTHH:MM:SS.ffffffZ`
//! (microsecond precision, always UTC). Conversions go through
//! [`filetime::FileTime`] so callers can move directly between entry
//! fields and file mtimes.

use filetime::FileTime;

const SECS_PER_DAY: i64 = 86_400;

/// Formats `time` as an ISO-8601 UTC instant with microsecond precision.
#[must_use]
pub fn to_iso8601(time: FileTime) -> String {
    let secs = time.unix_seconds();
    let micros = time.nanoseconds() / 1_000;
    let days = secs.div_euclid(SECS_PER_DAY);
    let rem = secs.rem_euclid(SECS_PER_DAY);
    let (year, month, day) = civil_from_days(days);
    let hour = rem / 3_600;
    let minute = (rem % 3_600) / 60;
    let second = rem % 60;
    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micros:06}Z"
    )
}

/// Parses an ISO-8601 UTC instant produced by [`to_iso8601`].
///
/// The fractional part is optional and truncated to microseconds.
#[must_use]
pub fn from_iso8601(text: &str) -> Option<FileTime> {
    let text = text.strip_suffix('Z')?;
    let (date, time) = text.split_once('T')?;

    let mut date_parts = date.splitn(3, '-');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: u32 = date_parts.next()?.parse().ok()?;
    let day: u32 = date_parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let (hms, frac) = match time.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (time, None),
    };
    let mut time_parts = hms.splitn(3, ':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let minute: i64 = time_parts.next()?.parse().ok()?;
    let second: i64 = time_parts.next()?.parse().ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    let nanos = match frac {
        Some(frac) if !frac.is_empty() => {
            let digits: String = frac.chars().take(9).collect();
            if !digits.chars().all(|ch| ch.is_ascii_digit()) {
                return None;
            }
            let value: u64 = digits.parse().ok()?;
            (value * 10u64.pow(9 - digits.len() as u32)) as u32
        }
        _ => 0,
    };

    let secs = days_from_civil(year, month, day) * SECS_PER_DAY
        + hour * 3_600
        + minute * 60
        + second;
    Some(FileTime::from_unix_time(secs, nanos))
}

// Civil-date conversions after Howard Hinnant's algorithms; exact over the
// full i64 day range we care about.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let yoe = year - era * 400;
    let mp = i64::from(if month > 2 { month - 3 } else { month + 9 });
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
