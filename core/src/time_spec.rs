//! Time specifications for `newer_than(...)` / `older_than(...)`
//!
//! A [`TimeSpec`] is parsed once at rule-compile time and resolved against the
//! run's captured current time ([`EvalContext::now`](crate::EvalContext)) at
//! evaluation time, so every comparison in one selection run uses the same
//! instant.
//!
//! Accepted forms:
//!
//! | Form | Example | Resolves to |
//! |------|---------|-------------|
//! | keyword | `now`, `today`, `yesterday`, `tomorrow` | now / UTC midnight ± 1 day |
//! | relative | `-7d`, `+12h`, `-1h30m` | `now + duration` (sign required) |
//! | absolute | `2024-05-01T00:00:00Z`, `2024-05-01`, `1714521600` | that instant |

use crate::ConfigError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// Naive timestamp layouts accepted after RFC 3339 fails. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A point in time, possibly relative to the evaluation's current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// The evaluation's current time.
    Now,
    /// Midnight UTC of the current day, shifted by `offset_days`.
    Midnight {
        /// Day offset from today (`-1` = yesterday, `1` = tomorrow).
        offset_days: i64,
    },
    /// `now + offset` (negative offsets are in the past).
    Relative(Duration),
    /// A fixed instant.
    Absolute(DateTime<Utc>),
}

impl TimeSpec {
    /// Parse a time specification from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimeSpec`] if the text is not a keyword,
    /// a signed duration or a recognizable timestamp.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let s = spec.trim();
        let invalid = |reason: String| ConfigError::InvalidTimeSpec {
            spec: spec.to_owned(),
            reason,
        };
        match s {
            "now" => return Ok(Self::Now),
            "today" => return Ok(Self::Midnight { offset_days: 0 }),
            "yesterday" => return Ok(Self::Midnight { offset_days: -1 }),
            "tomorrow" => return Ok(Self::Midnight { offset_days: 1 }),
            "" => return Err(invalid("empty time specification".into())),
            _ => {}
        }

        if let Some((negative, rest)) = s
            .strip_prefix('-')
            .map(|r| (true, r))
            .or_else(|| s.strip_prefix('+').map(|r| (false, r)))
        {
            // "-1714521600" would be a (silly) negative epoch; durations need a unit.
            if !rest.chars().all(|c| c.is_ascii_digit()) {
                let std = humantime::parse_duration(rest.trim())
                    .map_err(|e| invalid(format!("invalid duration: {e}")))?;
                let offset = Duration::from_std(std)
                    .map_err(|e| invalid(format!("duration out of range: {e}")))?;
                let offset = if negative { -offset } else { offset };
                if Utc::now().checked_add_signed(offset).is_none() {
                    return Err(invalid("duration out of range of representable time".into()));
                }
                return Ok(Self::Relative(offset));
            }
        }

        parse_timestamp(s).map(Self::Absolute).ok_or_else(|| {
            invalid(
                "expected a timestamp, a signed duration or now/today/yesterday/tomorrow".into(),
            )
        })
    }

    /// Resolve to a concrete instant against the captured current time.
    ///
    /// Saturates at the representable range instead of overflowing.
    #[must_use]
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Self::Now => now,
            Self::Midnight { offset_days } => {
                let midnight = now
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .map_or(now, |naive| Utc.from_utc_datetime(&naive));
                Duration::try_days(offset_days)
                    .and_then(|offset| midnight.checked_add_signed(offset))
                    .unwrap_or_else(|| saturated(offset_days < 0))
            }
            Self::Relative(offset) => now
                .checked_add_signed(offset)
                .unwrap_or_else(|| saturated(offset < Duration::zero())),
            Self::Absolute(ts) => ts,
        }
    }
}

fn saturated(past: bool) -> DateTime<Utc> {
    if past {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => f.write_str("now"),
            Self::Midnight { offset_days: 0 } => f.write_str("today"),
            Self::Midnight { offset_days: -1 } => f.write_str("yesterday"),
            Self::Midnight { offset_days: 1 } => f.write_str("tomorrow"),
            Self::Midnight { offset_days } => write!(f, "today{offset_days:+}d"),
            Self::Relative(d) => write!(f, "{:+}s", d.num_seconds()),
            Self::Absolute(ts) => f.write_str(&ts.to_rfc3339()),
        }
    }
}

/// Parse a timestamp string: RFC 3339, naive ISO-8601 (UTC), a bare date, or epoch seconds.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    // Some catalogs emit "2024-05-01 12:00:00+00:00"
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(secs) = s.parse::<f64>() {
        return epoch_float(secs);
    }
    None
}

/// Converts fractional epoch seconds to a timestamp.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // bounded by the finite/range check
pub fn epoch_float(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs.abs() > 1.0e13 {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1.0e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}
