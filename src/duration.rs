//! Duration strings in the OpenTSDB style (`30s`, `5m`, `1h`, `2d`, `1w`)

use std::fmt;
use std::str::FromStr;

use nom::{
    branch::alt, bytes::complete::tag, character::complete::digit1, combinator::value, IResult,
    Parser,
};

use crate::error::ValidationError;

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// A non-negative span of time parsed from a duration string
///
/// Supported units: `ms`, `s`, `m`, `h`, `d`, `w`, `n` (30 days) and
/// `y` (365 days).
///
/// # Example
///
/// ```rust
/// use graphite_band::duration::Duration;
///
/// let d = Duration::parse("2h").unwrap();
/// assert_eq!(d.as_chrono(), chrono::Duration::hours(2));
/// assert!(Duration::parse("2 hours").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration {
    millis: i64,
}

impl Duration {
    /// Zero-length duration
    pub const ZERO: Duration = Duration { millis: 0 };

    /// Parse a duration string
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidFormat {
            field: "duration".to_string(),
            message,
        };

        let (rest, (number, unit_millis)) = parse_duration(s).map_err(|_| {
            invalid(format!(
                "'{}' is not a number followed by one of ms, s, m, h, d, w, n, y",
                s
            ))
        })?;
        if !rest.is_empty() {
            return Err(invalid(format!("unexpected '{}' after duration in '{}'", rest, s)));
        }

        let millis = number
            .parse::<i64>()
            .ok()
            .and_then(|count| count.checked_mul(unit_millis))
            .ok_or_else(|| invalid(format!("'{}' is too large", s)))?;
        Ok(Self { millis })
    }

    /// Parse an optional offset, treating the empty string as zero
    pub fn parse_offset(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            Ok(Self::ZERO)
        } else {
            Self::parse(s)
        }
    }

    /// Build a duration from whole seconds
    pub fn from_secs(secs: i64) -> Self {
        Self {
            millis: secs.saturating_mul(MILLIS_PER_SECOND),
        }
    }

    /// Length in milliseconds
    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Convert for instant arithmetic
    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.millis)
    }
}

/// Digits followed by a unit, yielding the digits and the unit in milliseconds
fn parse_duration(input: &str) -> IResult<&str, (&str, i64)> {
    let (input, number) = digit1(input)?;
    let (input, unit_millis) = alt((
        value(1, tag("ms")),
        value(MILLIS_PER_SECOND, tag("s")),
        value(MILLIS_PER_MINUTE, tag("m")),
        value(MILLIS_PER_HOUR, tag("h")),
        value(MILLIS_PER_DAY, tag("d")),
        value(7 * MILLIS_PER_DAY, tag("w")),
        value(30 * MILLIS_PER_DAY, tag("n")),
        value(365 * MILLIS_PER_DAY, tag("y")),
    ))
    .parse(input)?;

    Ok((input, (number, unit_millis)))
}

impl FromStr for Duration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis % MILLIS_PER_SECOND != 0 {
            write!(f, "{}ms", self.millis)
        } else if self.millis % MILLIS_PER_DAY == 0 && self.millis != 0 {
            write!(f, "{}d", self.millis / MILLIS_PER_DAY)
        } else if self.millis % MILLIS_PER_HOUR == 0 && self.millis != 0 {
            write!(f, "{}h", self.millis / MILLIS_PER_HOUR)
        } else if self.millis % MILLIS_PER_MINUTE == 0 && self.millis != 0 {
            write!(f, "{}m", self.millis / MILLIS_PER_MINUTE)
        } else {
            write!(f, "{}s", self.millis / MILLIS_PER_SECOND)
        }
    }
}
