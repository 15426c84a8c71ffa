//! Durations as manifests write them, such as `30s`, `1m30s`, `1.5h` or `500ms`.
//!
//! The accepted syntax is a sequence of decimal numbers, each with an optional fraction and a
//! unit suffix. Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is
//! also accepted. [`Duration`] derefs to [`std::time::Duration`], so all of its accessors
//! are available.
//!
//! Durations are printed in the same canonical form the CLI reads, so `90s` is written
//! back as `1m30s` and `2h` as `2h0m0s`.
use std::{fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use snafu::{OptionExt, Snafu, ensure};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Unit suffixes and the number of nanoseconds in each.
const UNITS: [(&str, u128); 8] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("h", 3600 * NANOS_PER_SEC),
];

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseDurationError {
    #[snafu(display("duration is empty"))]
    Empty,

    #[snafu(display("negative durations are not supported"))]
    Negative,

    #[snafu(display("{fragment:?} is not a number"))]
    InvalidNumber { fragment: String },

    #[snafu(display("missing unit after {value:?}"))]
    MissingUnit { value: String },

    #[snafu(display("unknown unit {unit:?}, expected one of ns, us, ms, s, m or h"))]
    UnknownUnit { unit: String },

    #[snafu(display("duration is too long"))]
    Overflow,
}

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(std::time::Duration);

impl Duration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(std::time::Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(std::time::Duration::from_millis(millis))
    }
}

impl FromStr for Duration {
    type Err = ParseDurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let mut rest = input.strip_prefix('+').unwrap_or(input);
        ensure!(!rest.starts_with('-'), NegativeSnafu);
        ensure!(!rest.is_empty(), EmptySnafu);
        if rest == "0" {
            return Ok(Self::default());
        }

        let mut nanos: u128 = 0;
        while !rest.is_empty() {
            let (number, tail) = rest.split_at(
                rest.find(|c: char| !c.is_ascii_digit() && c != '.')
                    .unwrap_or(rest.len()),
            );
            let (unit, tail) = tail.split_at(
                tail.find(|c: char| c.is_ascii_digit() || c == '.')
                    .unwrap_or(tail.len()),
            );
            ensure!(!unit.is_empty(), MissingUnitSnafu { value: number });
            let scale = UNITS
                .iter()
                .find(|(name, _)| *name == unit)
                .map(|(_, scale)| *scale)
                .context(UnknownUnitSnafu { unit })?;

            nanos = nanos
                .checked_add(fragment_nanos(number, scale)?)
                .context(OverflowSnafu)?;
            rest = tail;
        }

        let secs = u64::try_from(nanos / NANOS_PER_SEC)
            .ok()
            .context(OverflowSnafu)?;
        Ok(Self(std::time::Duration::new(
            secs,
            (nanos % NANOS_PER_SEC) as u32,
        )))
    }
}

/// Converts one `<number><unit>` fragment, such as `1.5` hours, to nanoseconds.
fn fragment_nanos(number: &str, scale: u128) -> Result<u128, ParseDurationError> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    ensure!(
        !(whole.is_empty() && fraction.is_empty()) && fraction.bytes().all(|b| b.is_ascii_digit()),
        InvalidNumberSnafu { fragment: number }
    );

    let whole = match whole {
        "" => 0,
        digits => digits.parse::<u128>().ok().context(OverflowSnafu)?,
    };
    let mut place = scale;
    let mut fraction_nanos = 0;
    for digit in fraction.bytes() {
        place /= 10;
        fraction_nanos += u128::from(digit - b'0') * place;
    }

    whole
        .checked_mul(scale)
        .and_then(|nanos| nanos.checked_add(fraction_nanos))
        .context(OverflowSnafu)
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.as_nanos();
        if nanos == 0 {
            return f.write_str("0s");
        }
        if nanos < NANOS_PER_SEC {
            let (scale, unit) = match nanos {
                ..1_000 => (1, "ns"),
                ..1_000_000 => (1_000, "µs"),
                _ => (1_000_000, "ms"),
            };
            write_decimal(f, nanos, scale)?;
            return f.write_str(unit);
        }

        let secs = self.0.as_secs();
        let (hours, minutes) = (secs / 3600, secs / 60 % 60);
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        let seconds = u128::from(secs % 60) * NANOS_PER_SEC + u128::from(self.0.subsec_nanos());
        write_decimal(f, seconds, NANOS_PER_SEC)?;
        f.write_str("s")
    }
}

/// Writes `value / scale` with as many fractional digits as needed.
fn write_decimal(f: &mut fmt::Formatter<'_>, value: u128, scale: u128) -> fmt::Result {
    write!(f, "{}", value / scale)?;
    let fraction = value % scale;
    if fraction > 0 {
        let width = scale.ilog10() as usize;
        let digits = format!("{fraction:0width$}");
        write!(f, ".{}", digits.trim_end_matches('0'))?;
    }
    Ok(())
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let input = String::deserialize(deserializer)?;
        input.parse().map_err(de::Error::custom)
    }
}

impl Serialize for Duration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
