//! Semantic checks that run on a fully resolved manifest.
//!
//! Every configuration type implements [`Validate`]. A parent checks its children in a fixed
//! order, stops at the first problem and wraps it with the name of the offending field, so the
//! final message reads like a path:
//!
//! ```text
//! validate "storage": validate "volumes[foo]": "path" must be specified
//! ```
//!
//! Validation never modifies the manifest and is meant to run after environment overrides have
//! been applied, so that overrides are checked in their final form.

use std::{
    collections::BTreeMap,
    fmt::Display,
    net::IpAddr,
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;
use snafu::{ResultExt, Snafu};
use strum::IntoEnumIterator;

use crate::time::Duration;

const ARN_FMT: &str = "arn:[a-z0-9-]+:[a-z0-9-]+:[a-z0-9-]*:[0-9]*:.+";

static ARN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{ARN_FMT}$")).expect("failed to compile ARN regex"));

type Result<T = (), E = ValidationError> = std::result::Result<T, E>;

/// A single problem found during validation, wrapped in the path of fields leading to it.
#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ValidationError {
    #[snafu(display("validate {field:?}: {source}"))]
    Field {
        field: String,
        #[snafu(source(from(ValidationError, Box::new)))]
        source: Box<ValidationError>,
    },

    #[snafu(display("{field:?} must be specified"))]
    Required { field: String },

    #[snafu(display("must specify one, not both, of {first:?} and {second:?}"))]
    MutuallyExclusive { first: String, second: String },

    #[snafu(display("{field:?} cannot be specified when {other:?} is {reason}"))]
    Conflict {
        field: String,
        other: String,
        reason: String,
    },

    #[snafu(display("{field:?} must be specified when {other:?} is configured"))]
    RequiredBy { field: String, other: String },

    #[snafu(display("must specify at least one of {}", quoted(fields)))]
    AtLeastOne { fields: Vec<String> },

    #[snafu(display("{field:?} value {value:?} must be one of {}", quoted(allowed)))]
    NotOneOf {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[snafu(display("{field:?} value {value} must be between {min} and {max}"))]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[snafu(display("{field:?} value {value} must be between {min} and {max}"))]
    DurationOutOfRange {
        field: String,
        value: Duration,
        min: Duration,
        max: Duration,
    },

    #[snafu(display("{field:?} value {value:?} is not a valid CIDR block"))]
    InvalidCidr { field: String, value: String },

    #[snafu(display("{field:?} value {value:?} is not a valid ARN"))]
    InvalidArn { field: String, value: String },

    #[snafu(display("{field:?} value {value:?} is invalid: {reason}"))]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn quoted(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("{value:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A type that can check its own contents for semantic problems.
pub trait Validate {
    /// Returns the first problem found, in field declaration order.
    fn validate(&self) -> Result;
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result {
        match self {
            Some(value) => value.validate(),
            None => Ok(()),
        }
    }
}

impl<T: Validate> Validate for Box<T> {
    fn validate(&self) -> Result {
        T::validate(self)
    }
}

macro_rules! always_valid {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Validate for $ty {
                fn validate(&self) -> Result {
                    Ok(())
                }
            }
        )*
    };
}

always_valid!(
    u8,
    u16,
    u32,
    u64,
    i32,
    i64,
    bool,
    String,
    Duration,
    Vec<String>,
    BTreeMap<String, String>,
);

/// Validates every entry of a list, naming failures `field[index]`.
pub fn validate_list<T: Validate>(field: &str, items: &[T]) -> Result {
    for (index, item) in items.iter().enumerate() {
        item.validate().context(FieldSnafu {
            field: format!("{field}[{index}]"),
        })?;
    }
    Ok(())
}

/// Validates every value of a map, naming failures `field[key]`.
pub fn validate_map<K: Display, V: Validate>(field: &str, items: &BTreeMap<K, V>) -> Result {
    for (key, item) in items {
        item.validate().context(FieldSnafu {
            field: format!("{field}[{key}]"),
        })?;
    }
    Ok(())
}

/// Returns [`Ok`] if `value` is set.
pub fn required<T>(field: &str, value: Option<&T>) -> Result {
    match value {
        Some(_) => Ok(()),
        None => RequiredSnafu { field }.fail(),
    }
}

/// Returns [`Ok`] unless both alternatives are set.
pub fn mutually_exclusive(first: (&str, bool), second: (&str, bool)) -> Result {
    match (first, second) {
        ((first, true), (second, true)) => MutuallyExclusiveSnafu { first, second }.fail(),
        _ => Ok(()),
    }
}

/// Returns [`Ok`] if at least one of `fields` is set.
pub fn at_least_one(fields: &[(&str, bool)]) -> Result {
    if fields.iter().any(|(_, set)| *set) {
        return Ok(());
    }
    AtLeastOneSnafu {
        fields: fields
            .iter()
            .map(|(name, _)| (*name).to_owned())
            .collect::<Vec<_>>(),
    }
    .fail()
}

/// Returns [`Ok`] if `value` parses as one of the variants of `E`.
pub fn one_of<E>(field: &str, value: &str) -> Result
where
    E: FromStr + IntoEnumIterator + Display,
{
    match value.parse::<E>() {
        Ok(_) => Ok(()),
        Err(_) => NotOneOfSnafu {
            field,
            value,
            allowed: E::iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        }
        .fail(),
    }
}

/// Returns [`Ok`] if `value` lies within `min..=max`.
pub fn in_range(field: &str, value: i64, min: i64, max: i64) -> Result {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        OutOfRangeSnafu {
            field,
            value,
            min,
            max,
        }
        .fail()
    }
}

/// Returns [`Ok`] if `value` lies within `min..=max`.
pub fn duration_in_range(field: &str, value: Duration, min: Duration, max: Duration) -> Result {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        DurationOutOfRangeSnafu {
            field,
            value,
            min,
            max,
        }
        .fail()
    }
}

/// Returns [`Ok`] if `value` is an IPv4 or IPv6 CIDR block such as `10.0.0.0/16`.
pub fn cidr(field: &str, value: &str) -> Result {
    let parsed = value.split_once('/').and_then(|(address, prefix)| {
        let address = address.parse::<IpAddr>().ok()?;
        let prefix = prefix.parse::<u8>().ok()?;
        let max_prefix = match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        (prefix <= max_prefix).then_some(())
    });
    match parsed {
        Some(()) => Ok(()),
        None => InvalidCidrSnafu { field, value }.fail(),
    }
}

/// Returns [`Ok`] if `value` looks like an AWS ARN.
pub fn arn(field: &str, value: &str) -> Result {
    if ARN_REGEX.is_match(value) {
        Ok(())
    } else {
        InvalidArnSnafu { field, value }.fail()
    }
}
