//! A field that accepts either a short scalar form or a structured block.
//!
//! ```yaml
//! access_logs: true
//! # or
//! access_logs:
//!   bucket_name: my-bucket
//!   prefix: lb
//! ```
//!
//! Both spellings decode into the same [`Union`] field. The basic form is tried first, and
//! it only wins if it decodes to a non-zero value, so that an accidentally-zero scalar decode
//! never shadows a meaningful structured block.
use std::sync::LazyLock;

use regex::Regex;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{DeserializeOwned, Error as _},
};
use snafu::{ResultExt, Snafu};

use crate::{
    config::{merge::Merge, zero::IsZero},
    validation::{Validate, ValidationError},
};

static MODULE_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[A-Za-z_][A-Za-z0-9_]*::)+").expect("failed to compile module path regex")
});

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unmarshal into {type_name}: {source}"))]
    DecodeBasic {
        source: serde_yaml::Error,
        type_name: String,
    },

    #[snafu(display("unmarshal into {type_name}: {source}"))]
    DecodeAdvanced {
        source: serde_yaml::Error,
        type_name: String,
    },

    #[snafu(display("unable to unmarshal into {basic} or {advanced}"))]
    Ambiguous { basic: String, advanced: String },

    #[snafu(display("unable to unmarshal into {basic} or {advanced}: {source}"))]
    Mismatch {
        source: serde_yaml::Error,
        basic: String,
        advanced: String,
    },
}

/// Either the basic (scalar) or the advanced (structured) form of a field.
///
/// A field that may be left out is declared as `Option<Union<B, A>>`, where [`None`] is the
/// unset state. Holding a [`Union`] therefore always means exactly one form is active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Union<B, A> {
    Basic(B),
    Advanced(A),
}

impl<B, A> Union<B, A> {
    pub fn from_basic(basic: B) -> Self {
        Self::Basic(basic)
    }

    pub fn from_advanced(advanced: A) -> Self {
        Self::Advanced(advanced)
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Basic(_))
    }

    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced(_))
    }

    pub fn basic(&self) -> Option<&B> {
        match self {
            Self::Basic(basic) => Some(basic),
            Self::Advanced(_) => None,
        }
    }

    pub fn advanced(&self) -> Option<&A> {
        match self {
            Self::Basic(_) => None,
            Self::Advanced(advanced) => Some(advanced),
        }
    }

    /// Replaces the active form with the basic one.
    pub fn set_basic(&mut self, basic: B) {
        *self = Self::Basic(basic);
    }

    /// Replaces the active form with the advanced one.
    pub fn set_advanced(&mut self, advanced: A) {
        *self = Self::Advanced(advanced);
    }
}

impl<B, A> Union<B, A>
where
    B: DeserializeOwned + IsZero,
    A: DeserializeOwned + IsZero,
{
    /// Decodes an already parsed YAML node.
    ///
    /// 1. A non-zero basic value wins.
    /// 2. Otherwise a non-zero advanced value wins.
    /// 3. Otherwise an explicitly written zero scalar (`false`, `0`) is kept as the basic form.
    /// 4. Otherwise an explicitly written empty list (`[]`) is kept as the advanced form.
    ///
    /// Errors from the basic attempt that are not plain type mismatches are returned as-is,
    /// without trying the advanced form. An empty mapping (`{}`) matches neither form.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self> {
        let is_sequence = value.is_sequence();
        let basic = match serde_yaml::from_value::<B>(value.clone()) {
            Ok(basic) if !basic.is_zero() => return Ok(Self::Basic(basic)),
            Ok(basic) => Some(basic),
            Err(err) if is_type_mismatch(&err) => None,
            Err(source) => {
                return Err(source).context(DecodeBasicSnafu {
                    type_name: short_type_name::<B>(),
                });
            }
        };

        let mismatch = match serde_yaml::from_value::<A>(value) {
            Ok(advanced) if !advanced.is_zero() => return Ok(Self::Advanced(advanced)),
            Ok(advanced) if is_sequence && basic.is_none() => {
                return Ok(Self::Advanced(advanced));
            }
            Ok(_) => None,
            Err(err) if is_type_mismatch(&err) => Some(err),
            Err(source) => {
                return Err(source).context(DecodeAdvancedSnafu {
                    type_name: short_type_name::<A>(),
                });
            }
        };

        match (basic, mismatch) {
            (Some(basic), _) => Ok(Self::Basic(basic)),
            (None, Some(source)) => Err(source).context(MismatchSnafu {
                basic: short_type_name::<B>(),
                advanced: short_type_name::<A>(),
            }),
            (None, None) => AmbiguousSnafu {
                basic: short_type_name::<B>(),
                advanced: short_type_name::<A>(),
            }
            .fail(),
        }
    }
}

/// Whether `err` only says that the node has a different shape than the target type.
///
/// `serde_yaml` 0.9 exposes no error kind, so this matches the text that serde's
/// `Error::invalid_type` and `Error::invalid_length` produce. The `type_mismatch_errors` test
/// pins that text.
fn is_type_mismatch(err: &serde_yaml::Error) -> bool {
    let message = err.to_string();
    message.starts_with("invalid type") || message.starts_with("invalid length")
}

fn short_type_name<T>() -> String {
    MODULE_PATH_REGEX
        .replace_all(std::any::type_name::<T>(), "")
        .into_owned()
}

impl<'de, B, A> Deserialize<'de> for Union<B, A>
where
    B: DeserializeOwned + IsZero,
    A: DeserializeOwned + IsZero,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl<B: Serialize, A: Serialize> Serialize for Union<B, A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Basic(basic) => basic.serialize(serializer),
            Self::Advanced(advanced) => advanced.serialize(serializer),
        }
    }
}

impl<B: IsZero, A: IsZero> IsZero for Union<B, A> {
    fn is_zero(&self) -> bool {
        match self {
            Self::Basic(basic) => basic.is_zero(),
            Self::Advanced(advanced) => advanced.is_zero(),
        }
    }
}

/// Payloads of the same form are merged with each other, which keeps the override for scalar
/// payloads and recurses into structured ones. A change of form replaces the defaults as a
/// whole.
impl<B: Merge, A: Merge> Merge for Union<B, A> {
    fn merge(&mut self, defaults: &Self) {
        match (self, defaults) {
            (Self::Basic(this), Self::Basic(defaults)) => this.merge(defaults),
            (Self::Advanced(this), Self::Advanced(defaults)) => this.merge(defaults),
            (Self::Basic(_) | Self::Advanced(_), _) => {}
        }
    }
}

impl<B: Validate, A: Validate> Validate for Union<B, A> {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Basic(basic) => basic.validate(),
            Self::Advanced(advanced) => advanced.validate(),
        }
    }
}
