//! Environment variables and secrets injected into containers.
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    validation::{Validate, ValidationError, at_least_one, mutually_exclusive, required},
};

/// A single string or a list of strings, such as a command or an alias.
pub type StringSliceOrString = Union<String, Vec<String>>;

impl Union<String, Vec<String>> {
    /// Flattens both forms into a list.
    pub fn to_string_slice(&self) -> Vec<String> {
        match self {
            Self::Basic(value) => vec![value.clone()],
            Self::Advanced(values) => values.clone(),
        }
    }
}

/// A plain value, or a reference to a CloudFormation stack output.
pub type Variable = Union<String, ImportedValue>;

/// Reads a `variables` map, accepting bare numbers and booleans as plain values.
pub(crate) fn deserialize_variables<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Variable>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_yaml::Value::Number(number) => serde_yaml::Value::String(number.to_string()),
                serde_yaml::Value::Bool(flag) => serde_yaml::Value::String(flag.to_string()),
                other => other,
            };
            Variable::from_value(value)
                .map(|variable| (name, variable))
                .map_err(D::Error::custom)
        })
        .collect()
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ImportedValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cfn: Option<String>,
}

impl Validate for ImportedValue {
    fn validate(&self) -> Result<(), ValidationError> {
        required("from_cfn", self.from_cfn.as_ref())
    }
}

/// The name or ARN of a parameter, or a structured reference to where the secret lives.
pub type Secret = Union<String, SecretSource>;

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SecretSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cfn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secretsmanager: Option<String>,
}

impl Validate for SecretSource {
    fn validate(&self) -> Result<(), ValidationError> {
        mutually_exclusive(
            ("from_cfn", self.from_cfn.is_some()),
            ("secretsmanager", self.secretsmanager.is_some()),
        )?;
        at_least_one(&[
            ("from_cfn", self.from_cfn.is_some()),
            ("secretsmanager", self.secretsmanager.is_some()),
        ])
    }
}
