use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{merge::Merge, zero::IsZero},
    validation::{NotOneOfSnafu, Validate, ValidationError, validate_map},
    workload::{
        deserialize_scalar_map,
        variables::{Secret, Variable, deserialize_variables},
    },
};

/// Retention periods, in days, that CloudWatch Logs accepts.
const RETENTION_DAYS: [i64; 22] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// The FireLens log router that runs next to the main container.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub destination: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_metadata: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secret_options: BTreeMap<String, Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_variables",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
}

impl Validate for Logging {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(retention) = self.retention {
            if !RETENTION_DAYS.contains(&retention) {
                return NotOneOfSnafu {
                    field: "retention",
                    value: retention.to_string(),
                    allowed: RETENTION_DAYS
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>(),
                }
                .fail();
            }
        }
        validate_map("secret_options", &self.secret_options)?;
        validate_map("variables", &self.variables)?;
        validate_map("secrets", &self.secrets)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::merge::merge;

    #[test]
    fn decode_logging() {
        let logging: Logging = serde_yaml::from_str(indoc! {"
            retention: 30
            destination:
              Name: cloudwatch
              region: us-west-2
            secret_options:
              LOG_TOKEN: LOG_TOKEN_SECRET
        "})
        .unwrap();
        assert_eq!(logging.destination["Name"], "cloudwatch");
        assert!(logging.validate().is_ok());
    }

    #[test]
    fn unsupported_retention() {
        let logging = Logging {
            retention: Some(2),
            ..Default::default()
        };
        assert!(
            logging
                .validate()
                .unwrap_err()
                .to_string()
                .starts_with(r#""retention" value "2" must be one of "1", "3""#)
        );
    }

    #[test]
    fn destination_keys_upsert() {
        let base = Logging {
            destination: BTreeMap::from([
                ("Name".to_owned(), "cloudwatch".to_owned()),
                ("region".to_owned(), "us-west-2".to_owned()),
            ]),
            ..Default::default()
        };
        let overrides = Logging {
            destination: BTreeMap::from([("region".to_owned(), "eu-west-1".to_owned())]),
            ..Default::default()
        };
        let merged = merge(overrides, &base);
        assert_eq!(merged.destination["Name"], "cloudwatch");
        assert_eq!(merged.destination["region"], "eu-west-1");
    }
}
