use serde::{Deserialize, Serialize};

use crate::{
    config::{merge::Merge, zero::IsZero},
    validation::{Validate, ValidationError, one_of},
};

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum TracingVendor {
    #[strum(serialize = "awsxray")]
    AwsXray,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Observability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<String>,
}

impl Validate for Observability {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.tracing {
            Some(vendor) => one_of::<TracingVendor>("tracing", vendor),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_vendor() {
        let observability: Observability = serde_yaml::from_str("tracing: awsxray").unwrap();
        assert!(observability.validate().is_ok());

        let observability = Observability {
            tracing: Some("jaeger".to_owned()),
        };
        assert_eq!(
            observability.validate().unwrap_err().to_string(),
            r#""tracing" value "jaeger" must be one of "awsxray""#
        );
    }
}
