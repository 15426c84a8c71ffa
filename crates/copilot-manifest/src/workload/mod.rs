//! Configuration blocks shared by the workload manifests.
//!
//! Every block derives [`Merge`](crate::config::merge::Merge) so that it can be overridden per
//! environment, [`IsZero`](crate::config::zero::IsZero) so that it can serve as the structured
//! form of a [`Union`](crate::config::union::Union), and implements
//! [`Validate`](crate::validation::Validate).
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, de::Error as _};

pub mod count;
pub mod deployment;
pub mod http;
pub mod image;
pub mod logging;
pub mod network;
pub mod nlb;
pub mod observability;
pub mod publish;
pub mod sidecar;
pub mod storage;
pub mod subscribe;
pub mod task;
pub mod variables;

/// Reads an optional string field that is commonly written as a bare number, such as `port: 80`.
pub(crate) fn deserialize_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => scalar_string(value).map_err(D::Error::custom),
    }
}

/// Reads a string-to-string map such as `tags` or `labels`, where values like `version: 1` or
/// `public: true` are kept as their string spelling. A null value reads as the empty string.
pub(crate) fn deserialize_scalar_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            let value = scalar_string(value)
                .map_err(D::Error::custom)?
                .unwrap_or_default();
            Ok((key, value))
        })
        .collect()
}

fn scalar_string(value: serde_yaml::Value) -> Result<Option<String>, String> {
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(value) => Ok(Some(value)),
        serde_yaml::Value::Number(value) => Ok(Some(value.to_string())),
        serde_yaml::Value::Bool(value) => Ok(Some(value.to_string())),
        other => Err(format!(
            "invalid type: expected a string or a number, found {other:?}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sidecar {
        #[serde(default, deserialize_with = "super::deserialize_scalar_string")]
        port: Option<String>,
        #[serde(default, deserialize_with = "super::deserialize_scalar_map")]
        labels: BTreeMap<String, String>,
    }

    #[test]
    fn scalar_strings() {
        let sidecar: Sidecar = serde_yaml::from_str("port: 80").unwrap();
        assert_eq!(sidecar.port.as_deref(), Some("80"));

        let sidecar: Sidecar = serde_yaml::from_str("port: 2000/udp").unwrap();
        assert_eq!(sidecar.port.as_deref(), Some("2000/udp"));

        let sidecar: Sidecar = serde_yaml::from_str("{}").unwrap();
        assert_eq!(sidecar.port, None);

        assert!(serde_yaml::from_str::<Sidecar>("port: [80]").is_err());
    }

    #[test]
    fn scalar_maps() {
        let sidecar: Sidecar = serde_yaml::from_str(indoc! {"
            labels:
              version: 1
              public: true
              owner: platform
              empty:
        "})
        .unwrap();
        assert_eq!(
            sidecar.labels,
            BTreeMap::from([
                ("empty".to_owned(), String::new()),
                ("owner".to_owned(), "platform".to_owned()),
                ("public".to_owned(), "true".to_owned()),
                ("version".to_owned(), "1".to_owned()),
            ])
        );

        assert!(serde_yaml::from_str::<Sidecar>("labels: {nested: {a: b}}").is_err());
    }
}
