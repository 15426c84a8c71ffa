use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    validation::{FieldSnafu, InvalidValueSnafu, Validate, ValidationError, required, validate_list},
};

static TOPIC_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-zA-Z0-9_-]{1,256}$").expect("failed to compile topic name regex")
});

/// `true` for a FIFO topic with defaults, or its settings.
pub type FifoTopicAdvanceConfigOrBool = Union<bool, FifoTopicAdvanceConfig>;

/// SNS topics the workload publishes to.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct PublishConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Topic>>,
}

impl Validate for PublishConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.topics {
            Some(topics) => validate_list("topics", topics),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Topic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifo: Option<FifoTopicAdvanceConfigOrBool>,
}

impl Validate for Topic {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", self.name.as_ref())?;
        if let Some(name) = &self.name {
            validate_topic_name("name", name)?;
        }
        self.fifo.validate().context(FieldSnafu { field: "fifo" })
    }
}

pub(crate) fn validate_topic_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if TOPIC_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        InvalidValueSnafu {
            field,
            value: name,
            reason: "may only contain letters, numbers, underscores and hyphens",
        }
        .fail()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct FifoTopicAdvanceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_based_deduplication: Option<bool>,
}

impl Validate for FifoTopicAdvanceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::merge::merge;

    #[test]
    fn decode_topics() {
        let publish: PublishConfig = serde_yaml::from_str(indoc! {"
            topics:
              - name: orders
              - name: events
                fifo:
                  content_based_deduplication: true
        "})
        .unwrap();

        let topics = publish.topics.as_deref().unwrap();
        assert_eq!(topics.len(), 2);
        assert!(topics[1].fifo.as_ref().is_some_and(Union::is_advanced));
        assert!(publish.validate().is_ok());
    }

    #[test]
    fn topic_names() {
        let publish = PublishConfig {
            topics: Some(vec![Topic {
                name: Some("orders.created".to_owned()),
                fifo: None,
            }]),
        };
        assert_eq!(
            publish.validate().unwrap_err().to_string(),
            r#"validate "topics[0]": "name" value "orders.created" is invalid: may only contain letters, numbers, underscores and hyphens"#
        );
    }

    #[test]
    fn topics_replace_wholesale() {
        let topic = |name: &str| Topic {
            name: Some(name.to_owned()),
            fifo: None,
        };
        let base = PublishConfig {
            topics: Some(vec![topic("a"), topic("b")]),
        };
        let overrides = PublishConfig {
            topics: Some(vec![topic("c")]),
        };
        assert_eq!(merge(overrides.clone(), &base), overrides);
    }
}
