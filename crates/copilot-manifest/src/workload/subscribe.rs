//! SNS topic subscriptions and the SQS queues that receive them.
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    time::Duration,
    validation::{
        FieldSnafu, Validate, ValidationError, duration_in_range, in_range, mutually_exclusive,
        one_of, required, validate_list,
    },
    workload::publish::validate_topic_name,
};

/// `true` for a dedicated queue with defaults, or the settings of that queue.
pub type SqsQueueOrBool = Union<bool, SqsQueue>;

/// `true` for a FIFO queue with defaults, or its settings.
pub type FifoAdvanceConfigOrBool = Union<bool, FifoAdvanceConfig>;

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum DeduplicationScope {
    #[strum(serialize = "messageGroup")]
    MessageGroup,
    #[strum(serialize = "queue")]
    Queue,
}

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum FifoThroughputLimit {
    #[strum(serialize = "perMessageGroupId")]
    PerMessageGroupId,
    #[strum(serialize = "perQueue")]
    PerQueue,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SubscribeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<TopicSubscription>>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub queue: SqsQueue,
}

impl Validate for SubscribeConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(topics) = &self.topics {
            validate_list("topics", topics)?;
        }
        self.queue.validate().context(FieldSnafu { field: "queue" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct TopicSubscription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<SqsQueueOrBool>,
}

impl Validate for TopicSubscription {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", self.name.as_ref())?;
        if let Some(name) = &self.name {
            validate_topic_name("name", name)?;
        }
        required("service", self.service.as_ref())?;
        self.queue.validate().context(FieldSnafu { field: "queue" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SqsQueue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub dead_letter: DeadLetterQueue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifo: Option<FifoAdvanceConfigOrBool>,
}

impl Validate for SqsQueue {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(retention) = self.retention {
            duration_in_range(
                "retention",
                retention,
                Duration::from_secs(60),
                Duration::from_secs(1_209_600),
            )?;
        }
        if let Some(delay) = self.delay {
            duration_in_range(
                "delay",
                delay,
                Duration::from_secs(0),
                Duration::from_secs(900),
            )?;
        }
        if let Some(timeout) = self.timeout {
            duration_in_range(
                "timeout",
                timeout,
                Duration::from_secs(0),
                Duration::from_secs(43_200),
            )?;
        }
        self.dead_letter
            .validate()
            .context(FieldSnafu {
                field: "dead_letter",
            })?;
        self.fifo.validate().context(FieldSnafu { field: "fifo" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct DeadLetterQueue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tries: Option<u16>,
}

impl Validate for DeadLetterQueue {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.tries {
            Some(tries) => in_range("tries", i64::from(tries), 1, 1000),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct FifoAdvanceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_based_deduplication: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplication_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_throughput: Option<bool>,
}

impl Validate for FifoAdvanceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let high_throughput = self.high_throughput == Some(true);
        mutually_exclusive(
            ("high_throughput", high_throughput),
            ("deduplication_scope", self.deduplication_scope.is_some()),
        )?;
        mutually_exclusive(
            ("high_throughput", high_throughput),
            ("throughput_limit", self.throughput_limit.is_some()),
        )?;
        if let Some(scope) = &self.deduplication_scope {
            one_of::<DeduplicationScope>("deduplication_scope", scope)?;
        }
        if let Some(limit) = &self.throughput_limit {
            one_of::<FifoThroughputLimit>("throughput_limit", limit)?;
        }
        Ok(())
    }
}
