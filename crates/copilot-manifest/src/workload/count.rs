//! Task count and autoscaling.
//!
//! ```yaml
//! count: 2
//! # or
//! count:
//!   range: 1-10
//!   cpu_percentage: 70
//! # or
//! count:
//!   spot: 3
//! ```
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    atomic,
    config::{merge::Merge, union::Union, zero::IsZero},
    time::Duration,
    validation::{
        ConflictSnafu, FieldSnafu, InvalidValueSnafu, RequiredBySnafu, Validate, ValidationError,
        duration_in_range, in_range, mutually_exclusive, required,
    },
};

/// A fixed number of tasks, or an autoscaling configuration.
pub type Count = Union<i64, AdvancedCount>;

/// How an [`AdvancedCount`] decides the number of tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountMode {
    Unset,
    Spot,
    Autoscaling,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct AdvancedCount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percentage: Option<ScalingConfigOrT<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_percentage: Option<ScalingConfigOrT<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<ScalingConfigOrT<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<ScalingConfigOrT<Duration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_delay: Option<QueueScaling>,
}

impl AdvancedCount {
    pub fn mode(&self) -> CountMode {
        if self.spot.is_some() {
            CountMode::Spot
        } else if self.range.is_some() || self.has_scaling_metrics() {
            CountMode::Autoscaling
        } else {
            CountMode::Unset
        }
    }

    fn has_scaling_metrics(&self) -> bool {
        self.cpu_percentage.is_some()
            || self.memory_percentage.is_some()
            || self.requests.is_some()
            || self.response_time.is_some()
            || self.queue_delay.is_some()
    }

    /// Rejects scaling metrics that the given workload cannot scale on.
    ///
    /// `requests` and `response_time` need a load balancer in front of the service, while
    /// `queue_delay` needs a queue to read from.
    pub(crate) fn check_metrics(
        &self,
        workload: &str,
        has_queue: bool,
    ) -> Result<(), ValidationError> {
        let unsupported: &[(&str, bool)] = if has_queue {
            &[
                ("requests", self.requests.is_some()),
                ("response_time", self.response_time.is_some()),
            ]
        } else {
            &[("queue_delay", self.queue_delay.is_some())]
        };
        match unsupported.iter().find(|(_, set)| *set) {
            Some((field, _)) => ConflictSnafu {
                field: *field,
                other: "type",
                reason: format!("{workload:?}"),
            }
            .fail(),
            None => Ok(()),
        }
    }
}

/// Switching between spot and autoscaling in an override drops the base configuration
/// entirely. Otherwise the fields are merged one by one.
impl Merge for AdvancedCount {
    fn merge(&mut self, defaults: &Self) {
        let mode = self.mode();
        if mode != CountMode::Unset && mode != defaults.mode() {
            return;
        }
        self.spot.merge(&defaults.spot);
        self.range.merge(&defaults.range);
        self.cpu_percentage.merge(&defaults.cpu_percentage);
        self.memory_percentage.merge(&defaults.memory_percentage);
        self.requests.merge(&defaults.requests);
        self.response_time.merge(&defaults.response_time);
        self.queue_delay.merge(&defaults.queue_delay);
    }
}

impl Validate for AdvancedCount {
    fn validate(&self) -> Result<(), ValidationError> {
        mutually_exclusive(
            ("spot", self.spot.is_some()),
            ("range", self.range.is_some()),
        )?;
        if self.spot.is_some() && self.has_scaling_metrics() {
            return ConflictSnafu {
                field: "spot",
                other: "autoscaling",
                reason: "configured",
            }
            .fail();
        }
        if let Some(spot) = self.spot {
            in_range("spot", spot, 0, i64::MAX)?;
        }
        if self.has_scaling_metrics() && self.range.is_none() {
            return RequiredBySnafu {
                field: "range",
                other: "autoscaling",
            }
            .fail();
        }
        self.range
            .validate()
            .context(FieldSnafu { field: "range" })?;
        validate_percentage("cpu_percentage", self.cpu_percentage.as_ref())?;
        validate_percentage("memory_percentage", self.memory_percentage.as_ref())?;
        if let Some(requests) = &self.requests {
            requests
                .validate()
                .context(FieldSnafu { field: "requests" })?;
        }
        if let Some(response_time) = &self.response_time {
            response_time
                .validate()
                .context(FieldSnafu {
                    field: "response_time",
                })?;
        }
        self.queue_delay
            .validate()
            .context(FieldSnafu {
                field: "queue_delay",
            })
    }
}

fn validate_percentage(
    field: &str,
    value: Option<&ScalingConfigOrT<i64>>,
) -> Result<(), ValidationError> {
    let Some(value) = value else {
        return Ok(());
    };
    value.validate().context(FieldSnafu { field })?;
    match value.value() {
        Some(percentage) => in_range(field, percentage, 1, 100),
        None => Ok(()),
    }
}

/// A `min-max` range such as `1-10`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IntRangeBand(pub String);

atomic!(IntRangeBand);

impl IsZero for IntRangeBand {
    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntRangeBand {
    /// Returns the lower and upper bound, or [`None`] if the band is malformed.
    pub fn parse(&self) -> Option<(i64, i64)> {
        let (min, max) = self.0.split_once('-')?;
        Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
    }
}

impl Validate for IntRangeBand {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.parse() {
            Some((min, max)) if 0 <= min && min <= max => Ok(()),
            _ => InvalidValueSnafu {
                field: "range",
                value: self.0.as_str(),
                reason: "must be of the form min-max with 0 <= min <= max",
            }
            .fail(),
        }
    }
}

/// A `min-max` band, or explicit bounds with an optional spot threshold.
pub type Range = Union<IntRangeBand, RangeConfig>;

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct RangeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_from: Option<i64>,
}

impl Validate for RangeConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        required("min", self.min.as_ref())?;
        required("max", self.max.as_ref())?;
        if let (Some(min), Some(max)) = (self.min, self.max) {
            in_range("min", min, 0, max)?;
        }
        if let Some(spot_from) = self.spot_from {
            in_range("spot_from", spot_from, 0, i64::MAX)?;
        }
        Ok(())
    }
}

/// A scaling target, or a target together with cooldown periods.
pub type ScalingConfigOrT<T> = Union<T, AdvancedScalingConfig<T>>;

impl<T: Copy> Union<T, AdvancedScalingConfig<T>> {
    /// The scaling target, regardless of the form it was written in.
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Basic(value) => Some(*value),
            Self::Advanced(config) => config.value,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(
    bound = "T: Merge + Clone",
    path_overrides(merge = "crate::config::merge")
)]
pub struct AdvancedScalingConfig<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub cooldown: Cooldown,
}

impl<T> Validate for AdvancedScalingConfig<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        required("value", self.value.as_ref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Cooldown {
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub scale_in: Option<Duration>,
    #[serde(rename = "out", skip_serializing_if = "Option::is_none")]
    pub scale_out: Option<Duration>,
}

/// Queue based scaling for services that read from a queue.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct QueueScaling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptable_latency: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_processing_time: Option<Duration>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub cooldown: Cooldown,
}

impl Validate for QueueScaling {
    fn validate(&self) -> Result<(), ValidationError> {
        required("acceptable_latency", self.acceptable_latency.as_ref())?;
        required("msg_processing_time", self.msg_processing_time.as_ref())?;
        if let (Some(latency), Some(processing)) =
            (self.acceptable_latency, self.msg_processing_time)
        {
            duration_in_range(
                "msg_processing_time",
                processing,
                Duration::from_millis(1),
                latency,
            )?;
        }
        Ok(())
    }
}
