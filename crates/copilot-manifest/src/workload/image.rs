use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    time::Duration,
    validation::{
        self, FieldSnafu, InvalidValueSnafu, Validate, ValidationError, duration_in_range,
        in_range, mutually_exclusive,
    },
    workload::{deserialize_scalar_map, variables::StringSliceOrString},
};

/// Either a path to a Dockerfile or a full set of build arguments.
pub type BuildArgsOrString = Union<String, DockerBuildArgs>;

/// Container start-up ordering conditions accepted by `depends_on`.
#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum DependsOnCondition {
    #[strum(serialize = "start")]
    Start,
    #[strum(serialize = "complete")]
    Complete,
    #[strum(serialize = "success")]
    Success,
    #[strum(serialize = "healthy")]
    Healthy,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct DockerBuildArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub args: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_from: Option<Vec<String>>,
}

impl Validate for DockerBuildArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// The container image of the main container, either built from source or pulled.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildArgsOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub depends_on: BTreeMap<String, String>,
}

impl Validate for Image {
    fn validate(&self) -> Result<(), ValidationError> {
        mutually_exclusive(
            ("build", self.build.is_some()),
            ("location", self.location.is_some()),
        )?;
        validation::at_least_one(&[
            ("build", self.build.is_some()),
            ("location", self.location.is_some()),
        ])?;
        self.build
            .validate()
            .context(FieldSnafu { field: "build" })?;
        validate_depends_on(&self.depends_on).context(FieldSnafu {
            field: "depends_on",
        })
    }
}

pub(crate) fn validate_depends_on(
    depends_on: &BTreeMap<String, String>,
) -> Result<(), ValidationError> {
    for (container, condition) in depends_on {
        validation::one_of::<DependsOnCondition>(container, condition)?;
    }
    Ok(())
}

/// An [`Image`] together with the port the main container listens on.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ImageWithPort {
    #[serde(flatten)]
    pub image: Image,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Validate for ImageWithPort {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image.validate()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ImageWithHealthcheck {
    #[serde(flatten)]
    pub image: Image,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub healthcheck: ContainerHealthCheck,
}

impl Validate for ImageWithHealthcheck {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image.validate()?;
        self.healthcheck
            .validate()
            .context(FieldSnafu { field: "healthcheck" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ImageWithPortAndHealthcheck {
    #[serde(flatten)]
    pub image_with_port: ImageWithPort,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub healthcheck: ContainerHealthCheck,
}

impl ImageWithPortAndHealthcheck {
    pub fn port(&self) -> Option<u16> {
        self.image_with_port.port
    }
}

impl Validate for ImageWithPortAndHealthcheck {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image_with_port.validate()?;
        self.healthcheck
            .validate()
            .context(FieldSnafu { field: "healthcheck" })
    }
}

/// The health check ECS runs inside a container.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ContainerHealthCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_period: Option<Duration>,
}

impl Validate for ContainerHealthCheck {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(command) = &self.command {
            if command.is_empty() {
                return InvalidValueSnafu {
                    field: "command",
                    value: "[]",
                    reason: "must contain at least one argument",
                }
                .fail();
            }
        }
        if let Some(interval) = self.interval {
            duration_in_range(
                "interval",
                interval,
                Duration::from_secs(5),
                Duration::from_secs(300),
            )?;
        }
        if let Some(retries) = self.retries {
            in_range("retries", retries, 1, 10)?;
        }
        if let Some(timeout) = self.timeout {
            duration_in_range(
                "timeout",
                timeout,
                Duration::from_secs(2),
                Duration::from_secs(60),
            )?;
        }
        if let Some(start_period) = self.start_period {
            duration_in_range(
                "start_period",
                start_period,
                Duration::from_secs(0),
                Duration::from_secs(300),
            )?;
        }
        Ok(())
    }
}

/// Overrides for the entrypoint and command baked into the image.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ImageOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<StringSliceOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<StringSliceOrString>,
}

impl Validate for ImageOverride {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
