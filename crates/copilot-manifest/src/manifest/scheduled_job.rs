use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    manifest::{Manifest, WorkloadConfig, WorkloadType},
    time::Duration,
    validation::{
        FieldSnafu, InvalidValueSnafu, Validate, ValidationError, in_range, one_of, required,
        validate_map,
    },
    workload::{
        deserialize_scalar_map,
        image::{ImageOverride, ImageWithHealthcheck},
        logging::Logging,
        network::{NetworkConfig, VpcConfig},
        observability::Observability,
        publish::PublishConfig,
        sidecar::SidecarConfig,
        task::TaskConfig,
    },
};

pub type ScheduledJob = Manifest<ScheduledJobConfig>;

/// Predefined schedules accepted in place of a cron expression.
#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum SchedulePreset {
    #[strum(serialize = "@yearly")]
    Yearly,
    #[strum(serialize = "@annually")]
    Annually,
    #[strum(serialize = "@monthly")]
    Monthly,
    #[strum(serialize = "@weekly")]
    Weekly,
    #[strum(serialize = "@daily")]
    Daily,
    #[strum(serialize = "@midnight")]
    Midnight,
    #[strum(serialize = "@hourly")]
    Hourly,
}

const EVERY_PREFIX: &str = "@every ";
const MAX_RETRIES: i64 = 10;

/// A task that runs on a schedule and exits.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ScheduledJobConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub image: ImageWithHealthcheck,
    #[serde(flatten)]
    pub image_override: ImageOverride,
    #[serde(flatten)]
    pub task_config: TaskConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub logging: Logging,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sidecars: BTreeMap<String, Option<SidecarConfig>>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub on: JobTriggerConfig,
    #[serde(flatten)]
    pub failure_handler: JobFailureHandlerConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub network: NetworkConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub publish: PublishConfig,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub observability: Observability,
}

impl WorkloadConfig for ScheduledJobConfig {
    const WORKLOAD_TYPE: WorkloadType = WorkloadType::ScheduledJob;
}

impl Validate for ScheduledJobConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image
            .validate()
            .context(FieldSnafu { field: "image" })?;
        self.image_override.validate()?;
        self.task_config.validate()?;
        self.logging
            .validate()
            .context(FieldSnafu { field: "logging" })?;
        validate_map("sidecars", &self.sidecars)?;
        self.on.validate().context(FieldSnafu { field: "on" })?;
        self.failure_handler.validate()?;
        self.network
            .validate()
            .context(FieldSnafu { field: "network" })?;
        self.publish
            .validate()
            .context(FieldSnafu { field: "publish" })?;
        self.observability
            .validate()
            .context(FieldSnafu {
                field: "observability",
            })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct JobTriggerConfig {
    /// A cron expression, a preset such as `@daily`, `@every 2h`, or `none` to only run the
    /// job by hand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Validate for JobTriggerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        required("schedule", self.schedule.as_ref())?;
        match self.schedule.as_deref() {
            Some(schedule) => validate_schedule(schedule),
            None => Ok(()),
        }
    }
}

fn validate_schedule(schedule: &str) -> Result<(), ValidationError> {
    if schedule == "none" {
        return Ok(());
    }
    if let Some(every) = schedule.strip_prefix(EVERY_PREFIX) {
        return match every.parse::<Duration>() {
            Ok(_) => Ok(()),
            Err(error) => InvalidValueSnafu {
                field: "schedule",
                value: schedule,
                reason: error.to_string(),
            }
            .fail(),
        };
    }
    if schedule.starts_with('@') {
        return one_of::<SchedulePreset>("schedule", schedule);
    }
    if schedule.split_whitespace().count() != 5 {
        return InvalidValueSnafu {
            field: "schedule",
            value: schedule,
            reason: "must be a cron expression with 5 fields, a preset such as @daily, or \"none\"",
        }
        .fail();
    }
    Ok(())
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct JobFailureHandlerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
}

impl Validate for JobFailureHandlerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(timeout) = self.timeout {
            if timeout < Duration::from_secs(1) {
                return InvalidValueSnafu {
                    field: "timeout",
                    value: timeout.to_string(),
                    reason: "must be at least 1s",
                }
                .fail();
            }
        }
        match self.retries {
            Some(retries) => in_range("retries", retries, 0, MAX_RETRIES),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScheduledJobProps {
    pub name: String,
    pub dockerfile: Option<String>,
    pub image: Option<String>,
    pub schedule: String,
    pub timeout: Option<Duration>,
    pub retries: Option<i64>,
}

impl Manifest<ScheduledJobConfig> {
    /// Creates a manifest with the defaults of a new job, running in public subnets.
    pub fn new(props: ScheduledJobProps) -> Self {
        let config = ScheduledJobConfig {
            image: ImageWithHealthcheck {
                image: super::image_from_props(props.dockerfile, props.image),
                ..Default::default()
            },
            task_config: TaskConfig {
                cpu: Some(256),
                memory: Some(512),
                ..Default::default()
            },
            on: JobTriggerConfig {
                schedule: Some(props.schedule),
            },
            failure_handler: JobFailureHandlerConfig {
                timeout: props.timeout,
                retries: props.retries,
            },
            network: NetworkConfig {
                vpc: VpcConfig {
                    placement: Some(Union::Basic("public".to_owned())),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        Self::from_config(props.name, config)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[test]
    fn decode_job() {
        let job: ScheduledJob = serde_yaml::from_str(indoc! {"
            name: report
            type: Scheduled Job
            image:
              build: ./Dockerfile
            on:
              schedule: '0 9 * * MON'
            timeout: 1h30m
            retries: 3
            environments:
              test:
                on:
                  schedule: none
        "})
        .unwrap();

        assert_eq!(job.config.failure_handler.retries, Some(3));
        assert_eq!(
            job.config.failure_handler.timeout,
            Some(Duration::from_secs(5400))
        );
        assert!(job.validate().is_ok());

        let test = job.apply_env("test");
        assert_eq!(test.config.on.schedule.as_deref(), Some("none"));
        assert_eq!(test.config.failure_handler.retries, Some(3));
    }

    #[test]
    fn schedule_is_required() {
        let job = ScheduledJob::from_config(
            "report",
            ScheduledJobConfig {
                image: ImageWithHealthcheck {
                    image: crate::manifest::image_from_props(None, Some("report".to_owned())),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        assert_eq!(
            job.validate().unwrap_err().to_string(),
            r#"validate "on": "schedule" must be specified"#
        );
    }

    #[rstest]
    #[case("@daily", true)]
    #[case("@every 30m", true)]
    #[case("@every soon", false)]
    #[case("@fortnightly", false)]
    #[case("*/5 * * * *", true)]
    #[case("* * *", false)]
    #[case("none", true)]
    fn schedules(#[case] schedule: &str, #[case] valid: bool) {
        assert_eq!(validate_schedule(schedule).is_ok(), valid);
    }

    #[rstest]
    #[case(Some(0), true)]
    #[case(Some(10), true)]
    #[case(Some(11), false)]
    #[case(Some(-1), false)]
    #[case(None, true)]
    fn retries_bounds(#[case] retries: Option<i64>, #[case] valid: bool) {
        let handler = JobFailureHandlerConfig {
            retries,
            ..Default::default()
        };
        assert_eq!(handler.validate().is_ok(), valid);
    }

    #[test]
    fn scaffolded_manifest_is_valid() {
        let job = ScheduledJob::new(ScheduledJobProps {
            name: "report".to_owned(),
            image: Some("report".to_owned()),
            schedule: "@hourly".to_owned(),
            ..Default::default()
        });
        assert!(job.validate().is_ok());
    }
}
