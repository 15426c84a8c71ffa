use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    manifest::{Manifest, WorkloadConfig, WorkloadType},
    validation::{FieldSnafu, Validate, ValidationError, validate_map},
    workload::{
        deserialize_scalar_map,
        count::Count,
        deployment::DeploymentConfig,
        image::{ImageOverride, ImageWithHealthcheck},
        logging::Logging,
        network::{NetworkConfig, VpcConfig},
        observability::Observability,
        publish::PublishConfig,
        sidecar::SidecarConfig,
        subscribe::{SubscribeConfig, TopicSubscription},
        task::{ExecuteCommand, TaskConfig},
    },
};

pub type WorkerService = Manifest<WorkerServiceConfig>;

/// A service that consumes messages from SNS topics through an SQS queue.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct WorkerServiceConfig {
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
    pub subscribe: SubscribeConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub publish: PublishConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub network: NetworkConfig,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub deployment: DeploymentConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub observability: Observability,
}

impl WorkloadConfig for WorkerServiceConfig {
    const WORKLOAD_TYPE: WorkloadType = WorkloadType::WorkerService;
}

impl Validate for WorkerServiceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image
            .validate()
            .context(FieldSnafu { field: "image" })?;
        self.image_override.validate()?;
        self.task_config.validate()?;
        if let Some(Union::Advanced(count)) = &self.task_config.count {
            count
                .check_metrics(&Self::WORKLOAD_TYPE.to_string(), true)
                .context(FieldSnafu { field: "count" })?;
        }
        self.logging
            .validate()
            .context(FieldSnafu { field: "logging" })?;
        validate_map("sidecars", &self.sidecars)?;
        self.subscribe
            .validate()
            .context(FieldSnafu { field: "subscribe" })?;
        self.publish
            .validate()
            .context(FieldSnafu { field: "publish" })?;
        self.network
            .validate()
            .context(FieldSnafu { field: "network" })?;
        self.deployment
            .validate()
            .context(FieldSnafu {
                field: "deployment",
            })?;
        self.observability
            .validate()
            .context(FieldSnafu {
                field: "observability",
            })
    }
}

#[derive(Clone, Debug, Default)]
pub struct WorkerServiceProps {
    pub name: String,
    pub dockerfile: Option<String>,
    pub image: Option<String>,
    /// `(topic, publishing service)` pairs to subscribe to.
    pub topics: Vec<(String, String)>,
}

impl Manifest<WorkerServiceConfig> {
    /// Creates a manifest with the defaults of a new worker service, subscribed to `topics`.
    pub fn new(props: WorkerServiceProps) -> Self {
        let topics = (!props.topics.is_empty()).then(|| {
            props
                .topics
                .into_iter()
                .map(|(name, service)| TopicSubscription {
                    name: Some(name),
                    service: Some(service),
                    queue: None,
                })
                .collect()
        });
        let config = WorkerServiceConfig {
            image: ImageWithHealthcheck {
                image: super::image_from_props(props.dockerfile, props.image),
                ..Default::default()
            },
            task_config: TaskConfig {
                cpu: Some(256),
                memory: Some(512),
                count: Some(Count::Basic(1)),
                exec: Some(ExecuteCommand::Basic(false)),
                ..Default::default()
            },
            subscribe: SubscribeConfig {
                topics,
                ..Default::default()
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

    use super::*;

    const MANIFEST: &str = indoc! {"
        name: processor
        type: Worker Service
        image:
          build: Dockerfile
        count:
          range: 1-10
          queue_delay:
            acceptable_latency: 10m
            msg_processing_time: 250ms
        subscribe:
          topics:
            - name: orders
              service: api
          queue:
            dead_letter:
              tries: 5
        environments:
          prod:
            subscribe:
              topics:
                - name: payments
                  service: billing
    "};

    #[test]
    fn decode_and_validate() {
        let manifest: WorkerService = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.config.subscribe.queue.dead_letter.tries, Some(5));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn topics_are_replaced_per_environment() {
        let manifest: WorkerService = serde_yaml::from_str(MANIFEST).unwrap();
        let prod = manifest.apply_env("prod");

        let topics = prod.config.subscribe.topics.as_deref().unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name.as_deref(), Some("payments"));
        assert_eq!(prod.config.subscribe.queue.dead_letter.tries, Some(5));
    }

    #[test]
    fn cannot_scale_on_requests() {
        let manifest: WorkerService = serde_yaml::from_str(indoc! {"
            name: processor
            type: Worker Service
            image:
              location: worker
            count:
              range: 1-10
              requests: 100
        "})
        .unwrap();
        assert_eq!(
            manifest.validate().unwrap_err().to_string(),
            r#"validate "count": "requests" cannot be specified when "type" is "Worker Service""#
        );
    }

    #[test]
    fn scaffolded_manifest_is_valid() {
        let manifest = WorkerService::new(WorkerServiceProps {
            name: "processor".to_owned(),
            dockerfile: Some("Dockerfile".to_owned()),
            topics: vec![("orders".to_owned(), "api".to_owned())],
            ..Default::default()
        });
        assert_eq!(
            manifest.config.subscribe.topics.as_ref().map(Vec::len),
            Some(1)
        );
        assert!(manifest.validate().is_ok());
    }
}
