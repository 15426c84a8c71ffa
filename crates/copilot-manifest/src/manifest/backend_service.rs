use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    manifest::{Manifest, WorkloadConfig, WorkloadType},
    validation::{FieldSnafu, RequiredBySnafu, Validate, ValidationError, validate_map},
    workload::{
        deserialize_scalar_map,
        count::Count,
        deployment::DeploymentConfig,
        http::RoutingRuleConfiguration,
        image::{ImageOverride, ImageWithPort, ImageWithPortAndHealthcheck},
        logging::Logging,
        network::{NetworkConfig, VpcConfig},
        observability::Observability,
        publish::PublishConfig,
        sidecar::SidecarConfig,
        task::{ExecuteCommand, TaskConfig},
    },
};

pub type BackendService = Manifest<BackendServiceConfig>;

/// A service that is only reachable from inside the environment, optionally behind an
/// internal Application Load Balancer.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct BackendServiceConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub image: ImageWithPortAndHealthcheck,
    #[serde(flatten)]
    pub image_override: ImageOverride,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<RoutingRuleConfiguration>,
    #[serde(flatten)]
    pub task_config: TaskConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub logging: Logging,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sidecars: BTreeMap<String, Option<SidecarConfig>>,
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
    pub deployment: DeploymentConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub observability: Observability,
}

impl WorkloadConfig for BackendServiceConfig {
    const WORKLOAD_TYPE: WorkloadType = WorkloadType::BackendService;
}

impl Validate for BackendServiceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image
            .validate()
            .context(FieldSnafu { field: "image" })?;
        self.image_override.validate()?;
        self.http.validate().context(FieldSnafu { field: "http" })?;
        self.task_config.validate()?;
        if let Some(Union::Advanced(count)) = &self.task_config.count {
            count
                .check_metrics(&Self::WORKLOAD_TYPE.to_string(), false)
                .context(FieldSnafu { field: "count" })?;
        }
        self.logging
            .validate()
            .context(FieldSnafu { field: "logging" })?;
        validate_map("sidecars", &self.sidecars)?;
        self.network
            .validate()
            .context(FieldSnafu { field: "network" })?;
        self.publish
            .validate()
            .context(FieldSnafu { field: "publish" })?;
        self.deployment
            .validate()
            .context(FieldSnafu {
                field: "deployment",
            })?;
        self.observability
            .validate()
            .context(FieldSnafu {
                field: "observability",
            })?;

        if self.http.is_some() && self.image.port().is_none() {
            return RequiredBySnafu {
                field: "image.port",
                other: "http",
            }
            .fail();
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct BackendServiceProps {
    pub name: String,
    pub dockerfile: Option<String>,
    pub image: Option<String>,
    pub port: Option<u16>,
}

impl Manifest<BackendServiceConfig> {
    /// Creates a manifest with the defaults of a new backend service, running in public
    /// subnets without an internal load balancer.
    pub fn new(props: BackendServiceProps) -> Self {
        let config = BackendServiceConfig {
            image: ImageWithPortAndHealthcheck {
                image_with_port: ImageWithPort {
                    image: super::image_from_props(props.dockerfile, props.image),
                    port: props.port,
                },
                ..Default::default()
            },
            task_config: TaskConfig {
                cpu: Some(256),
                memory: Some(512),
                count: Some(Count::Basic(1)),
                exec: Some(ExecuteCommand::Basic(false)),
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
    use crate::workload::storage::Volume;

    #[test]
    fn internal_http() {
        let manifest: BackendService = serde_yaml::from_str(indoc! {"
            name: api
            type: Backend Service
            image:
              location: nginx
              port: 8080
            http:
              path: /api
            network:
              vpc:
                placement: private
        "})
        .unwrap();
        assert_eq!(
            manifest.config.http.as_ref().and_then(|http| http.path.as_deref()),
            Some("/api")
        );
        assert!(manifest.config.network.vpc.is_private());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn http_requires_a_port() {
        let manifest = BackendService::from_config(
            "api",
            BackendServiceConfig {
                image: ImageWithPortAndHealthcheck {
                    image_with_port: ImageWithPort {
                        image: crate::manifest::image_from_props(None, Some("nginx".to_owned())),
                        port: None,
                    },
                    ..Default::default()
                },
                http: Some(RoutingRuleConfiguration {
                    path: Some("/".to_owned()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        assert_eq!(
            manifest.validate().unwrap_err().to_string(),
            r#""image.port" must be specified when "http" is configured"#
        );
    }

    #[test]
    fn environment_adds_volume() {
        let manifest: BackendService = serde_yaml::from_str(indoc! {"
            name: api
            type: Backend Service
            image:
              location: nginx
            storage:
              volumes:
                cache:
                  path: /var/cache
                  efs: true
            environments:
              prod:
                storage:
                  volumes:
                    cache:
                      read_only: true
                    data:
                      path: /data
                      efs:
                        id: fs-1234
        "})
        .unwrap();

        let prod = manifest.apply_env("prod");
        let volumes = &prod.config.task_config.storage.volumes;
        assert_eq!(volumes.len(), 2);
        let cache: &Volume = volumes["cache"].as_ref().unwrap();
        assert_eq!(cache.mount_point.path.as_deref(), Some("/var/cache"));
        assert_eq!(cache.mount_point.read_only, Some(true));
        assert_eq!(cache.efs, Some(Union::Basic(true)));
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn scaffolded_manifest_is_valid() {
        let manifest = BackendService::new(BackendServiceProps {
            name: "api".to_owned(),
            image: Some("nginx".to_owned()),
            ..Default::default()
        });
        assert_eq!(manifest.config.task_config.count, Some(Count::Basic(1)));
        assert!(manifest.validate().is_ok());
    }
}
