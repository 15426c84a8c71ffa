use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    manifest::{Manifest, WorkloadConfig, WorkloadType},
    validation::{
        FieldSnafu, RequiredBySnafu, Validate, ValidationError, at_least_one, validate_map,
    },
    workload::{
        deserialize_scalar_map,
        count::Count,
        deployment::DeploymentConfig,
        http::{RoutingRuleConfigOrBool, RoutingRuleConfiguration},
        image::{ImageOverride, ImageWithPort, ImageWithPortAndHealthcheck},
        logging::Logging,
        network::{NetworkConfig, VpcConfig},
        nlb::NetworkLoadBalancerConfiguration,
        observability::Observability,
        publish::PublishConfig,
        sidecar::SidecarConfig,
        task::{ExecuteCommand, TaskConfig},
    },
};

pub type LoadBalancedWebService = Manifest<LoadBalancedWebServiceConfig>;

/// An internet-facing service behind an Application and/or Network Load Balancer.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct LoadBalancedWebServiceConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub image: ImageWithPortAndHealthcheck,
    #[serde(flatten)]
    pub image_override: ImageOverride,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<RoutingRuleConfigOrBool>,
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
    pub nlb: NetworkLoadBalancerConfiguration,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub observability: Observability,
}

impl LoadBalancedWebServiceConfig {
    pub fn is_http_enabled(&self) -> bool {
        self.http.as_ref().is_some_and(RoutingRuleConfigOrBool::is_enabled)
    }
}

impl WorkloadConfig for LoadBalancedWebServiceConfig {
    const WORKLOAD_TYPE: WorkloadType = WorkloadType::LoadBalancedWebService;
}

impl Validate for LoadBalancedWebServiceConfig {
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
        self.nlb.validate().context(FieldSnafu { field: "nlb" })?;
        self.observability
            .validate()
            .context(FieldSnafu {
                field: "observability",
            })?;

        at_least_one(&[
            ("http", self.is_http_enabled()),
            ("nlb", self.nlb.is_enabled()),
        ])?;
        if self.is_http_enabled() && self.image.port().is_none() {
            return RequiredBySnafu {
                field: "image.port",
                other: "http",
            }
            .fail();
        }
        Ok(())
    }
}

/// The minimal inputs needed to scaffold a [`LoadBalancedWebService`].
#[derive(Clone, Debug, Default)]
pub struct LoadBalancedWebServiceProps {
    pub name: String,
    pub dockerfile: Option<String>,
    pub image: Option<String>,
    pub port: u16,
    pub path: String,
}

impl Manifest<LoadBalancedWebServiceConfig> {
    /// Creates a manifest with the defaults of a new service: 0.25 vCPU, 512 MiB, one task,
    /// ECS Exec turned off and tasks in public subnets.
    pub fn new(props: LoadBalancedWebServiceProps) -> Self {
        let config = LoadBalancedWebServiceConfig {
            image: ImageWithPortAndHealthcheck {
                image_with_port: ImageWithPort {
                    image: super::image_from_props(props.dockerfile, props.image),
                    port: Some(props.port),
                },
                ..Default::default()
            },
            http: Some(Union::Advanced(RoutingRuleConfiguration {
                path: Some(props.path),
                ..Default::default()
            })),
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
    use crate::{manifest::unmarshal_workload, workload::variables::Variable};

    const MANIFEST: &str = indoc! {"
        name: frontend
        type: Load Balanced Web Service
        image:
          build: ./frontend/Dockerfile
          port: 8080
        http:
          path: /
          healthcheck: /_healthz
        cpu: 256
        memory: 512
        count: 1
        exec: true
        variables:
          LOG_LEVEL: info
        environments:
          test:
          prod:
            cpu: 1024
            count:
              range: 2-10
              cpu_percentage: 70
            http:
              alias: example.com
            variables:
              LOG_LEVEL: warn
    "};

    fn decode() -> LoadBalancedWebService {
        serde_yaml::from_str(MANIFEST).unwrap()
    }

    #[test]
    fn decode_manifest() {
        let manifest = decode();
        assert_eq!(manifest.name.as_deref(), Some("frontend"));
        assert_eq!(manifest.config.image.port(), Some(8080));
        assert_eq!(manifest.config.task_config.cpu, Some(256));
        assert_eq!(manifest.environments.len(), 2);
        assert_eq!(manifest.environments["test"], None);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn apply_prod_overrides() {
        let manifest = decode();
        let prod = manifest.apply_env("prod");

        assert!(prod.environments.is_empty());
        assert_eq!(prod.config.task_config.cpu, Some(1024));
        assert_eq!(prod.config.task_config.memory, Some(512));
        assert!(prod.config.task_config.count.as_ref().is_some_and(Union::is_advanced));
        assert_eq!(
            prod.config.task_config.variables["LOG_LEVEL"],
            Variable::Basic("warn".to_owned())
        );

        let Some(Union::Advanced(http)) = &prod.config.http else {
            panic!("expected http rules, got {:?}", prod.config.http);
        };
        assert_eq!(http.path.as_deref(), Some("/"));
        assert_eq!(http.alias, Some(Union::Basic("example.com".to_owned())));
        assert_eq!(http.healthcheck, Some(Union::Basic("/_healthz".to_owned())));
        assert!(prod.validate().is_ok());

        assert_eq!(manifest, decode(), "apply_env must not modify the manifest");
    }

    #[test]
    fn declared_environment_without_overrides() {
        let manifest = decode();
        let test = manifest.apply_env("test");
        assert_eq!(test.config, manifest.config);
        assert!(test.environments.is_empty());
    }

    #[test]
    fn needs_http_or_nlb() {
        let manifest = unmarshal_workload(indoc! {b"
            name: frontend
            type: Load Balanced Web Service
            image:
              location: nginx
              port: 80
            http: false
        "})
        .unwrap();
        assert_eq!(
            manifest.validate().unwrap_err().to_string(),
            r#"must specify at least one of "http", "nlb""#
        );
    }

    #[test]
    fn nlb_only_service() {
        let manifest: LoadBalancedWebService = serde_yaml::from_str(indoc! {"
            name: game
            type: Load Balanced Web Service
            image:
              location: game-server
            http: false
            nlb:
              port: 7777/udp
        "})
        .unwrap();
        assert!(manifest.config.nlb.is_enabled());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn http_requires_a_port() {
        let mut manifest = decode();
        manifest.config.image.image_with_port.port = None;
        assert_eq!(
            manifest.validate().unwrap_err().to_string(),
            r#""image.port" must be specified when "http" is configured"#
        );
    }

    #[test]
    fn scaffolded_manifest_is_valid() {
        let manifest = LoadBalancedWebService::new(LoadBalancedWebServiceProps {
            name: "frontend".to_owned(),
            dockerfile: Some("./Dockerfile".to_owned()),
            port: 80,
            path: "/".to_owned(),
            ..Default::default()
        });
        assert_eq!(
            manifest.workload_type.as_deref(),
            Some("Load Balanced Web Service")
        );
        assert!(manifest.validate().is_ok());
    }
}
