use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    manifest::{Manifest, WorkloadConfig, WorkloadType},
    validation::{
        ConflictSnafu, FieldSnafu, NotOneOfSnafu, Validate, ValidationError, mutually_exclusive,
        one_of, required, validate_map,
    },
    workload::{
        deserialize_scalar_map,
        http::HealthCheckArgsOrString,
        image::ImageWithPort,
        network::NetworkConfig,
        observability::Observability,
        publish::PublishConfig,
        task::{Architecture, PlatformArgsOrString},
        variables::{Secret, Variable, deserialize_variables},
    },
};

pub type RequestDrivenWebService = Manifest<RequestDrivenWebServiceConfig>;

/// `true` for a private service reachable through a new VPC endpoint, or the endpoint to use.
pub type PrivateBoolOrEndpoint = Union<bool, VpcEndpoint>;

const APP_RUNNER_CPU: &[i64] = &[256, 512, 1024, 2048, 4096];
const APP_RUNNER_MEMORY: &[i64] = &[512, 1024, 2048, 3072, 4096, 6144, 8192, 10240, 12288];

/// Platforms App Runner can run.
#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum AppRunnerPlatform {
    #[strum(serialize = "linux/amd64")]
    LinuxAmd64,
    #[strum(serialize = "linux/x86_64")]
    LinuxX86_64,
}

/// A web service hosted on AWS App Runner.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct RequestDrivenWebServiceConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub image: ImageWithPort,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub http: RequestDrivenWebServiceHttpConfig,
    #[serde(flatten)]
    pub instance: AppRunnerInstanceConfig,
    #[serde(
        default,
        deserialize_with = "deserialize_variables",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub publish: PublishConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub network: NetworkConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub observability: Observability,
}

impl WorkloadConfig for RequestDrivenWebServiceConfig {
    const WORKLOAD_TYPE: WorkloadType = WorkloadType::RequestDrivenWebService;
}

impl Validate for RequestDrivenWebServiceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.image
            .validate()
            .context(FieldSnafu { field: "image" })?;
        self.http.validate().context(FieldSnafu { field: "http" })?;
        self.instance.validate()?;
        validate_map("variables", &self.variables)?;
        validate_map("secrets", &self.secrets)?;
        self.publish
            .validate()
            .context(FieldSnafu { field: "publish" })?;
        validate_network(&self.network).context(FieldSnafu { field: "network" })?;
        self.observability
            .validate()
            .context(FieldSnafu {
                field: "observability",
            })
    }
}

/// App Runner only joins a VPC through private subnets, and has no Service Connect.
fn validate_network(network: &NetworkConfig) -> Result<(), ValidationError> {
    if network.connect.is_some() {
        return ConflictSnafu {
            field: "connect",
            other: "type",
            reason: format!("{:?}", WorkloadType::RequestDrivenWebService.to_string()),
        }
        .fail();
    }
    network
        .vpc
        .validate()
        .context(FieldSnafu { field: "vpc" })?;
    if network.vpc.placement.is_some() && !network.vpc.is_private() {
        return NotOneOfSnafu {
            field: "vpc.placement",
            value: "public",
            allowed: vec!["private".to_owned()],
        }
        .fail();
    }
    Ok(())
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct RequestDrivenWebServiceHttpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheckArgsOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<PrivateBoolOrEndpoint>,
}

impl RequestDrivenWebServiceHttpConfig {
    pub fn is_private(&self) -> bool {
        match &self.private {
            Some(Union::Basic(private)) => *private,
            Some(Union::Advanced(_)) => true,
            None => false,
        }
    }
}

impl Validate for RequestDrivenWebServiceHttpConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.healthcheck
            .validate()
            .context(FieldSnafu {
                field: "healthcheck",
            })?;
        mutually_exclusive(
            ("private", self.is_private()),
            ("alias", self.alias.is_some()),
        )?;
        self.private
            .validate()
            .context(FieldSnafu { field: "private" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct VpcEndpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Validate for VpcEndpoint {
    fn validate(&self) -> Result<(), ValidationError> {
        required("endpoint", self.endpoint.as_ref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct AppRunnerInstanceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformArgsOrString>,
}

impl Validate for AppRunnerInstanceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(cpu) = self.cpu {
            app_runner_size("cpu", cpu, APP_RUNNER_CPU)?;
        }
        if let Some(memory) = self.memory {
            app_runner_size("memory", memory, APP_RUNNER_MEMORY)?;
        }
        match &self.platform {
            Some(Union::Basic(platform)) => one_of::<AppRunnerPlatform>("platform", platform),
            Some(Union::Advanced(args)) => {
                args.validate()
                    .context(FieldSnafu { field: "platform" })?;
                if let Some(osfamily) = args.osfamily.as_deref().filter(|os| *os != "linux") {
                    return NotOneOfSnafu {
                        field: "platform.osfamily",
                        value: osfamily,
                        allowed: vec!["linux".to_owned()],
                    }
                    .fail();
                }
                match args.architecture.as_deref() {
                    Some(arch) if arch != Architecture::X86_64.to_string() => NotOneOfSnafu {
                        field: "platform.architecture",
                        value: arch,
                        allowed: vec![Architecture::X86_64.to_string()],
                    }
                    .fail(),
                    _ => Ok(()),
                }
            }
            None => Ok(()),
        }
    }
}

fn app_runner_size(field: &str, value: i64, allowed: &[i64]) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    NotOneOfSnafu {
        field,
        value: value.to_string(),
        allowed: allowed.iter().map(i64::to_string).collect::<Vec<_>>(),
    }
    .fail()
}

#[derive(Clone, Debug, Default)]
pub struct RequestDrivenWebServiceProps {
    pub name: String,
    pub dockerfile: Option<String>,
    pub image: Option<String>,
    pub port: u16,
}

impl Manifest<RequestDrivenWebServiceConfig> {
    /// Creates a manifest with the defaults of a new App Runner service: 1 vCPU and 2 GiB.
    pub fn new(props: RequestDrivenWebServiceProps) -> Self {
        let config = RequestDrivenWebServiceConfig {
            image: ImageWithPort {
                image: super::image_from_props(props.dockerfile, props.image),
                port: Some(props.port),
            },
            instance: AppRunnerInstanceConfig {
                cpu: Some(1024),
                memory: Some(2048),
                platform: None,
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
    fn decode_and_override() {
        let manifest: RequestDrivenWebService = serde_yaml::from_str(indoc! {"
            name: web
            type: Request-Driven Web Service
            image:
              location: public.ecr.aws/nginx/nginx
              port: 80
            http:
              healthcheck: /health
            cpu: 1024
            memory: 2048
            variables:
              PORT: 80
            environments:
              prod:
                memory: 4096
                http:
                  private: true
        "})
        .unwrap();
        assert_eq!(manifest.config.variables["PORT"], Variable::Basic("80".to_owned()));
        assert!(manifest.validate().is_ok());

        let prod = manifest.apply_env("prod");
        assert_eq!(prod.config.instance.cpu, Some(1024));
        assert_eq!(prod.config.instance.memory, Some(4096));
        assert!(prod.config.http.is_private());
        assert_eq!(
            prod.config.http.healthcheck,
            Some(Union::Basic("/health".to_owned()))
        );
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn private_service_cannot_have_alias() {
        let http = RequestDrivenWebServiceHttpConfig {
            alias: Some("web.example.com".to_owned()),
            private: Some(Union::Advanced(VpcEndpoint {
                endpoint: Some("vpce-1234".to_owned()),
            })),
            ..Default::default()
        };
        assert_eq!(
            http.validate().unwrap_err().to_string(),
            r#"must specify one, not both, of "private" and "alias""#
        );
    }

    #[rstest]
    #[case(Some(1024), Some(2048), None, true)]
    #[case(Some(300), None, None, false)]
    #[case(None, Some(2500), None, false)]
    #[case(None, None, Some("linux/x86_64"), true)]
    #[case(None, None, Some("linux/arm64"), false)]
    fn instance_sizes(
        #[case] cpu: Option<i64>,
        #[case] memory: Option<i64>,
        #[case] platform: Option<&str>,
        #[case] valid: bool,
    ) {
        let instance = AppRunnerInstanceConfig {
            cpu,
            memory,
            platform: platform.map(|platform| Union::Basic(platform.to_owned())),
        };
        assert_eq!(instance.validate().is_ok(), valid);
    }

    #[test]
    fn cpu_error_lists_allowed_sizes() {
        let instance = AppRunnerInstanceConfig {
            cpu: Some(300),
            ..Default::default()
        };
        assert_eq!(
            instance.validate().unwrap_err().to_string(),
            r#""cpu" value "300" must be one of "256", "512", "1024", "2048", "4096""#
        );
    }

    #[test]
    fn only_private_placement() {
        let network: NetworkConfig = serde_yaml::from_str(indoc! {"
            vpc:
              placement: public
        "})
        .unwrap();
        assert_eq!(
            validate_network(&network).unwrap_err().to_string(),
            r#""vpc.placement" value "public" must be one of "private""#
        );
    }

    #[test]
    fn scaffolded_manifest_is_valid() {
        let manifest = RequestDrivenWebService::new(RequestDrivenWebServiceProps {
            name: "web".to_owned(),
            image: Some("nginx".to_owned()),
            port: 80,
            ..Default::default()
        });
        assert!(manifest.validate().is_ok());
    }
}
