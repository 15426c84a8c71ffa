//! The environment manifest, which describes the shared infrastructure that workloads are
//! deployed into.
//!
//! Unlike workload manifests, environment manifests carry no per-environment overrides.
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{union::Union, zero::IsZero},
    validation::{
        FieldSnafu, InvalidValueSnafu, RequiredBySnafu, Validate, ValidationError, arn, at_least_one,
        cidr, in_range, mutually_exclusive, required,
    },
};

pub const ENVIRONMENT_TYPE: &str = "Environment";

/// CloudFront only accepts certificates from this region.
const CDN_CERTIFICATE_REGION: &str = "us-east-1";

/// `true` to enable VPC flow logs with defaults, or their settings.
pub type FlowLogsBoolOrArgs = Union<bool, VpcFlowLogsArgs>;

/// `true` to store load balancer access logs in a new bucket, or the bucket to use.
pub type AccessLogsBoolOrArgs = Union<bool, ElbAccessLogsArgs>;

/// `true` for a CloudFront distribution with defaults, or its settings.
pub type CdnBoolOrConfig = Union<bool, AdvancedCdnConfig>;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Environment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub environment_type: Option<String>,

    #[serde(flatten)]
    pub config: EnvironmentConfig,
}

impl Validate for Environment {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", self.name.as_ref())?;
        if let Some(environment_type) = self
            .environment_type
            .as_deref()
            .filter(|environment_type| *environment_type != ENVIRONMENT_TYPE)
        {
            return InvalidValueSnafu {
                field: "type",
                value: environment_type,
                reason: format!("expected {ENVIRONMENT_TYPE:?}"),
            }
            .fail();
        }
        self.config.validate()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub network: EnvironmentNetworkConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn: Option<CdnBoolOrConfig>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub http: EnvironmentHttpConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub observability: EnvironmentObservability,
}

impl EnvironmentConfig {
    pub fn is_cdn_enabled(&self) -> bool {
        match &self.cdn {
            Some(Union::Basic(enabled)) => *enabled,
            Some(Union::Advanced(_)) => true,
            None => false,
        }
    }
}

impl Validate for EnvironmentConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.network
            .validate()
            .context(FieldSnafu { field: "network" })?;
        self.cdn.validate().context(FieldSnafu { field: "cdn" })?;
        self.http.validate().context(FieldSnafu { field: "http" })?;

        if self.http.public.ingress.cdn == Some(true) && !self.is_cdn_enabled() {
            return RequiredBySnafu {
                field: "cdn",
                other: "http.public.ingress.cdn",
            }
            .fail();
        }
        let cdn_certificate = self
            .cdn
            .as_ref()
            .and_then(Union::advanced)
            .is_some_and(|cdn| cdn.certificate.is_some());
        if cdn_certificate && self.http.public.certificates.is_none() {
            return RequiredBySnafu {
                field: "http.public.certificates",
                other: "cdn.certificate",
            }
            .fail();
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct EnvironmentNetworkConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub vpc: EnvironmentVpcConfig,
}

impl Validate for EnvironmentNetworkConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.vpc.validate().context(FieldSnafu { field: "vpc" })
    }
}

/// Either an imported VPC (`id`) or the settings of the VPC to create (`cidr`).
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct EnvironmentVpcConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub subnets: SubnetsConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_logs: Option<FlowLogsBoolOrArgs>,
}

impl EnvironmentVpcConfig {
    pub fn is_imported(&self) -> bool {
        self.id.is_some()
    }
}

impl Validate for EnvironmentVpcConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        mutually_exclusive(("id", self.id.is_some()), ("cidr", self.cidr.is_some()))?;
        if let Some(block) = &self.cidr {
            cidr("cidr", block)?;
        }
        self.subnets
            .validate()
            .context(FieldSnafu { field: "subnets" })?;

        let subnets = self.subnets.iter();
        if self.is_imported() {
            // Imported subnets are referenced by ID only.
            for (field, subnet) in subnets {
                required("id", subnet.id.as_ref())
                    .context(FieldSnafu { field })
                    .context(FieldSnafu { field: "subnets" })?;
            }
        } else if !self.subnets.is_zero() {
            for (field, subnet) in subnets {
                required("cidr", subnet.cidr.as_ref())
                    .context(FieldSnafu { field })
                    .context(FieldSnafu { field: "subnets" })?;
            }
        }
        self.flow_logs
            .validate()
            .context(FieldSnafu { field: "flow_logs" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct SubnetsConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<Vec<SubnetConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<Vec<SubnetConfiguration>>,
}

impl SubnetsConfiguration {
    /// All subnets along with their `public[i]`/`private[i]` names.
    fn iter(&self) -> impl Iterator<Item = (String, &SubnetConfiguration)> {
        named_subnets("public", self.public.as_deref())
            .chain(named_subnets("private", self.private.as_deref()))
    }
}

fn named_subnets<'a>(
    kind: &'static str,
    subnets: Option<&'a [SubnetConfiguration]>,
) -> impl Iterator<Item = (String, &'a SubnetConfiguration)> {
    subnets
        .into_iter()
        .flatten()
        .enumerate()
        .map(move |(index, subnet)| (format!("{kind}[{index}]"), subnet))
}

impl Validate for SubnetsConfiguration {
    fn validate(&self) -> Result<(), ValidationError> {
        for (field, subnet) in self.iter() {
            subnet.validate().context(FieldSnafu { field })?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct SubnetConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub az: Option<String>,
}

impl Validate for SubnetConfiguration {
    fn validate(&self) -> Result<(), ValidationError> {
        mutually_exclusive(("id", self.id.is_some()), ("cidr", self.cidr.is_some()))?;
        at_least_one(&[("id", self.id.is_some()), ("cidr", self.cidr.is_some())])?;
        match &self.cidr {
            Some(block) => cidr("cidr", block),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct VpcFlowLogsArgs {
    /// Days to keep the logs for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<i64>,
}

impl Validate for VpcFlowLogsArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.retention {
            Some(retention) => in_range("retention", retention, 1, 3653),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct EnvironmentHttpConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub public: PublicHttpConfig,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub private: PrivateHttpConfig,
}

impl Validate for EnvironmentHttpConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.public
            .validate()
            .context(FieldSnafu { field: "public" })?;
        self.private
            .validate()
            .context(FieldSnafu { field: "private" })
    }
}

/// The internet-facing Application Load Balancer shared by the environment.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct PublicHttpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_logs: Option<AccessLogsBoolOrArgs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub ingress: RestrictiveIngress,
}

impl Validate for PublicHttpConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_certificates(self.certificates.as_deref())?;
        self.access_logs
            .validate()
            .context(FieldSnafu {
                field: "access_logs",
            })?;
        self.ingress
            .validate()
            .context(FieldSnafu { field: "ingress" })
    }
}

/// The internal Application Load Balancer shared by the environment.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct PrivateHttpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub ingress: RelaxedIngress,
}

impl Validate for PrivateHttpConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_certificates(self.certificates.as_deref())
    }
}

fn validate_certificates(certificates: Option<&[String]>) -> Result<(), ValidationError> {
    for (index, certificate) in certificates.into_iter().flatten().enumerate() {
        arn(&format!("certificates[{index}]"), certificate)?;
    }
    Ok(())
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct ElbAccessLogsArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl Validate for ElbAccessLogsArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.prefix.is_some() && self.bucket_name.is_none() {
            return RequiredBySnafu {
                field: "bucket_name",
                other: "prefix",
            }
            .fail();
        }
        Ok(())
    }
}

/// Limits who can reach the public load balancer.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct RestrictiveIngress {
    /// Only accept traffic from CloudFront.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ips: Option<Vec<String>>,
}

impl Validate for RestrictiveIngress {
    fn validate(&self) -> Result<(), ValidationError> {
        for ip in self.source_ips.iter().flatten() {
            cidr("source_ips", ip)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct RelaxedIngress {
    /// Also accept traffic from the whole VPC rather than from workloads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct AdvancedCdnConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_tls: Option<bool>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub static_assets: CdnStaticConfig,
}

impl Validate for AdvancedCdnConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(certificate) = &self.certificate {
            arn("certificate", certificate)?;
            let region = certificate.split(':').nth(3).unwrap_or_default();
            if region != CDN_CERTIFICATE_REGION {
                return InvalidValueSnafu {
                    field: "certificate",
                    value: certificate.as_str(),
                    reason: format!("must be in region {CDN_CERTIFICATE_REGION}"),
                }
                .fail();
            }
        }
        self.static_assets
            .validate()
            .context(FieldSnafu {
                field: "static_assets",
            })
    }
}

/// An S3 bucket served by CloudFront under `path`.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct CdnStaticConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Validate for CdnStaticConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_zero() {
            return Ok(());
        }
        required("location", self.location.as_ref())?;
        required("alias", self.alias.as_ref())?;
        required("path", self.path.as_ref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
pub struct EnvironmentObservability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_insights: Option<bool>,
}
