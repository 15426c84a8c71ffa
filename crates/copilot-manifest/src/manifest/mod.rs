//! Workload and environment manifests.
//!
//! A workload manifest consists of a base configuration and a set of per-environment override
//! fragments of the same type:
//!
//! ```yaml
//! name: api
//! type: Backend Service
//! cpu: 256
//! environments:
//!   prod:
//!     cpu: 512
//! ```
//!
//! [`Manifest::apply_env`] resolves the configuration for one environment by merging the
//! matching fragment on top of the base, using the rules of [`Merge`].
//!
//! Manifests are loaded with [`unmarshal_workload`], which dispatches on the `type` key, or
//! [`unmarshal_environment`].
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::{
    config::merge::{Merge, merge},
    validation::{InvalidValueSnafu, Validate, ValidationError, required},
    workload::image::{BuildArgsOrString, Image},
};

mod backend_service;
mod environment;
mod lb_web_service;
mod rd_web_service;
mod scheduled_job;
mod static_site;
mod worker_service;

pub use backend_service::*;
pub use environment::*;
pub use lb_web_service::*;
pub use rd_web_service::*;
pub use scheduled_job::*;
pub use static_site::*;
pub use worker_service::*;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse manifest"))]
    ParseYaml { source: serde_yaml::Error },

    #[snafu(display("manifest does not specify a \"type\""))]
    MissingType,

    #[snafu(display("unknown workload type {workload_type:?}"))]
    UnknownWorkloadType {
        source: strum::ParseError,
        workload_type: String,
    },

    #[snafu(display("failed to unmarshal {workload_type:?} manifest"))]
    DecodeWorkload {
        source: serde_yaml::Error,
        workload_type: String,
    },

    #[snafu(display("failed to unmarshal environment manifest"))]
    DecodeEnvironment { source: serde_yaml::Error },
}

/// The kinds of workload manifests, as written in the `type` key.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
pub enum WorkloadType {
    #[strum(serialize = "Load Balanced Web Service")]
    LoadBalancedWebService,

    #[strum(serialize = "Backend Service")]
    BackendService,

    #[strum(serialize = "Worker Service")]
    WorkerService,

    #[strum(serialize = "Scheduled Job")]
    ScheduledJob,

    #[strum(serialize = "Request-Driven Web Service")]
    RequestDrivenWebService,

    #[strum(serialize = "Static Site")]
    StaticSite,
}

/// The configuration of one kind of workload, which is both the base of a manifest and the
/// shape of each of its environment overrides.
pub trait WorkloadConfig: Merge + Clone + Validate {
    const WORKLOAD_TYPE: WorkloadType;
}

/// A workload manifest with configuration `C`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Manifest<C> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub workload_type: Option<String>,

    #[serde(flatten)]
    pub config: C,

    /// Override fragments by environment name. A `null` entry declares the environment
    /// without overriding anything.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, Option<C>>,
}

impl<C: WorkloadConfig> Manifest<C> {
    /// Creates a manifest of the matching `type`, without any environment overrides.
    pub fn from_config(name: impl Into<String>, config: C) -> Self {
        Self {
            name: Some(name.into()),
            workload_type: Some(C::WORKLOAD_TYPE.to_string()),
            config,
            environments: BTreeMap::new(),
        }
    }

    /// Returns the manifest as deployed to `env_name`.
    ///
    /// The override fragment of `env_name`, if any, is merged on top of the base
    /// configuration. The result has no `environments` left, so it cannot be resolved twice.
    /// `self` is left untouched, and the result shares no state with it.
    pub fn apply_env(&self, env_name: &str) -> Self {
        let config = match self.environments.get(env_name) {
            Some(Some(overrides)) => {
                debug!(
                    name = self.name.as_deref(),
                    env = env_name,
                    "applying environment overrides"
                );
                merge(overrides.clone(), &self.config)
            }
            Some(None) => {
                debug!(
                    name = self.name.as_deref(),
                    env = env_name,
                    "environment declared without overrides"
                );
                self.config.clone()
            }
            None => {
                debug!(
                    name = self.name.as_deref(),
                    env = env_name,
                    "no overrides for environment"
                );
                self.config.clone()
            }
        };

        Self {
            name: self.name.clone(),
            workload_type: self.workload_type.clone(),
            config,
            environments: BTreeMap::new(),
        }
    }
}

impl<C: WorkloadConfig> Validate for Manifest<C> {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", self.name.as_ref())?;
        if let Some(workload_type) = &self.workload_type {
            let expected = C::WORKLOAD_TYPE.to_string();
            if *workload_type != expected {
                return InvalidValueSnafu {
                    field: "type",
                    value: workload_type.as_str(),
                    reason: format!("expected {expected:?}"),
                }
                .fail();
            }
        }
        self.config.validate()
    }
}

/// The image of a freshly scaffolded workload: built from `dockerfile` if given, otherwise
/// pulled from `location`.
fn image_from_props(dockerfile: Option<String>, location: Option<String>) -> Image {
    match dockerfile {
        Some(dockerfile) => Image {
            build: Some(BuildArgsOrString::Basic(dockerfile)),
            ..Default::default()
        },
        None => Image {
            location,
            ..Default::default()
        },
    }
}

/// Any workload manifest, as returned by [`unmarshal_workload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WorkloadManifest {
    LoadBalancedWebService(LoadBalancedWebService),
    BackendService(BackendService),
    WorkerService(WorkerService),
    ScheduledJob(ScheduledJob),
    RequestDrivenWebService(RequestDrivenWebService),
    StaticSite(StaticSite),
}

impl WorkloadManifest {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::LoadBalancedWebService(manifest) => manifest.name.as_deref(),
            Self::BackendService(manifest) => manifest.name.as_deref(),
            Self::WorkerService(manifest) => manifest.name.as_deref(),
            Self::ScheduledJob(manifest) => manifest.name.as_deref(),
            Self::RequestDrivenWebService(manifest) => manifest.name.as_deref(),
            Self::StaticSite(manifest) => manifest.name.as_deref(),
        }
    }

    pub fn workload_type(&self) -> WorkloadType {
        match self {
            Self::LoadBalancedWebService(_) => WorkloadType::LoadBalancedWebService,
            Self::BackendService(_) => WorkloadType::BackendService,
            Self::WorkerService(_) => WorkloadType::WorkerService,
            Self::ScheduledJob(_) => WorkloadType::ScheduledJob,
            Self::RequestDrivenWebService(_) => WorkloadType::RequestDrivenWebService,
            Self::StaticSite(_) => WorkloadType::StaticSite,
        }
    }

    /// Names of the environments this manifest declares overrides for.
    pub fn environment_names(&self) -> Vec<&str> {
        fn keys<C>(manifest: &Manifest<C>) -> Vec<&str> {
            manifest.environments.keys().map(String::as_str).collect()
        }
        match self {
            Self::LoadBalancedWebService(manifest) => keys(manifest),
            Self::BackendService(manifest) => keys(manifest),
            Self::WorkerService(manifest) => keys(manifest),
            Self::ScheduledJob(manifest) => keys(manifest),
            Self::RequestDrivenWebService(manifest) => keys(manifest),
            Self::StaticSite(manifest) => keys(manifest),
        }
    }

    /// See [`Manifest::apply_env`].
    pub fn apply_env(&self, env_name: &str) -> Self {
        match self {
            Self::LoadBalancedWebService(manifest) => {
                Self::LoadBalancedWebService(manifest.apply_env(env_name))
            }
            Self::BackendService(manifest) => Self::BackendService(manifest.apply_env(env_name)),
            Self::WorkerService(manifest) => Self::WorkerService(manifest.apply_env(env_name)),
            Self::ScheduledJob(manifest) => Self::ScheduledJob(manifest.apply_env(env_name)),
            Self::RequestDrivenWebService(manifest) => {
                Self::RequestDrivenWebService(manifest.apply_env(env_name))
            }
            Self::StaticSite(manifest) => Self::StaticSite(manifest.apply_env(env_name)),
        }
    }
}

impl Validate for WorkloadManifest {
    fn validate(&self) -> Result<(), ValidationError> {
        let result = match self {
            Self::LoadBalancedWebService(manifest) => manifest.validate(),
            Self::BackendService(manifest) => manifest.validate(),
            Self::WorkerService(manifest) => manifest.validate(),
            Self::ScheduledJob(manifest) => manifest.validate(),
            Self::RequestDrivenWebService(manifest) => manifest.validate(),
            Self::StaticSite(manifest) => manifest.validate(),
        };
        if let Err(error) = &result {
            debug!(name = self.name(), %error, "manifest failed validation");
        }
        result
    }
}

#[derive(Deserialize)]
struct TypeProbe {
    #[serde(rename = "type")]
    workload_type: Option<String>,
}

/// Decodes a workload manifest into the type named by its `type` key.
#[instrument(skip_all)]
pub fn unmarshal_workload(input: &[u8]) -> Result<WorkloadManifest> {
    let value: serde_yaml::Value = serde_yaml::from_slice(input).context(ParseYamlSnafu)?;
    let TypeProbe { workload_type } =
        serde_yaml::from_value(value.clone()).context(ParseYamlSnafu)?;
    let workload_type = workload_type.context(MissingTypeSnafu)?;
    let kind = workload_type
        .parse::<WorkloadType>()
        .context(UnknownWorkloadTypeSnafu {
            workload_type: workload_type.as_str(),
        })?;
    debug!(%kind, "decoding workload manifest");

    let decode_context = DecodeWorkloadSnafu {
        workload_type: workload_type.as_str(),
    };
    let manifest = match kind {
        WorkloadType::LoadBalancedWebService => {
            WorkloadManifest::LoadBalancedWebService(serde_yaml::from_value(value).context(decode_context)?)
        }
        WorkloadType::BackendService => {
            WorkloadManifest::BackendService(serde_yaml::from_value(value).context(decode_context)?)
        }
        WorkloadType::WorkerService => {
            WorkloadManifest::WorkerService(serde_yaml::from_value(value).context(decode_context)?)
        }
        WorkloadType::ScheduledJob => {
            WorkloadManifest::ScheduledJob(serde_yaml::from_value(value).context(decode_context)?)
        }
        WorkloadType::RequestDrivenWebService => WorkloadManifest::RequestDrivenWebService(
            serde_yaml::from_value(value).context(decode_context)?,
        ),
        WorkloadType::StaticSite => {
            WorkloadManifest::StaticSite(serde_yaml::from_value(value).context(decode_context)?)
        }
    };
    Ok(manifest)
}

/// Decodes an environment manifest.
#[instrument(skip_all)]
pub fn unmarshal_environment(input: &[u8]) -> Result<Environment> {
    serde_yaml::from_slice(input).context(DecodeEnvironmentSnafu)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn dispatch_on_type() {
        let manifest = unmarshal_workload(indoc! {b"
            name: api
            type: Backend Service
            image:
              location: nginx
              port: 80
        "})
        .unwrap();

        assert_eq!(manifest.workload_type(), WorkloadType::BackendService);
        assert_eq!(manifest.name(), Some("api"));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn missing_and_unknown_type() {
        let err = unmarshal_workload(b"name: api\n").unwrap_err();
        assert!(matches!(err, Error::MissingType), "unexpected error: {err}");

        let err = unmarshal_workload(b"name: api\ntype: Lambda Function\n").unwrap_err();
        assert_eq!(err.to_string(), r#"unknown workload type "Lambda Function""#);
    }

    #[test]
    fn decode_error_names_type() {
        let err = unmarshal_workload(indoc! {b"
            name: api
            type: Load Balanced Web Service
            http: {}
        "})
        .unwrap_err();
        assert!(
            matches!(err, Error::DecodeWorkload { .. }),
            "unexpected error: {err}"
        );
        assert_eq!(
            err.to_string(),
            r#"failed to unmarshal "Load Balanced Web Service" manifest"#
        );
    }

    #[test]
    fn type_must_match_config() {
        let mut manifest = BackendService::from_config("api", BackendServiceConfig::default());
        manifest.workload_type = Some("Worker Service".to_owned());
        assert_eq!(
            manifest.validate().unwrap_err().to_string(),
            r#""type" value "Worker Service" is invalid: expected "Backend Service""#
        );
    }
}
