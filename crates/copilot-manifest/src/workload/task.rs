use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    validation::{
        FieldSnafu, InvalidValueSnafu, Validate, ValidationError, in_range, one_of, required,
        validate_map,
    },
    workload::{
        count::Count,
        storage::Storage,
        variables::{Secret, Variable, deserialize_variables},
    },
};

/// An `os/arch` string, or the operating system family and architecture spelled out.
pub type PlatformArgsOrString = Union<String, PlatformArgs>;

/// `true` to enable ECS Exec, or the block form of the same switch.
pub type ExecuteCommand = Union<bool, ExecuteCommandConfig>;

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum Platform {
    #[strum(serialize = "linux/amd64")]
    LinuxAmd64,
    #[strum(serialize = "linux/x86_64")]
    LinuxX86_64,
    #[strum(serialize = "linux/arm")]
    LinuxArm,
    #[strum(serialize = "linux/arm64")]
    LinuxArm64,
    #[strum(serialize = "windows/amd64")]
    WindowsAmd64,
    #[strum(serialize = "windows/x86_64")]
    WindowsX86_64,
}

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum OsFamily {
    #[strum(serialize = "linux")]
    Linux,
    #[strum(serialize = "windows_server_2019_core")]
    WindowsServer2019Core,
    #[strum(serialize = "windows_server_2019_full")]
    WindowsServer2019Full,
    #[strum(serialize = "windows_server_2022_core")]
    WindowsServer2022Core,
    #[strum(serialize = "windows_server_2022_full")]
    WindowsServer2022Full,
}

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum Architecture {
    #[strum(serialize = "x86_64")]
    X86_64,
    #[strum(serialize = "arm64")]
    Arm64,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct PlatformArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osfamily: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

impl Validate for PlatformArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        required("osfamily", self.osfamily.as_ref())?;
        required("architecture", self.architecture.as_ref())?;
        if let Some(osfamily) = &self.osfamily {
            one_of::<OsFamily>("osfamily", osfamily)?;
        }
        if let Some(architecture) = &self.architecture {
            one_of::<Architecture>("architecture", architecture)?;
        }
        Ok(())
    }
}

impl Union<String, PlatformArgs> {
    /// Validates the `os/arch` shorthand against the supported platforms.
    pub fn validate_platform(&self) -> Result<(), ValidationError> {
        match self {
            Self::Basic(platform) => one_of::<Platform>("platform", platform),
            Self::Advanced(args) => args.validate(),
        }
    }

    pub fn is_windows(&self) -> bool {
        match self {
            Self::Basic(platform) => platform.starts_with("windows"),
            Self::Advanced(args) => args
                .osfamily
                .as_deref()
                .is_some_and(|osfamily| osfamily.starts_with("windows")),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ExecuteCommandConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
}

impl Validate for ExecuteCommandConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Resources and runtime settings of the ECS task, shared by every container-based workload.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct TaskConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformArgsOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecuteCommand>,
    #[serde(
        default,
        deserialize_with = "deserialize_variables",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub variables: BTreeMap<String, Variable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, Secret>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub storage: Storage,
}

const MIN_WINDOWS_CPU: i64 = 1024;
const MIN_WINDOWS_MEMORY: i64 = 2048;

impl TaskConfig {
    pub fn is_windows(&self) -> bool {
        self.platform
            .as_ref()
            .is_some_and(PlatformArgsOrString::is_windows)
    }

    pub fn is_exec_enabled(&self) -> bool {
        match &self.exec {
            Some(Union::Basic(enabled)) => *enabled,
            Some(Union::Advanced(config)) => config.enable.unwrap_or(true),
            None => false,
        }
    }
}

impl Validate for TaskConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(cpu) = self.cpu {
            in_range("cpu", cpu, 1, i64::MAX)?;
        }
        if let Some(memory) = self.memory {
            in_range("memory", memory, 1, i64::MAX)?;
        }
        if let Some(platform) = &self.platform {
            platform
                .validate_platform()
                .context(FieldSnafu { field: "platform" })?;
        }
        if self.is_windows() {
            if let Some(cpu) = self.cpu.filter(|cpu| *cpu < MIN_WINDOWS_CPU) {
                return InvalidValueSnafu {
                    field: "cpu",
                    value: cpu.to_string(),
                    reason: format!("windows tasks need at least {MIN_WINDOWS_CPU} CPU units"),
                }
                .fail();
            }
            if let Some(memory) = self.memory.filter(|memory| *memory < MIN_WINDOWS_MEMORY) {
                return InvalidValueSnafu {
                    field: "memory",
                    value: memory.to_string(),
                    reason: format!("windows tasks need at least {MIN_WINDOWS_MEMORY} MiB"),
                }
                .fail();
            }
        }
        self.count
            .validate()
            .context(FieldSnafu { field: "count" })?;
        self.exec.validate().context(FieldSnafu { field: "exec" })?;
        validate_map("variables", &self.variables)?;
        validate_map("secrets", &self.secrets)?;
        self.storage
            .validate()
            .context(FieldSnafu { field: "storage" })
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{config::merge::merge, workload::storage::Volume};

    #[test]
    fn decode_task() {
        let task: TaskConfig = serde_yaml::from_str(indoc! {"
            cpu: 256
            memory: 512
            platform: linux/arm64
            count: 1
            exec: true
            variables:
              LOG_LEVEL: info
        "})
        .unwrap();

        assert_eq!(task.cpu, Some(256));
        assert_eq!(
            task.platform,
            Some(Union::Basic("linux/arm64".to_owned()))
        );
        assert_eq!(task.count, Some(Count::Basic(1)));
        assert!(task.is_exec_enabled());
        assert!(task.validate().is_ok());
    }

    #[rstest]
    #[case("linux/amd64", true)]
    #[case("windows/x86_64", true)]
    #[case("darwin/arm64", false)]
    fn platform_strings(#[case] platform: &str, #[case] valid: bool) {
        let platform = PlatformArgsOrString::Basic(platform.to_owned());
        assert_eq!(platform.validate_platform().is_ok(), valid);
    }

    #[test]
    fn platform_block_needs_both_fields() {
        let platform = PlatformArgsOrString::Advanced(PlatformArgs {
            osfamily: Some("linux".to_owned()),
            architecture: None,
        });
        assert_eq!(
            platform.validate_platform().unwrap_err().to_string(),
            r#""architecture" must be specified"#
        );
    }

    #[test]
    fn windows_needs_larger_tasks() {
        let task = TaskConfig {
            cpu: Some(256),
            platform: Some(Union::Basic("windows/amd64".to_owned())),
            ..Default::default()
        };
        assert!(task.is_windows());
        assert!(task.validate().is_err());
    }

    #[test]
    fn storage_errors_are_prefixed() {
        let task = TaskConfig {
            storage: Storage {
                volumes: BTreeMap::from([("foo".to_owned(), Some(Volume::default()))]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            task.validate().unwrap_err().to_string(),
            r#"validate "storage": validate "volumes[foo]": "path" must be specified"#
        );
    }

    #[test]
    fn explicit_zero_values_override() {
        let base = TaskConfig {
            cpu: Some(256),
            exec: Some(Union::Basic(true)),
            ..Default::default()
        };
        let overrides = TaskConfig {
            cpu: Some(0),
            exec: Some(Union::Basic(false)),
            ..Default::default()
        };

        let merged = merge(overrides, &base);
        assert_eq!(merged.cpu, Some(0));
        assert!(!merged.is_exec_enabled());
    }
}
