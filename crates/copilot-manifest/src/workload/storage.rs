use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    validation::{
        ConflictSnafu, FieldSnafu, InvalidValueSnafu, Validate, ValidationError, in_range,
        mutually_exclusive, required, validate_map,
    },
};

/// `true` for a managed filesystem, or the configuration of an existing or managed one.
pub type EfsConfigOrBool = Union<bool, EfsVolumeConfiguration>;

/// Ephemeral storage and volumes attached to the task.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Storage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly_fs: Option<bool>,
    /// Volumes by name. A volume may be declared without a body (`data: ~`) and filled in by
    /// an environment override.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Option<Volume>>,
}

impl Validate for Storage {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ephemeral) = self.ephemeral {
            in_range("ephemeral", ephemeral, 20, 200)?;
        }
        validate_map("volumes", &self.volumes)?;

        let managed = self
            .volumes
            .values()
            .flatten()
            .filter(|volume| volume.is_managed_efs())
            .count();
        if managed > 1 {
            return InvalidValueSnafu {
                field: "volumes",
                value: managed.to_string(),
                reason: "at most one volume can use a managed EFS filesystem",
            }
            .fail();
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct Volume {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efs: Option<EfsConfigOrBool>,
    #[serde(flatten)]
    pub mount_point: MountPointOpts,
}

impl Volume {
    /// Whether the volume asks for a filesystem created alongside the service.
    pub fn is_managed_efs(&self) -> bool {
        match &self.efs {
            Some(Union::Basic(enabled)) => *enabled,
            Some(Union::Advanced(config)) => config.is_managed(),
            None => false,
        }
    }
}

impl Validate for Volume {
    fn validate(&self) -> Result<(), ValidationError> {
        self.mount_point.validate()?;
        self.efs.validate().context(FieldSnafu { field: "efs" })
    }
}

/// Where and how a volume is mounted into a container.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct MountPointOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl Validate for MountPointOpts {
    fn validate(&self) -> Result<(), ValidationError> {
        required("path", self.path.as_ref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct EfsVolumeConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub auth: AuthorizationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

impl EfsVolumeConfiguration {
    pub fn is_managed(&self) -> bool {
        self.uid.is_some() || self.gid.is_some()
    }
}

impl Validate for EfsVolumeConfiguration {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.uid.is_some() != self.gid.is_some() {
            let missing = if self.uid.is_some() { "gid" } else { "uid" };
            return required(missing, None::<&u32>);
        }
        if self.is_managed() {
            mutually_exclusive(("uid", true), ("id", self.id.is_some()))?;
            mutually_exclusive(("uid", true), ("root_dir", self.root_dir.is_some()))?;
            mutually_exclusive(("uid", true), ("auth", !self.auth.is_zero()))?;
        } else {
            required("id", self.id.as_ref())?;
        }
        if let Some(root_dir) = &self.root_dir {
            if root_dir.len() > 255 {
                return InvalidValueSnafu {
                    field: "root_dir",
                    value: root_dir.as_str(),
                    reason: "must be at most 255 characters",
                }
                .fail();
            }
            if self.auth.access_point_id.is_some() && root_dir != "/" {
                return ConflictSnafu {
                    field: "root_dir",
                    other: "access_point_id",
                    reason: "set, unless it is \"/\"",
                }
                .fail();
            }
        }
        self.auth.validate().context(FieldSnafu { field: "auth" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct AuthorizationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_point_id: Option<String>,
}

impl Validate for AuthorizationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.access_point_id.is_some() && self.iam == Some(false) {
            return ConflictSnafu {
                field: "access_point_id",
                other: "iam",
                reason: "false",
            }
            .fail();
        }
        Ok(())
    }
}
