use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, zero::IsZero},
    validation::{
        FieldSnafu, Validate, ValidationError, one_of, required, validate_list, validate_map,
    },
    workload::{
        deserialize_scalar_map, deserialize_scalar_string,
        image::{ContainerHealthCheck, ImageOverride, validate_depends_on},
        nlb::parse_port_protocol,
        storage::MountPointOpts,
        variables::{Secret, Variable, deserialize_variables},
    },
};

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum SidecarProtocol {
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
}

/// An additional container that runs next to the main container of the task.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SidecarConfig {
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_parameter: Option<String>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_points: Option<Vec<SidecarMountPoint>>,
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
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub healthcheck: ContainerHealthCheck,
    #[serde(flatten)]
    pub image_override: ImageOverride,
}

impl Validate for SidecarConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        required("image", self.image.as_ref())?;
        if let Some(port) = &self.port {
            if let (_, Some(protocol)) = parse_port_protocol("port", port)? {
                one_of::<SidecarProtocol>("port", &protocol)?;
            }
        }
        validate_map("variables", &self.variables)?;
        validate_map("secrets", &self.secrets)?;
        if let Some(mount_points) = &self.mount_points {
            validate_list("mount_points", mount_points)?;
        }
        validate_depends_on(&self.depends_on).context(FieldSnafu {
            field: "depends_on",
        })?;
        self.healthcheck
            .validate()
            .context(FieldSnafu {
                field: "healthcheck",
            })?;
        self.image_override.validate()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SidecarMountPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_volume: Option<String>,
    #[serde(flatten)]
    pub mount_point: MountPointOpts,
}

impl Validate for SidecarMountPoint {
    fn validate(&self) -> Result<(), ValidationError> {
        required("source_volume", self.source_volume.as_ref())?;
        self.mount_point.validate()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::merge::merge;

    fn decode(input: &str) -> BTreeMap<String, SidecarConfig> {
        serde_yaml::from_str(input).unwrap()
    }

    #[test]
    fn decode_sidecars() {
        let sidecars = decode(indoc! {"
            nginx:
              port: 80
              image: public.ecr.aws/nginx:latest
              depends_on:
                startup: success
              labels:
                version: 1
              mount_points:
                - source_volume: shared
                  path: /etc/nginx
                  read_only: true
              command: [nginx, -g, daemon off;]
            startup:
              image: busybox
              essential: false
        "});

        let nginx = &sidecars["nginx"];
        assert_eq!(nginx.port.as_deref(), Some("80"));
        assert_eq!(nginx.labels["version"], "1");
        assert_eq!(
            nginx.image_override.command.as_ref().map(|c| c.to_string_slice().len()),
            Some(3)
        );
        assert!(validate_map("sidecars", &sidecars).is_ok());
    }

    #[test]
    fn mount_point_needs_source() {
        let sidecar = SidecarConfig {
            image: Some("busybox".to_owned()),
            mount_points: Some(vec![SidecarMountPoint {
                source_volume: None,
                mount_point: MountPointOpts {
                    path: Some("/data".to_owned()),
                    read_only: None,
                },
            }]),
            ..Default::default()
        };
        assert_eq!(
            sidecar.validate().unwrap_err().to_string(),
            r#"validate "mount_points[0]": "source_volume" must be specified"#
        );
    }

    #[test]
    fn sidecar_override_keeps_image() {
        let base = decode(indoc! {"
            xray:
              image: public.ecr.aws/xray/aws-xray-daemon
              port: 2000/udp
        "});
        let overrides = decode(indoc! {"
            xray:
              essential: false
        "});

        let merged = merge(overrides, &base);
        assert_eq!(
            merged["xray"].image.as_deref(),
            Some("public.ecr.aws/xray/aws-xray-daemon")
        );
        assert_eq!(merged["xray"].essential, Some(false));
        assert!(merged["xray"].validate().is_ok());
    }
}
