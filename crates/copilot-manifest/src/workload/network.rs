use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    validation::{FieldSnafu, Validate, ValidationError, one_of, required},
    workload::variables::StringSliceOrString,
};

/// `public` or `private`, or an explicit choice of subnets.
pub type PlacementArgOrString = Union<String, PlacementArgs>;

/// A list of subnet IDs, or tags to select subnets by.
pub type SubnetListOrArgs = Union<Vec<String>, SubnetArgs>;

/// A list of security group IDs, or groups together with the default-group switch.
pub type SecurityGroupsIdsOrConfig = Union<Vec<String>, SecurityGroupsConfig>;

/// `true` to join Service Connect, or the alias to register under.
pub type ServiceConnectBoolOrArgs = Union<bool, ServiceConnectArgs>;

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum Placement {
    #[strum(serialize = "public")]
    Public,
    #[strum(serialize = "private")]
    Private,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct NetworkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<ServiceConnectBoolOrArgs>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub vpc: VpcConfig,
}

impl Validate for NetworkConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.connect
            .validate()
            .context(FieldSnafu { field: "connect" })?;
        self.vpc.validate().context(FieldSnafu { field: "vpc" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct VpcConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementArgOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<SecurityGroupsIdsOrConfig>,
}

impl VpcConfig {
    /// Whether tasks are placed in private subnets, either by name or by explicit subnets.
    pub fn is_private(&self) -> bool {
        match &self.placement {
            Some(Union::Basic(placement)) => placement == "private",
            Some(Union::Advanced(_)) => true,
            None => false,
        }
    }
}

impl Validate for VpcConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.placement {
            Some(Union::Basic(placement)) => one_of::<Placement>("placement", placement)?,
            Some(Union::Advanced(args)) => {
                args.validate()
                    .context(FieldSnafu { field: "placement" })?;
            }
            None => {}
        }
        self.security_groups
            .validate()
            .context(FieldSnafu {
                field: "security_groups",
            })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct PlacementArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnets: Option<SubnetListOrArgs>,
}

impl Validate for PlacementArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        required("subnets", self.subnets.as_ref())?;
        self.subnets
            .validate()
            .context(FieldSnafu { field: "subnets" })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SubnetArgs {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub from_tags: BTreeMap<String, StringSliceOrString>,
}

impl Validate for SubnetArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct SecurityGroupsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_default: Option<bool>,
}

impl Validate for SecurityGroupsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct ServiceConnectArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Validate for ServiceConnectArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::merge::merge;

    #[test]
    fn decode_network() {
        let network: NetworkConfig = serde_yaml::from_str(indoc! {"
            connect: true
            vpc:
              placement:
                subnets:
                  from_tags:
                    org: bi
                    type: [private, internal]
              security_groups:
                groups: [sg-1234]
                deny_default: true
        "})
        .unwrap();

        assert_eq!(network.connect, Some(Union::Basic(true)));
        assert!(network.vpc.is_private());
        let Some(Union::Advanced(PlacementArgs {
            subnets: Some(Union::Advanced(args)),
        })) = &network.vpc.placement
        else {
            panic!("expected subnet tags, got {:?}", network.vpc.placement);
        };
        assert_eq!(
            args.from_tags["type"].to_string_slice(),
            vec!["private".to_owned(), "internal".to_owned()]
        );
        assert!(network.validate().is_ok());
    }

    #[test]
    fn placement_must_be_known() {
        let network = NetworkConfig {
            vpc: VpcConfig {
                placement: Some(Union::Basic("internal".to_owned())),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            network.validate().unwrap_err().to_string(),
            r#"validate "vpc": "placement" value "internal" must be one of "public", "private""#
        );
    }

    #[test]
    fn security_groups_list_replaces() {
        let base = VpcConfig {
            security_groups: Some(Union::Basic(vec!["sg-1".to_owned(), "sg-2".to_owned()])),
            ..Default::default()
        };
        let overrides = VpcConfig {
            placement: Some(Union::Basic("private".to_owned())),
            security_groups: Some(Union::Basic(vec!["sg-3".to_owned()])),
        };

        let merged = merge(overrides, &base);
        assert_eq!(
            merged.security_groups,
            Some(Union::Basic(vec!["sg-3".to_owned()]))
        );
        assert!(merged.is_private());
    }
}
