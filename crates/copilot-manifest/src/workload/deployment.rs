use serde::{Deserialize, Serialize};

use crate::{
    config::{merge::Merge, zero::IsZero},
    validation::{Validate, ValidationError, one_of},
};

/// How ECS replaces running tasks during a deployment.
#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum RollingStrategy {
    /// Start new tasks before stopping old ones.
    #[strum(serialize = "default")]
    Default,
    /// Stop all old tasks before starting new ones.
    #[strum(serialize = "recreate")]
    Recreate,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct DeploymentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling: Option<String>,
}

impl Validate for DeploymentConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.rolling {
            Some(strategy) => one_of::<RollingStrategy>("rolling", strategy),
            None => Ok(()),
        }
    }
}
