//! Application Load Balancer routing for services that serve HTTP traffic.
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, union::Union, zero::IsZero},
    time::Duration,
    validation::{
        ConflictSnafu, FieldSnafu, Validate, ValidationError, cidr, duration_in_range, in_range,
        one_of, required,
    },
    workload::variables::StringSliceOrString,
};

/// A health check path, or the full target group health check.
pub type HealthCheckArgsOrString = Union<String, HttpHealthCheckArgs>;

/// `false` to disable the load balancer listener, or its routing configuration.
pub type RoutingRuleConfigOrBool = Union<bool, RoutingRuleConfiguration>;

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum ProtocolVersion {
    #[strum(serialize = "GRPC")]
    Grpc,
    #[strum(serialize = "HTTP1")]
    Http1,
    #[strum(serialize = "HTTP2")]
    Http2,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct RoutingRuleConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheckArgsOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<StringSliceOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deregistration_delay: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_source_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to_https: Option<bool>,
}

impl Validate for RoutingRuleConfiguration {
    fn validate(&self) -> Result<(), ValidationError> {
        required("path", self.path.as_ref())?;
        if let Some(version) = &self.version {
            one_of::<ProtocolVersion>("version", &version.to_uppercase())?;
        }
        self.healthcheck
            .validate()
            .context(FieldSnafu {
                field: "healthcheck",
            })?;
        if self.hosted_zone.is_some() && self.alias.is_none() {
            return ConflictSnafu {
                field: "hosted_zone",
                other: "alias",
                reason: "not set",
            }
            .fail();
        }
        if let Some(delay) = self.deregistration_delay {
            duration_in_range(
                "deregistration_delay",
                delay,
                Duration::from_secs(0),
                Duration::from_secs(3600),
            )?;
        }
        for ip in self.allowed_source_ips.iter().flatten() {
            cidr("allowed_source_ips", ip)?;
        }
        Ok(())
    }
}

impl Union<bool, RoutingRuleConfiguration> {
    /// Whether a listener rule should be created at all.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Basic(enabled) => *enabled,
            Self::Advanced(_) => true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct HttpHealthCheckArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_codes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<Duration>,
}

impl Validate for HttpHealthCheckArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(threshold) = self.healthy_threshold {
            in_range("healthy_threshold", threshold, 2, 10)?;
        }
        if let Some(threshold) = self.unhealthy_threshold {
            in_range("unhealthy_threshold", threshold, 2, 10)?;
        }
        if let Some(timeout) = self.timeout {
            duration_in_range(
                "timeout",
                timeout,
                Duration::from_secs(2),
                Duration::from_secs(120),
            )?;
        }
        if let Some(interval) = self.interval {
            duration_in_range(
                "interval",
                interval,
                Duration::from_secs(5),
                Duration::from_secs(300),
            )?;
        }
        if let (Some(timeout), Some(interval)) = (self.timeout, self.interval) {
            if timeout >= interval {
                return ConflictSnafu {
                    field: "timeout",
                    other: "interval",
                    reason: "not longer than the timeout",
                }
                .fail();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::merge::merge;

    #[derive(Debug, Deserialize)]
    struct Service {
        http: Option<RoutingRuleConfigOrBool>,
    }

    #[test]
    fn decode_http() {
        let service: Service = serde_yaml::from_str(indoc! {"
            http:
              path: /api
              healthcheck:
                path: /health
                healthy_threshold: 3
              alias: [example.com, www.example.com]
              allowed_source_ips: [10.24.34.0/23]
        "})
        .unwrap();

        let http = service.http.unwrap();
        assert!(http.is_enabled());
        let rule = http.advanced().unwrap();
        assert_eq!(rule.path.as_deref(), Some("/api"));
        assert!(rule.healthcheck.as_ref().is_some_and(Union::is_advanced));
        assert!(http.validate().is_ok());
    }

    #[test]
    fn http_can_be_disabled() {
        let service: Service = serde_yaml::from_str("http: false").unwrap();
        assert_eq!(service.http, Some(Union::Basic(false)));
        assert!(!service.http.unwrap().is_enabled());
    }

    #[test]
    fn hosted_zone_needs_alias() {
        let rule = RoutingRuleConfiguration {
            path: Some("/".to_owned()),
            hosted_zone: Some("Z0873220N255IR3MTNR4".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            rule.validate().unwrap_err().to_string(),
            r#""hosted_zone" cannot be specified when "alias" is not set"#
        );
    }

    #[test]
    fn healthcheck_shorthand_override() {
        let base = RoutingRuleConfiguration {
            path: Some("/".to_owned()),
            healthcheck: Some(Union::Advanced(HttpHealthCheckArgs {
                path: Some("/health".to_owned()),
                interval: Some(Duration::from_secs(10)),
                ..Default::default()
            })),
            ..Default::default()
        };
        let overrides = RoutingRuleConfiguration {
            healthcheck: Some(Union::Basic("/ping".to_owned())),
            ..Default::default()
        };

        let merged = merge(overrides, &base);
        assert_eq!(merged.path.as_deref(), Some("/"));
        assert_eq!(merged.healthcheck, Some(Union::Basic("/ping".to_owned())));
    }

    #[test]
    fn source_ips_must_be_cidrs() {
        let rule = RoutingRuleConfiguration {
            path: Some("/".to_owned()),
            allowed_source_ips: Some(vec!["10.0.0.1".to_owned()]),
            ..Default::default()
        };
        assert!(rule.validate().is_err());
    }
}
