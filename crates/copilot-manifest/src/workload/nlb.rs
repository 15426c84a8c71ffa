use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, zero::IsZero},
    time::Duration,
    validation::{
        FieldSnafu, InvalidValueSnafu, Validate, ValidationError, duration_in_range, in_range,
        one_of, required,
    },
    workload::{deserialize_scalar_string, variables::StringSliceOrString},
};

#[derive(Debug, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum NlbProtocol {
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
    #[strum(serialize = "tls")]
    Tls,
    #[strum(serialize = "tcp_udp")]
    TcpUdp,
}

/// Splits a `port[/protocol]` listener string, such as `443/tls`.
pub(crate) fn parse_port_protocol(
    field: &str,
    value: &str,
) -> Result<(u16, Option<String>), ValidationError> {
    let (port, protocol) = match value.split_once('/') {
        Some((port, protocol)) => (port, Some(protocol.to_lowercase())),
        None => (value, None),
    };
    let port = port.parse::<u16>().ok().filter(|port| *port > 0);
    match port {
        Some(port) => Ok((port, protocol)),
        None => InvalidValueSnafu {
            field,
            value,
            reason: "must be a port number optionally followed by a protocol, such as 443/tcp",
        }
        .fail(),
    }
}

/// A Network Load Balancer in front of the service. An all-empty block means no NLB.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct NetworkLoadBalancerConfiguration {
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub healthcheck: NlbHealthCheckArgs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<StringSliceOrString>,
}

impl NetworkLoadBalancerConfiguration {
    pub fn is_enabled(&self) -> bool {
        !self.is_zero()
    }
}

impl Validate for NetworkLoadBalancerConfiguration {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_zero() {
            return Ok(());
        }
        required("port", self.port.as_ref())?;
        if let Some(port) = &self.port {
            if let (_, Some(protocol)) = parse_port_protocol("port", port)? {
                one_of::<NlbProtocol>("port", &protocol)?;
            }
        }
        self.healthcheck
            .validate()
            .context(FieldSnafu {
                field: "healthcheck",
            })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct NlbHealthCheckArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
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

impl Validate for NlbHealthCheckArgs {
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("443", true)]
    #[case("443/tls", true)]
    #[case("53/UDP", true)]
    #[case("80/http", false)]
    #[case("0", false)]
    #[case("tcp", false)]
    fn listener_ports(#[case] port: &str, #[case] valid: bool) {
        let nlb = NetworkLoadBalancerConfiguration {
            port: Some(port.to_owned()),
            ..Default::default()
        };
        assert_eq!(nlb.validate().is_ok(), valid, "port {port}");
    }

    #[test]
    fn empty_block_is_disabled() {
        let nlb = NetworkLoadBalancerConfiguration::default();
        assert!(!nlb.is_enabled());
        assert!(nlb.validate().is_ok());

        let nlb = NetworkLoadBalancerConfiguration {
            stickiness: Some(true),
            ..Default::default()
        };
        assert_eq!(
            nlb.validate().unwrap_err().to_string(),
            r#""port" must be specified"#
        );
    }
}
