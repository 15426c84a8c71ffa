use copilot_manifest::{
    config::union::Union,
    manifest::{
        AccessLogsBoolOrArgs, BackendService, ElbAccessLogsArgs, unmarshal_environment,
        unmarshal_workload,
    },
    validation::{Validate, ValidationError},
};
use indoc::indoc;
use rstest::rstest;

#[test]
fn union_prefers_the_basic_form() {
    let access_logs: AccessLogsBoolOrArgs = serde_yaml::from_str("true").unwrap();
    assert_eq!(access_logs, Union::Basic(true));

    let access_logs: AccessLogsBoolOrArgs = serde_yaml::from_str("bucket_name: x").unwrap();
    assert_eq!(
        access_logs,
        Union::Advanced(ElbAccessLogsArgs {
            bucket_name: Some("x".to_owned()),
            prefix: None,
        })
    );

    serde_yaml::from_str::<AccessLogsBoolOrArgs>("{}").unwrap_err();
}

#[test]
fn first_invalid_field_wins() {
    let manifest: BackendService = serde_yaml::from_str(indoc! {"
        name: api
        type: Backend Service
        image:
          build: Dockerfile
          location: nginx
        count:
          spot: 1
          range: 1-10
    "})
    .unwrap();

    assert_eq!(
        manifest.validate().unwrap_err().to_string(),
        r#"validate "image": must specify one, not both, of "build" and "location""#
    );
}

#[test]
fn missing_name_is_reported_before_config() {
    let manifest: BackendService = serde_yaml::from_str(indoc! {"
        type: Backend Service
        cpu: -1
    "})
    .unwrap();

    assert_eq!(
        manifest.validate(),
        Err(ValidationError::Required {
            field: "name".to_owned()
        })
    );
}

#[rstest]
#[case::unset("", Ok(()))]
#[case::valid("prod", Ok(()))]
#[case::invalid_override(
    "dev",
    Err(r#""cpu" value 0 must be between 1 and 9223372036854775807"#)
)]
fn validate_after_resolving(#[case] env: &str, #[case] expected: Result<(), &str>) {
    let manifest = unmarshal_workload(indoc! {b"
        name: api
        type: Backend Service
        image:
          location: nginx
        cpu: 256
        environments:
          prod:
            cpu: 512
          dev:
            cpu: 0
    "})
    .unwrap();

    let resolved = manifest.apply_env(env);
    assert_eq!(
        resolved.validate().map_err(|err| err.to_string()),
        expected.map_err(str::to_owned)
    );
}

#[test]
fn environment_manifest() {
    let environment = unmarshal_environment(indoc! {b"
        name: prod
        type: Environment
        network:
          vpc:
            cidr: 10.0.0.0/16
            subnets:
              public:
                - cidr: 10.0.0.0/24
                  az: us-east-1a
        http:
          public:
            access_logs:
              bucket_name: elb-logs
              prefix: prod
    "})
    .unwrap();
    assert_eq!(environment.validate(), Ok(()));

    let environment = unmarshal_environment(indoc! {b"
        name: prod
        type: Environment
        http:
          public:
            ingress:
              cdn: true
    "})
    .unwrap();
    assert_eq!(
        environment.validate().unwrap_err().to_string(),
        r#""cdn" must be specified when "http.public.ingress.cdn" is configured"#
    );
}
