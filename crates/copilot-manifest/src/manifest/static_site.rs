use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    config::{merge::Merge, zero::IsZero},
    manifest::{Manifest, WorkloadConfig, WorkloadType},
    validation::{
        FieldSnafu, RequiredBySnafu, Validate, ValidationError, arn, required, validate_list,
    },
    workload::{deserialize_scalar_map, variables::StringSliceOrString},
};

pub type StaticSite = Manifest<StaticSiteConfig>;

/// Static assets uploaded to S3 and served through CloudFront.
#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct StaticSiteConfig {
    #[serde(default, skip_serializing_if = "IsZero::is_zero")]
    pub http: StaticSiteHttp,
    /// Replaced as a whole by an environment override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileUpload>>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub tags: BTreeMap<String, String>,
}

impl WorkloadConfig for StaticSiteConfig {
    const WORKLOAD_TYPE: WorkloadType = WorkloadType::StaticSite;
}

impl Validate for StaticSiteConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.http.validate().context(FieldSnafu { field: "http" })?;
        match &self.files {
            Some(files) => validate_list("files", files),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct StaticSiteHttp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// ACM certificate for `alias`, which must live in us-east-1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Validate for StaticSiteHttp {
    fn validate(&self) -> Result<(), ValidationError> {
        let Some(certificate) = &self.certificate else {
            return Ok(());
        };
        if self.alias.is_none() {
            return RequiredBySnafu {
                field: "alias",
                other: "certificate",
            }
            .fail();
        }
        arn("certificate", certificate)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IsZero, Merge, PartialEq, Serialize)]
#[is_zero(path_overrides(zero = "crate::config::zero"))]
#[merge(path_overrides(merge = "crate::config::merge"))]
pub struct FileUpload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<StringSliceOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reinclude: Option<StringSliceOrString>,
}

impl Validate for FileUpload {
    fn validate(&self) -> Result<(), ValidationError> {
        required("source", self.source.as_ref())
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticSiteProps {
    pub name: String,
    pub files: Vec<FileUpload>,
}

impl Manifest<StaticSiteConfig> {
    pub fn new(props: StaticSiteProps) -> Self {
        let config = StaticSiteConfig {
            files: (!props.files.is_empty()).then_some(props.files),
            ..Default::default()
        };
        Self::from_config(props.name, config)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::union::Union;

    const MANIFEST: &str = indoc! {"
        name: docs
        type: Static Site
        http:
          alias: docs.example.com
        files:
          - source: site/
            recursive: true
            exclude: '*'
            reinclude:
              - '*.html'
              - '*.css'
        environments:
          test:
            http:
              alias: docs.test.example.com
            files: []
    "};

    #[test]
    fn decode_files() {
        let site: StaticSite = serde_yaml::from_str(MANIFEST).unwrap();
        let files = site.config.files.as_deref().unwrap();
        assert_eq!(files[0].exclude, Some(Union::Basic("*".to_owned())));
        assert_eq!(
            files[0].reinclude.as_ref().map(|files| files.to_string_slice()),
            Some(vec!["*.html".to_owned(), "*.css".to_owned()])
        );
        assert!(site.validate().is_ok());
    }

    #[test]
    fn empty_file_list_replaces_base() {
        let site: StaticSite = serde_yaml::from_str(MANIFEST).unwrap();
        let test = site.apply_env("test");
        assert_eq!(test.config.files, Some(vec![]));
        assert_eq!(test.config.http.alias.as_deref(), Some("docs.test.example.com"));
    }

    #[test]
    fn source_is_required() {
        let site = StaticSite::new(StaticSiteProps {
            name: "docs".to_owned(),
            files: vec![FileUpload {
                destination: Some("assets".to_owned()),
                ..Default::default()
            }],
        });
        assert_eq!(
            site.validate().unwrap_err().to_string(),
            r#"validate "files[0]": "source" must be specified"#
        );
    }

    #[test]
    fn certificate_needs_alias() {
        let http = StaticSiteHttp {
            alias: None,
            certificate: Some(
                "arn:aws:acm:us-east-1:123456789012:certificate/abc".to_owned(),
            ),
        };
        assert_eq!(
            http.validate().unwrap_err().to_string(),
            r#""alias" must be specified when "certificate" is configured"#
        );
    }
}
