//! Utility functions for writing manifests back out as YAML
use std::io::Write;

use serde::ser;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },
}

/// Serializes `value` as an explicit YAML document, starting with `---`, and writes it to
/// `writer`.
///
/// # Example
///
/// ```
/// use copilot_manifest::{
///     manifest::{BackendService, BackendServiceProps},
///     yaml,
/// };
///
/// let manifest = BackendService::new(BackendServiceProps {
///     name: "api".to_owned(),
///     image: Some("nginx".to_owned()),
///     ..Default::default()
/// });
///
/// let mut buf = Vec::new();
/// yaml::serialize_to_explicit_document(&mut buf, &manifest).unwrap();
/// let actual_yaml = std::str::from_utf8(&buf).unwrap();
///
/// assert!(actual_yaml.starts_with("---\nname: api\ntype: Backend Service\n"));
/// ```
pub fn serialize_to_explicit_document<T, W>(mut writer: W, value: &T) -> Result<()>
where
    T: ser::Serialize,
    W: Write,
{
    writer
        .write_all(b"---\n")
        .context(WriteDocumentSeparatorSnafu)?;
    let mut serializer = serde_yaml::Serializer::new(writer);
    value
        .serialize(&mut serializer)
        .context(SerializeYamlSnafu)?;
    Ok(())
}
