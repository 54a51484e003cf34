//! Dockerrun manifest parsing and validation.
//!
//! `Dockerrun.aws.json` comes in two schema versions: V1 describes a single
//! container (image, exposed port, registry auth, log directory); V2 carries
//! container definitions consumed by the compose generator. The manifest is
//! read once per invocation and never mutated. A missing file is a
//! legitimate "no manifest" state, not an error; malformed JSON is a hard
//! validation error.

use super::{ContainerError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// V1 schema version token
pub const VERSION_ONE: &str = "1";
/// V2 schema version token
pub const VERSION_TWO: &str = "2";

const ERR_INVALID_JSON: &str = "Dockerrun.aws.json is not valid JSON";
const ERR_INVALID_VERSION: &str =
    "Dockerrun.aws.json has an invalid or missing AWSEBDockerrunVersion";
const ERR_MISSING_MANIFEST: &str = "Dockerrun.aws.json was not found";
const ERR_MISSING_IMAGE: &str = "Dockerrun.aws.json is missing Image.Name";
const ERR_MISSING_PORT: &str = "Dockerrun.aws.json is missing Ports[0].ContainerPort";

/// Parsed `Dockerrun.aws.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(rename = "AWSEBDockerrunVersion")]
    version: Option<Value>,

    #[serde(rename = "Image")]
    image: Option<ImageEntry>,

    #[serde(rename = "Ports")]
    ports: Option<Vec<PortEntry>>,

    // V1 uses capitalized keys, V2 lowercase
    #[serde(rename = "Authentication", alias = "authentication")]
    auth: Option<AuthEntry>,

    #[serde(rename = "Logging")]
    logging: Option<String>,

    #[serde(rename = "containerDefinitions", default)]
    container_definitions: Vec<ContainerDefinition>,

    #[serde(rename = "localContainerDefinitions", default)]
    local_container_definitions: Vec<ContainerDefinition>,

    #[serde(rename = "volumes", default)]
    volumes: Vec<VolumeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ImageEntry {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Update")]
    update: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct PortEntry {
    #[serde(rename = "ContainerPort")]
    container_port: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct AuthEntry {
    #[serde(rename = "Bucket", alias = "bucket")]
    bucket: Option<String>,
    #[serde(rename = "Key", alias = "key")]
    key: Option<String>,
}

/// One V2 container definition, consumed by the compose generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub environment: Vec<NamedValue>,
    #[serde(default)]
    pub mount_points: Vec<MountPoint>,
    #[serde(default)]
    pub privileged: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub host_port: Option<Value>,
    pub container_port: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub source_volume: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeEntry {
    pub name: String,
    pub host: VolumeHost,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeHost {
    pub source_path: String,
}

impl Manifest {
    /// Read a manifest from disk. A missing (or unreadable) file is the
    /// "no manifest" state and returns `Ok(None)`; malformed JSON fails.
    pub fn from_file(path: &Path) -> Result<Option<Manifest>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("no manifest at {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ContainerError::Validation(format!("{}: {}", ERR_INVALID_JSON, e)))
    }

    /// The declared schema version, stringified (the wire format allows
    /// both the integer `1` and the string `"1"`).
    pub fn schema_version(&self) -> Option<String> {
        self.version.as_ref().map(value_to_string)
    }

    /// `Image.Name`. Callers are expected to have validated first.
    pub fn base_image(&self) -> Result<&str> {
        self.image
            .as_ref()
            .and_then(|img| img.name.as_deref())
            .ok_or_else(|| ContainerError::Validation(ERR_MISSING_IMAGE.into()))
    }

    /// `Ports[0].ContainerPort`, stringified. The first entry is
    /// authoritative.
    pub fn exposed_port(&self) -> Result<String> {
        self.ports
            .as_ref()
            .and_then(|ports| ports.first())
            .and_then(|entry| entry.container_port.as_ref())
            .map(value_to_string)
            .ok_or_else(|| ContainerError::Validation(ERR_MISSING_PORT.into()))
    }

    /// `Authentication.Bucket`.
    pub fn auth_bucket(&self) -> Result<&str> {
        self.auth
            .as_ref()
            .and_then(|auth| auth.bucket.as_deref())
            .ok_or_else(|| {
                ContainerError::Validation("Dockerrun.aws.json is missing Authentication.Bucket".into())
            })
    }

    /// `Authentication.Key`.
    pub fn auth_key(&self) -> Result<&str> {
        self.auth.as_ref().and_then(|auth| auth.key.as_deref()).ok_or_else(|| {
            ContainerError::Validation("Dockerrun.aws.json is missing Authentication.Key".into())
        })
    }

    /// `Logging`: the container-side path to bind-mount to a host log
    /// directory. Absence is not an error, unlike the other accessors.
    pub fn log_dir(&self) -> Option<&str> {
        self.logging.as_deref()
    }

    /// All V2 container definitions, remote ones first.
    pub fn all_container_definitions(&self) -> impl Iterator<Item = &ContainerDefinition> {
        self.container_definitions
            .iter()
            .chain(self.local_container_definitions.iter())
    }

    /// V2 named volume declarations.
    pub fn volumes(&self) -> &[VolumeEntry] {
        &self.volumes
    }
}

/// Validate a V1 manifest. With `for_dockerfile` set the manifest must be
/// able to stand in for a Dockerfile, so the manifest itself plus an image
/// name and a container port are required. Without it, a `None` manifest
/// passes: the user relies entirely on their own Dockerfile.
pub fn validate_v1(manifest: Option<&Manifest>, for_dockerfile: bool) -> Result<()> {
    let Some(manifest) = manifest else {
        if for_dockerfile {
            return Err(ContainerError::Validation(ERR_MISSING_MANIFEST.into()));
        }
        return Ok(());
    };

    if manifest.schema_version().as_deref() != Some(VERSION_ONE) {
        return Err(ContainerError::Validation(ERR_INVALID_VERSION.into()));
    }

    if !for_dockerfile {
        return Ok(());
    }

    manifest.base_image()?;
    manifest.exposed_port()?;
    Ok(())
}

/// Validate a V2 manifest. Multi-container runs cannot work without one.
pub fn validate_v2(manifest: Option<&Manifest>) -> Result<()> {
    let Some(manifest) = manifest else {
        return Err(ContainerError::Validation(ERR_MISSING_MANIFEST.into()));
    };

    if manifest.schema_version().as_deref() != Some(VERSION_TWO) {
        return Err(ContainerError::Validation(ERR_INVALID_VERSION.into()));
    }

    Ok(())
}

/// Whether `docker pull` is necessary: pull unless `Image.Update` is
/// explicitly false.
pub fn require_pull(manifest: Option<&Manifest>) -> bool {
    let update = manifest
        .and_then(|m| m.image.as_ref())
        .and_then(|img| img.update.as_ref());

    match update {
        Some(Value::String(s)) => s != "false",
        Some(Value::Bool(b)) => *b,
        _ => true,
    }
}

/// Whether registry credentials must be downloaded first: true only when
/// both `Authentication.Bucket` and `Authentication.Key` are present.
pub fn require_auth_download(manifest: Option<&Manifest>) -> bool {
    manifest
        .map(|m| m.auth_bucket().is_ok() && m.auth_key().is_ok())
        .unwrap_or(false)
}

pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_from(json: &str) -> Manifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_missing_file_is_none() {
        let parsed = Manifest::from_file(Path::new("/nonexistent/Dockerrun.aws.json")).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_malformed_json_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerrun.aws.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Manifest::from_file(&path).unwrap_err();
        assert!(matches!(err, ContainerError::Validation(_)));
    }

    #[test]
    fn test_version_accepts_int_and_string() {
        let int_version = manifest_from(r#"{"AWSEBDockerrunVersion": 1}"#);
        let str_version = manifest_from(r#"{"AWSEBDockerrunVersion": "1"}"#);
        assert_eq!(int_version.schema_version().as_deref(), Some("1"));
        assert_eq!(str_version.schema_version().as_deref(), Some("1"));
    }

    #[test]
    fn test_validate_v1_missing_version_fails() {
        let manifest = manifest_from(r#"{"Image": {"Name": "nginx"}}"#);
        assert!(validate_v1(Some(&manifest), false).is_err());
        assert!(validate_v2(Some(&manifest)).is_err());
    }

    #[test]
    fn test_validate_v1_none_passes_only_with_own_dockerfile() {
        assert!(validate_v1(None, false).is_ok());
        assert!(validate_v1(None, true).is_err());
    }

    #[test]
    fn test_validate_v1_for_dockerfile_requires_image_and_port() {
        let no_image = manifest_from(r#"{"AWSEBDockerrunVersion": 1}"#);
        assert!(validate_v1(Some(&no_image), false).is_ok());
        assert!(validate_v1(Some(&no_image), true).is_err());

        let no_port = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Image": {"Name": "nginx"}}"#,
        );
        assert!(validate_v1(Some(&no_port), true).is_err());

        let complete = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1,
                "Image": {"Name": "nginx"},
                "Ports": [{"ContainerPort": "80"}]}"#,
        );
        assert!(validate_v1(Some(&complete), true).is_ok());
    }

    #[test]
    fn test_validate_v2() {
        assert!(validate_v2(None).is_err());

        let v1 = manifest_from(r#"{"AWSEBDockerrunVersion": 1}"#);
        assert!(validate_v2(Some(&v1)).is_err());

        let v2 = manifest_from(r#"{"AWSEBDockerrunVersion": 2}"#);
        assert!(validate_v2(Some(&v2)).is_ok());
    }

    #[test]
    fn test_require_pull_default_true() {
        assert!(require_pull(None));

        let no_image = manifest_from(r#"{"AWSEBDockerrunVersion": 1}"#);
        assert!(require_pull(Some(&no_image)));

        let update_true = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Image": {"Name": "nginx", "Update": "true"}}"#,
        );
        assert!(require_pull(Some(&update_true)));

        let no_update = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Image": {"Name": "nginx"}}"#,
        );
        assert!(require_pull(Some(&no_update)));
    }

    #[test]
    fn test_require_pull_false_only_when_pinned() {
        let pinned = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Image": {"Name": "nginx", "Update": "false"}}"#,
        );
        assert!(!require_pull(Some(&pinned)));

        let pinned_bool = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Image": {"Name": "nginx", "Update": false}}"#,
        );
        assert!(!require_pull(Some(&pinned_bool)));
    }

    #[test]
    fn test_require_auth_download() {
        assert!(!require_auth_download(None));

        let both = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1,
                "Authentication": {"Bucket": "my-bucket", "Key": "docker/.dockercfg"}}"#,
        );
        assert!(require_auth_download(Some(&both)));

        let bucket_only = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Authentication": {"Bucket": "my-bucket"}}"#,
        );
        assert!(!require_auth_download(Some(&bucket_only)));

        let neither = manifest_from(r#"{"AWSEBDockerrunVersion": 1}"#);
        assert!(!require_auth_download(Some(&neither)));
    }

    #[test]
    fn test_v2_lowercase_auth_keys() {
        let v2 = manifest_from(
            r#"{"AWSEBDockerrunVersion": 2,
                "authentication": {"bucket": "b", "key": "k"}}"#,
        );
        assert_eq!(v2.auth_bucket().unwrap(), "b");
        assert_eq!(v2.auth_key().unwrap(), "k");
        assert!(require_auth_download(Some(&v2)));
    }

    #[test]
    fn test_accessor_asymmetry() {
        let empty = manifest_from(r#"{"AWSEBDockerrunVersion": 1}"#);
        assert!(empty.base_image().is_err());
        assert!(empty.exposed_port().is_err());
        assert!(empty.auth_bucket().is_err());
        // Logging alone may be absent
        assert_eq!(empty.log_dir(), None);

        let with_log = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Logging": "/var/log/app"}"#,
        );
        assert_eq!(with_log.log_dir(), Some("/var/log/app"));
    }

    #[test]
    fn test_exposed_port_stringifies_ints() {
        let int_port = manifest_from(
            r#"{"AWSEBDockerrunVersion": 1, "Ports": [{"ContainerPort": 8080}]}"#,
        );
        assert_eq!(int_port.exposed_port().unwrap(), "8080");
    }

    #[test]
    fn test_v2_definitions_parse() {
        let v2 = manifest_from(
            r#"{"AWSEBDockerrunVersion": 2,
                "volumes": [{"name": "web-src", "host": {"sourcePath": "/var/app/current/web"}}],
                "containerDefinitions": [
                    {"name": "web", "image": "nginx",
                     "portMappings": [{"hostPort": 80, "containerPort": 8080}],
                     "environment": [{"name": "A", "value": "1"}],
                     "links": ["worker"],
                     "mountPoints": [{"sourceVolume": "web-src",
                                      "containerPath": "/usr/share/nginx/html",
                                      "readOnly": true}]},
                    {"name": "worker", "image": "busybox"}
                ]}"#,
        );

        let defs: Vec<_> = v2.all_container_definitions().collect();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "web");
        assert_eq!(defs[0].port_mappings.len(), 1);
        assert_eq!(v2.volumes().len(), 1);
    }
}
