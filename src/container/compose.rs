//! Manifest to docker-compose translation.
//!
//! Converts a validated V2 manifest's container definitions into the
//! structure `docker-compose` consumes. This is a pure transform: rendering
//! to YAML and creating host log directories is the filesystem handler's
//! job. Output is `BTreeMap`-ordered so identical inputs always produce
//! identical structures.

use super::envvars::EnvvarCollector;
use super::manifest::{value_to_string, ContainerDefinition, Manifest};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Source-volume prefix in the manifest that maps a service's logs into the
/// per-run host log directory.
pub const LOG_VOLUME_PREFIX: &str = "awseb-logs-";

/// Manifest volume source paths under this prefix resolve relative to the
/// project directory.
const APP_CURRENT_PREFIX: &str = "/var/app/current/";

/// One service entry in the generated docker-compose.yml.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeService {
    pub image: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
}

/// Build the compose structure for a V2 manifest: one service per container
/// definition, with `env` layered over each definition's own variables.
pub fn compose_map(
    manifest: &Manifest,
    project_path: &Path,
    host_log_path: &Path,
    env: &EnvvarCollector,
) -> BTreeMap<String, ComposeService> {
    let volume_map = named_volume_map(manifest, project_path);

    manifest
        .all_container_definitions()
        .map(|definition| {
            (
                service_name(&definition.name),
                to_service(definition, &volume_map, host_log_path, env),
            )
        })
        .collect()
}

/// Compose service names must be alphanumeric; container definition names
/// may carry dashes.
pub fn service_name(definition_name: &str) -> String {
    definition_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn to_service(
    definition: &ContainerDefinition,
    volume_map: &BTreeMap<String, String>,
    host_log_path: &Path,
    env: &EnvvarCollector,
) -> ComposeService {
    let ports = definition
        .port_mappings
        .iter()
        .map(|mapping| {
            let container = value_to_string(&mapping.container_port);
            let host = mapping
                .host_port
                .as_ref()
                .map(value_to_string)
                .unwrap_or_else(|| container.clone());
            format!("{}:{}", host, container)
        })
        .collect();

    let definition_env = EnvvarCollector::new(
        definition
            .environment
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect(),
        Default::default(),
    );
    let environment = definition_env
        .merge(env)
        .filtered()
        .map()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let links = definition
        .links
        .iter()
        .map(|link| format!("{}:{}", service_name(link), link))
        .collect();

    let volumes = definition
        .mount_points
        .iter()
        .filter_map(|mount| {
            let source = if let Some(path) = volume_map.get(&mount.source_volume) {
                path.clone()
            } else if let Some(dirname) = mount.source_volume.strip_prefix(LOG_VOLUME_PREFIX) {
                host_log_path.join(dirname).to_string_lossy().into_owned()
            } else {
                return None;
            };

            let mut volume = format!("{}:{}", source, mount.container_path);
            if mount.read_only == Some(true) {
                volume.push_str(":ro");
            }
            Some(volume)
        })
        .collect();

    ComposeService {
        image: definition.image.clone(),
        command: definition.command.clone(),
        ports,
        links,
        environment,
        volumes,
        privileged: definition.privileged,
    }
}

/// Named volumes from the manifest, with `/var/app/current/` sources
/// resolved against the project directory.
fn named_volume_map(manifest: &Manifest, project_path: &Path) -> BTreeMap<String, String> {
    manifest
        .volumes()
        .iter()
        .map(|volume| {
            let source = &volume.host.source_path;
            let resolved = match source.strip_prefix(APP_CURRENT_PREFIX) {
                Some(relative) => project_path.join(relative).to_string_lossy().into_owned(),
                None => source.clone(),
            };
            (volume.name.clone(), resolved)
        })
        .collect()
}

/// Host log subdirectories the services will mount: every volume source
/// under `host_log_path`. The filesystem handler creates these before
/// `docker-compose up`.
pub fn host_log_dirs(
    services: &BTreeMap<String, ComposeService>,
    host_log_path: &Path,
) -> Vec<std::path::PathBuf> {
    services
        .values()
        .flat_map(|service| service.volumes.iter())
        .filter_map(|volume| {
            let source = volume.split(':').next()?;
            let path = Path::new(source);
            path.starts_with(host_log_path).then(|| path.to_path_buf())
        })
        .collect()
}
