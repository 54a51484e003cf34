//! Project filesystem mutations for local runs: generated Dockerfiles,
//! `.dockerignore` hygiene, registry credential checks, and the rendered
//! compose file.

use super::compose;
use super::envvars::EnvvarCollector;
use super::logdir;
use super::manifest::{self, Manifest};
use super::paths::PathConfig;
use super::platform::{ContainerConfig, SolutionStack};
use super::{ContainerError, Result};
use crate::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Line appended to `.dockerignore`; its presence marks the file as
/// already handled.
const DOCKERIGNORE_MARKER: &str = env::LOCALDOCK_DIR_NAME;

/// Generated artifacts use the host platform's line separator.
const LINE_SEP: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// Filesystem operations backing single-container runs.
#[derive(Debug)]
pub struct ContainerFsHandler {
    pathconfig: PathConfig,
    manifest: Option<Manifest>,
}

impl ContainerFsHandler {
    pub fn new(pathconfig: PathConfig, manifest: Option<Manifest>) -> Self {
        Self {
            pathconfig,
            manifest,
        }
    }

    pub fn pathconfig(&self) -> &PathConfig {
        &self.pathconfig
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Whether a Dockerfile has to be generated because the project ships
    /// none of its own.
    pub fn require_new_dockerfile(&self) -> bool {
        !self.pathconfig.dockerfile_exists()
    }

    /// Synthesize a minimal Dockerfile from the manifest's image name and
    /// exposed port.
    pub fn make_dockerfile(&self) -> Result<()> {
        let manifest = self.manifest.as_ref().ok_or_else(|| {
            ContainerError::Validation(format!(
                "cannot generate a Dockerfile without {}",
                env::DOCKERRUN_FILENAME
            ))
        })?;

        let contents = format!(
            "{} {}{sep}{} {}{sep}",
            super::commands::FROM_CMD,
            manifest.base_image()?,
            super::commands::EXPOSE_CMD,
            manifest.exposed_port()?,
            sep = LINE_SEP
        );

        let destination = self.pathconfig.new_dockerfile_path();
        debug!("writing generated Dockerfile to {}", destination.display());
        std::fs::write(destination, contents)?;
        Ok(())
    }

    /// Copy a preconfigured platform's runtime Dockerfile into place.
    /// Callers must have checked the stack is preconfigured.
    pub fn copy_dockerfile(
        &self,
        stack: &SolutionStack,
        config: &ContainerConfig,
    ) -> Result<()> {
        debug_assert!(config.is_preconfigured(stack));

        let contents = config.runtime_dockerfile_contents(stack)?;
        std::fs::write(self.pathconfig.new_dockerfile_path(), contents)?;
        Ok(())
    }

    /// Whether `.dockerignore` still needs the marker appended. Probed on
    /// every call; the file can change between runs.
    pub fn require_append_dockerignore(&self) -> bool {
        require_append_dockerignore(self.pathconfig.dockerignore_path())
    }

    /// Append the ignore lines unless the marker is already present.
    pub fn append_dockerignore(&self) -> Result<()> {
        let path = self.pathconfig.dockerignore_path();
        if !require_append_dockerignore(path) {
            return Ok(());
        }

        let existing = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => String::new(),
        };

        let mut contents = existing;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push_str(LINE_SEP);
        }
        contents.push_str(DOCKERIGNORE_MARKER);
        contents.push_str(LINE_SEP);

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// When the manifest asks for private registry auth, the credentials
    /// file named by the manifest key must already exist locally.
    pub fn require_registry_auth(&self) -> Result<()> {
        require_registry_auth(&self.pathconfig, self.manifest.as_ref())
    }
}

/// Check that registry credentials are present when the manifest declares
/// an `Authentication` section.
pub fn require_registry_auth(pathconfig: &PathConfig, manifest: Option<&Manifest>) -> Result<()> {
    if !manifest::require_auth_download(manifest) {
        return Ok(());
    }

    let dockercfg = pathconfig.dockercfg_path();
    if dockercfg.is_file() {
        return Ok(());
    }

    Err(ContainerError::Validation(format!(
        "{} declares an Authentication section but {} does not exist; \
         place your registry credentials there first",
        env::DOCKERRUN_FILENAME,
        dockercfg.display()
    )))
}

fn require_append_dockerignore(dockerignore_path: &Path) -> bool {
    match std::fs::read_to_string(dockerignore_path) {
        Ok(contents) => !contents.lines().any(|line| line.trim() == DOCKERIGNORE_MARKER),
        Err(_) => true,
    }
}

/// Filesystem operations backing multi-container runs.
#[derive(Debug)]
pub struct MultiContainerFsHandler {
    pathconfig: PathConfig,
    manifest: Manifest,
}

impl MultiContainerFsHandler {
    pub fn new(pathconfig: PathConfig, manifest: Manifest) -> Self {
        Self {
            pathconfig,
            manifest,
        }
    }

    pub fn pathconfig(&self) -> &PathConfig {
        &self.pathconfig
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Render `docker-compose.yml` for this run: set up a fresh host log
    /// run directory, map every service, pre-create the per-service log
    /// mounts, and write the YAML. Returns the run directory path.
    pub fn make_compose_file(&self, env: &EnvvarCollector) -> Result<PathBuf> {
        let log_root = self.pathconfig.logdir_path();
        let run_path = logdir::new_run_path(log_root);
        logdir::make_logdirs(log_root, &run_path)?;

        let services = compose::compose_map(
            &self.manifest,
            self.pathconfig.project_root(),
            &run_path,
            env,
        );

        for dir in compose::host_log_dirs(&services, &run_path) {
            std::fs::create_dir_all(&dir)?;
            logdir::set_all_unrestricted_permissions(&dir)?;
        }

        let yaml = serde_yaml::to_string(&services).map_err(|e| {
            ContainerError::Validation(format!("could not render compose file: {}", e))
        })?;

        let compose_path = self.pathconfig.compose_path();
        debug!("writing compose file to {}", compose_path.display());
        std::fs::write(compose_path, yaml)?;
        Ok(run_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_in(dir: &Path, manifest: Option<Manifest>) -> ContainerFsHandler {
        std::fs::create_dir_all(env::localdock_dir_path(dir)).unwrap();
        ContainerFsHandler::new(PathConfig::new(dir.to_path_buf()), manifest)
    }

    fn v1_manifest() -> Manifest {
        serde_json::from_str(
            r#"{
                "AWSEBDockerrunVersion": "1",
                "Image": {"Name": "janedoe/image"},
                "Ports": [{"ContainerPort": "5000"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_require_new_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path(), None);
        assert!(handler.require_new_dockerfile());

        std::fs::write(env::dockerfile_path(dir.path()), "FROM nginx\n").unwrap();
        let handler = handler_in(dir.path(), None);
        assert!(!handler.require_new_dockerfile());
    }

    #[test]
    fn test_make_dockerfile_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path(), Some(v1_manifest()));
        handler.make_dockerfile().unwrap();

        let written = std::fs::read_to_string(env::new_dockerfile_path(dir.path())).unwrap();
        assert_eq!(
            written,
            format!("FROM janedoe/image{sep}EXPOSE 5000{sep}", sep = LINE_SEP)
        );
    }

    #[test]
    fn test_make_dockerfile_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path(), None);
        assert!(matches!(
            handler.make_dockerfile(),
            Err(ContainerError::Validation(_))
        ));
    }

    #[test]
    fn test_copy_dockerfile_writes_runtime_contents() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path(), None);
        let config = ContainerConfig::load().unwrap();
        let stack = SolutionStack::new(
            "64bit Debian jessie v1.2.0 running GlassFish 4.1 Java 8 (Preconfigured - Docker)",
        );

        handler.copy_dockerfile(&stack, &config).unwrap();

        let written = std::fs::read_to_string(env::new_dockerfile_path(dir.path())).unwrap();
        assert!(written.starts_with("FROM localdock/glassfish-runtime:4.1-jdk8"));
    }

    #[test]
    fn test_dockerignore_append_reprobes_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path(), None);

        assert!(handler.require_append_dockerignore());
        handler.append_dockerignore().unwrap();
        assert!(!handler.require_append_dockerignore());

        // a second append changes nothing
        let first = std::fs::read_to_string(env::dockerignore_path(dir.path())).unwrap();
        handler.append_dockerignore().unwrap();
        let second = std::fs::read_to_string(env::dockerignore_path(dir.path())).unwrap();
        assert_eq!(first, second);

        // external edits are seen on the next probe
        std::fs::write(env::dockerignore_path(dir.path()), "node_modules\n").unwrap();
        assert!(handler.require_append_dockerignore());
    }

    #[test]
    fn test_dockerignore_append_preserves_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(env::dockerignore_path(dir.path()), "node_modules").unwrap();

        let handler = handler_in(dir.path(), None);
        handler.append_dockerignore().unwrap();

        let contents = std::fs::read_to_string(env::dockerignore_path(dir.path())).unwrap();
        assert_eq!(
            contents,
            format!(
                "node_modules{sep}{}{sep}",
                DOCKERIGNORE_MARKER,
                sep = LINE_SEP
            )
        );
    }

    #[test]
    fn test_registry_auth_only_required_when_manifest_asks() {
        let dir = tempfile::tempdir().unwrap();

        let no_auth = handler_in(dir.path(), Some(v1_manifest()));
        no_auth.require_registry_auth().unwrap();

        let with_auth: Manifest = serde_json::from_str(
            r#"{
                "AWSEBDockerrunVersion": "1",
                "Authentication": {"Bucket": "my-bucket", "Key": "docker/.dockercfg"}
            }"#,
        )
        .unwrap();
        let handler = handler_in(dir.path(), Some(with_auth));
        assert!(matches!(
            handler.require_registry_auth(),
            Err(ContainerError::Validation(_))
        ));

        std::fs::write(env::dockercfg_path(dir.path()), "{}").unwrap();
        let handler = ContainerFsHandler::new(
            PathConfig::new(dir.path().to_path_buf()),
            handler.manifest.clone(),
        );
        handler.require_registry_auth().unwrap();
    }

    #[test]
    fn test_make_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(env::localdock_dir_path(dir.path())).unwrap();

        let manifest: Manifest = serde_json::from_str(
            r#"{
                "AWSEBDockerrunVersion": 2,
                "containerDefinitions": [
                    {
                        "name": "web-app",
                        "image": "nginx",
                        "essential": true,
                        "mountPoints": [
                            {"sourceVolume": "awseb-logs-web-app", "containerPath": "/var/log/nginx"}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        let handler =
            MultiContainerFsHandler::new(PathConfig::new(dir.path().to_path_buf()), manifest);
        let run_path = handler.make_compose_file(&EnvvarCollector::default()).unwrap();

        assert!(run_path.starts_with(env::logdir_path(dir.path())));
        assert!(run_path.join("web-app").is_dir());

        let yaml = std::fs::read_to_string(env::compose_path(dir.path())).unwrap();
        assert!(yaml.contains("webapp:"));
        assert!(yaml.contains("image: nginx"));
    }
}
