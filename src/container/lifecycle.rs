//! Container lifecycle: what it means to "run the project locally".
//!
//! A [`SingleContainer`] drives a V1 project through Dockerfile synthesis,
//! pull, build, and `docker run`; a [`MultiContainer`] renders a compose
//! file from a V2 manifest and hands the run to `docker-compose`. Both are
//! unified by [`LocalContainer`] so callers can stay flavor-agnostic.

use super::commands;
use super::fshandler::{self, ContainerFsHandler, MultiContainerFsHandler};
use super::logdir;
use super::manifest;
use super::paths::PathConfig;
use super::platform::{ContainerConfig, SolutionStack};
use super::{ContainerError, Result};
use crate::env;
use crate::runner::CommandRunner;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info};

/// Compose project prefix; docker-compose names containers
/// `{prefix}_{service}_1`.
pub const PROJ_NAME: &str = "localdock";

/// How a single-container project gets its Dockerfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFlavor {
    /// Dockerfile from the project, or synthesized from the manifest
    Generic,
    /// Dockerfile copied from a preconfigured platform runtime
    Preconfigured,
}

/// A V1 project run through `docker run`.
#[derive(Debug)]
pub struct SingleContainer {
    fs_handler: ContainerFsHandler,
    runner: CommandRunner,
    stack: SolutionStack,
    config: ContainerConfig,
    flavor: ContainerFlavor,
    host_port: Option<String>,
    env: super::envvars::EnvvarCollector,
}

impl SingleContainer {
    pub fn new(
        fs_handler: ContainerFsHandler,
        runner: CommandRunner,
        stack: SolutionStack,
        config: ContainerConfig,
        flavor: ContainerFlavor,
        host_port: Option<String>,
        env: super::envvars::EnvvarCollector,
    ) -> Self {
        Self {
            fs_handler,
            runner,
            stack,
            config,
            flavor,
            host_port,
            env,
        }
    }

    pub fn pathconfig(&self) -> &PathConfig {
        self.fs_handler.pathconfig()
    }

    /// The container name: stable per project directory, so repeated runs
    /// replace rather than accumulate.
    pub fn name(&self) -> String {
        project_hash(self.pathconfig())
    }

    /// Check the project is structurally runnable before touching the
    /// engine.
    pub fn validate(&self) -> Result<()> {
        match self.flavor {
            ContainerFlavor::Generic => manifest::validate_v1(
                self.fs_handler.manifest(),
                self.fs_handler.require_new_dockerfile(),
            ),
            ContainerFlavor::Preconfigured => self.validate_preconfigured_dockerfile(),
        }
    }

    /// A user-provided Dockerfile on a preconfigured platform must build
    /// from that platform's runtime image.
    fn validate_preconfigured_dockerfile(&self) -> Result<()> {
        if self.fs_handler.require_new_dockerfile() {
            return Ok(());
        }

        let base =
            commands::base_image_from_dockerfile(self.pathconfig().dockerfile_path())?;
        let expected = self.config.runtime_image(&self.stack)?;
        if base == expected {
            Ok(())
        } else {
            Err(ContainerError::Validation(format!(
                "Dockerfile must build from {} on this platform, found {}",
                expected, base
            )))
        }
    }

    /// Run the whole single-container sequence. Callers validate first;
    /// this does not re-validate.
    pub async fn start(&self) -> Result<()> {
        if self.fs_handler.require_append_dockerignore() {
            self.fs_handler.append_dockerignore()?;
        }

        let generated_dockerfile = self.fs_handler.require_new_dockerfile();
        self.containerize()?;
        self.fs_handler.require_registry_auth()?;

        if manifest::require_pull(self.fs_handler.manifest()) {
            info!("pulling base image");
            commands::pull_img(&self.runner, self.pathconfig().effective_dockerfile_path())
                .await?;
        }

        self.remove_existing().await?;

        info!("building image");
        let dockerfile_override = if generated_dockerfile {
            Some(self.pathconfig().new_dockerfile_path())
        } else {
            None
        };
        let img_id = commands::build_img(
            &self.runner,
            self.pathconfig().project_root(),
            dockerfile_override,
        )
        .await?;

        let volume_map = self.log_volume_map();
        let log_root = self.pathconfig().logdir_path();
        for host_path in volume_map.keys() {
            logdir::make_logdirs(log_root, host_path)?;
        }

        info!(image = %img_id, name = %self.name(), "running container");
        commands::run_container(
            &self.runner,
            self.pathconfig().effective_dockerfile_path(),
            &img_id,
            self.host_port.as_deref(),
            &self.final_envvars(),
            &volume_map,
            Some(&self.name()),
        )
        .await
    }

    pub async fn is_running(&self) -> Result<bool> {
        commands::is_running(&self.runner, &self.name()).await
    }

    /// Variables handed to `docker run`, with removals already applied.
    pub fn final_envvars(&self) -> HashMap<String, String> {
        self.env.filtered().map().clone()
    }

    fn containerize(&self) -> Result<()> {
        if !self.fs_handler.require_new_dockerfile() {
            return Ok(());
        }

        match self.flavor {
            ContainerFlavor::Generic => self.fs_handler.make_dockerfile(),
            ContainerFlavor::Preconfigured => {
                self.fs_handler.copy_dockerfile(&self.stack, &self.config)
            }
        }
    }

    /// Stale-container removal failures from the engine are non-fatal;
    /// a missing engine is not.
    async fn remove_existing(&self) -> Result<()> {
        match commands::rm_container(&self.runner, &self.name(), true).await {
            Ok(()) => Ok(()),
            Err(ContainerError::Command(e)) => {
                debug!("removing previous container: {}", e);
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Host-to-container log mount. Preconfigured platforms fall back to
    /// the runtime's default log location when the manifest is silent.
    fn log_volume_map(&self) -> HashMap<PathBuf, String> {
        let log_root = self.pathconfig().logdir_path();
        let from_manifest = logdir::get_log_volume_map(log_root, self.fs_handler.manifest());
        if !from_manifest.is_empty() {
            return from_manifest;
        }

        if self.flavor == ContainerFlavor::Preconfigured {
            if let Ok(default_log) = self.config.runtime_default_log_path(&self.stack) {
                return HashMap::from([(
                    logdir::new_run_path(log_root),
                    default_log.to_string(),
                )]);
            }
        }

        HashMap::new()
    }
}

/// A V2 project run through `docker-compose`.
#[derive(Debug)]
pub struct MultiContainer {
    fs_handler: MultiContainerFsHandler,
    runner: CommandRunner,
    env: super::envvars::EnvvarCollector,
    allow_insecure_ssl: bool,
}

impl MultiContainer {
    pub fn new(
        fs_handler: MultiContainerFsHandler,
        runner: CommandRunner,
        env: super::envvars::EnvvarCollector,
        allow_insecure_ssl: bool,
    ) -> Self {
        Self {
            fs_handler,
            runner,
            env,
            allow_insecure_ssl,
        }
    }

    pub fn pathconfig(&self) -> &PathConfig {
        self.fs_handler.pathconfig()
    }

    pub fn validate(&self) -> Result<()> {
        manifest::validate_v2(Some(self.fs_handler.manifest()))
    }

    /// Render the compose file, clear stale service containers, and bring
    /// the service set up. Callers validate first.
    pub async fn start(&self) -> Result<()> {
        fshandler::require_registry_auth(self.pathconfig(), Some(self.fs_handler.manifest()))?;

        self.fs_handler.make_compose_file(&self.env)?;
        self.remove_existing().await?;

        info!("starting services with docker-compose");
        commands::up(
            &self.runner,
            Some(self.pathconfig().compose_path()),
            self.allow_insecure_ssl,
        )
        .await
    }

    /// Service names from the generated compose file, re-read on every
    /// call. No compose file means no services yet.
    pub fn list_services(&self) -> Result<Vec<String>> {
        let contents = match std::fs::read_to_string(self.pathconfig().compose_path()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let services: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&contents)
            .map_err(|e| {
                ContainerError::Validation(format!(
                    "{} is not a valid compose file: {}",
                    env::COMPOSE_FILENAME,
                    e
                ))
            })?;

        Ok(services.into_keys().collect())
    }

    /// Container names docker-compose assigns to this project's services.
    pub fn container_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_services()?
            .into_iter()
            .map(|service| compose_container_name(&service))
            .collect())
    }

    pub async fn is_running(&self) -> Result<bool> {
        for name in self.container_names()? {
            if commands::is_running(&self.runner, &name).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn final_envvars(&self) -> HashMap<String, String> {
        self.env.filtered().map().clone()
    }

    async fn remove_existing(&self) -> Result<()> {
        for name in self.container_names()? {
            if commands::is_container_existent(&self.runner, &name).await? {
                if let Err(ContainerError::Command(e)) =
                    commands::rm_container(&self.runner, &name, true).await
                {
                    debug!("removing previous service container {}: {}", name, e);
                }
            }
        }
        Ok(())
    }
}

/// Either flavor of local run, behind one surface.
#[derive(Debug)]
pub enum LocalContainer {
    Single(SingleContainer),
    Multi(MultiContainer),
}

impl LocalContainer {
    pub fn pathconfig(&self) -> &PathConfig {
        match self {
            LocalContainer::Single(c) => c.pathconfig(),
            LocalContainer::Multi(c) => c.pathconfig(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            LocalContainer::Single(c) => c.validate(),
            LocalContainer::Multi(c) => c.validate(),
        }
    }

    pub async fn start(&self) -> Result<()> {
        match self {
            LocalContainer::Single(c) => c.start().await,
            LocalContainer::Multi(c) => c.start().await,
        }
    }

    pub async fn is_running(&self) -> Result<bool> {
        match self {
            LocalContainer::Single(c) => c.is_running().await,
            LocalContainer::Multi(c) => c.is_running().await,
        }
    }

    /// Names of the containers this project runs under.
    pub fn container_names(&self) -> Result<Vec<String>> {
        match self {
            LocalContainer::Single(c) => Ok(vec![c.name()]),
            LocalContainer::Multi(c) => c.container_names(),
        }
    }

    pub fn final_envvars(&self) -> HashMap<String, String> {
        match self {
            LocalContainer::Single(c) => c.final_envvars(),
            LocalContainer::Multi(c) => c.final_envvars(),
        }
    }
}

/// SHA-1 of the project path; hex, so it is a valid container name.
pub fn project_hash(pathconfig: &PathConfig) -> String {
    let digest = Sha1::digest(pathconfig.project_root().to_string_lossy().as_bytes());
    format!("{:x}", digest)
}

/// `docker-compose` container naming for a service in this project.
pub fn compose_container_name(service: &str) -> String {
    format!("{}_{}_1", PROJ_NAME, service)
}
