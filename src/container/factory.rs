//! Puts a runnable [`LocalContainer`] together from the project on disk,
//! the platform name, and command-line options.

use super::envvars::EnvvarCollector;
use super::fshandler::{ContainerFsHandler, MultiContainerFsHandler};
use super::lifecycle::{ContainerFlavor, LocalContainer, MultiContainer, SingleContainer};
use super::manifest::Manifest;
use super::paths::PathConfig;
use super::platform::{ContainerConfig, SolutionStack};
use super::state;
use super::{ContainerError, Result};
use crate::runner::CommandRunner;
use tracing::debug;

/// Command-line options that shape a local run.
#[derive(Debug, Clone, Default)]
pub struct ContainerOptions {
    /// Raw `K=V,K2=` overlay from `--envvars`
    pub envvars: Option<String>,
    /// Host port override from `--port`
    pub host_port: Option<String>,
    /// Pass `--allow-insecure-ssl` through to docker-compose
    pub allow_insecure_ssl: bool,
}

/// Build the right container flavor for this project, or fail fast when
/// the platform cannot run in containers at all.
pub fn make_container(
    pathconfig: PathConfig,
    stack: SolutionStack,
    opts: ContainerOptions,
) -> Result<LocalContainer> {
    let config = ContainerConfig::load()?;

    if !config.is_multi(&stack) && !config.is_container(&stack) {
        return Err(ContainerError::NotSupported(format!(
            "platform \"{}\" does not support local container runs",
            stack.name()
        )));
    }

    let manifest = Manifest::from_file(pathconfig.dockerrun_path())?;
    let env = state::load(pathconfig.state_file_path())?
        .merge(&EnvvarCollector::from_str(opts.envvars.as_deref()));
    let runner = CommandRunner::new();

    if config.is_multi(&stack) {
        debug!("assembling multi-container run");
        let Some(manifest) = manifest else {
            return Err(ContainerError::Validation(
                "multi-container platforms require Dockerrun.aws.json".into(),
            ));
        };
        let fs_handler = MultiContainerFsHandler::new(pathconfig, manifest);
        return Ok(LocalContainer::Multi(MultiContainer::new(
            fs_handler,
            runner,
            env,
            opts.allow_insecure_ssl,
        )));
    }

    let flavor = if config.is_preconfigured(&stack) {
        ContainerFlavor::Preconfigured
    } else {
        ContainerFlavor::Generic
    };
    debug!(?flavor, "assembling single-container run");

    let fs_handler = ContainerFsHandler::new(pathconfig, manifest);
    Ok(LocalContainer::Single(SingleContainer::new(
        fs_handler,
        runner,
        stack,
        config,
        flavor,
        opts.host_port,
        env,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env;

    const DOCKER_STACK: &str = "64bit Amazon Linux 2014.03 v1.0.9 running Docker 1.2.0";
    const MULTI_STACK: &str =
        "64bit Amazon Linux 2014.09 v1.2.0 running Multi-container Docker 1.3.3 (Generic)";

    fn pathconfig_in(dir: &std::path::Path) -> PathConfig {
        std::fs::create_dir_all(env::localdock_dir_path(dir)).unwrap();
        PathConfig::new(dir.to_path_buf())
    }

    #[test]
    fn test_unsupported_platform_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let result = make_container(
            pathconfig_in(dir.path()),
            SolutionStack::new("64bit Amazon Linux 2014.03 v1.0.9 running PHP 5.5"),
            ContainerOptions::default(),
        );
        assert!(matches!(result, Err(ContainerError::NotSupported(_))));
    }

    #[test]
    fn test_docker_platform_yields_single_container() {
        let dir = tempfile::tempdir().unwrap();
        let container = make_container(
            pathconfig_in(dir.path()),
            SolutionStack::new(DOCKER_STACK),
            ContainerOptions::default(),
        )
        .unwrap();
        assert!(matches!(container, LocalContainer::Single(_)));
    }

    #[test]
    fn test_multi_platform_requires_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let result = make_container(
            pathconfig_in(dir.path()),
            SolutionStack::new(MULTI_STACK),
            ContainerOptions::default(),
        );
        assert!(matches!(result, Err(ContainerError::Validation(_))));
    }

    #[test]
    fn test_multi_platform_yields_multi_container() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            env::dockerrun_path(dir.path()),
            r#"{"AWSEBDockerrunVersion": 2, "containerDefinitions": [{"name": "web", "image": "nginx"}]}"#,
        )
        .unwrap();

        let container = make_container(
            pathconfig_in(dir.path()),
            SolutionStack::new(MULTI_STACK),
            ContainerOptions::default(),
        )
        .unwrap();
        assert!(matches!(container, LocalContainer::Multi(_)));
    }

    #[test]
    fn test_cli_envvars_layer_over_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let pathconfig = pathconfig_in(dir.path());
        state::setenv(
            pathconfig.state_file_path(),
            &EnvvarCollector::from_str(Some("A=1,B=old")),
        )
        .unwrap();

        let container = make_container(
            pathconfig,
            SolutionStack::new(DOCKER_STACK),
            ContainerOptions {
                envvars: Some("B=new".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let envvars = container.final_envvars();
        assert_eq!(envvars.get("A").map(String::as_str), Some("1"));
        assert_eq!(envvars.get("B").map(String::as_str), Some("new"));
    }
}
