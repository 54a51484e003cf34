//! Host-environment compatibility: is a usable engine installed, and what
//! address do its containers answer on.

use super::commands;
use super::{ContainerError, Result};
use crate::runner::CommandRunner;
use tracing::debug;

/// Oldest docker release the generated command lines work against.
pub const MIN_DOCKER_VERSION: &str = "1.6.0";

const LOCALHOST: &str = "127.0.0.1";

/// Fail with guidance when docker is missing or too old.
pub async fn validate_docker_installed(runner: &CommandRunner) -> Result<()> {
    if which::which("docker").is_err() {
        return Err(ContainerError::Validation(
            "docker is not installed or not on PATH; install docker to run \
             your project locally"
                .into(),
        ));
    }

    let installed = commands::version(runner).await?;
    if version_at_least(&installed, MIN_DOCKER_VERSION) {
        Ok(())
    } else {
        Err(ContainerError::Validation(format!(
            "docker {} found, but at least {} is required",
            installed, MIN_DOCKER_VERSION
        )))
    }
}

/// The address containers are reachable at. Hosts running the engine in a
/// docker-machine VM answer on the machine's address; everything else is
/// localhost. Lookup failures degrade to localhost.
pub async fn container_ip(runner: &CommandRunner) -> String {
    match runner.run_quiet("docker-machine", &["ip".to_string()]).await {
        Ok(output) => {
            let ip = output.trim();
            if ip.is_empty() {
                LOCALHOST.to_string()
            } else {
                ip.to_string()
            }
        }
        Err(e) => {
            debug!("no docker-machine ip: {}", e);
            LOCALHOST.to_string()
        }
    }
}

/// Numeric dotted-version comparison; a non-numeric component ends the
/// comparison for that side (`1.6.0-rc1` compares as `1.6`).
fn version_at_least(installed: &str, min: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> {
        v.split('.')
            .map_while(|part| part.parse::<u32>().ok())
            .collect()
    };
    parse(installed) >= parse(min)
}
