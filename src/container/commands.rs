//! docker / docker-compose invocation wrappers.
//!
//! Every function here assembles one engine command line, runs it through
//! the [`CommandRunner`](crate::runner::CommandRunner), and interprets the
//! output. Argument shapes are part of the tool's contract with the engine
//! and must not drift.

use super::manifest::value_to_string;
use super::{ContainerError, Result};
use crate::runner::{CommandError, CommandRunner};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FROM_CMD: &str = "FROM";
pub const EXPOSE_CMD: &str = "EXPOSE";
const LATEST_TAG: &str = ":latest";

const DOCKER: &str = "docker";
const DOCKER_COMPOSE: &str = "docker-compose";

fn build_success_re() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?im)^successfully built (\S+)\s*$").unwrap()
    })
}

/// Pull the base image named in the Dockerfile at `dockerfile_path`,
/// defaulting the tag to `:latest` when none is given.
pub async fn pull_img(runner: &CommandRunner, dockerfile_path: &Path) -> Result<String> {
    let img = default_tag(&base_image_from_dockerfile(dockerfile_path)?);
    let output = runner
        .run_live(DOCKER, &["pull".to_string(), img])
        .await?;
    Ok(output)
}

/// Append `:latest` unless the image name already carries a tag. A colon
/// counts as a tag separator only after the last slash, so a registry
/// host:port prefix (`host:5000/name`) is not mistaken for a tag.
pub fn default_tag(img: &str) -> String {
    let after_last_slash = match img.rsplit_once('/') {
        Some((_, rest)) => rest,
        None => img,
    };

    if after_last_slash.contains(':') {
        img.to_string()
    } else {
        format!("{}{}", img, LATEST_TAG)
    }
}

/// Build an image from `project_path`, optionally with an explicit
/// Dockerfile, and return the image ID parsed from the build output.
pub async fn build_img(
    runner: &CommandRunner,
    project_path: &Path,
    dockerfile_path: Option<&Path>,
) -> Result<String> {
    let img_tag = format!("{}:{}", random_token(), random_token());
    let args = build_args(&img_tag, project_path, dockerfile_path);
    let output = runner.run_live(DOCKER, &args).await?;
    img_id_from_build_output(&output)
}

fn build_args(img_tag: &str, project_path: &Path, dockerfile_path: Option<&Path>) -> Vec<String> {
    let mut args = vec!["build".to_string(), "-t".to_string(), img_tag.to_string()];
    if let Some(dockerfile) = dockerfile_path {
        args.push("-f".to_string());
        args.push(dockerfile.to_string_lossy().into_owned());
    }
    args.push(project_path.to_string_lossy().into_owned());
    args
}

/// The image ID is the token on the final "Successfully built" line.
/// Any other output shape is an engine interpretation failure, not a
/// parser crash.
fn img_id_from_build_output(output: &str) -> Result<String> {
    let id = build_success_re()
        .captures_iter(output)
        .last()
        .map(|captures| captures[1].to_string());

    match id {
        Some(id) => Ok(id),
        None => Err(ContainerError::Command(CommandError::interpretation(
            "could not find the built image ID in docker build output",
            output,
        ))),
    }
}

/// Run a container from `image_id`. The container port comes from the
/// effective Dockerfile's EXPOSE line; the host port defaults to it.
pub async fn run_container(
    runner: &CommandRunner,
    dockerfile_path: &Path,
    image_id: &str,
    host_port: Option<&str>,
    envvars: &HashMap<String, String>,
    volume_map: &HashMap<PathBuf, String>,
    name: Option<&str>,
) -> Result<()> {
    let container_port = container_port_from_dockerfile(dockerfile_path)?;
    let host_port = host_port.unwrap_or(&container_port);
    let args = run_args(image_id, &container_port, host_port, envvars, volume_map, name);
    runner.run_live(DOCKER, &args).await?;
    Ok(())
}

fn run_args(
    image_id: &str,
    container_port: &str,
    host_port: &str,
    envvars: &HashMap<String, String>,
    volume_map: &HashMap<PathBuf, String>,
    name: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-i".to_string(),
        "-t".to_string(),
        "--rm".to_string(),
        "-p".to_string(),
        format!("{}:{}", host_port, container_port),
    ];

    let mut env_keys: Vec<_> = envvars.keys().collect();
    env_keys.sort();
    for key in env_keys {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, envvars[key]));
    }

    let mut volume_keys: Vec<_> = volume_map.keys().collect();
    volume_keys.sort();
    for host_path in volume_keys {
        args.push("-v".to_string());
        args.push(format!("{}:{}", host_path.display(), volume_map[host_path]));
    }

    if let Some(name) = name {
        args.push("--name".to_string());
        args.push(name.to_string());
    }

    args.push(image_id.to_string());
    args
}

/// Remove a container by ID or name. Not-found failures surface as
/// [`CommandError`]; idempotent-removal policy lives with the caller.
pub async fn rm_container(runner: &CommandRunner, container_id: &str, force: bool) -> Result<()> {
    let mut args = vec!["rm".to_string()];
    if force {
        args.push("-f".to_string());
    }
    args.push(container_id.to_string());
    runner.run_quiet(DOCKER, &args).await?;
    Ok(())
}

/// Build and run all services in the generated compose file.
pub async fn up(
    runner: &CommandRunner,
    compose_path: Option<&Path>,
    allow_insecure_ssl: bool,
) -> Result<()> {
    let mut args = Vec::new();
    if let Some(path) = compose_path {
        args.push("-f".to_string());
        args.push(path.to_string_lossy().into_owned());
    }
    args.push("up".to_string());
    if allow_insecure_ssl {
        args.push("--allow-insecure-ssl".to_string());
    }

    debug!("compose args: {:?}", args);
    runner.run_live(DOCKER_COMPOSE, &args).await?;
    Ok(())
}

/// Low-level info for a container, as `docker inspect` reports it.
pub async fn container_lowlvl_info(
    runner: &CommandRunner,
    container_id: &str,
) -> Result<serde_json::Value> {
    let output = runner
        .run_quiet(DOCKER, &["inspect".to_string(), container_id.to_string()])
        .await?;

    let parsed: serde_json::Value = serde_json::from_str(&output).map_err(|_| {
        ContainerError::Command(CommandError::interpretation(
            "unexpected docker inspect output",
            output.clone(),
        ))
    })?;

    parsed.get(0).cloned().ok_or_else(|| {
        ContainerError::Command(CommandError::interpretation(
            "docker inspect returned an empty result",
            output,
        ))
    })
}

/// Whether a container with this ID or name exists. Engine-level failures
/// mean "no"; a missing engine binary still propagates.
pub async fn is_container_existent(runner: &CommandRunner, container_id: &str) -> Result<bool> {
    match container_lowlvl_info(runner, container_id).await {
        Ok(_) => Ok(true),
        Err(ContainerError::Command(_)) => Ok(false),
        Err(other) => Err(other),
    }
}

/// Whether the container is currently running. Query failures degrade to
/// false.
pub async fn is_running(runner: &CommandRunner, container_id: &str) -> Result<bool> {
    match container_lowlvl_info(runner, container_id).await {
        Ok(info) => Ok(info["State"]["Running"].as_bool().unwrap_or(false)),
        Err(ContainerError::Command(_)) => Ok(false),
        Err(other) => Err(other),
    }
}

/// Host ports currently exposed by the container. A port map entry with no
/// bindings means "no binding", not an error; query failures degrade to an
/// empty list.
pub async fn exposed_hostports(runner: &CommandRunner, container_id: &str) -> Result<Vec<String>> {
    let info = match container_lowlvl_info(runner, container_id).await {
        Ok(info) => info,
        Err(ContainerError::Command(_)) => return Ok(Vec::new()),
        Err(other) => return Err(other),
    };

    let mut hostports = Vec::new();
    if let Some(ports) = info["NetworkSettings"]["Ports"].as_object() {
        for bindings in ports.values() {
            let Some(bindings) = bindings.as_array() else {
                continue;
            };
            for binding in bindings {
                if let Some(port) = binding.get("HostPort") {
                    hostports.push(value_to_string(port));
                }
            }
        }
    }
    hostports.sort();
    Ok(hostports)
}

/// Installed docker version. Format: `Docker version X.Y.Z, build …`;
/// the version is the third whitespace-separated token, comma stripped.
pub async fn version(runner: &CommandRunner) -> Result<String> {
    let output = runner
        .run_quiet(DOCKER, &["--version".to_string()])
        .await?;
    parse_version_token(&output, 2)
}

/// Installed docker-compose version: the last whitespace-separated token.
pub async fn compose_version(runner: &CommandRunner) -> Result<String> {
    let output = runner
        .run_quiet(DOCKER_COMPOSE, &["--version".to_string()])
        .await?;

    output
        .split_whitespace()
        .last()
        .map(|token| token.to_string())
        .ok_or_else(|| {
            ContainerError::Command(CommandError::interpretation(
                "unexpected docker-compose --version output",
                output,
            ))
        })
}

fn parse_version_token(output: &str, index: usize) -> Result<String> {
    output
        .split_whitespace()
        .nth(index)
        .map(|token| token.trim_end_matches(',').to_string())
        .ok_or_else(|| {
            ContainerError::Command(CommandError::interpretation(
                "unexpected docker --version output",
                output,
            ))
        })
}

/// The image named by the first FROM line of a Dockerfile.
pub fn base_image_from_dockerfile(dockerfile_path: &Path) -> Result<String> {
    first_directive_value(dockerfile_path, FROM_CMD, "no base image (FROM) found in Dockerfile")
}

/// The port named by the first EXPOSE line of a Dockerfile.
pub fn container_port_from_dockerfile(dockerfile_path: &Path) -> Result<String> {
    first_directive_value(dockerfile_path, EXPOSE_CMD, "no port (EXPOSE) found in Dockerfile")
}

fn first_directive_value(path: &Path, directive: &str, missing_msg: &str) -> Result<String> {
    let contents = std::fs::read_to_string(path)?;

    contents
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(directive))
        .filter_map(|line| line.split_whitespace().nth(1))
        .next()
        .map(|value| value.to_string())
        .ok_or_else(|| ContainerError::Validation(missing_msg.to_string()))
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}
