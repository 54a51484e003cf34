//! Solution stack capability detection.
//!
//! A solution stack is an opaque identifier like
//! `64bit Debian jessie v1.2.0 running GlassFish 4.1 Java 8 (Preconfigured - Docker)`.
//! The bundled registry maps it to one of three container modes: generic
//! (Dockerfile synthesized from the manifest), preconfigured (a runtime
//! Dockerfile shipped with the tool), or multi-container (docker-compose).
//! Anything else is not container-capable.

use super::{ContainerError, Result};
use serde::Deserialize;

const CONTAINER_CONFIG_JSON: &str = include_str!("containerfiles/container_config.json");

const GLASSFISH_41_JDK8_DOCKERFILE: &str =
    include_str!("containerfiles/glassfish-runtime-4.1-jdk8");
const GO_14_DOCKERFILE: &str = include_str!("containerfiles/go-runtime-1.4");

/// An environment's solution stack identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionStack {
    name: String,
}

impl SolutionStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full stack identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The platform portion of the identifier: the text after " running "
    /// in a full stack name, or the whole name when given a shorthand.
    pub fn platform_shorthand(&self) -> &str {
        match self.name.split_once(" running ") {
            Some((_, platform)) => platform,
            None => &self.name,
        }
    }
}

impl std::fmt::Display for SolutionStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Bundled registry of container-capable platforms.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    generic_containers: PlatformEntry,
    multi_containers: PlatformEntry,
    preconfigured_containers: Vec<PreconfiguredEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlatformEntry {
    platform: String,
}

/// One preconfigured runtime the tool ships a Dockerfile for.
#[derive(Debug, Clone, Deserialize)]
pub struct PreconfiguredEntry {
    version: String,
    platform_name: String,
    runtime_image: String,
    runtime_dockerfile: String,
    runtime_default_log: String,
}

impl ContainerConfig {
    /// Load the registry bundled into the binary.
    pub fn load() -> Result<Self> {
        serde_json::from_str(CONTAINER_CONFIG_JSON)
            .map_err(|e| ContainerError::Validation(format!("bundled container config: {}", e)))
    }

    /// Whether the stack runs containers at all.
    pub fn is_container(&self, stack: &SolutionStack) -> bool {
        self.is_preconfigured(stack) || self.is_generic(stack)
    }

    /// Whether the stack runs generic single containers.
    pub fn is_generic(&self, stack: &SolutionStack) -> bool {
        let shorthand = stack.platform_shorthand();
        shorthand.starts_with(&self.generic_containers.platform)
            && !shorthand.starts_with(&self.multi_containers.platform)
    }

    /// Whether the stack runs multi-container projects.
    pub fn is_multi(&self, stack: &SolutionStack) -> bool {
        stack
            .platform_shorthand()
            .starts_with(&self.multi_containers.platform)
    }

    /// Whether the stack matches a bundled preconfigured runtime.
    pub fn is_preconfigured(&self, stack: &SolutionStack) -> bool {
        self.preconfig_entry(stack).is_some()
    }

    /// Runtime image a preconfigured Dockerfile must be based on.
    pub fn runtime_image(&self, stack: &SolutionStack) -> Result<&str> {
        self.require_preconfig_entry(stack)
            .map(|entry| entry.runtime_image.as_str())
    }

    /// Bundled Dockerfile contents for a preconfigured stack.
    pub fn runtime_dockerfile_contents(&self, stack: &SolutionStack) -> Result<&'static str> {
        let entry = self.require_preconfig_entry(stack)?;
        match entry.runtime_dockerfile.as_str() {
            "glassfish-runtime-4.1-jdk8" => Ok(GLASSFISH_41_JDK8_DOCKERFILE),
            "go-runtime-1.4" => Ok(GO_14_DOCKERFILE),
            other => Err(ContainerError::Validation(format!(
                "no bundled Dockerfile named {}",
                other
            ))),
        }
    }

    /// Container-side path where a preconfigured runtime writes its logs.
    pub fn runtime_default_log_path(&self, stack: &SolutionStack) -> Result<&str> {
        self.require_preconfig_entry(stack)
            .map(|entry| entry.runtime_default_log.as_str())
    }

    fn preconfig_entry(&self, stack: &SolutionStack) -> Option<&PreconfiguredEntry> {
        let shorthand = stack.platform_shorthand();
        self.preconfigured_containers
            .iter()
            .find(|entry| entry.version == shorthand || entry.platform_name == shorthand)
    }

    fn require_preconfig_entry(&self, stack: &SolutionStack) -> Result<&PreconfiguredEntry> {
        self.preconfig_entry(stack).ok_or_else(|| {
            ContainerError::NotSupported(format!(
                "{} is not a preconfigured container platform",
                stack
            ))
        })
    }
}
