//! Local container orchestration.
//!
//! Translates a declarative `Dockerrun.aws.json` manifest into a local
//! container run: a generated Dockerfile (when the user did not author one),
//! a pull/remove/build/run lifecycle driven through the `docker` CLI, and a
//! generated `docker-compose.yml` plus `docker-compose up` for
//! multi-container projects. Per-run log directories are kept under
//! `.localdock/logs/local/<timestamp>/` with a `latest` symlink.
//!
//! ## Architecture
//!
//! - [`manifest`]: Dockerrun manifest parsing, validation, typed accessors
//! - [`platform`]: solution stack capability registry (generic /
//!   preconfigured / multi-container)
//! - [`paths`]: project-root discovery and per-run path resolution
//! - [`fshandler`]: generated build artifacts and ignore-file maintenance
//! - [`compose`]: manifest to docker-compose structure translation
//! - [`logdir`]: timestamp-keyed log run directories and `latest` symlink
//! - [`commands`]: docker / docker-compose invocation wrappers
//! - [`lifecycle`]: the single/multi container run state machine
//! - [`factory`]: container variant selection from stack + manifest
//! - [`viewmodel`]: read-only projection of running container state
//!
//! ## Usage
//!
//! ```rust,no_run
//! use localdock::container::factory::{make_container, ContainerOptions};
//! use localdock::container::paths::PathConfig;
//! use localdock::container::platform::SolutionStack;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stack = SolutionStack::new("64bit Amazon Linux 2014.03 v1.0.9 running Docker 1.2.0");
//!     let container = make_container(PathConfig::discover()?, stack, ContainerOptions::default())?;
//!     container.validate()?;
//!     container.start().await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod compat;
pub mod compose;
pub mod envvars;
pub mod factory;
pub mod fshandler;
pub mod lifecycle;
pub mod logdir;
pub mod manifest;
pub mod paths;
pub mod platform;
pub mod state;
pub mod viewmodel;

pub use envvars::EnvvarCollector;
pub use factory::{make_container, ContainerOptions};
pub use fshandler::{ContainerFsHandler, MultiContainerFsHandler};
pub use lifecycle::{ContainerFlavor, LocalContainer, MultiContainer, SingleContainer};
pub use manifest::Manifest;
pub use paths::PathConfig;
pub use platform::{ContainerConfig, SolutionStack};
pub use viewmodel::{ContainerViewModel, ServiceInfo};

use crate::runner::{CommandError, RunnerError};

/// Container orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// An engine process exited non-zero or produced unexpected output
    #[error(transparent)]
    Command(#[from] CommandError),

    /// IO error, including a missing engine binary (`ErrorKind::NotFound`).
    /// Never folded into [`ContainerError::Command`].
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is structurally invalid for the requested operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The solution stack is neither single- nor multi-container-capable
    #[error("{0}")]
    NotSupported(String),
}

impl From<RunnerError> for ContainerError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Command(e) => ContainerError::Command(e),
            RunnerError::Io(e) => ContainerError::Io(e),
        }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
