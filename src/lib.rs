//! # localdock
//!
//! Runs a deployable project in local docker containers the same way the
//! hosting platform would, driven entirely through the `docker` and
//! `docker-compose` command-line tools.
//!
//! A project directory is inspected for a `Dockerrun.aws.json` manifest
//! and/or a `Dockerfile`; from those, localdock synthesizes the missing
//! build inputs under `.localdock/`, builds and runs the container (or
//! renders a `docker-compose.yml` and brings the whole service set up),
//! mounts per-run log directories, and keeps a `latest` symlink pointing at
//! the newest run's logs.
//!
//! ## Architecture Overview
//!
//! - **[`runner`]**: async subprocess execution with live output echoing
//!   and engine-error interpretation
//! - **[`container`]**: manifest parsing, platform capability registry,
//!   generated build artifacts, the run lifecycle, and status projection
//! - **[`env`]**: the `.localdock/` path layout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use localdock::container::factory::{make_container, ContainerOptions};
//! use localdock::container::paths::PathConfig;
//! use localdock::container::platform::SolutionStack;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stack = SolutionStack::new("64bit Amazon Linux 2015.03 v1.4.3 running Docker 1.6.2");
//!     let container = make_container(PathConfig::discover()?, stack, ContainerOptions::default())?;
//!     container.validate()?;
//!     container.start().await?;
//!     Ok(())
//! }
//! ```

pub mod container;
pub mod env;
pub mod runner;

pub use container::{ContainerError, LocalContainer};
pub use runner::{CommandError, CommandRunner, RunnerError};
