//! Project path resolution.
//!
//! [`PathConfig`] is built once per invocation: the project root is found by
//! ascending from the working directory until a `.localdock/` marker
//! directory appears, and every path a run touches is resolved from it. The
//! `*_exists` booleans are probed exactly once at construction and not
//! re-checked later in the run; steps that follow rely on that snapshot
//! staying stable.

use super::{ContainerError, Result};
use crate::env;
use std::path::{Path, PathBuf};

/// Absolute paths and one-shot existence probes for one run.
#[derive(Debug, Clone)]
pub struct PathConfig {
    project_root: PathBuf,
    dockerrun_path: PathBuf,
    dockerfile_path: PathBuf,
    new_dockerfile_path: PathBuf,
    dockerignore_path: PathBuf,
    dockercfg_path: PathBuf,
    compose_path: PathBuf,
    logdir_path: PathBuf,
    state_file_path: PathBuf,
    dockerfile_exists: bool,
    dockerrun_exists: bool,
}

impl PathConfig {
    /// Resolve all paths from a known project root, probing for the
    /// user-authored Dockerfile and manifest as of right now.
    pub fn new(project_root: PathBuf) -> Self {
        let dockerfile_path = env::dockerfile_path(&project_root);
        let dockerrun_path = env::dockerrun_path(&project_root);
        let dockerfile_exists = dockerfile_path.is_file();
        let dockerrun_exists = dockerrun_path.is_file();

        Self {
            dockerignore_path: env::dockerignore_path(&project_root),
            new_dockerfile_path: env::new_dockerfile_path(&project_root),
            dockercfg_path: env::dockercfg_path(&project_root),
            compose_path: env::compose_path(&project_root),
            logdir_path: env::logdir_path(&project_root),
            state_file_path: env::state_file_path(&project_root),
            project_root,
            dockerrun_path,
            dockerfile_path,
            dockerfile_exists,
            dockerrun_exists,
        }
    }

    /// Ascend from the working directory until a directory containing
    /// `.localdock/` is found.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Ascend from `start` until a directory containing `.localdock/` is
    /// found.
    pub fn discover_from(start: &Path) -> Result<Self> {
        let root = find_project_root(start).ok_or_else(|| {
            ContainerError::Validation(format!(
                "no {} directory found in {} or any parent; run 'localdock' from an initialized project",
                env::LOCALDOCK_DIR_NAME,
                start.display()
            ))
        })?;
        Ok(Self::new(root))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn dockerrun_path(&self) -> &Path {
        &self.dockerrun_path
    }

    /// Where a user-authored Dockerfile would live.
    pub fn dockerfile_path(&self) -> &Path {
        &self.dockerfile_path
    }

    /// Where the generated Dockerfile goes when the user has none.
    pub fn new_dockerfile_path(&self) -> &Path {
        &self.new_dockerfile_path
    }

    /// The Dockerfile pulls and builds actually use: the user's if it
    /// existed at construction time, the generated one otherwise.
    pub fn effective_dockerfile_path(&self) -> &Path {
        if self.dockerfile_exists {
            &self.dockerfile_path
        } else {
            &self.new_dockerfile_path
        }
    }

    pub fn dockerignore_path(&self) -> &Path {
        &self.dockerignore_path
    }

    pub fn dockercfg_path(&self) -> &Path {
        &self.dockercfg_path
    }

    pub fn compose_path(&self) -> &Path {
        &self.compose_path
    }

    pub fn logdir_path(&self) -> &Path {
        &self.logdir_path
    }

    pub fn state_file_path(&self) -> &Path {
        &self.state_file_path
    }

    /// Whether the user authored a Dockerfile (as of construction).
    pub fn dockerfile_exists(&self) -> bool {
        self.dockerfile_exists
    }

    /// Whether the project has a manifest (as of construction).
    pub fn dockerrun_exists(&self) -> bool {
        self.dockerrun_exists
    }
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(env::LOCALDOCK_DIR_NAME).is_dir())
        .map(Path::to_path_buf)
}
