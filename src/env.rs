//! Path constants and utilities for the localdock project tree.
//!
//! This module centralizes all hardcoded paths and file names used throughout
//! the application, making them easier to maintain and modify.

/// Main application directory name (hidden directory like .git, .vscode)
pub const LOCALDOCK_DIR_NAME: &str = ".localdock";

/// Declarative container manifest file name, expected at the project root
pub const DOCKERRUN_FILENAME: &str = "Dockerrun.aws.json";

/// User-authored Dockerfile name, expected at the project root
pub const DOCKERFILE_FILENAME: &str = "Dockerfile";

/// Name of the Dockerfile we generate when the user did not provide one
pub const NEW_DOCKERFILE_FILENAME: &str = "Dockerfile.local";

/// Docker ignore file name at the project root
pub const DOCKERIGNORE_FILENAME: &str = ".dockerignore";

/// Registry credentials file name
pub const DOCKERCFG_FILENAME: &str = ".dockercfg";

/// Generated compose file name for multi-container projects
pub const COMPOSE_FILENAME: &str = "docker-compose.yml";

/// Local state file name (setenv overlay)
pub const STATE_FILE_NAME: &str = "state.json";

/// Log-related directory names
pub mod logs {
    /// Logs directory name within .localdock
    pub const LOGS_DIR_NAME: &str = "logs";

    /// Host logs directory name for local runs
    pub const HOST_LOGS_DIRNAME: &str = "local";

    /// Name of the symlink pointing at the most recent run directory
    pub const LATEST_LOGS_DIRNAME: &str = "latest";
}

use std::path::{Path, PathBuf};

/// Build the main .localdock directory path from a project root
pub fn localdock_dir_path(project_root: &Path) -> PathBuf {
    project_root.join(LOCALDOCK_DIR_NAME)
}

/// Build the Dockerrun.aws.json path from a project root
pub fn dockerrun_path(project_root: &Path) -> PathBuf {
    project_root.join(DOCKERRUN_FILENAME)
}

/// Build the user Dockerfile path from a project root
pub fn dockerfile_path(project_root: &Path) -> PathBuf {
    project_root.join(DOCKERFILE_FILENAME)
}

/// Build the generated Dockerfile path from a project root
pub fn new_dockerfile_path(project_root: &Path) -> PathBuf {
    localdock_dir_path(project_root).join(NEW_DOCKERFILE_FILENAME)
}

/// Build the .dockerignore path from a project root
pub fn dockerignore_path(project_root: &Path) -> PathBuf {
    project_root.join(DOCKERIGNORE_FILENAME)
}

/// Build the registry credentials file path from a project root
pub fn dockercfg_path(project_root: &Path) -> PathBuf {
    localdock_dir_path(project_root).join(DOCKERCFG_FILENAME)
}

/// Build the generated docker-compose.yml path from a project root
pub fn compose_path(project_root: &Path) -> PathBuf {
    localdock_dir_path(project_root).join(COMPOSE_FILENAME)
}

/// Build the root local logs directory path from a project root.
/// Run directories are created under this path, named by timestamp.
pub fn logdir_path(project_root: &Path) -> PathBuf {
    localdock_dir_path(project_root)
        .join(logs::LOGS_DIR_NAME)
        .join(logs::HOST_LOGS_DIRNAME)
}

/// Build the local state file path from a project root
pub fn state_file_path(project_root: &Path) -> PathBuf {
    localdock_dir_path(project_root).join(STATE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_path_construction() {
        let root = Path::new("/test/project");

        assert_eq!(
            localdock_dir_path(root),
            Path::new("/test/project/.localdock")
        );

        assert_eq!(
            dockerrun_path(root),
            Path::new("/test/project/Dockerrun.aws.json")
        );

        assert_eq!(
            new_dockerfile_path(root),
            Path::new("/test/project/.localdock/Dockerfile.local")
        );

        assert_eq!(
            compose_path(root),
            Path::new("/test/project/.localdock/docker-compose.yml")
        );

        assert_eq!(
            logdir_path(root),
            Path::new("/test/project/.localdock/logs/local")
        );

        assert_eq!(
            state_file_path(root),
            Path::new("/test/project/.localdock/state.json")
        );
    }
}
