//! Persisted local run state.
//!
//! `setenv` survives across invocations by writing the resulting variable
//! overlay to `state.json` inside the project state directory. A missing
//! file means an empty overlay.

use super::envvars::EnvvarCollector;
use super::{ContainerError, Result};
use std::path::Path;
use tracing::debug;

/// Load the persisted overlay. Absent file yields the empty overlay;
/// unparsable contents are a validation failure, not silent data loss.
pub fn load(state_path: &Path) -> Result<EnvvarCollector> {
    let contents = match std::fs::read_to_string(state_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(EnvvarCollector::default())
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&contents).map_err(|e| {
        ContainerError::Validation(format!(
            "{} is not valid local state: {}",
            state_path.display(),
            e
        ))
    })
}

/// Persist the overlay, creating the enclosing state directory if needed.
pub fn save(state_path: &Path, envvars: &EnvvarCollector) -> Result<()> {
    if let Some(parent) = state_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = serde_json::to_string_pretty(envvars).map_err(|e| {
        ContainerError::Validation(format!("could not serialize local state: {}", e))
    })?;

    debug!("persisting local state to {}", state_path.display());
    std::fs::write(state_path, contents)?;
    Ok(())
}

/// Layer `overlay` over the persisted overlay, drop removed keys, persist,
/// and return the resulting variables.
pub fn setenv(state_path: &Path, overlay: &EnvvarCollector) -> Result<EnvvarCollector> {
    let merged = load(state_path)?.merge(overlay).filtered();
    save(state_path, &merged)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let envvars = load(&dir.path().join("state.json")).unwrap();
        assert!(envvars.map().is_empty());
        assert!(envvars.to_remove().is_empty());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load(&path), Err(ContainerError::Validation(_))));
    }

    #[test]
    fn test_setenv_persists_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        setenv(&path, &EnvvarCollector::from_str(Some("A=1,B=2"))).unwrap();
        let result = setenv(&path, &EnvvarCollector::from_str(Some("B=,C=3"))).unwrap();

        assert_eq!(result.map().get("A").map(String::as_str), Some("1"));
        assert_eq!(result.map().get("C").map(String::as_str), Some("3"));
        assert!(!result.map().contains_key("B"));

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.map().len(), 2);
    }
}
