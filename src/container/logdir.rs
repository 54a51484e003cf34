//! Per-run log directories.
//!
//! Each run that mounts a log volume gets a fresh directory under the root
//! log directory, named by a microsecond-resolution timestamp, and a
//! `latest` symlink is repointed at it. The symlink is a convenience:
//! both the unlink and relink steps are best-effort and never abort a run.
//! Nothing here deletes old run directories; retention is out of scope.

use super::manifest::Manifest;
use super::Result;
use crate::env::logs::LATEST_LOGS_DIRNAME;
use chrono::Local;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a fresh run directory path under `log_root`. Every call yields
/// a new path, down to microseconds, so rapid successive runs cannot
/// collide.
pub fn new_run_path(log_root: &Path) -> PathBuf {
    let now = Local::now();
    let name = format!(
        "{}{:06}",
        now.format("%y%m%d_%H%M%S"),
        now.timestamp_subsec_micros()
    );
    log_root.join(name)
}

/// Host-to-container log mount for a run: empty when there is no manifest
/// or the manifest declares no `Logging` path, otherwise a single entry
/// mapping a fresh run directory to the declared container-side path.
pub fn get_log_volume_map(
    log_root: &Path,
    manifest: Option<&Manifest>,
) -> HashMap<PathBuf, String> {
    let Some(container_log) = manifest.and_then(|m| m.log_dir()) else {
        return HashMap::new();
    };

    HashMap::from([(new_run_path(log_root), container_log.to_string())])
}

/// Create `run_path` (and `log_root` if needed) and repoint the `latest`
/// symlink at it.
///
/// The log directories are deliberately world-writable: the container
/// process writes into them with arbitrary uids. The directory *enclosing*
/// the log root loses group/other write+execute instead.
pub fn make_logdirs(log_root: &Path, run_path: &Path) -> Result<()> {
    if !log_root.exists() {
        std::fs::create_dir_all(log_root)?;
        set_all_unrestricted_permissions(log_root)?;
    }

    if let Some(enclosing) = log_root.parent() {
        remove_group_other_access(enclosing)?;
    }

    // Fails if the caller reused a stale timestamp
    std::fs::create_dir(run_path)?;
    set_all_unrestricted_permissions(run_path)?;

    symlink_latest(log_root, run_path);
    Ok(())
}

/// Repoint `<log_root>/latest` at `run_path`, tolerating a missing prior
/// symlink and platforms without symlink support.
fn symlink_latest(log_root: &Path, run_path: &Path) {
    let latest = log_root.join(LATEST_LOGS_DIRNAME);

    if let Err(e) = std::fs::remove_file(&latest) {
        debug!("could not unlink {}: {}", latest.display(), e);
    }

    #[cfg(unix)]
    if let Err(e) = std::os::unix::fs::symlink(run_path, &latest) {
        debug!("could not symlink {}: {}", latest.display(), e);
    }

    #[cfg(not(unix))]
    debug!(
        "skipping latest symlink for {} on this platform",
        run_path.display()
    );
}

/// Print where local logs live and which run directory was written last.
/// Reports "no logs yet" for an empty or absent root; never fails.
pub fn print_logs(log_root: &Path) {
    if log_root.is_dir() {
        println!("Local run logs are kept under {}", log_root.display());
    }

    match last_run_dir(log_root) {
        Some(last) if !directory_empty(&last) => {
            if let Some(modified) = modified_time(&last) {
                println!(
                    "Most recent logs ({}): {}",
                    modified.format("%Y-%m-%d %H:%M:%S"),
                    last.display()
                );
            } else {
                println!("Most recent logs: {}", last.display());
            }
            println!(
                "Convenience symlink: {}",
                log_root.join(LATEST_LOGS_DIRNAME).display()
            );
        }
        _ => println!(
            "There are no local logs yet. Logs are written once you run a container \
             that declares a Logging directory."
        ),
    }
}

/// Most recently modified non-symlink entry under the root ('latest'
/// itself is skipped).
fn last_run_dir(log_root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(log_root).ok()?;

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| !path.is_symlink())
        .max_by_key(|path| modified_time(path))
}

fn modified_time(path: &Path) -> Option<chrono::DateTime<Local>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.into())
}

fn directory_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[cfg(unix)]
pub(crate) fn set_all_unrestricted_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))
}

#[cfg(not(unix))]
pub(crate) fn set_all_unrestricted_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Strip write+execute from group and other users on `path`, keeping them
/// readable.
#[cfg(unix)]
fn remove_group_other_access(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o744))
}

#[cfg(not(unix))]
fn remove_group_other_access(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
