//! One Chrome user-data directory per job, named from the job id rather than
//! a bare UUID, so a stale directory left behind by a crashed worker can be
//! traced back to the job that created it. Every launch in this crate goes
//! through [`create_job_profile`] rather than constructing a path by hand.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// RAII handle on a job's Chrome profile directory. Removes the directory
/// on drop, which is what actually frees it once `Worker::run` returns —
/// the `Browser` handle chromiumoxide gives back holds no reference to this
/// path, so nothing else would clean it up.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
}

impl BrowserProfile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to clean up Chrome profile directory");
            } else {
                debug!(path = %self.path.display(), "removed Chrome profile directory");
            }
        }
    }
}

/// Directory name prefix for a job's profile: `geoscope_chrome_{job_id}_`.
/// [`cleanup_stale_profiles`] matches on this same prefix at startup.
fn profile_prefix_for_job(job_id: &str) -> String {
    format!("geoscope_chrome_{job_id}_")
}

/// Create this job's profile directory under the system temp dir. The UUID
/// suffix (on top of the job id prefix) protects against a worker retry for
/// the same job racing a not-yet-cleaned-up directory from a prior attempt.
pub fn create_job_profile(job_id: &str) -> Result<BrowserProfile> {
    let path = std::env::temp_dir().join(format!("{}{}", profile_prefix_for_job(job_id), Uuid::new_v4()));
    std::fs::create_dir(&path).with_context(|| format!("failed to create Chrome profile directory: {}", path.display()))?;
    info!(path = %path.display(), job_id, "created Chrome profile directory");
    Ok(BrowserProfile { path })
}

/// Whether a profile's `SingletonLock` is safe to treat as abandoned: no
/// lock file at all, or a lock whose target PID (`SingletonLock` is a
/// symlink to `{hostname}-{pid}`) no longer exists.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");
    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();
            let Some(pid) = target_str.rsplit('-').next().and_then(|s| s.parse::<i32>().ok()) else {
                warn!(target = %target_str, "could not parse PID from SingletonLock target");
                return false;
            };
            // SAFETY: kill(pid, 0) only probes for existence/permission, sends no signal.
            let running = unsafe { libc::kill(pid, 0) == 0 };
            if running {
                debug!(pid, "SingletonLock is active");
            }
            !running
        }
        // Not a symlink; if it exists at all it's corrupted rather than a live lock.
        Err(_) => lock_path.is_file(),
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

/// Sweep the temp directory for `geoscope_chrome_*` profiles left behind by
/// workers that crashed or were killed before their `BrowserProfile` could
/// drop, and remove the ones whose lock is stale. Called once from the
/// worker binary's startup path, before it launches its own browser.
pub fn cleanup_stale_profiles() -> Result<usize> {
    let temp_dir = std::env::temp_dir();
    let mut cleaned = 0;

    let entries = std::fs::read_dir(&temp_dir).with_context(|| format!("failed to read temp directory: {}", temp_dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_geoscope_profile = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("geoscope_chrome_"));
        if is_geoscope_profile && path.is_dir() && is_singleton_lock_stale(&path) {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove stale Chrome profile");
            } else {
                cleaned += 1;
            }
        }
    }

    if cleaned > 0 {
        info!(cleaned, "removed stale Chrome profile directories");
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_job_profile_scopes_the_directory_name_to_the_job_id() {
        let profile = create_job_profile("job-42").unwrap();
        assert!(profile.path().exists());
        let name = profile.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("geoscope_chrome_job-42_"));
    }

    #[test]
    fn dropping_the_profile_removes_its_directory() {
        let path = {
            let profile = create_job_profile("job-drop").unwrap();
            profile.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_lock_file_is_considered_stale() {
        let profile = create_job_profile("job-nolock").unwrap();
        assert!(is_singleton_lock_stale(profile.path()));
    }
}
