//! Persistence for the exclusion registry.

use super::{REGISTRY_VERSION, RegistryState};
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sibling of `path` with `suffix` appended to the file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Temporary sibling used for atomic replacement.
fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

/// Lock file guarding read-modify-write cycles on `path`.
///
/// The registry file itself is replaced by rename, so the lock has to live
/// on a file that is never swapped out.
pub fn lock_path(path: &Path) -> PathBuf {
    sibling(path, ".lock")
}

/// Create the directory holding `path` if needed.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Registry(format!("failed to create {}: {e}", dir.display())))?;
    }
    Ok(())
}

/// Open (creating if needed) the lock file for `path`.
pub fn open_lock_file(path: &Path) -> Result<File> {
    let lock = lock_path(path);
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock)
        .map_err(|e| Error::Registry(format!("failed to open {}: {e}", lock.display())))
}

/// Load registry state from disk.
///
/// Returns an empty `RegistryState` if the file doesn't exist. A file that
/// exists but does not parse, including a malformed PR key, is an error.
pub fn load_registry(path: &Path) -> Result<RegistryState> {
    if !path.exists() {
        return Ok(RegistryState::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Registry(format!("failed to read {}: {e}", path.display())))?;

    let state: RegistryState = toml::from_str(&content)
        .map_err(|e| Error::Registry(format!("failed to parse {}: {e}", path.display())))?;

    if state.version > REGISTRY_VERSION {
        return Err(Error::Registry(format!(
            "{} has version {}, newer than supported version {REGISTRY_VERSION}",
            path.display(),
            state.version
        )));
    }

    Ok(state)
}

/// Save registry state to disk.
///
/// Exclusions and counters are written together to a temporary file, which
/// is synced and then renamed over the old one, so readers never observe a
/// partial write and a crash leaves either the old or the new document.
pub fn save_registry(path: &Path, state: &RegistryState) -> Result<()> {
    ensure_parent_dir(path)?;

    let mut state_to_save = state.clone();
    state_to_save.version = REGISTRY_VERSION;

    let content = toml::to_string_pretty(&state_to_save)
        .map_err(|e| Error::Registry(format!("failed to serialize registry: {e}")))?;

    let content_with_header = format!(
        "# merge-warden exclusion registry\n# Auto-generated - manual edits may be overwritten\n\n{content}"
    );

    let tmp = temp_path(path);
    let mut file = File::create(&tmp)
        .map_err(|e| Error::Registry(format!("failed to create {}: {e}", tmp.display())))?;
    file.write_all(content_with_header.as_bytes())
        .map_err(|e| Error::Registry(format!("failed to write {}: {e}", tmp.display())))?;
    file.sync_all()
        .map_err(|e| Error::Registry(format!("failed to sync {}: {e}", tmp.display())))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| {
        Error::Registry(format!(
            "failed to replace {} with {}: {e}",
            path.display(),
            tmp.display()
        ))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PullRequestRef;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn pr(number: u64) -> PullRequestRef {
        format!("github.com/acme/widgets#{number}").parse().unwrap()
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let temp = TempDir::new().unwrap();
        let state = load_registry(&temp.path().join("registry.toml")).unwrap();
        assert!(state.excluded.is_empty());
        assert!(state.attempts.is_empty());
        assert_eq!(state.version, REGISTRY_VERSION);
    }

    #[test]
    fn test_save_creates_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("registry.toml");

        save_registry(&path, &RegistryState::new()).unwrap();

        assert!(path.exists());
        assert!(!temp_path(&path).exists(), "temp file must be renamed away");
    }

    #[test]
    fn test_exclusions_and_counters_persist_together() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.toml");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let mut state = RegistryState::new();
        state.exclude(&pr(2), "conflict attempts exhausted", at);
        state.increment_attempt(&pr(2));
        state.increment_attempt(&pr(2));
        state.increment_attempt(&pr(5));
        save_registry(&path, &state).unwrap();

        let loaded = load_registry(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.attempt_count(&pr(2)), 2);
        assert_eq!(loaded.excluded[&pr(2)].excluded_at, at);
    }

    #[test]
    fn test_lock_file_sits_next_to_registry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.toml");

        open_lock_file(&path).unwrap();

        assert_eq!(lock_path(&path), temp.path().join("registry.toml.lock"));
        assert!(lock_path(&path).exists());
        assert!(!path.exists(), "locking must not create the registry");
    }

    #[test]
    fn test_file_contains_header_comment() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.toml");
        save_registry(&path, &RegistryState::new()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# merge-warden exclusion registry"));
    }

    #[test]
    fn test_malformed_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.toml");
        fs::write(&path, "version = 1\n\n[attempts]\n\"not-a-pr\" = 1\n").unwrap();

        match load_registry(&path) {
            Err(Error::Registry(msg)) => assert!(msg.contains("failed to parse")),
            other => panic!("Expected Registry error, got: {other:?}"),
        }
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.toml");
        fs::write(&path, "version = 99\n").unwrap();

        assert!(matches!(load_registry(&path), Err(Error::Registry(_))));
    }
}
