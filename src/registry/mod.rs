//! Exclusion registry and attempt counters
//!
//! The registry is the first gate of every orchestration cycle. Excluded PRs
//! are never processed again; attempt counters bound how many times a
//! conflicting PR is handed off before it is excluded.

mod storage;

pub use storage::{load_registry, lock_path, save_registry};

use crate::error::{Error, Result};
use crate::types::PullRequestRef;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use storage::{ensure_parent_dir, open_lock_file};
use tracing::{debug, info, warn};

/// Current version of the registry file format.
pub const REGISTRY_VERSION: u32 = 1;

/// Why and when a PR was excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRecord {
    /// Human-readable reason
    pub reason: String,
    /// When the exclusion happened
    pub excluded_at: DateTime<Utc>,
}

/// An excluded PR together with its record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionEntry {
    /// The excluded PR
    pub pr: PullRequestRef,
    /// Reason and timestamp
    pub record: ExclusionRecord,
}

/// Exclusion set and attempt counters, persisted as one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    /// File format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Excluded PRs
    #[serde(default)]
    pub excluded: BTreeMap<PullRequestRef, ExclusionRecord>,
    /// Conflict delegations issued per PR
    #[serde(default)]
    pub attempts: BTreeMap<PullRequestRef, u32>,
}

const fn default_version() -> u32 {
    REGISTRY_VERSION
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryState {
    /// Create an empty state
    pub const fn new() -> Self {
        Self {
            version: REGISTRY_VERSION,
            excluded: BTreeMap::new(),
            attempts: BTreeMap::new(),
        }
    }

    /// Whether `pr` is excluded
    pub fn is_excluded(&self, pr: &PullRequestRef) -> bool {
        self.excluded.contains_key(pr)
    }

    /// Exclude `pr`; returns `false` if it was already excluded
    pub fn exclude(&mut self, pr: &PullRequestRef, reason: &str, now: DateTime<Utc>) -> bool {
        if self.excluded.contains_key(pr) {
            return false;
        }
        self.excluded.insert(
            pr.clone(),
            ExclusionRecord {
                reason: reason.to_string(),
                excluded_at: now,
            },
        );
        true
    }

    /// Increment and return the attempt counter for `pr`
    pub fn increment_attempt(&mut self, pr: &PullRequestRef) -> u32 {
        let count = self.attempts.entry(pr.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Current attempt counter for `pr`
    pub fn attempt_count(&self, pr: &PullRequestRef) -> u32 {
        self.attempts.get(pr).copied().unwrap_or(0)
    }

    /// Excluded entries in key order
    pub fn entries(&self) -> Vec<ExclusionEntry> {
        self.excluded
            .iter()
            .map(|(pr, record)| ExclusionEntry {
                pr: pr.clone(),
                record: record.clone(),
            })
            .collect()
    }
}

/// Store of excluded PRs and per-PR attempt counters
///
/// Every method is linearizable per key. Implementations that persist must
/// write the exclusion set and the counters together.
pub trait ExclusionRegistry: Send + Sync {
    /// Whether `pr` must never be processed again
    fn is_excluded(&self, pr: &PullRequestRef) -> bool;

    /// Permanently exclude `pr` (idempotent; the first reason is kept)
    fn exclude(&self, pr: &PullRequestRef, reason: &str) -> Result<()>;

    /// All excluded PRs
    fn list_excluded(&self) -> Vec<PullRequestRef> {
        self.excluded_entries().into_iter().map(|e| e.pr).collect()
    }

    /// All excluded PRs with reasons and timestamps
    fn excluded_entries(&self) -> Vec<ExclusionEntry>;

    /// Increment the attempt counter for `pr`, returning the new count
    fn increment_attempt(&self, pr: &PullRequestRef) -> Result<u32>;

    /// Current attempt counter for `pr`
    fn attempt_count(&self, pr: &PullRequestRef) -> u32;

    /// Reset all attempt counters; exclusions are kept
    fn clear_attempts(&self) -> Result<()>;
}

fn lock(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory registry for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExclusionRegistry for MemoryRegistry {
    fn is_excluded(&self, pr: &PullRequestRef) -> bool {
        lock(&self.state).is_excluded(pr)
    }

    fn exclude(&self, pr: &PullRequestRef, reason: &str) -> Result<()> {
        if lock(&self.state).exclude(pr, reason, Utc::now()) {
            info!(pr = %pr, reason, "excluded PR");
        }
        Ok(())
    }

    fn excluded_entries(&self) -> Vec<ExclusionEntry> {
        lock(&self.state).entries()
    }

    fn increment_attempt(&self, pr: &PullRequestRef) -> Result<u32> {
        Ok(lock(&self.state).increment_attempt(pr))
    }

    fn attempt_count(&self, pr: &PullRequestRef) -> u32 {
        lock(&self.state).attempt_count(pr)
    }

    fn clear_attempts(&self) -> Result<()> {
        lock(&self.state).attempts.clear();
        Ok(())
    }
}

/// Registry persisted to a TOML file
///
/// Several processes may share one file. Every mutation takes an exclusive
/// lock on a sibling `.lock` file, re-reads the document, applies the change
/// and writes it back, so concurrent writers never drop each other's
/// updates. Reads take a shared lock and see the latest committed document.
/// A failed write leaves both the file and the in-memory copy unchanged.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

fn lock_error(path: &Path, e: &io::Error) -> Error {
    Error::Registry(format!("failed to lock {}: {e}", lock_path(path).display()))
}

impl FileRegistry {
    /// Open the registry at `path`, starting empty if the file does not exist
    pub fn open(path: &Path) -> Result<Self> {
        let registry = Self {
            path: path.to_path_buf(),
            state: Mutex::new(RegistryState::new()),
        };
        if let Some(state) = registry.read_shared()? {
            debug!(
                path = %path.display(),
                excluded = state.excluded.len(),
                counters = state.attempts.len(),
                "opened registry"
            );
            *lock(&registry.state) = state;
        }
        Ok(registry)
    }

    /// Committed document, or `None` if nothing was ever written
    fn read_shared(&self) -> Result<Option<RegistryState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file_lock = RwLock::new(open_lock_file(&self.path)?);
        let _held = file_lock.read().map_err(|e| lock_error(&self.path, &e))?;
        load_registry(&self.path).map(Some)
    }

    /// Latest committed state; the last one seen if the file can't be read
    fn snapshot(&self) -> MutexGuard<'_, RegistryState> {
        let mut guard = lock(&self.state);
        match self.read_shared() {
            Ok(Some(state)) => *guard = state,
            Ok(None) => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "registry reload failed, using last known state"
            ),
        }
        guard
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut RegistryState) -> Option<T>, unchanged: T) -> Result<T> {
        let mut guard = lock(&self.state);
        ensure_parent_dir(&self.path)?;
        let mut file_lock = RwLock::new(open_lock_file(&self.path)?);
        let _held = file_lock.write().map_err(|e| lock_error(&self.path, &e))?;

        let mut next = load_registry(&self.path)?;
        let Some(out) = f(&mut next) else {
            *guard = next;
            return Ok(unchanged);
        };
        save_registry(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

impl ExclusionRegistry for FileRegistry {
    fn is_excluded(&self, pr: &PullRequestRef) -> bool {
        self.snapshot().is_excluded(pr)
    }

    fn exclude(&self, pr: &PullRequestRef, reason: &str) -> Result<()> {
        let inserted = self.mutate(
            |state| state.exclude(pr, reason, Utc::now()).then_some(true),
            false,
        )?;
        if inserted {
            info!(pr = %pr, reason, "excluded PR");
        }
        Ok(())
    }

    fn excluded_entries(&self) -> Vec<ExclusionEntry> {
        self.snapshot().entries()
    }

    fn increment_attempt(&self, pr: &PullRequestRef) -> Result<u32> {
        self.mutate(|state| Some(state.increment_attempt(pr)), 0)
    }

    fn attempt_count(&self, pr: &PullRequestRef) -> u32 {
        self.snapshot().attempt_count(pr)
    }

    fn clear_attempts(&self) -> Result<()> {
        self.mutate(
            |state| {
                if state.attempts.is_empty() {
                    None
                } else {
                    state.attempts.clear();
                    Some(())
                }
            },
            (),
        )
    }
}
