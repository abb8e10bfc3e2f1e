//! JSON file storage layer -- one file per concern, keyed by project id.
//!
//! Layout under the data directory:
//! - `projects.json`               array of projects
//! - `tests-{projectId}.json`      id -> test record
//! - `test-codes-{projectId}.json` id -> test definition
//! - `executions-{projectId}.json` `{ projectId, executions }`, newest first
//!
//! Reads are tolerant: a missing, empty or malformed file reads as an empty
//! collection. Writes replace the whole file atomically and report failures.
//! Every read-modify-write cycle holds the owning project's lock.

pub mod definitions;
pub mod history;
pub mod projects;
pub mod records;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::model::ValidationError;

pub use self::definitions::TestDefinitionStore;
pub use self::history::ExecutionHistoryStore;
pub use self::projects::ProjectStore;
pub use self::records::TestRecordStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("invalid project: {0}")]
    Invalid(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Per-project locks
// ---------------------------------------------------------------------------

/// Registry of async mutexes keyed by project id (or file name for
/// files that are not project scoped).
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Forget the lock for `key` unless it is held or awaited. Returns
    /// whether the entry was removed.
    pub fn release(&self, key: &str) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let idle = map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            map.remove(key);
        }
        idle
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// DataDir
// ---------------------------------------------------------------------------

/// Storage root shared by all stores. Cloning shares the lock registry, so
/// stores built from clones of one `DataDir` exclude each other correctly.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    locks: ProjectLocks,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: ProjectLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of a project-scoped file, e.g. `tests-{id}.json`.
    pub(crate) fn project_file(&self, prefix: &str, project_id: &str) -> Result<PathBuf, StorageError> {
        validate_key(project_id)?;
        Ok(self.root.join(format!("{prefix}-{project_id}.json")))
    }

    pub(crate) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(key).await
    }

    pub(crate) fn locks(&self) -> &ProjectLocks {
        &self.locks
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.chars().any(|c| c == '/' || c == '\\' || c == '\0');
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// File primitives
// ---------------------------------------------------------------------------

/// Read and decode a JSON file. Missing, empty, unreadable or malformed
/// files all yield `None`; only the latter two are logged.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable store file, treating as empty");
            return None;
        }
    };

    if content.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed store file, treating as empty");
            None
        }
    }
}

/// Serialize `value` and replace `path` with it.
///
/// Writes to a temp file in the same directory, syncs it, then renames over
/// the target so readers never observe a partial file.
pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| StorageError::Io { path: p, source }
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let mut file = tokio::fs::File::create(&temp_path).await.map_err(io_err(&temp_path))?;
    file.write_all(json.as_bytes()).await.map_err(io_err(&temp_path))?;
    file.sync_all().await.map_err(io_err(&temp_path))?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(io_err(path)(e));
    }

    debug!(path = %path.display(), bytes = json.len(), "store file written");
    Ok(())
}

/// Remove a file. Returns whether it existed.
pub(crate) async fn remove_file(path: &Path) -> Result<bool, StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// All four stores rooted at one data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    pub projects: ProjectStore,
    pub records: TestRecordStore,
    pub definitions: TestDefinitionStore,
    pub history: ExecutionHistoryStore,
    dir: DataDir,
}

impl Storage {
    pub fn open(root: impl Into<PathBuf>, history_cap: usize) -> Self {
        let dir = DataDir::new(root);
        debug!(root = %dir.root().display(), history_cap, "opening storage");
        Self {
            projects: ProjectStore::new(dir.clone()),
            records: TestRecordStore::new(dir.clone()),
            definitions: TestDefinitionStore::new(dir.clone()),
            history: ExecutionHistoryStore::new(dir.clone(), history_cap),
            dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.root()
    }

    /// Drop the lock entry of a deleted project. Kept if still in use.
    pub fn release_project(&self, project_id: &str) -> bool {
        self.dir.locks().release(project_id)
    }

    /// Number of lock entries held for projects and `projects.json`.
    pub fn tracked_locks(&self) -> usize {
        self.dir.locks().len()
    }
}
