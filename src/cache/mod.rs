//! On-disk completion cache.
//!
//! Shell completion must answer in milliseconds, so candidate paths are
//! served from a per-backend JSON document under the user cache directory
//! and refreshed out-of-band. The documents hold key paths and storage-mode
//! metadata only; secret values are never written here.
//!
//! Writers take an advisory lock and replace the document with a temp-file
//! rename, so readers (which do not lock) always see a complete document.

pub mod lock;

use std::env;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tags::StoreMode;

pub use lock::with_exclusive_lock;

/// Version tag of the cache document. Documents with any other tag are
/// treated as unusable, not merely stale.
pub const SCHEMA_VERSION: &str = "v1";

/// Name of the directory under the user cache dir.
const CACHE_SUBDIR: &str = "bundr";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache not found")]
    NotFound,
    #[error("unsupported cache schema version {found:?}")]
    SchemaMismatch { found: String },
    #[error("cache file is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("timed out waiting for cache lock after {0:?}")]
    LockTimeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One cached key: its path and how the value is stored. There is no value
/// field, and there must never be one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: String,
    pub store_mode: StoreMode,
}

/// The on-disk cache document for one backend kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub schema_version: String,
    pub backend_type: String,
    pub updated_at: DateTime<Utc>,
    pub last_refreshed_at: DateTime<Utc>,
    pub entries: Vec<CacheEntry>,
}

/// Read/write access to the completion cache.
pub trait CacheStore: Send + Sync {
    /// Returns the cached entries for a backend, or [`CacheError::NotFound`]
    /// if no cache document exists yet.
    fn read(&self, backend: &str) -> Result<Vec<CacheEntry>, CacheError>;

    /// Atomically replaces the cache document for a backend.
    fn write(&self, backend: &str, entries: &[CacheEntry]) -> Result<(), CacheError>;

    /// When the backend's cache was last refreshed. Returns the Unix epoch if
    /// the document is absent or unreadable for any reason; never fails.
    fn last_refreshed_at(&self, backend: &str) -> DateTime<Utc>;
}

/// File-backed store rooted at `${XDG_CACHE_HOME:-$HOME/.cache}/bundr/`.
#[derive(Debug)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Creates a store under the user cache directory. Fails when neither
    /// `XDG_CACHE_HOME` (absolute) nor `HOME` is available.
    pub fn new() -> Result<Self, CacheError> {
        let cache_dir = user_cache_dir().ok_or_else(|| {
            CacheError::Io(std::io::Error::other(
                "cannot resolve cache directory: HOME is not set",
            ))
        })?;
        Ok(Self {
            base_dir: cache_dir.join(CACHE_SUBDIR),
        })
    }

    /// Uses an explicit base directory instead of the XDG default.
    pub fn with_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn cache_path(&self, backend: &str) -> PathBuf {
        self.base_dir.join(format!("{backend}.json"))
    }

    fn read_document(&self, backend: &str) -> Result<CacheFile, CacheError> {
        let path = self.cache_path(backend);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(CacheError::NotFound),
            Err(err) => return Err(CacheError::Io(err)),
        };

        let doc: CacheFile = serde_json::from_slice(&bytes).map_err(CacheError::Corrupt)?;
        if doc.schema_version != SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                found: doc.schema_version,
            });
        }
        Ok(doc)
    }

    fn ensure_base_dir(&self) -> Result<(), CacheError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.base_dir)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    /// Removes temp files a crashed writer may have left behind. Only files
    /// matching this backend's temp prefix are touched.
    fn remove_stray_temps(&self, backend: &str) {
        let prefix = temp_prefix(backend);
        let Ok(dir) = fs::read_dir(&self.base_dir) else {
            return;
        };
        for entry in dir.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

fn temp_prefix(backend: &str) -> String {
    format!(".tmp-{backend}-")
}

/// `$XDG_CACHE_HOME` when set to an absolute path, otherwise `$HOME/.cache`.
/// The fallback applies on every platform so the cache lands in the same
/// place on macOS as on Linux.
fn user_cache_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CACHE_HOME") {
        let dir = PathBuf::from(dir);
        if dir.is_absolute() {
            return Some(dir);
        }
    }
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache"))
}

impl CacheStore for FileStore {
    fn read(&self, backend: &str) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self.read_document(backend)?.entries)
    }

    fn write(&self, backend: &str, entries: &[CacheEntry]) -> Result<(), CacheError> {
        self.ensure_base_dir()?;
        let target = self.cache_path(backend);
        let lock_path = self.base_dir.join(format!("{backend}.json.lock"));

        with_exclusive_lock(&lock_path, || {
            self.remove_stray_temps(backend);

            let mut tmp = tempfile::Builder::new()
                .prefix(&temp_prefix(backend))
                .tempfile_in(&self.base_dir)?;

            let now = Utc::now();
            let doc = CacheFile {
                schema_version: SCHEMA_VERSION.to_string(),
                backend_type: backend.to_string(),
                updated_at: now,
                last_refreshed_at: now,
                entries: entries.to_vec(),
            };
            let bytes = serde_json::to_vec(&doc).map_err(CacheError::Corrupt)?;
            tmp.write_all(&bytes)?;

            // Atomic on the same filesystem; the temp file is removed on
            // drop if anything above failed.
            tmp.persist(&target).map_err(|err| CacheError::Io(err.error))?;
            Ok(())
        })
    }

    fn last_refreshed_at(&self, backend: &str) -> DateTime<Utc> {
        self.read_document(backend)
            .map(|doc| doc.last_refreshed_at)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Store used when the cache directory cannot be initialized (no home
/// directory, unwritable filesystem). Completion degrades to no candidates
/// while the rest of the CLI keeps working.
#[derive(Debug, Default)]
pub struct NoopStore;

impl CacheStore for NoopStore {
    fn read(&self, _backend: &str) -> Result<Vec<CacheEntry>, CacheError> {
        Err(CacheError::NotFound)
    }

    fn write(&self, _backend: &str, _entries: &[CacheEntry]) -> Result<(), CacheError> {
        Ok(())
    }

    fn last_refreshed_at(&self, _backend: &str) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }
}
