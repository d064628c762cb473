//! Local Key/Value Storage
//!
//! The console's equivalent of browser `localStorage`: a small durable
//! string-to-string store. Feature crates layer their own formats on top
//! and own their key names.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key contains characters that cannot be mapped to a file name
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Underlying I/O failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for local storage backends
#[trait_variant::make(KeyValueStore: Send)]
pub trait LocalKeyValueStore {
    /// Read a value, `None` when the key was never written or was removed
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Process-local storage. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, for tests and fixtures
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.into(), value.into());
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// File-backed storage
// ============================================================================

/// Distinguishes temporary files of concurrent writes to the same key
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One file per key under a root directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves either the old value or the new one. Entries may
/// hold tokens; on unix they are readable by the owner only.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

impl KeyValueStore for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(".{key}.{n}.tmp"));
        let written = match write_private(&tmp, value).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // Best effort; the write error is the one worth reporting.
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(path = %path.display(), "Stored local entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create `path` and write `value`, owner read/write only on unix
async fn write_private(path: &Path, value: &str) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(value.as_bytes()).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::{FileStorage, KeyValueStore, MemoryStorage, StorageError};

    #[tokio::test]
    async fn test_memory_roundtrip_and_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "v1").await.unwrap();
        storage.set("k", "v2").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v2"));

        storage.remove("k").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_with_entry() {
        let storage = MemoryStorage::with_entry("session", "{}");
        assert_eq!(storage.get("session").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_file_storage_creates_root_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("state");
        let storage = FileStorage::new(&root);

        assert_eq!(storage.get("admin-console.session").await.unwrap(), None);
        storage.set("admin-console.session", "payload").await.unwrap();

        let reopened = FileStorage::new(&root);
        assert_eq!(
            reopened.get("admin-console.session").await.unwrap().as_deref(),
            Some("payload")
        );
        assert_eq!(tmp_leftovers(&root), 0);
    }

    #[tokio::test]
    async fn test_file_storage_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.remove("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                storage.set(key, "x").await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    fn tmp_leftovers(root: &std::path::Path) -> usize {
        std::fs::read_dir(root)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_storage_entries_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("admin-console.session", "tokens").await.unwrap();
        storage.set("admin-console.session", "rotated").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("admin-console.session"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("occupied")).unwrap();
        std::fs::write(dir.path().join("occupied").join("child"), "x").unwrap();
        let storage = FileStorage::new(dir.path());

        assert!(matches!(
            storage.set("occupied", "value").await,
            Err(StorageError::Io(_))
        ));
        assert_eq!(tmp_leftovers(dir.path()), 0);
    }
}
