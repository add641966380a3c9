//! Storage trait definitions

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path)
        } else {
            StorageError::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for vault storage backends
///
/// All paths are relative to the vault root. Implementations must be
/// thread-safe (Send + Sync). No operation is transactional: a failed
/// multi-file update leaves earlier writes in place.
pub trait VaultStore: Send + Sync {
    /// Read a whole file as UTF-8
    fn read_to_string(&self, path: &Path) -> StorageResult<String>;

    /// Create or replace a file
    fn write(&self, path: &Path, contents: &str) -> StorageResult<()>;

    /// Check whether a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Create a folder and any missing parents
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// List every file below `dir`, recursively, as vault-relative paths
    fn list_files(&self, dir: &Path) -> StorageResult<Vec<PathBuf>>;
}

/// Extension trait for opening stores from paths
pub trait OpenVault: VaultStore + Sized {
    /// Open a vault rooted at the given folder, creating it if missing
    fn open(root: impl AsRef<Path>) -> StorageResult<Self>;
}
