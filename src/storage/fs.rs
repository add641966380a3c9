//! Filesystem storage backend

use super::traits::{OpenVault, StorageError, StorageResult, VaultStore};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Vault backed by a folder on the local filesystem
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl OpenVault for FsVault {
    fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        Ok(Self { root })
    }
}

impl VaultStore for FsVault {
    fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        std::fs::read_to_string(self.resolve(path)).map_err(|e| StorageError::io(path, e))
    }

    fn write(&self, path: &Path, contents: &str) -> StorageResult<()> {
        debug!(path = %path.display(), bytes = contents.len(), "writing file");
        std::fs::write(self.resolve(path), contents).map_err(|e| StorageError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        std::fs::create_dir_all(self.resolve(path)).map_err(|e| StorageError::io(path, e))
    }

    fn list_files(&self, dir: &Path) -> StorageResult<Vec<PathBuf>> {
        let base = self.resolve(dir);
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone());
                StorageError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }
}
