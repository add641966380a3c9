//! In-memory storage backend
//!
//! Mirrors filesystem semantics closely enough for tests: writes need their
//! parent folder to exist, and failures can be injected per path prefix.

use super::traits::{StorageError, StorageResult, VaultStore};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
    failing_writes: Vec<PathBuf>,
    failing_reads: Vec<PathBuf>,
}

/// Vault held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: Mutex<MemoryState>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write or folder creation at or below `prefix` fail.
    pub fn fail_writes_under(&self, prefix: impl Into<PathBuf>) {
        self.lock().failing_writes.push(prefix.into());
    }

    /// Make every read at or below `prefix` fail with an I/O error.
    pub fn fail_reads_under(&self, prefix: impl Into<PathBuf>) {
        self.lock().failing_reads.push(prefix.into());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_writes.clear();
        state.failing_reads.clear();
    }

    /// Remove a file, returning whether it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.lock().files.remove(path).is_some()
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rejected(path: &Path, prefixes: &[PathBuf]) -> Option<StorageError> {
        prefixes.iter().any(|p| path.starts_with(p)).then(|| {
            StorageError::io(
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
            )
        })
    }

    fn parent_exists(state: &MemoryState, path: &Path) -> bool {
        match path.parent() {
            None => true,
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => state.dirs.contains(parent),
        }
    }
}

impl VaultStore for MemoryVault {
    fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        let state = self.lock();
        if let Some(err) = Self::rejected(path, &state.failing_reads) {
            return Err(err);
        }
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, contents: &str) -> StorageResult<()> {
        let mut state = self.lock();
        if let Some(err) = Self::rejected(path, &state.failing_writes) {
            return Err(err);
        }
        if !Self::parent_exists(&state, path) {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        state.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let mut state = self.lock();
        if let Some(err) = Self::rejected(path, &state.failing_writes) {
            return Err(err);
        }
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> StorageResult<Vec<PathBuf>> {
        Ok(self
            .lock()
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_parent_folder() {
        let vault = MemoryVault::new();
        assert!(vault.write(Path::new("a/b.md"), "x").is_err());

        vault.create_dir_all(Path::new("a")).unwrap();
        vault.write(Path::new("a/b.md"), "x").unwrap();
        assert_eq!(vault.read_to_string(Path::new("a/b.md")).unwrap(), "x");
    }

    #[test]
    fn root_level_files_need_no_folder() {
        let vault = MemoryVault::new();
        vault.write(Path::new("top.md"), "x").unwrap();
        assert!(vault.exists(Path::new("top.md")));
    }

    #[test]
    fn injected_failures_apply_by_prefix() {
        let vault = MemoryVault::new();
        vault.create_dir_all(Path::new("MOCs")).unwrap();
        vault.fail_writes_under("MOCs/Biology");

        assert!(vault.write(Path::new("MOCs/00-Biology MOC.md"), "").is_ok());
        let err = vault
            .create_dir_all(Path::new("MOCs/Biology/Genetics"))
            .unwrap_err();
        assert!(!err.is_not_found());

        vault.clear_failures();
        assert!(vault.create_dir_all(Path::new("MOCs/Biology")).is_ok());
    }
}
