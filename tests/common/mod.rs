//! Common test utilities for vault-backed integration tests
//!
//! Each `TestVault` is a temporary directory opened through `FsVault`, so
//! tests exercise the same storage path as the CLI.

use mocweave::{EngineConfig, FsVault, OpenVault, PlacementPolicy, TaxonomyEngine, VaultStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

pub struct TestVault {
    // Held so the directory outlives the test
    _dir: TempDir,
    pub root: PathBuf,
    pub store: Arc<FsVault>,
}

impl TestVault {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp vault");
        let root = dir.path().to_path_buf();
        let store = Arc::new(FsVault::open(&root).expect("open vault"));
        Self {
            _dir: dir,
            root,
            store,
        }
    }

    /// Engine with no pacing delay
    pub fn engine(&self, policy: PlacementPolicy) -> TaxonomyEngine {
        let config = EngineConfig::default()
            .with_pacing_delay(Duration::ZERO)
            .with_placement(policy);
        TaxonomyEngine::open(self.store.clone(), config)
    }

    /// Write a note at `rel` (without extension) and return the same path
    pub fn write_note(&self, rel: &str, content: &str) -> String {
        let path = PathBuf::from(format!("{}.md", rel));
        if let Some(parent) = path.parent() {
            self.store.create_dir_all(parent).expect("create note dir");
        }
        self.store.write(&path, content).expect("write note");
        rel.to_string()
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> String {
        std::fs::read_to_string(self.root.join(rel)).expect("read vault file")
    }

    /// Every MOC markdown file on disk, vault-relative and sorted
    pub fn moc_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(self.root.join("MOCs"))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().ends_with(" MOC.md"))
            .filter_map(|e| e.path().strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .collect();
        files.sort();
        files
    }
}

/// Body of the `## title` section, up to the next heading
pub fn section<'a>(text: &'a str, title: &str) -> &'a str {
    let heading = format!("## {}\n", title);
    let Some(start) = text.find(&heading) else {
        return "";
    };
    let body = &text[start + heading.len()..];
    let end = body.find("\n#").map_or(body.len(), |i| i + 1);
    &body[..end]
}
