//! MocTree: keeps the MOC file tree in step with taxonomy paths

use super::document::{MocDocument, NoteReference};
use super::layout::MocLayout;
use crate::storage::{StorageResult, VaultStore};
use crate::taxonomy::Hierarchy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Creates and links MOC files under a vault-relative root
///
/// Not transactional: when a level fails, levels written before it stay on
/// storage and the error is returned to the caller.
#[derive(Clone)]
pub struct MocTree {
    store: Arc<dyn VaultStore>,
    layout: MocLayout,
}

impl MocTree {
    pub fn new(store: Arc<dyn VaultStore>, layout: MocLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &MocLayout {
        &self.layout
    }

    /// Make sure every level of `hierarchy` has a MOC file and each one is
    /// linked from its parent. Labels are normalized first.
    ///
    /// Returns the deepest level's file path.
    pub fn ensure_exists(&self, hierarchy: &Hierarchy) -> StorageResult<PathBuf> {
        let hierarchy = hierarchy.normalized();
        let levels = hierarchy.levels();
        let paths = self.layout.paths_for(&hierarchy);

        for (depth, path) in paths.iter().enumerate() {
            let label = &levels[depth];
            if self.store.exists(path) {
                debug!(path = %path.display(), "MOC already exists");
            } else {
                self.create(path, label)?;
            }

            if depth > 0 {
                self.link_child(&paths[depth - 1], label)?;
            }
        }

        // Construction guarantees at least one level.
        Ok(paths[paths.len() - 1].clone())
    }

    fn create(&self, path: &Path, label: &str) -> StorageResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.store.create_dir_all(parent)?;
        }
        self.store
            .write(path, MocDocument::template(label).as_str())?;
        info!(path = %path.display(), "created MOC");
        Ok(())
    }

    fn link_child(&self, parent: &Path, child_label: &str) -> StorageResult<()> {
        let mut doc = self.read(parent)?;
        if doc.link_child(child_label) {
            self.write(parent, &doc)?;
            debug!(parent = %parent.display(), child = child_label, "linked child MOC");
        }
        Ok(())
    }

    /// List a note in a MOC's `Notes` section. Returns false if it was
    /// already listed.
    pub fn link_note(&self, moc: &Path, note: &NoteReference) -> StorageResult<bool> {
        let mut doc = self.read(moc)?;
        if !doc.link_note(note) {
            return Ok(false);
        }
        self.write(moc, &doc)?;
        info!(moc = %moc.display(), note = %note.path, "linked note");
        Ok(true)
    }

    pub fn read(&self, path: &Path) -> StorageResult<MocDocument> {
        self.store.read_to_string(path).map(MocDocument::parse)
    }

    pub fn write(&self, path: &Path, doc: &MocDocument) -> StorageResult<()> {
        self.store.write(path, doc.as_str())
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.store.exists(path)
    }

    /// Every MOC file under the root, paired with the label path it encodes
    pub fn list(&self) -> StorageResult<Vec<(PathBuf, Vec<String>)>> {
        Ok(self
            .store
            .list_files(self.layout.root())?
            .into_iter()
            .filter_map(|path| {
                let labels = self.layout.labels_for(&path)?;
                Some((path, labels))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moc::document::{CHILD_SECTION, TEMPLATE_SECTIONS};
    use crate::storage::MemoryVault;

    fn tree() -> (Arc<MemoryVault>, MocTree) {
        let store = Arc::new(MemoryVault::new());
        let tree = MocTree::new(store.clone(), MocLayout::new("MOCs"));
        (store, tree)
    }

    #[test]
    fn creates_every_level_and_links_parent() {
        let (store, tree) = tree();
        let leaf = tree
            .ensure_exists(&Hierarchy::new(["Biology", "Genetics"]).unwrap())
            .unwrap();

        assert_eq!(leaf, PathBuf::from("MOCs/Biology/00-Genetics MOC.md"));
        assert!(store.exists(Path::new("MOCs/00-Biology MOC.md")));
        assert!(store.exists(&leaf));

        let biology = tree.read(Path::new("MOCs/00-Biology MOC.md")).unwrap();
        assert_eq!(biology.section_lines(CHILD_SECTION), vec!["- [[00-Genetics MOC]]"]);

        let genetics = tree.read(&leaf).unwrap();
        assert_eq!(genetics.section_titles(), TEMPLATE_SECTIONS.to_vec());
    }

    #[test]
    fn repeated_calls_never_duplicate() {
        let (store, tree) = tree();
        let h = Hierarchy::new(["Biology", "Genetics", "Heredity"]).unwrap();
        tree.ensure_exists(&h).unwrap();
        let snapshot: Vec<String> = tree
            .list()
            .unwrap()
            .iter()
            .map(|(p, _)| store.read_to_string(p).unwrap())
            .collect();

        tree.ensure_exists(&h).unwrap();
        let again: Vec<String> = tree
            .list()
            .unwrap()
            .iter()
            .map(|(p, _)| store.read_to_string(p).unwrap())
            .collect();

        assert_eq!(snapshot, again);
        assert_eq!(store.file_count(), 3);
    }

    #[test]
    fn siblings_share_parent_file() {
        let (_, tree) = tree();
        tree.ensure_exists(&Hierarchy::new(["Biology", "Genetics"]).unwrap())
            .unwrap();
        tree.ensure_exists(&Hierarchy::new(["Biology", "Ecology"]).unwrap())
            .unwrap();

        let biology = tree.read(Path::new("MOCs/00-Biology MOC.md")).unwrap();
        assert_eq!(
            biology.section_lines(CHILD_SECTION),
            vec!["- [[00-Genetics MOC]]", "- [[00-Ecology MOC]]"]
        );
    }

    #[test]
    fn normalizes_labels_before_building_paths() {
        let (store, tree) = tree();
        let leaf = tree
            .ensure_exists(&Hierarchy::new(["Data Sciences", "Stats & Probability"]).unwrap())
            .unwrap();
        assert_eq!(
            leaf,
            PathBuf::from("MOCs/Data Science/00-Stats and Probability MOC.md")
        );
        assert!(store.exists(Path::new("MOCs/00-Data Science MOC.md")));
    }

    #[test]
    fn partial_failure_keeps_earlier_levels() {
        let (store, tree) = tree();
        store.fail_writes_under("MOCs/Biology/Genetics");

        let result =
            tree.ensure_exists(&Hierarchy::new(["Biology", "Genetics", "Heredity"]).unwrap());
        assert!(result.is_err());
        assert!(store.exists(Path::new("MOCs/00-Biology MOC.md")));
        assert!(store.exists(Path::new("MOCs/Biology/00-Genetics MOC.md")));
        assert!(!store.exists(Path::new("MOCs/Biology/Genetics/00-Heredity MOC.md")));
    }

    #[test]
    fn link_note_is_idempotent() {
        let (_, tree) = tree();
        let leaf = tree
            .ensure_exists(&Hierarchy::new(["Biology", "Genetics"]).unwrap())
            .unwrap();
        let note = NoteReference::new("Mendel", "Notes/Mendel");

        assert!(tree.link_note(&leaf, &note).unwrap());
        assert!(!tree.link_note(&leaf, &note).unwrap());
        assert_eq!(tree.read(&leaf).unwrap().note_references(), vec![note]);
    }
}
