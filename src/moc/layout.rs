//! Mapping between taxonomy paths and MOC file locations
//!
//! ```text
//! <root>/00-<Domain> MOC.md
//! <root>/<Domain>/00-<Area> MOC.md
//! <root>/<Domain>/<Area>/00-<Topic> MOC.md
//! <root>/<Domain>/<Area>/<Topic>/00-<Concept> MOC.md
//! ```

use crate::taxonomy::{Hierarchy, MAX_DEPTH};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "00-";
const FILE_SUFFIX: &str = " MOC.md";

/// Link target (basename without extension) of a label's MOC
pub fn link_target(label: &str) -> String {
    format!("{}{} MOC", FILE_PREFIX, label)
}

/// File name of a label's MOC
pub fn file_name(label: &str) -> String {
    format!("{}{}{}", FILE_PREFIX, label, FILE_SUFFIX)
}

/// Label encoded in a MOC file name, if it is one
pub fn label_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)
        .filter(|label| !label.is_empty())
}

/// Folder layout of the MOC tree under a vault-relative root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MocLayout {
    root: PathBuf,
}

impl MocLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// MOC file for the node named by `labels` (root first, non-empty)
    pub fn moc_path(&self, labels: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        let Some((leaf, folders)) = labels.split_last() else {
            return path;
        };
        for folder in folders {
            path.push(folder);
        }
        path.push(file_name(leaf));
        path
    }

    /// MOC file for every level of `hierarchy`, root first
    pub fn paths_for(&self, hierarchy: &Hierarchy) -> Vec<PathBuf> {
        let levels = hierarchy.levels();
        (1..=levels.len())
            .map(|depth| self.moc_path(&levels[..depth]))
            .collect()
    }

    /// Recover the label path from a MOC file location.
    ///
    /// Returns `None` for files outside the root, files that are not MOCs,
    /// and paths deeper than the taxonomy allows.
    pub fn labels_for(&self, file: &Path) -> Option<Vec<String>> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let mut labels: Vec<String> = Vec::new();
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            let name = component.as_os_str().to_str()?;
            if components.peek().is_some() {
                labels.push(name.to_string());
            } else {
                labels.push(label_from_file_name(name)?.to_string());
            }
        }

        if labels.is_empty() || labels.len() > MAX_DEPTH {
            return None;
        }
        Some(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_file_lives_directly_under_root() {
        let layout = MocLayout::new("MOCs");
        let h = Hierarchy::new(["Biology", "Genetics", "Heredity", "Alleles"]).unwrap();

        assert_eq!(
            layout.paths_for(&h),
            vec![
                PathBuf::from("MOCs/00-Biology MOC.md"),
                PathBuf::from("MOCs/Biology/00-Genetics MOC.md"),
                PathBuf::from("MOCs/Biology/Genetics/00-Heredity MOC.md"),
                PathBuf::from("MOCs/Biology/Genetics/Heredity/00-Alleles MOC.md"),
            ]
        );
    }

    #[test]
    fn labels_round_trip_through_paths() {
        let layout = MocLayout::new("MOCs");
        let labels = vec!["Biology".to_string(), "Genetics".to_string()];
        let path = layout.moc_path(&labels);
        assert_eq!(layout.labels_for(&path), Some(labels));
    }

    #[test]
    fn non_moc_files_have_no_labels() {
        let layout = MocLayout::new("MOCs");
        assert_eq!(layout.labels_for(Path::new("MOCs/hierarchy.json")), None);
        assert_eq!(layout.labels_for(Path::new("MOCs/Biology/notes.md")), None);
        assert_eq!(layout.labels_for(Path::new("Elsewhere/00-Biology MOC.md")), None);
        assert_eq!(label_from_file_name("00- MOC.md"), None);
    }

    #[test]
    fn link_target_drops_extension() {
        assert_eq!(link_target("Genetics"), "00-Genetics MOC");
        assert_eq!(file_name("Genetics"), "00-Genetics MOC.md");
    }
}
