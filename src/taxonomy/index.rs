//! TaxonomyIndex: the serialized taxonomy tree plus its conflict log

use super::hierarchy::{Hierarchy, NodePath, PATH_SEPARATOR};
use crate::storage::{StorageResult, VaultStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// One node of the taxonomy forest
///
/// The node's label is its key in the parent's `children` map (or in
/// `TaxonomyIndex::domains` for a domain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyNode {
    /// 1 = domain, 2 = area, 3 = topic, 4 = concept
    pub level: u8,
    /// Notes filed directly at this node
    #[serde(default)]
    pub note_count: u64,
    /// Short description kept for future similarity matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub children: BTreeMap<String, TaxonomyNode>,
    /// Root-to-node label path, `" > "` separated
    pub path: String,
}

impl TaxonomyNode {
    fn new(path: &NodePath) -> Self {
        Self {
            level: path.level() as u8,
            note_count: 0,
            summary: None,
            children: BTreeMap::new(),
            path: path.to_string(),
        }
    }

    /// Label of this node (last segment of its path)
    pub fn label(&self) -> &str {
        self.path
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or(&self.path)
    }

    pub fn node_path(&self) -> NodePath {
        NodePath::from_labels(self.path.split(PATH_SEPARATOR).map(String::from).collect())
    }
}

/// A place where a conflicting concept label occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictLocation {
    pub path: String,
    pub level: u8,
}

impl ConflictLocation {
    fn new(path: &NodePath) -> Self {
        Self {
            path: path.to_string(),
            level: path.level() as u8,
        }
    }
}

/// The same concept label found at more than one taxonomy path
///
/// Fields are read-only: the recommendation is derived from the locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    concept: String,
    locations: Vec<ConflictLocation>,
    recommendation: String,
}

impl ConflictRecord {
    /// Build a record from the existing locations and the proposed one.
    ///
    /// `existing` must be non-empty and must not contain `proposed`.
    fn new(concept: &str, mut existing: Vec<ConflictLocation>, proposed: ConflictLocation) -> Self {
        let recommendation = Self::recommend(concept, &existing, &proposed);
        existing.push(proposed);
        Self {
            concept: concept.to_string(),
            locations: existing,
            recommendation,
        }
    }

    /// Prefer the location closest to the root when it is strictly shallower
    /// than the proposed one; otherwise ask for manual consolidation.
    fn recommend(concept: &str, existing: &[ConflictLocation], proposed: &ConflictLocation) -> String {
        let closest = existing
            .iter()
            .chain(std::iter::once(proposed))
            .min_by_key(|l| l.level)
            .unwrap_or(proposed);

        if closest.level < proposed.level {
            format!(
                "Reuse the existing \"{}\" at \"{}\" (level {}) instead of creating it at level {}",
                concept, closest.path, closest.level, proposed.level
            )
        } else {
            format!(
                "Consolidate \"{}\" manually: it appears at {} locations and none is shallower than the proposed one",
                concept,
                existing.len() + 1
            )
        }
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn locations(&self) -> &[ConflictLocation] {
        &self.locations
    }

    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }

    /// Same concept at the same set of paths, in any order
    fn same_conflict(&self, other: &ConflictRecord) -> bool {
        self.concept == other.concept
            && self.locations.len() == other.locations.len()
            && self
                .locations
                .iter()
                .all(|l| other.locations.iter().any(|o| o.path == l.path))
    }
}

/// The taxonomy aggregate root
///
/// Owns every `TaxonomyNode` and the conflict log. The caller owns the
/// load/save lifecycle; every mutating operation is expected to be followed
/// by [`TaxonomyIndex::save`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyIndex {
    #[serde(default)]
    pub(crate) domains: BTreeMap<String, TaxonomyNode>,
    #[serde(default)]
    pub(crate) conflicts: Vec<ConflictRecord>,
    pub(crate) last_updated: DateTime<Utc>,
    #[serde(rename = "totalMOCs", default)]
    pub(crate) total_mocs: u64,
}

impl Default for TaxonomyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            domains: BTreeMap::new(),
            conflicts: Vec::new(),
            last_updated: Utc::now(),
            total_mocs: 0,
        }
    }

    /// Load the index from `path`.
    ///
    /// A missing, unreadable, or unparseable file yields an empty index.
    pub fn load(store: &dyn VaultStore, path: &Path) -> Self {
        let text = match store.read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "no taxonomy index yet, starting empty");
                return Self::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read taxonomy index, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(index) => index,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse taxonomy index, starting empty");
                Self::new()
            }
        }
    }

    /// Persist the index to `path`, stamping `last_updated`.
    pub fn save(&mut self, store: &dyn VaultStore, path: &Path) -> StorageResult<()> {
        self.last_updated = Utc::now();
        let json = serde_json::to_string_pretty(self)?;
        store.write(path, &json)?;
        debug!(path = %path.display(), nodes = self.node_count(), "saved taxonomy index");
        Ok(())
    }

    pub fn domains(&self) -> &BTreeMap<String, TaxonomyNode> {
        &self.domains
    }

    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.conflicts
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Number of `insert` calls ever made against this index
    pub fn total_mocs(&self) -> u64 {
        self.total_mocs
    }

    /// Insert the chain named by `hierarchy`, creating missing nodes.
    ///
    /// Labels are normalized first. Re-inserting an existing path changes no
    /// node but still counts toward `total_mocs`. Returns the leaf's path.
    pub fn insert(&mut self, hierarchy: &Hierarchy) -> NodePath {
        let hierarchy = hierarchy.normalized();
        let mut labels: Vec<String> = Vec::with_capacity(hierarchy.depth());
        let mut children = &mut self.domains;

        for label in hierarchy.levels() {
            labels.push(label.clone());
            let node = children.entry(label.clone()).or_insert_with(|| {
                let path = NodePath::from_labels(labels.clone());
                info!(path = %path, "creating taxonomy node");
                TaxonomyNode::new(&path)
            });
            children = &mut node.children;
        }

        self.total_mocs += 1;
        NodePath::from_labels(labels)
    }

    /// Attach a summary to an existing node. Returns false if absent.
    pub fn set_summary(&mut self, path: &NodePath, summary: impl Into<String>) -> bool {
        match self.find_mut(path) {
            Some(node) => {
                node.summary = Some(summary.into());
                true
            }
            None => false,
        }
    }

    /// Look up a node by its (already normalized) label path
    pub fn find(&self, path: &NodePath) -> Option<&TaxonomyNode> {
        let (first, rest) = path.labels().split_first()?;
        let mut node = self.domains.get(first)?;
        for label in rest {
            node = node.children.get(label)?;
        }
        Some(node)
    }

    fn find_mut(&mut self, path: &NodePath) -> Option<&mut TaxonomyNode> {
        let (first, rest) = path.labels().split_first()?;
        let mut node = self.domains.get_mut(first)?;
        for label in rest {
            node = node.children.get_mut(label)?;
        }
        Some(node)
    }

    /// Whether the node named by `hierarchy` (normalized) exists
    pub fn contains(&self, hierarchy: &Hierarchy) -> bool {
        self.find(&hierarchy.normalized().path()).is_some()
    }

    /// Every node, depth-first pre-order, siblings in label order.
    ///
    /// Uses an explicit stack so depth is not bounded by the call stack.
    pub fn nodes(&self) -> Vec<&TaxonomyNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&TaxonomyNode> = self.domains.values().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.values().rev());
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// Every node carrying `label`, in traversal order
    pub fn locate(&self, label: &str) -> Vec<&TaxonomyNode> {
        self.nodes()
            .into_iter()
            .filter(|n| n.label() == label)
            .collect()
    }

    /// Find labels of `hierarchy` that already exist at other paths.
    ///
    /// For each level, every node elsewhere in the tree with the same
    /// normalized label becomes a location; the proposed position is
    /// appended last. Pure: the conflict log is not touched.
    pub fn detect_conflicts(&self, hierarchy: &Hierarchy) -> Vec<ConflictRecord> {
        let hierarchy = hierarchy.normalized();
        let mut records = Vec::new();

        for depth in 1..=hierarchy.depth() {
            let proposed_path = hierarchy.truncated(depth).path();
            let Some(concept) = proposed_path.label() else {
                continue;
            };
            let proposed = ConflictLocation::new(&proposed_path);

            let mut existing: Vec<ConflictLocation> = Vec::new();
            for node in self.locate(concept) {
                if node.path == proposed.path || existing.iter().any(|l| l.path == node.path) {
                    continue;
                }
                existing.push(ConflictLocation {
                    path: node.path.clone(),
                    level: node.level,
                });
            }

            if !existing.is_empty() {
                records.push(ConflictRecord::new(concept, existing, proposed));
            }
        }

        records
    }

    /// Append records to the conflict log, skipping ones already logged.
    /// Returns how many were appended.
    pub fn record_conflicts(&mut self, records: &[ConflictRecord]) -> usize {
        let mut appended = 0;
        for record in records {
            if self.conflicts.iter().any(|c| c.same_conflict(record)) {
                debug!(concept = %record.concept, "conflict already logged");
                continue;
            }
            warn!(
                concept = %record.concept,
                locations = record.locations.len(),
                "taxonomy conflict detected"
            );
            self.conflicts.push(record.clone());
            appended += 1;
        }
        appended
    }

    /// Detect conflicts for `hierarchy` and log any new ones.
    pub fn detect_and_record_conflicts(&mut self, hierarchy: &Hierarchy) -> Vec<ConflictRecord> {
        let records = self.detect_conflicts(hierarchy);
        self.record_conflicts(&records);
        records
    }

    /// Increment the note count of the deepest existing node on the path.
    ///
    /// Falls back to shallower nodes when deeper levels are absent. Returns
    /// the incremented node's path, or `None` when the domain itself is
    /// absent (nothing is incremented).
    pub fn increment_note_count(&mut self, hierarchy: &Hierarchy) -> Option<NodePath> {
        let hierarchy = hierarchy.normalized();
        let levels = hierarchy.levels();

        let mut node = self.domains.get_mut(&levels[0])?;
        for label in &levels[1..] {
            if !node.children.contains_key(label) {
                break;
            }
            node = node.children.get_mut(label)?;
        }

        node.note_count += 1;
        debug!(path = %node.path, count = node.note_count, "incremented note count");
        Some(node.node_path())
    }
}
