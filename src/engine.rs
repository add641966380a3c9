//! TaxonomyEngine: keeps the taxonomy index and the MOC file tree in step
//!
//! The engine owns one in-memory `TaxonomyIndex`, loaded when the engine is
//! opened and saved after every mutation. Mutations of the index and of the
//! file tree for one call happen under a single lock, so two callers sharing
//! an engine cannot interleave a read-modify-write of the index. Separate
//! engines (or processes) over the same vault are still not coordinated.

use crate::config::EngineConfig;
use crate::moc::{MocLayout, MocTree, NoteReference};
use crate::placement::{HierarchyProposal, PlacementResolver, ProposalError};
use crate::storage::{StorageError, VaultStore};
use crate::synthesis::{NodeSynthesizer, SynthesisOutcome, TextGenerator};
use crate::taxonomy::{ConflictRecord, Hierarchy, HierarchyError, NodePath, TaxonomyIndex};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur in engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("Rejected proposal: {0}")]
    Proposal(#[from] ProposalError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Disagreement between the index and the MOC file tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyFault {
    /// The index has a node whose MOC file is missing
    MissingMocFile { node: String, file: PathBuf },
    /// A MOC file exists with no matching index node
    OrphanMocFile { file: PathBuf },
}

impl fmt::Display for ConsistencyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMocFile { node, file } => {
                write!(f, "node \"{}\" has no MOC file at {}", node, file.display())
            }
            Self::OrphanMocFile { file } => {
                write!(f, "MOC file {} has no index node", file.display())
            }
        }
    }
}

/// Synthesis result for one level of a cascade
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeStep {
    pub moc: PathBuf,
    /// `Err` holds the storage error that stopped this level
    pub outcome: Result<SynthesisOutcome, String>,
}

/// One accepted hierarchy a note was filed under
#[derive(Debug, Clone)]
pub struct Placement {
    pub hierarchy: Hierarchy,
    pub leaf_moc: PathBuf,
    pub conflicts: Vec<ConflictRecord>,
    /// Leaf first, domain last
    pub cascade: Vec<CascadeStep>,
}

/// An accepted hierarchy the note could not be filed under
#[derive(Debug, Clone)]
pub struct PlacementFailure {
    pub hierarchy: Hierarchy,
    pub error: String,
}

/// Everything `place_note` did
#[derive(Debug, Clone, Default)]
pub struct PlacementReport {
    pub placements: Vec<Placement>,
    pub failures: Vec<PlacementFailure>,
}

impl PlacementReport {
    pub fn leaf_mocs(&self) -> Vec<&Path> {
        self.placements.iter().map(|p| p.leaf_moc.as_path()).collect()
    }
}

/// The exposed taxonomy and MOC engine
pub struct TaxonomyEngine {
    store: Arc<dyn VaultStore>,
    config: EngineConfig,
    index: Mutex<TaxonomyIndex>,
    mocs: MocTree,
    synthesizer: NodeSynthesizer,
    resolver: PlacementResolver,
}

impl TaxonomyEngine {
    /// Open an engine over `store`, loading the persisted index if any
    pub fn open(store: Arc<dyn VaultStore>, config: EngineConfig) -> Self {
        let index = TaxonomyIndex::load(store.as_ref(), &config.index_path());
        info!(
            root = %config.moc_root.display(),
            nodes = index.node_count(),
            conflicts = index.conflicts().len(),
            "opened taxonomy"
        );
        let mocs = MocTree::new(store.clone(), MocLayout::new(&config.moc_root));
        let synthesizer =
            NodeSynthesizer::new(store.clone()).with_excerpt_chars(config.excerpt_chars);
        let resolver = PlacementResolver::new(config.placement.clone());

        Self {
            store,
            config,
            index: Mutex::new(index),
            mocs,
            synthesizer,
            resolver,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mocs(&self) -> &MocTree {
        &self.mocs
    }

    fn lock_index(&self) -> MutexGuard<'_, TaxonomyIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, index: &mut TaxonomyIndex) -> Result<(), StorageError> {
        let path = self.config.index_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.store.create_dir_all(parent)?;
        }
        index.save(self.store.as_ref(), &path)
    }

    /// Snapshot of the in-memory index
    pub fn index(&self) -> TaxonomyIndex {
        self.lock_index().clone()
    }

    /// Discard the in-memory index and load it again from storage
    pub fn reload(&self) {
        let fresh = TaxonomyIndex::load(self.store.as_ref(), &self.config.index_path());
        *self.lock_index() = fresh;
    }

    /// Materialize a MOC for every level of `hierarchy` and insert it into
    /// the index. Returns the leaf MOC's path.
    ///
    /// Files are written before the index is saved, so the index never names
    /// a node without a file. If a level fails, the levels already on storage
    /// are indexed, and the error is returned.
    pub fn ensure_exists(&self, hierarchy: &Hierarchy, summary: Option<&str>) -> EngineResult<PathBuf> {
        let mut index = self.lock_index();
        let path = match self.mocs.ensure_exists(hierarchy) {
            Ok(path) => path,
            Err(e) => {
                self.index_written_levels(&mut index, hierarchy);
                return Err(e.into());
            }
        };

        let leaf = index.insert(hierarchy);
        if let Some(summary) = summary {
            index.set_summary(&leaf, summary);
        }
        self.save(&mut index)?;
        info!(node = %leaf, moc = %path.display(), "ensured MOC chain");
        Ok(path)
    }

    /// Index the leading levels of `hierarchy` whose MOC files exist
    fn index_written_levels(&self, index: &mut TaxonomyIndex, hierarchy: &Hierarchy) {
        let written = self
            .mocs
            .layout()
            .paths_for(&hierarchy.normalized())
            .iter()
            .take_while(|path| self.mocs.exists(path))
            .count();
        if written == 0 {
            return;
        }

        let partial = hierarchy.truncated(written);
        if index.contains(&partial) {
            return;
        }
        let node = index.insert(&partial);
        warn!(node = %node, "MOC chain incomplete, indexed written levels only");
        if let Err(e) = self.save(index) {
            warn!(error = %e, "failed to save index after partial MOC chain");
        }
    }

    /// Detect conflicts for `hierarchy` and log new ones in the index
    pub fn detect_and_record_conflicts(&self, hierarchy: &Hierarchy) -> EngineResult<Vec<ConflictRecord>> {
        let mut index = self.lock_index();
        let records = index.detect_conflicts(hierarchy);
        if index.record_conflicts(&records) > 0 {
            self.save(&mut index)?;
        }
        Ok(records)
    }

    /// Count a filed note against the deepest existing node of `hierarchy`
    pub fn increment_note_count(&self, hierarchy: &Hierarchy) -> EngineResult<Option<NodePath>> {
        let mut index = self.lock_index();
        let hit = index.increment_note_count(hierarchy);
        if hit.is_some() {
            self.save(&mut index)?;
        }
        Ok(hit)
    }

    pub fn render_context_for_classifier(&self) -> String {
        self.lock_index().render_context_for_classifier()
    }

    pub fn compact_projection(&self) -> serde_json::Value {
        self.lock_index().compact_projection()
    }

    /// Re-synthesize one MOC's free-form sections
    pub async fn synthesize(
        &self,
        generator: &dyn TextGenerator,
        moc: &Path,
    ) -> EngineResult<SynthesisOutcome> {
        Ok(self.synthesizer.synthesize(generator, moc).await?)
    }

    /// Synthesize every level of `hierarchy`, leaf first, pausing between
    /// levels. A failing level is recorded and the cascade moves on.
    pub async fn cascade(&self, generator: &dyn TextGenerator, hierarchy: &Hierarchy) -> Vec<CascadeStep> {
        let mut paths = self.mocs.layout().paths_for(&hierarchy.normalized());
        paths.reverse();

        let delay = self.config.pacing_delay();
        let mut steps = Vec::with_capacity(paths.len());
        for (i, moc) in paths.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = match self.synthesizer.synthesize(generator, &moc).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    warn!(moc = %moc.display(), error = %e, "cascade level failed, continuing upward");
                    Err(e.to_string())
                }
            };
            steps.push(CascadeStep { moc, outcome });
        }
        steps
    }

    /// File a note according to a classifier proposal.
    ///
    /// Each accepted hierarchy is handled independently: conflicts are
    /// recorded, the MOC chain is ensured, the note is linked from the leaf
    /// MOC and counted. A placement that fails is reported and the rest go
    /// ahead. Once every placement is attempted, each successful one's
    /// cascade runs leaf to root.
    ///
    /// Fails only when no placement succeeded.
    pub async fn place_note(
        &self,
        generator: &dyn TextGenerator,
        note: &NoteReference,
        proposal: &HierarchyProposal,
    ) -> EngineResult<PlacementReport> {
        let accepted = self.resolver.resolve(proposal);
        let mut report = PlacementReport::default();
        let mut first_error = None;

        for hierarchy in accepted {
            match self.file_under(&hierarchy, note) {
                Ok(placement) => report.placements.push(placement),
                Err(e) => {
                    warn!(hierarchy = %hierarchy, error = %e, "placement failed");
                    report.failures.push(PlacementFailure {
                        hierarchy,
                        error: e.to_string(),
                    });
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if report.placements.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let delay = self.config.pacing_delay();
        for (i, placement) in report.placements.iter_mut().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            placement.cascade = self.cascade(generator, &placement.hierarchy).await;
        }

        info!(
            note = %note.path,
            placements = report.placements.len(),
            failures = report.failures.len(),
            "filed note"
        );
        Ok(report)
    }

    fn file_under(&self, hierarchy: &Hierarchy, note: &NoteReference) -> EngineResult<Placement> {
        let conflicts = self.detect_and_record_conflicts(hierarchy)?;
        let leaf_moc = self.ensure_exists(hierarchy, None)?;
        self.mocs.link_note(&leaf_moc, note)?;
        self.increment_note_count(hierarchy)?;
        Ok(Placement {
            hierarchy: hierarchy.clone(),
            leaf_moc,
            conflicts,
            cascade: Vec::new(),
        })
    }

    /// Compare the index against the MOC files on storage. Nothing is
    /// repaired.
    pub fn verify_consistency(&self) -> EngineResult<Vec<ConsistencyFault>> {
        let index = self.index();
        let layout = self.mocs.layout();
        let mut faults = Vec::new();

        for node in index.nodes() {
            let file = layout.moc_path(node.node_path().labels());
            if !self.mocs.exists(&file) {
                faults.push(ConsistencyFault::MissingMocFile {
                    node: node.path.clone(),
                    file,
                });
            }
        }

        for (file, labels) in self.mocs.list()? {
            if index.find(&NodePath::from_labels(labels)).is_none() {
                faults.push(ConsistencyFault::OrphanMocFile { file });
            }
        }

        for fault in &faults {
            warn!(%fault, "consistency fault");
        }
        Ok(faults)
    }
}
