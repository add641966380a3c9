//! Mocweave: Taxonomy-Driven Map-of-Content Engine
//!
//! Files notes from a markdown vault into a bounded Domain → Area → Topic →
//! Concept taxonomy and keeps a tree of Map-of-Content (MOC) files in step
//! with it.
//!
//! # Core Concepts
//!
//! - **Taxonomy index**: persisted forest of labelled nodes with note counts
//!   and a log of concepts that appear in more than one place
//! - **MOC tree**: one markdown file per node, in folders mirroring the
//!   taxonomy, each parent linking its children
//! - **Synthesis**: generator-written overview sections, refreshed from the
//!   leaf upward whenever a note is filed
//!
//! # Example
//!
//! ```
//! use mocweave::{EngineConfig, Hierarchy, MemoryVault, TaxonomyEngine};
//! use std::sync::Arc;
//!
//! let engine = TaxonomyEngine::open(Arc::new(MemoryVault::new()), EngineConfig::default());
//! let leaf = engine
//!     .ensure_exists(&Hierarchy::new(["Biology", "Genetics"]).unwrap(), None)
//!     .unwrap();
//! assert!(leaf.ends_with("Biology/00-Genetics MOC.md"));
//! ```

pub mod config;
pub mod engine;
pub mod moc;
pub mod placement;
pub mod storage;
pub mod synthesis;
pub mod taxonomy;

pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use engine::{
    CascadeStep, ConsistencyFault, EngineError, EngineResult, Placement, PlacementFailure,
    PlacementReport, TaxonomyEngine,
};
pub use moc::{MocDocument, MocLayout, MocTree, NoteReference};
pub use placement::{
    HierarchyProposal, PlacementPolicy, PlacementResolver, ProposalError, ProposalResult,
};
pub use storage::{FsVault, MemoryVault, OpenVault, StorageError, StorageResult, VaultStore};
pub use synthesis::{
    GenerationError, GenerationResult, GeneratorCommand, MockGenerator, NodeSynthesizer,
    SubprocessGenerator, SynthesisOutcome, TextGenerator,
};
pub use taxonomy::{ConflictRecord, Hierarchy, HierarchyError, NodePath, TaxonomyIndex, TaxonomyNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
