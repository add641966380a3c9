//! Taxonomy data structures
//!
//! Domain → Area → Topic → Concept forest, its conflict log, and the label
//! normalization every lookup goes through.

mod hierarchy;
mod index;
mod normalize;
mod render;


pub use hierarchy::{Hierarchy, HierarchyError, HierarchyResult, NodePath, MAX_DEPTH, PATH_SEPARATOR};
pub use index::{ConflictLocation, ConflictRecord, TaxonomyIndex, TaxonomyNode};
pub use normalize::normalize_label;
