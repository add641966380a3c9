//! Placement of notes into the taxonomy from classifier proposals

mod proposal;
mod resolver;

pub use proposal::{AlternativeHierarchy, HierarchyProposal, ProposalError, ProposalResult};
pub use resolver::{PlacementPolicy, PlacementResolver};
