//! Turning a proposal into concrete placements

use super::proposal::{AlternativeHierarchy, HierarchyProposal};
use crate::taxonomy::Hierarchy;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_min_strength() -> f64 {
    0.5
}

fn default_min_confidence() -> f64 {
    0.0
}

fn default_max_alternatives() -> usize {
    2
}

/// How many places a cross-domain note may be filed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// Always file under the primary hierarchy only
    #[default]
    Single,
    /// File cross-domain notes under the primary and every strong enough
    /// alternative
    Multi {
        #[serde(default = "default_min_strength")]
        min_strength: f64,
        #[serde(default = "default_min_confidence")]
        min_confidence: f64,
        #[serde(default = "default_max_alternatives")]
        max_alternatives: usize,
    },
}

impl PlacementPolicy {
    /// Multi-placement with default thresholds
    pub fn multi() -> Self {
        PlacementPolicy::Multi {
            min_strength: default_min_strength(),
            min_confidence: default_min_confidence(),
            max_alternatives: default_max_alternatives(),
        }
    }
}

/// Chooses which hierarchies a proposal is filed under
#[derive(Debug, Clone, Default)]
pub struct PlacementResolver {
    policy: PlacementPolicy,
}

impl PlacementResolver {
    pub fn new(policy: PlacementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    /// Hierarchies to file under, primary first.
    ///
    /// Alternatives are never merged into the primary: each accepted one is
    /// an independent placement. Alternatives that normalize to an already
    /// accepted path are skipped.
    pub fn resolve(&self, proposal: &HierarchyProposal) -> Vec<Hierarchy> {
        let primary = proposal.hierarchy.clone();

        let PlacementPolicy::Multi {
            min_strength,
            min_confidence,
            max_alternatives,
        } = self.policy
        else {
            return vec![primary];
        };

        if !proposal.is_cross_domain || proposal.confidence < min_confidence {
            return vec![primary];
        }

        let mut candidates: Vec<&AlternativeHierarchy> = proposal
            .alternative_hierarchies
            .iter()
            .filter(|a| a.strength >= min_strength)
            .collect();
        candidates.sort_by(|a, b| b.strength.total_cmp(&a.strength));

        let mut accepted = vec![primary];
        let mut seen = vec![accepted[0].normalized()];
        for alternative in candidates {
            if accepted.len() > max_alternatives {
                break;
            }
            let normalized = alternative.hierarchy.normalized();
            if seen.contains(&normalized) {
                debug!(hierarchy = %alternative.hierarchy, "skipping duplicate alternative");
                continue;
            }
            seen.push(normalized);
            accepted.push(alternative.hierarchy.clone());
        }

        debug!(placements = accepted.len(), "resolved proposal");
        accepted
    }
}
