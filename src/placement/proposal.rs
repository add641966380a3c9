//! Classifier hierarchy proposals
//!
//! Classifier output is loosely shaped JSON. It is parsed into a validated
//! `HierarchyProposal`: the primary hierarchy must name at least a domain
//! and an area. Alternatives are held to the same rule; ones that fail are
//! dropped.

use crate::taxonomy::{Hierarchy, HierarchyError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Errors raised while accepting a classifier proposal
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("malformed proposal: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid primary hierarchy: {0}")]
    InvalidHierarchy(#[from] HierarchyError),

    #[error("primary hierarchy must name level1 and level2, got \"{0}\"")]
    Incomplete(String),
}

/// Result type for proposal validation
pub type ProposalResult<T> = Result<T, ProposalError>;

/// An alternative placement with the classifier's strength score
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeHierarchy {
    pub hierarchy: Hierarchy,
    pub strength: f64,
}

/// A validated classifier proposal
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyProposal {
    pub hierarchy: Hierarchy,
    pub confidence: f64,
    pub reasoning: String,
    /// Free-text alternatives the classifier mentioned
    pub alternatives: Vec<String>,
    pub is_cross_domain: bool,
    pub alternative_hierarchies: Vec<AlternativeHierarchy>,
}

#[derive(Debug, Default, Deserialize)]
struct LevelSlots {
    #[serde(default)]
    level1: Option<String>,
    #[serde(default)]
    level2: Option<String>,
    #[serde(default)]
    level3: Option<String>,
    #[serde(default)]
    level4: Option<String>,
}

impl LevelSlots {
    fn into_hierarchy(self) -> Result<Hierarchy, HierarchyError> {
        Hierarchy::from_slots([self.level1, self.level2, self.level3, self.level4])
    }
}

#[derive(Debug, Deserialize)]
struct RawAlternative {
    #[serde(flatten)]
    levels: LevelSlots,
    #[serde(default)]
    strength: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    hierarchy: LevelSlots,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    alternatives: Vec<Value>,
    #[serde(default)]
    is_cross_domain: bool,
    #[serde(default)]
    alternative_hierarchies: Vec<RawAlternative>,
}

impl HierarchyProposal {
    /// A single-placement proposal for `hierarchy`
    pub fn new(hierarchy: Hierarchy) -> ProposalResult<Self> {
        if hierarchy.depth() < 2 {
            return Err(ProposalError::Incomplete(hierarchy.to_string()));
        }
        Ok(Self {
            hierarchy,
            confidence: 1.0,
            reasoning: String::new(),
            alternatives: Vec::new(),
            is_cross_domain: false,
            alternative_hierarchies: Vec::new(),
        })
    }

    /// Mark the proposal as cross-domain with the given confidence
    pub fn cross_domain(mut self, confidence: f64) -> Self {
        self.is_cross_domain = true;
        self.confidence = confidence;
        self
    }

    /// Add an alternative placement. One without an area is dropped.
    pub fn with_alternative(mut self, hierarchy: Hierarchy, strength: f64) -> Self {
        self.push_alternative(hierarchy, strength);
        self
    }

    fn push_alternative(&mut self, hierarchy: Hierarchy, strength: f64) {
        if hierarchy.depth() < 2 {
            warn!(hierarchy = %hierarchy, "dropping alternative hierarchy without an area");
            return;
        }
        self.alternative_hierarchies
            .push(AlternativeHierarchy { hierarchy, strength });
    }

    /// Parse and validate classifier JSON
    pub fn from_json(json: &str) -> ProposalResult<Self> {
        let raw: RawProposal = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Validate an already-decoded classifier payload
    pub fn from_value(value: Value) -> ProposalResult<Self> {
        let raw: RawProposal = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawProposal) -> ProposalResult<Self> {
        let hierarchy = raw.hierarchy.into_hierarchy()?;
        let mut proposal = Self::new(hierarchy)?;
        proposal.confidence = raw.confidence;
        proposal.reasoning = raw.reasoning;
        proposal.is_cross_domain = raw.is_cross_domain;
        proposal.alternatives = raw
            .alternatives
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();

        for alternative in raw.alternative_hierarchies {
            match alternative.levels.into_hierarchy() {
                Ok(hierarchy) => proposal.push_alternative(hierarchy, alternative.strength),
                Err(e) => warn!(error = %e, "dropping invalid alternative hierarchy"),
            }
        }

        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_proposal() {
        let proposal = HierarchyProposal::from_value(json!({
            "hierarchy": {"level1": "Computer Science", "level2": "Machine Learning", "level3": "Neural Networks"},
            "confidence": 0.82,
            "reasoning": "Mostly about training deep nets",
            "alternatives": ["Mathematics > Optimization"],
            "isCrossDomain": true,
            "alternativeHierarchies": [
                {"level1": "Mathematics", "level2": "Optimization", "strength": 0.7},
                {"level1": "Neuroscience", "level3": "Gap", "strength": 0.9}
            ]
        }))
        .unwrap();

        assert_eq!(proposal.hierarchy.depth(), 3);
        assert!(proposal.is_cross_domain);
        assert_eq!(proposal.alternatives, vec!["Mathematics > Optimization"]);
        assert_eq!(proposal.alternative_hierarchies.len(), 1);
        assert_eq!(
            proposal.alternative_hierarchies[0].hierarchy.to_string(),
            "Mathematics > Optimization"
        );
        assert_eq!(proposal.alternative_hierarchies[0].strength, 0.7);
    }

    #[test]
    fn drops_alternatives_without_an_area() {
        let proposal = HierarchyProposal::from_value(json!({
            "hierarchy": {"level1": "Biology", "level2": "Genetics"},
            "isCrossDomain": true,
            "alternativeHierarchies": [
                {"level1": "Chemistry", "strength": 0.9},
                {"level1": "Chemistry", "level2": "Biochemistry", "strength": 0.8}
            ]
        }))
        .unwrap();
        let kept: Vec<String> = proposal
            .alternative_hierarchies
            .iter()
            .map(|a| a.hierarchy.to_string())
            .collect();
        assert_eq!(kept, vec!["Chemistry > Biochemistry"]);

        let built = HierarchyProposal::new(Hierarchy::new(["Biology", "Genetics"]).unwrap())
            .unwrap()
            .with_alternative(Hierarchy::new(["Chemistry"]).unwrap(), 0.9);
        assert!(built.alternative_hierarchies.is_empty());
    }

    #[test]
    fn rejects_primary_without_area() {
        let err = HierarchyProposal::from_json(r#"{"hierarchy": {"level1": "Biology"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProposalError::Incomplete(_)));
    }

    #[test]
    fn rejects_missing_domain_and_garbage() {
        assert!(matches!(
            HierarchyProposal::from_json(r#"{"hierarchy": {"level2": "Genetics"}}"#).unwrap_err(),
            ProposalError::InvalidHierarchy(_)
        ));
        assert!(matches!(
            HierarchyProposal::from_json("not json").unwrap_err(),
            ProposalError::Parse(_)
        ));
        assert!(matches!(
            HierarchyProposal::from_json(r#"{"confidence": 0.5}"#).unwrap_err(),
            ProposalError::Parse(_)
        ));
    }

    #[test]
    fn defaults_optional_fields() {
        let proposal = HierarchyProposal::from_json(
            r#"{"hierarchy": {"level1": "Biology", "level2": "Genetics"}}"#,
        )
        .unwrap();
        assert!(!proposal.is_cross_domain);
        assert_eq!(proposal.confidence, 0.0);
        assert!(proposal.alternative_hierarchies.is_empty());
    }
}
