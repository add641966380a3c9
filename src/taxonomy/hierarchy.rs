//! Validated taxonomy paths
//!
//! A `Hierarchy` is the Domain → Area → Topic → Concept chain proposed for a
//! note. It is validated on construction so the rest of the engine never
//! sees a gap, an empty label, or a fifth level.

use super::normalize::normalize_label;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Deepest level a taxonomy node may occupy.
pub const MAX_DEPTH: usize = 4;

/// Separator used when rendering a root-to-node label path.
pub const PATH_SEPARATOR: &str = " > ";

/// Errors raised while building a `Hierarchy`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("hierarchy has no level1 (domain)")]
    MissingDomain,

    #[error("level{level} is present but level{missing} is not")]
    Gap { level: usize, missing: usize },

    #[error("level{level} label {raw:?} is empty after normalization")]
    EmptyLabel { level: usize, raw: String },

    #[error("hierarchy has {0} levels, at most 4 are allowed")]
    TooDeep(usize),
}

pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// A validated root-to-leaf taxonomy chain of 1 to 4 labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawHierarchy", into = "RawHierarchy")]
pub struct Hierarchy {
    levels: Vec<String>,
}

impl Hierarchy {
    /// Build a hierarchy from labels ordered root first.
    ///
    /// Labels are trimmed and kept as given; use [`Hierarchy::normalized`]
    /// for the canonical form.
    pub fn new<I, S>(labels: I) -> HierarchyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels: Vec<String> = labels
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .collect();

        if levels.is_empty() {
            return Err(HierarchyError::MissingDomain);
        }
        if levels.len() > MAX_DEPTH {
            return Err(HierarchyError::TooDeep(levels.len()));
        }
        for (i, raw) in levels.iter().enumerate() {
            if normalize_label(raw).is_empty() {
                return Err(HierarchyError::EmptyLabel {
                    level: i + 1,
                    raw: raw.clone(),
                });
            }
        }

        Ok(Self { levels })
    }

    /// Build a hierarchy from `level1..level4` slots as sent by classifiers.
    ///
    /// Blank slots count as absent; a present level below an absent one is
    /// a gap.
    pub fn from_slots(slots: [Option<String>; MAX_DEPTH]) -> HierarchyResult<Self> {
        let present: Vec<Option<String>> = slots
            .into_iter()
            .map(|s| s.filter(|v| !v.trim().is_empty()))
            .collect();

        let depth = present.iter().rposition(Option::is_some).map_or(0, |i| i + 1);
        if depth == 0 {
            return Err(HierarchyError::MissingDomain);
        }

        let mut labels = Vec::with_capacity(depth);
        for (i, slot) in present.into_iter().take(depth).enumerate() {
            match slot {
                Some(label) => labels.push(label),
                None if i == 0 => return Err(HierarchyError::MissingDomain),
                None => {
                    return Err(HierarchyError::Gap {
                        level: depth,
                        missing: i + 1,
                    })
                }
            }
        }

        Hierarchy::new(labels)
    }

    /// Labels ordered root first.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Number of levels (1 to 4).
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Label at a 1-based level, if present.
    pub fn label(&self, level: usize) -> Option<&str> {
        level
            .checked_sub(1)
            .and_then(|i| self.levels.get(i))
            .map(String::as_str)
    }

    /// Deepest label.
    pub fn leaf(&self) -> &str {
        // Construction guarantees at least one level.
        &self.levels[self.levels.len() - 1]
    }

    /// The first `depth` levels of this hierarchy.
    pub fn truncated(&self, depth: usize) -> Self {
        let depth = depth.clamp(1, self.levels.len());
        Self {
            levels: self.levels[..depth].to_vec(),
        }
    }

    /// Copy with every label canonicalized.
    pub fn normalized(&self) -> Self {
        Self {
            levels: self.levels.iter().map(|l| normalize_label(l)).collect(),
        }
    }

    /// Label path of the leaf.
    pub fn path(&self) -> NodePath {
        NodePath(self.levels.clone())
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.levels.join(PATH_SEPARATOR))
    }
}

/// Wire shape used by classifiers and the persisted form:
/// `{level1, level2?, level3?, level4?}`. Empty strings count as absent.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawHierarchy {
    #[serde(default)]
    level1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level4: Option<String>,
}

impl TryFrom<RawHierarchy> for Hierarchy {
    type Error = HierarchyError;

    fn try_from(raw: RawHierarchy) -> HierarchyResult<Self> {
        Hierarchy::from_slots([raw.level1, raw.level2, raw.level3, raw.level4])
    }
}

impl From<Hierarchy> for RawHierarchy {
    fn from(h: Hierarchy) -> Self {
        let mut levels = h.levels.into_iter();
        Self {
            level1: levels.next(),
            level2: levels.next(),
            level3: levels.next(),
            level4: levels.next(),
        }
    }
}

/// Root-to-node label path identifying a taxonomy node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// 1-based level of the node this path names.
    pub fn level(&self) -> usize {
        self.0.len()
    }

    pub fn label(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of the parent node, `None` for a domain.
    pub fn parent(&self) -> Option<NodePath> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(NodePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub(crate) fn from_labels(labels: Vec<String>) -> Self {
        Self(labels)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(PATH_SEPARATOR))
    }
}
