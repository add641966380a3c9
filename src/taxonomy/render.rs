//! Textual and compact projections of the taxonomy
//!
//! Both are derived views. The classifier context is prose with no
//! machine-parseable contract; the compact projection is a label → label
//! map and is never read back as a source of truth.

use super::index::{TaxonomyIndex, TaxonomyNode};
use serde_json::{Map, Value};
use std::fmt::Write;

const PLACEMENT_RULES: &[&str] = &[
    "Prefer reusing an existing node over creating a new one, and prefer the shallower node when a concept already exists at several levels.",
    "Only create a new level-1 domain for a genuinely distinct field of knowledge.",
    "When a concept is flagged as a conflict, place the note under the recommended location.",
    "Hierarchies are at most 4 levels deep: domain, area, topic, concept.",
];

impl TaxonomyIndex {
    /// Render the taxonomy as context for the next classification prompt.
    ///
    /// Deterministic for a given index: siblings are listed in label order.
    pub fn render_context_for_classifier(&self) -> String {
        let mut out = String::new();

        out.push_str("EXISTING KNOWLEDGE HIERARCHY:\n");
        if self.domains.is_empty() {
            out.push_str("(empty: no domains yet)\n");
        }

        let mut stack: Vec<&TaxonomyNode> = self.domains.values().rev().collect();
        while let Some(node) = stack.pop() {
            let indent = "  ".repeat(usize::from(node.level.saturating_sub(1)));
            let _ = write!(
                out,
                "{}- {} (level {}, {} {})",
                indent,
                node.label(),
                node.level,
                node.note_count,
                if node.note_count == 1 { "note" } else { "notes" }
            );
            if let Some(summary) = &node.summary {
                let _ = write!(out, ": {}", summary);
            }
            if self.is_conflicted(node) {
                out.push_str(" [CONFLICT]");
            }
            out.push('\n');
            stack.extend(node.children.values().rev());
        }

        if !self.conflicts.is_empty() {
            out.push_str("\nCONFLICTS:\n");
            for record in &self.conflicts {
                let _ = writeln!(out, "- \"{}\" appears at:", record.concept());
                for location in record.locations() {
                    let _ = writeln!(out, "    - {} (level {})", location.path, location.level);
                }
                let _ = writeln!(out, "  Recommendation: {}", record.recommendation());
            }
        }

        let _ = writeln!(
            out,
            "\nSUMMARY: {} MOCs across {} domains",
            self.total_mocs,
            self.domains.len()
        );

        out.push_str("\nPLACEMENT RULES:\n");
        for (i, rule) in PLACEMENT_RULES.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, rule);
        }

        out
    }

    fn is_conflicted(&self, node: &TaxonomyNode) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.locations().iter().any(|l| l.path == node.path))
    }

    /// Derive the compact label map used as lightweight classifier context.
    ///
    /// Inner nodes map child labels to their subtrees; leaves map to their
    /// summary, or to an empty object when they have none.
    pub fn compact_projection(&self) -> Value {
        fn project(children: &std::collections::BTreeMap<String, TaxonomyNode>) -> Value {
            let mut map = Map::new();
            for (label, node) in children {
                let value = if node.children.is_empty() {
                    match &node.summary {
                        Some(summary) => Value::String(summary.clone()),
                        None => Value::Object(Map::new()),
                    }
                } else {
                    project(&node.children)
                };
                map.insert(label.clone(), value);
            }
            Value::Object(map)
        }

        project(&self.domains)
    }
}
