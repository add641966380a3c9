//! Node content synthesis
//!
//! Reads the notes filed under a MOC, asks a `TextGenerator` for a
//! structured synthesis and rewrites only the free-form sections. The
//! template sections (`Learning Paths`, `Core Concepts`, `Related Topics`,
//! `Prerequisites`, `Notes`) are never edited here.

use super::generator::TextGenerator;
use crate::moc::{escape_headings, label_from_file_name, MocDocument, NoteReference, SYNTHESIS_SECTIONS};
use crate::storage::{StorageResult, VaultStore};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Free-form sections are inserted ahead of this template section.
const INSERT_ANCHOR: &str = "Learning Paths";

/// What a synthesis run did to a MOC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Generator output was applied
    Synthesized { notes: usize },
    /// Generator failed or answered badly; a deterministic summary was written
    Fallback { notes: usize, reason: String },
    /// The MOC lists no resolvable notes; nothing was written
    NoNotes,
    /// The MOC could not be read although it should exist; nothing was written
    ConsistencyFault { reason: String },
}

impl SynthesisOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Synthesized { .. } | Self::Fallback { .. })
    }
}

/// Section content as returned by the generator: prose or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    Text(String),
    Items(Vec<String>),
}

impl SectionContent {
    fn is_blank(&self) -> bool {
        match self {
            Self::Text(t) => t.trim().is_empty(),
            Self::Items(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    /// Markdown for a section body. Generated headings are escaped.
    fn to_markdown(&self) -> String {
        match self {
            Self::Text(t) => escape_headings(t.trim()),
            Self::Items(items) => items
                .iter()
                .map(|i| i.trim())
                .filter(|i| !i.is_empty())
                .map(|i| format!("- {}", escape_headings(i)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Structured synthesis expected from the generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    #[serde(default)]
    pub overview: Option<SectionContent>,
    #[serde(default)]
    pub key_themes: Option<SectionContent>,
    #[serde(default)]
    pub conceptual_relationships: Option<SectionContent>,
    #[serde(default)]
    pub learning_progress: Option<SectionContent>,
    #[serde(default)]
    pub knowledge_gaps: Option<SectionContent>,
    #[serde(default)]
    pub cross_domain_connections: Option<SectionContent>,
    #[serde(default)]
    pub synthesized_insights: Option<SectionContent>,
}

impl Synthesis {
    /// Parse generator output, tolerating prose or code fences around the
    /// JSON object. A response without an overview is rejected.
    pub fn parse(response: &str) -> Result<Self, String> {
        let start = response.find('{').ok_or("response contains no JSON object")?;
        let end = response.rfind('}').ok_or("response contains no JSON object")?;
        if end < start {
            return Err("response contains no JSON object".to_string());
        }

        let synthesis: Synthesis = serde_json::from_str(&response[start..=end])
            .map_err(|e| format!("malformed synthesis JSON: {}", e))?;

        match &synthesis.overview {
            Some(overview) if !overview.is_blank() => Ok(synthesis),
            _ => Err("synthesis has no overview".to_string()),
        }
    }

    /// Section title paired with its content, in display order
    fn sections(&self) -> [(&'static str, Option<&SectionContent>); 7] {
        [
            (SYNTHESIS_SECTIONS[0], self.overview.as_ref()),
            (SYNTHESIS_SECTIONS[1], self.key_themes.as_ref()),
            (SYNTHESIS_SECTIONS[2], self.conceptual_relationships.as_ref()),
            (SYNTHESIS_SECTIONS[3], self.learning_progress.as_ref()),
            (SYNTHESIS_SECTIONS[4], self.knowledge_gaps.as_ref()),
            (SYNTHESIS_SECTIONS[5], self.cross_domain_connections.as_ref()),
            (SYNTHESIS_SECTIONS[6], self.synthesized_insights.as_ref()),
        ]
    }

    /// Deterministic stand-in used when generation fails
    pub fn fallback(note_count: usize) -> Self {
        Self {
            overview: Some(SectionContent::Text(format!(
                "Knowledge area with {} {}.",
                note_count,
                if note_count == 1 { "note" } else { "notes" }
            ))),
            ..Default::default()
        }
    }

    /// Write every present section into `doc`. Sections the synthesis
    /// leaves out keep their current text.
    pub fn apply(&self, doc: &mut MocDocument) {
        for (title, content) in self.sections() {
            let Some(content) = content.filter(|c| !c.is_blank()) else {
                continue;
            };
            let body = content.to_markdown();
            if !doc.replace_section_body(title, &body) {
                doc.insert_section_before(INSERT_ANCHOR, title, &body);
            }
        }
    }
}

/// A note resolved from the vault for prompting
#[derive(Debug, Clone)]
struct NoteDigest {
    title: String,
    complexity: Option<String>,
    excerpt: String,
}

/// Rewrites the free-form sections of a MOC from its notes
pub struct NodeSynthesizer {
    store: Arc<dyn VaultStore>,
    excerpt_chars: usize,
}

impl NodeSynthesizer {
    pub fn new(store: Arc<dyn VaultStore>) -> Self {
        Self {
            store,
            excerpt_chars: 500,
        }
    }

    /// Characters of each note's body included in the prompt
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    /// Synthesize the MOC at `moc_path`.
    ///
    /// Generation problems never surface as errors; they degrade to
    /// [`SynthesisOutcome::Fallback`]. Only a failed write of the MOC is
    /// returned as an error.
    pub async fn synthesize(
        &self,
        generator: &dyn TextGenerator,
        moc_path: &Path,
    ) -> StorageResult<SynthesisOutcome> {
        let mut doc = match self.store.read_to_string(moc_path) {
            Ok(text) => MocDocument::parse(text),
            Err(e) => {
                error!(moc = %moc_path.display(), error = %e, "consistency fault: MOC expected but unreadable");
                return Ok(SynthesisOutcome::ConsistencyFault {
                    reason: e.to_string(),
                });
            }
        };

        let notes: Vec<NoteDigest> = doc
            .note_references()
            .iter()
            .filter_map(|r| self.resolve(r))
            .collect();
        if notes.is_empty() {
            debug!(moc = %moc_path.display(), "no notes to synthesize");
            return Ok(SynthesisOutcome::NoNotes);
        }

        let label = moc_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(label_from_file_name)
            .unwrap_or("this area");
        let prompt = build_prompt(label, &notes, &doc);

        let outcome = match generator.generate(&prompt).await {
            Ok(response) => match Synthesis::parse(&response) {
                Ok(synthesis) => {
                    synthesis.apply(&mut doc);
                    SynthesisOutcome::Synthesized { notes: notes.len() }
                }
                Err(reason) => {
                    warn!(moc = %moc_path.display(), %reason, "unusable synthesis, writing fallback");
                    Synthesis::fallback(notes.len()).apply(&mut doc);
                    SynthesisOutcome::Fallback {
                        notes: notes.len(),
                        reason,
                    }
                }
            },
            Err(e) => {
                warn!(moc = %moc_path.display(), error = %e, "generation failed, writing fallback");
                Synthesis::fallback(notes.len()).apply(&mut doc);
                SynthesisOutcome::Fallback {
                    notes: notes.len(),
                    reason: e.to_string(),
                }
            }
        };

        self.store.write(moc_path, doc.as_str())?;
        info!(moc = %moc_path.display(), notes = notes.len(), ?outcome, "synthesized MOC");
        Ok(outcome)
    }

    /// Load a referenced note. Unresolvable references are skipped.
    fn resolve(&self, reference: &NoteReference) -> Option<NoteDigest> {
        let candidates: Vec<PathBuf> = if reference.path.ends_with(".md") {
            vec![PathBuf::from(&reference.path)]
        } else {
            vec![
                PathBuf::from(format!("{}.md", reference.path)),
                PathBuf::from(&reference.path),
            ]
        };

        let content = candidates
            .iter()
            .find_map(|p| self.store.read_to_string(p).ok());
        let Some(content) = content else {
            warn!(note = %reference.path, "referenced note not found");
            return None;
        };

        let (frontmatter, body) = split_frontmatter(&content);
        let complexity = reference
            .complexity_level
            .clone()
            .or_else(|| frontmatter.as_ref().and_then(complexity_from_frontmatter));

        Some(NoteDigest {
            title: reference.title.clone(),
            complexity,
            excerpt: excerpt(body, self.excerpt_chars),
        })
    }
}

/// Split leading `---` YAML frontmatter from the body.
fn split_frontmatter(content: &str) -> (Option<serde_yaml::Value>, &str) {
    let trimmed = content.trim_start();
    let Some(after_first) = trimmed.strip_prefix("---") else {
        return (None, content);
    };
    let Some(end) = after_first.find("\n---") else {
        return (None, content);
    };

    let yaml = &after_first[..end];
    let rest = &after_first[end + 4..];
    let body = rest.split_once('\n').map_or("", |(_, b)| b);

    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value) => (Some(value), body),
        Err(e) => {
            debug!(error = %e, "ignoring unparseable frontmatter");
            (None, body)
        }
    }
}

fn complexity_from_frontmatter(frontmatter: &serde_yaml::Value) -> Option<String> {
    ["complexity", "complexity_level", "complexityLevel"]
        .iter()
        .find_map(|key| frontmatter.get(*key))
        .and_then(|v| match v {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// First `limit` characters of `body`, whitespace collapsed
fn excerpt(body: &str, limit: usize) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= limit {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(limit).collect();
    cut.push('…');
    cut
}

fn build_prompt(label: &str, notes: &[NoteDigest], doc: &MocDocument) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You maintain the Map of Content \"{}\", which currently files {} notes.",
        label,
        notes.len()
    );
    prompt.push_str(
        "Update its synthesis incrementally: keep what is still accurate in the existing \
         sections and integrate what the notes add.\n\nNOTES:\n",
    );
    for (i, note) in notes.iter().enumerate() {
        let _ = write!(prompt, "{}. {}", i + 1, note.title);
        if let Some(level) = &note.complexity {
            let _ = write!(prompt, " (complexity: {})", level);
        }
        let _ = writeln!(prompt, "\n   {}", note.excerpt);
    }

    prompt.push_str("\nEXISTING SECTIONS:\n");
    let mut any = false;
    for title in SYNTHESIS_SECTIONS {
        if let Some(body) = doc.section_body(title).map(str::trim).filter(|b| !b.is_empty()) {
            let _ = writeln!(prompt, "## {}\n{}\n", title, body);
            any = true;
        }
    }
    if !any {
        prompt.push_str("(none yet)\n");
    }

    prompt.push_str(
        "\nRespond with a single JSON object with these fields:\n\
         - overview: two or three sentences describing the area\n\
         - keyThemes: list of recurring themes\n\
         - conceptualRelationships: how the notes' concepts relate to each other\n\
         - learningProgress: a progression from foundational to advanced notes\n\
         - knowledgeGaps: list of topics the notes do not yet cover\n\
         - crossDomainConnections: list of links to other fields\n\
         - synthesizedInsights: list of insights that only emerge from reading the notes together\n\
         Respond with JSON only.\n",
    );
    prompt
}
