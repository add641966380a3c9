//! Section-aware view of a MOC markdown file
//!
//! A section is a level-2 heading plus the text up to the next level-1 or
//! level-2 heading. Deeper headings stay inside the body. Edits only ever replace or extend a section body; text outside
//! recognized headings is never rewritten.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Fixed sections every MOC is created with, in order
pub const TEMPLATE_SECTIONS: [&str; 5] = [
    "Learning Paths",
    "Core Concepts",
    "Related Topics",
    "Prerequisites",
    "Notes",
];

/// Free-form sections written by the synthesizer, in display order
pub const SYNTHESIS_SECTIONS: [&str; 7] = [
    "Overview",
    "Key Themes",
    "Conceptual Relationships",
    "Learning Progress",
    "Knowledge Gaps",
    "Cross-Domain Connections",
    "Synthesized Insights",
];

/// Section holding links to child MOCs
pub const CHILD_SECTION: &str = "Subtopics";

/// Section holding links to filed notes
pub const NOTES_SECTION: &str = "Notes";

/// A note listed in a MOC's `Notes` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteReference {
    pub title: String,
    /// Wiki link target, vault-relative, usually without `.md`
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_level: Option<String>,
}

impl NoteReference {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            complexity_level: None,
        }
    }

    pub fn with_complexity(mut self, level: impl Into<String>) -> Self {
        self.complexity_level = Some(level.into());
        self
    }

    /// `- [[path|title]]`, followed by ` (complexity)` when known
    pub fn to_line(&self) -> String {
        let mut line = if self.title.is_empty() || self.title == self.path {
            format!("- [[{}]]", self.path)
        } else {
            format!("- [[{}|{}]]", self.path, self.title)
        };
        if let Some(level) = &self.complexity_level {
            line.push_str(&format!(" ({})", level));
        }
        line
    }

    /// Parse a `Notes` line written by [`NoteReference::to_line`] or by hand
    pub fn from_line(line: &str) -> Option<Self> {
        let link = parse_wiki_links(line).into_iter().next()?;
        let after = line
            .find("]]")
            .map(|i| line[i + 2..].trim())
            .unwrap_or_default();
        let complexity_level = after
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Some(Self {
            title: link.alias.unwrap_or_else(|| link.target.clone()),
            path: link.target,
            complexity_level,
        })
    }
}

/// `[[target|alias]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub target: String,
    pub alias: Option<String>,
}

/// Every wiki link in `text`, in order
pub fn parse_wiki_links(text: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        let inner = &after[..end];
        let (target, alias) = match inner.split_once('|') {
            Some((t, a)) => (t.trim(), Some(a.trim().to_string())),
            None => (inner.trim(), None),
        };
        if !target.is_empty() {
            links.push(WikiLink {
                target: target.to_string(),
                alias: alias.filter(|a| !a.is_empty()),
            });
        }
        rest = &after[end + 2..];
    }
    links
}

#[derive(Debug, Clone)]
struct Heading {
    title: String,
    level: HeadingLevel,
    /// Byte offset where the heading line starts
    start: usize,
    /// Byte offset just past the heading line
    body_start: usize,
}

/// A MOC file's text with section-level editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MocDocument {
    text: String,
}

impl MocDocument {
    /// Fresh MOC with the fixed template sections, all empty
    pub fn template(label: &str) -> Self {
        let mut text = format!("# {} MOC\n", label);
        for section in TEMPLATE_SECTIONS {
            text.push_str(&format!("\n## {}\n", section));
        }
        Self { text }
    }

    pub fn parse(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    fn headings(&self) -> Vec<Heading> {
        let options = Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
            | Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH;
        let parser = Parser::new_ext(&self.text, options).into_offset_iter();

        let mut headings = Vec::new();
        let mut current: Option<(HeadingLevel, Range<usize>, String)> = None;

        for (event, range) in parser {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    current = Some((level, range, String::new()));
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, _, title)) = current.as_mut() {
                        title.push_str(&text);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, range, title)) = current.take() {
                        headings.push(Heading {
                            title: title.trim().to_string(),
                            level,
                            start: self.line_start(range.start),
                            body_start: self.line_end(range.end),
                        });
                    }
                }
                _ => {}
            }
        }
        headings
    }

    fn line_start(&self, offset: usize) -> usize {
        self.text[..offset].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Offset just past the newline ending the line that contains `end - 1`
    fn line_end(&self, end: usize) -> usize {
        let from = end.saturating_sub(1);
        match self.text[from..].find('\n') {
            Some(i) => from + i + 1,
            None => self.text.len(),
        }
    }

    /// Byte range of a level-2 section's body
    fn section_range(&self, title: &str) -> Option<Range<usize>> {
        let headings = self.headings();
        let index = headings
            .iter()
            .position(|h| h.level == HeadingLevel::H2 && h.title == title)?;
        let start = headings[index].body_start;
        // Deeper headings belong to the section body.
        let end = headings[index + 1..]
            .iter()
            .find(|next| next.level <= HeadingLevel::H2)
            .map_or(self.text.len(), |next| next.start);
        Some(start..end.max(start))
    }

    /// Titles of all level-2 sections, in document order
    pub fn section_titles(&self) -> Vec<String> {
        self.headings()
            .into_iter()
            .filter(|h| h.level == HeadingLevel::H2)
            .map(|h| h.title)
            .collect()
    }

    pub fn has_section(&self, title: &str) -> bool {
        self.section_range(title).is_some()
    }

    /// Raw body of a section, including surrounding blank lines
    pub fn section_body(&self, title: &str) -> Option<&str> {
        self.section_range(title).map(|r| &self.text[r])
    }

    /// Non-blank lines of a section body, trimmed
    pub fn section_lines(&self, title: &str) -> Vec<String> {
        self.section_body(title)
            .map(|body| {
                body.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace a section's body. Returns false if the section is absent.
    pub fn replace_section_body(&mut self, title: &str, body: &str) -> bool {
        let Some(range) = self.section_range(title) else {
            return false;
        };
        let is_last = range.end >= self.text.len();
        let body = body.trim();

        let replacement = match (body.is_empty(), is_last) {
            (true, _) => "\n".to_string(),
            (false, true) => format!("\n{}\n", body),
            (false, false) => format!("\n{}\n\n", body),
        };
        self.text.replace_range(range, &replacement);
        true
    }

    /// Append `line` to a section unless an identical line is already there.
    ///
    /// Returns true if the document changed. An absent section is created
    /// at the end of the document.
    pub fn append_line(&mut self, title: &str, line: &str) -> bool {
        let line = line.trim();
        if !self.has_section(title) {
            self.push_section(title, line);
            return true;
        }
        if self.section_lines(title).iter().any(|l| l == line) {
            return false;
        }

        let existing = self.section_body(title).unwrap_or_default().trim().to_string();
        let body = if existing.is_empty() {
            line.to_string()
        } else {
            format!("{}\n{}", existing, line)
        };
        self.replace_section_body(title, &body)
    }

    /// Insert a new section immediately before `anchor`'s heading, or at the
    /// end of the document when `anchor` is absent.
    pub fn insert_section_before(&mut self, anchor: &str, title: &str, body: &str) {
        let position = self
            .headings()
            .into_iter()
            .find(|h| h.level == HeadingLevel::H2 && h.title == anchor)
            .map(|h| h.start);

        match position {
            Some(at) => {
                let body = body.trim();
                let block = if body.is_empty() {
                    format!("## {}\n\n", title)
                } else {
                    format!("## {}\n\n{}\n\n", title, body)
                };
                self.text.insert_str(at, &block);
            }
            None => self.push_section(title, body),
        }
    }

    /// Append a new section at the end of the document
    pub fn push_section(&mut self, title: &str, body: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        let body = body.trim();
        if body.is_empty() {
            self.text.push_str(&format!("\n## {}\n", title));
        } else {
            self.text.push_str(&format!("\n## {}\n\n{}\n", title, body));
        }
    }

    /// Link a child MOC from the child-linking section, idempotently
    pub fn link_child(&mut self, child_label: &str) -> bool {
        let line = format!("- [[{}]]", super::layout::link_target(child_label));
        self.append_line(CHILD_SECTION, &line)
    }

    /// Notes listed in the `Notes` section
    pub fn note_references(&self) -> Vec<NoteReference> {
        self.section_lines(NOTES_SECTION)
            .iter()
            .filter_map(|l| NoteReference::from_line(l))
            .collect()
    }

    /// Add a note to the `Notes` section unless its target is already listed
    pub fn link_note(&mut self, note: &NoteReference) -> bool {
        if self.note_references().iter().any(|n| n.path == note.path) {
            return false;
        }
        self.append_line(NOTES_SECTION, &note.to_line())
    }
}

/// Escape every heading in `text` so it renders as a plain line.
///
/// Text spliced into a section body must not open sections of its own.
pub fn escape_headings(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let markers: Vec<usize> = Parser::new_ext(text, options)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::Heading { .. }) => heading_marker(text, range),
            _ => None,
        })
        .collect();

    let mut out = text.to_string();
    for at in markers.into_iter().rev() {
        out.insert(at, '\\');
    }
    out
}

/// Offset of the first `#` of an ATX heading, or of the underline of a
/// setext heading
fn heading_marker(text: &str, range: Range<usize>) -> Option<usize> {
    let block = text[range.clone()].trim_end_matches(['\r', '\n']);
    if !block.contains('\n') {
        if let Some(i) = block.find('#') {
            return Some(range.start + i);
        }
    }

    let mut offset = range.start;
    for (n, line) in text[range.start..].split_inclusive('\n').enumerate() {
        let body = line.trim_start_matches([' ', '\t', '>']);
        let marks = body.trim_end();
        let underline = !marks.is_empty()
            && (marks.bytes().all(|b| b == b'=') || marks.bytes().all(|b| b == b'-'));
        if n > 0 && underline {
            return Some(offset + line.len() - body.len());
        }
        offset += line.len();
    }
    None
}
