//! Map-of-Content file tree
//!
//! One markdown file per taxonomy node, laid out in folders that mirror the
//! taxonomy, each parent linking its children.

mod document;
mod layout;
mod sync;

pub use document::{
    escape_headings, parse_wiki_links, MocDocument, NoteReference, WikiLink, CHILD_SECTION,
    NOTES_SECTION, SYNTHESIS_SECTIONS, TEMPLATE_SECTIONS,
};
pub use layout::{file_name, label_from_file_name, link_target, MocLayout};
pub use sync::MocTree;
