//! The physical note unit and its typed view.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Property keys with dedicated handling. Stored keys keep their original
/// casing; lookups are case-insensitive.
pub const PROP_ID: &str = "ID";
pub const PROP_CREATED: &str = "CREATED";
pub const PROP_UPDATED: &str = "UPDATED";
pub const PROP_TAGS: &str = "TAGS";
pub const PROP_EMBEDDING: &str = "EMBEDDING";
pub const PROP_EMBED_MODEL: &str = "EMBED_MODEL";
pub const PROP_EMBED_AT: &str = "EMBED_AT";

/// Tag that marks a note as a captured source (read-only body).
pub const SOURCE_TAG: &str = "source";
/// Tag that marks a note as a literature note.
pub const LITERATURE_TAG: &str = "literature";
/// Tag that suppresses all automated modification of a note.
pub const NO_AGENTS_TAG: &str = "no_agents";

/// Classification of a note derived from its tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    /// Captured external material. The body is read-only for the engine.
    Source,
    /// Notes about someone else's ideas, in the gardener's words.
    Literature,
    /// The gardener's own ideas. Default when no type tag is present.
    Permanent,
}

impl NoteType {
    pub fn from_tags(tags: &[String]) -> Self {
        if tags.iter().any(|t| t == SOURCE_TAG) {
            NoteType::Source
        } else if tags.iter().any(|t| t == LITERATURE_TAG) {
            NoteType::Literature
        } else {
            NoteType::Permanent
        }
    }
}

/// A parsed note file.
///
/// The reader guarantees that serializing an unmodified note reproduces
/// the input byte-for-byte for well-formed files: `properties` preserves
/// insertion order, `preamble` holds the verbatim region between the
/// properties block and the title line, and `body` holds everything after
/// the title line verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Opaque identifier, unique across the corpus when present.
    pub id: Option<String>,
    pub path: PathBuf,
    /// Text of the first single-asterisk heading.
    pub title: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// All `key -> value` pairs from the properties block, in file order.
    pub properties: Vec<(String, String)>,
    /// Whether the file carried a properties block at all. A block may be
    /// present yet empty, so this is not derivable from `properties`.
    pub has_properties_block: bool,
    /// Verbatim text between the properties block and the title line.
    pub preamble: String,
    /// Verbatim text after the title line.
    pub body: String,
    /// Ids referenced by `[[id:...]]` link tokens, in order of appearance.
    pub outbound_links: Vec<String>,
    /// Original file content, kept for diffing.
    pub raw: String,
}

impl Note {
    /// A blank note at the given path, used when materializing new files.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            id: None,
            path: path.into(),
            title: None,
            created: None,
            updated: None,
            tags: Vec::new(),
            properties: Vec::new(),
            has_properties_block: false,
            preamble: String::new(),
            body: String::new(),
            outbound_links: Vec::new(),
            raw: String::new(),
        }
    }

    pub fn note_type(&self) -> NoteType {
        NoteType::from_tags(&self.tags)
    }

    /// True when the `no_agents` tag suppresses automated modification.
    pub fn agents_disabled(&self) -> bool {
        self.tags.iter().any(|t| t == NO_AGENTS_TAG)
    }

    /// Case-insensitive property lookup.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace a property value in place, or append it when absent.
    pub fn set_property(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self
            .properties
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            slot.1 = value;
        } else {
            self.properties.push((key.to_string(), value));
        }
        self.has_properties_block = true;
    }

    /// Content fingerprint over the body, used for embedding freshness.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// First `limit` characters of the body on a single line, for
    /// previews in proposals and the embedding cache.
    pub fn content_preview(&self, limit: usize) -> String {
        let flat: String = self
            .body
            .chars()
            .map(|c| if c == '\n' { ' ' } else { c })
            .take(limit)
            .collect();
        flat.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_type_from_tags() {
        let tags = |ts: &[&str]| ts.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(NoteType::from_tags(&tags(&["source"])), NoteType::Source);
        assert_eq!(
            NoteType::from_tags(&tags(&["literature", "rust"])),
            NoteType::Literature
        );
        assert_eq!(NoteType::from_tags(&tags(&["rust"])), NoteType::Permanent);
        assert_eq!(NoteType::from_tags(&[]), NoteType::Permanent);
    }

    #[test]
    fn property_lookup_is_case_insensitive() {
        let mut note = Note::empty("a.org");
        note.set_property("ID", "abc");
        assert_eq!(note.property("id"), Some("abc"));
        assert_eq!(note.property("Id"), Some("abc"));
        assert_eq!(note.property("missing"), None);
    }

    #[test]
    fn set_property_replaces_in_place() {
        let mut note = Note::empty("a.org");
        note.set_property("ID", "one");
        note.set_property("CUSTOM", "x");
        note.set_property("id", "two");
        assert_eq!(note.properties.len(), 2);
        assert_eq!(note.properties[0], ("ID".to_string(), "two".to_string()));
        assert!(note.has_properties_block);
    }

    #[test]
    fn content_hash_tracks_body_only() {
        let mut a = Note::empty("a.org");
        let mut b = Note::empty("b.org");
        a.body = "same".into();
        b.body = "same".into();
        b.title = Some("different".into());
        assert_eq!(a.content_hash(), b.content_hash());
        b.body = "changed".into();
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_preview_flattens_newlines() {
        let mut note = Note::empty("a.org");
        note.body = "first line\nsecond line\n".into();
        assert_eq!(note.content_preview(30), "first line second line");
        assert_eq!(note.content_preview(5), "first");
    }

    #[test]
    fn agents_disabled_only_on_exact_tag() {
        let mut note = Note::empty("a.org");
        note.tags = vec!["no_agents_yet".into()];
        assert!(!note.agents_disabled());
        note.tags = vec!["no_agents".into()];
        assert!(note.agents_disabled());
    }
}
