//! Serializing a [`Note`] back to bytes and writing it safely.

use std::io::Write as _;
use std::path::Path;

use loam_core::note::{PROP_CREATED, PROP_ID, PROP_TAGS, PROP_UPDATED};
use loam_core::{LoamError, Note, Result};

/// Keys emitted ahead of the rest, in this order.
const PRIORITY_KEYS: [&str; 4] = [PROP_ID, PROP_CREATED, PROP_UPDATED, PROP_TAGS];

/// Render a note to its file form.
///
/// Properties come out with `ID`, `CREATED`, `UPDATED`, `TAGS` first,
/// then the remaining keys in their original order. The output always
/// ends in a newline.
pub fn serialize(note: &Note) -> String {
    let mut out = String::new();

    if note.has_properties_block {
        out.push_str(":PROPERTIES:\n");
        for priority in PRIORITY_KEYS {
            if let Some((key, value)) = note
                .properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(priority))
            {
                push_property(&mut out, key, value);
            }
        }
        for (key, value) in &note.properties {
            if PRIORITY_KEYS.iter().any(|p| key.eq_ignore_ascii_case(p)) {
                continue;
            }
            push_property(&mut out, key, value);
        }
        out.push_str(":END:\n");
    }

    out.push_str(&note.preamble);
    if let Some(title) = &note.title {
        out.push_str("* ");
        out.push_str(title);
        out.push('\n');
    }
    out.push_str(&note.body);

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn push_property(out: &mut String, key: &str, value: &str) {
    out.push(':');
    out.push_str(key);
    out.push(':');
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push('\n');
}

/// Write a note to its path via temp-file-and-rename. The caller is
/// responsible for taking a backup first; this function never touches
/// the original until the replacement is fully on disk.
pub fn write_note(note: &Note) -> Result<()> {
    let content = serialize(note);
    let parent = note.path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| LoamError::io(parent, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| LoamError::io(&note.path, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| LoamError::io(&note.path, e))?;
    tmp.flush().map_err(|e| LoamError::io(&note.path, e))?;
    tmp.persist(&note.path)
        .map_err(|e| LoamError::io(&note.path, e.error))?;
    Ok(())
}
