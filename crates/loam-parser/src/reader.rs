//! Parsing a note file into a [`Note`].

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use loam_core::note::{PROP_CREATED, PROP_ID, PROP_TAGS, PROP_UPDATED};
use loam_core::{LoamError, Note, Result};

use crate::timestamps::parse_org_timestamp;

static PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([A-Za-z0-9_+@-]+):(?:[ \t]+(.*))?$").expect("property regex"));

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[id:([^\]\[]+?)\](?:\[([^\]]*)\])?\]").expect("link regex"));

/// Read and parse one note file.
pub fn read_note(path: &Path) -> Result<Note> {
    let bytes = std::fs::read(path).map_err(|e| LoamError::io(path, e))?;
    let raw = String::from_utf8(bytes).map_err(|_| LoamError::MalformedFile {
        path: path.to_path_buf(),
        detail: "not valid UTF-8 text".to_string(),
    })?;
    parse_note(path, &raw)
}

/// Parse note content already in memory.
///
/// A file is a note when it carries an initial properties block or at
/// least one `* ` title heading; anything else is `MalformedFile`.
/// Missing properties are absences in the projection, not failures.
pub fn parse_note(path: &Path, raw: &str) -> Result<Note> {
    let mut note = Note::empty(path);
    note.raw = raw.to_string();

    let mut rest = raw;
    if first_line(raw) == Some(":PROPERTIES:") {
        let (properties, block_end) = parse_properties_block(path, raw)?;
        note.has_properties_block = true;
        note.properties = properties;
        rest = &raw[block_end..];
    }

    note.id = note
        .property(PROP_ID)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    note.created = note.property(PROP_CREATED).and_then(parse_org_timestamp);
    note.updated = note.property(PROP_UPDATED).and_then(parse_org_timestamp);
    if let Some(raw_tags) = note.property(PROP_TAGS) {
        note.tags = parse_tags(raw_tags);
    }

    match find_title(rest) {
        Some((start, end, text)) => {
            note.preamble = rest[..start].to_string();
            note.title = Some(text);
            note.body = rest[end..].to_string();
        }
        None => {
            note.body = rest.to_string();
        }
    }

    if !note.has_properties_block && note.title.is_none() {
        return Err(LoamError::MalformedFile {
            path: path.to_path_buf(),
            detail: "not a note: no properties block or title heading".to_string(),
        });
    }

    note.outbound_links = extract_links(rest);
    Ok(note)
}

/// Every `id:` token inside `[[...]]` brackets, in order of appearance,
/// duplicates removed.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in LINK_RE.captures_iter(text) {
        let id = caps[1].to_string();
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

fn first_line(raw: &str) -> Option<&str> {
    raw.split_inclusive('\n')
        .next()
        .map(|l| l.strip_suffix('\n').unwrap_or(l))
}

/// Parse the block, returning the pairs and the byte offset just past
/// the `:END:` line.
fn parse_properties_block(path: &Path, raw: &str) -> Result<(Vec<(String, String)>, usize)> {
    let mut properties = Vec::new();
    let mut lines = raw.split_inclusive('\n');
    let opener = lines.next().expect("caller checked the first line");
    let mut pos = opener.len();

    for line in lines {
        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        if trimmed == ":END:" {
            return Ok((properties, pos + line.len()));
        }
        let caps = PROPERTY_RE.captures(trimmed).ok_or_else(|| LoamError::MalformedFile {
            path: path.to_path_buf(),
            detail: format!("invalid property line: {trimmed:?}"),
        })?;
        let value = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
        properties.push((caps[1].to_string(), value));
        pos += line.len();
    }

    Err(LoamError::MalformedFile {
        path: path.to_path_buf(),
        detail: "unterminated properties block".to_string(),
    })
}

/// Locate the first single-asterisk heading. Returns (start, end, text)
/// where `start..end` spans the whole title line including its newline.
fn find_title(rest: &str) -> Option<(usize, usize, String)> {
    let mut pos = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        if let Some(text) = trimmed.strip_prefix("* ") {
            return Some((pos, pos + line.len(), text.to_string()));
        }
        pos += line.len();
    }
    None
}

/// Tags are written either org-style (`:a:b:`) or whitespace separated.
fn parse_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.contains(':') {
        raw.split(':')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        raw.split_whitespace().map(str::to_string).collect()
    }
}
