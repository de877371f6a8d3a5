//! Formatting normalization: a pure function from note to note.

use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use loam_core::note::{PROP_CREATED, PROP_ID, PROP_UPDATED};
use loam_core::Note;

/// Cheap rule-based format check. Returns the list of violated rules,
/// empty when the note is well formatted.
pub fn format_issues(note: &Note) -> Vec<&'static str> {
    let mut issues = Vec::new();
    if !note.has_properties_block {
        issues.push("missing properties block");
    }
    if note.id.is_none() {
        issues.push("missing id");
    }
    if note.created.is_none() {
        issues.push("missing created timestamp");
    }
    if note.title.is_none() {
        issues.push("missing title");
    }
    if !note.raw.is_empty() && !note.raw.ends_with('\n') {
        issues.push("missing trailing newline");
    }
    issues
}

/// Normalize a note's formatting. Rules, applied in order: ensure a
/// properties block exists; ensure an id; ensure `created`; set
/// `updated` to `now`; generate a title when absent.
///
/// Pure in `now`: repeated application with the same instant is a
/// fixed point after the first call.
pub fn normalize(note: &Note, now: DateTime<Utc>) -> Note {
    let mut out = note.clone();

    out.has_properties_block = true;

    if out.id.is_none() {
        let id = Uuid::new_v4().to_string();
        out.set_property(PROP_ID, id.clone());
        out.id = Some(id);
    } else if out.property(PROP_ID).is_none() {
        let id = out.id.clone().expect("checked above");
        out.set_property(PROP_ID, id);
    }

    if out.created.is_none() {
        out.set_property(PROP_CREATED, crate::timestamps::format_org_timestamp(now));
        out.created = Some(now);
    }

    out.set_property(PROP_UPDATED, crate::timestamps::format_org_timestamp(now));
    out.updated = Some(now);

    if out.title.is_none() {
        out.title = Some(title_from_path(&out.path));
    }

    out
}

/// Derive a human-readable title from the file name.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    let title = stem.replace(['_', '-'], " ").trim().to_string();
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_note;
    use std::path::PathBuf;

    #[test]
    fn normalize_fills_missing_pieces() {
        let note =
            parse_note(&PathBuf::from("morning_pages.org"), ":PROPERTIES:\n:END:\nBody.\n")
                .unwrap();
        let now = Utc::now();
        let fixed = normalize(&note, now);

        assert!(fixed.id.is_some());
        assert_eq!(fixed.created, Some(now));
        assert_eq!(fixed.updated, Some(now));
        assert_eq!(fixed.title.as_deref(), Some("morning pages"));
        assert!(fixed.property("ID").is_some());
        assert!(fixed.property("CREATED").is_some());
        assert!(fixed.property("UPDATED").is_some());
    }

    #[test]
    fn normalize_is_idempotent_for_a_fixed_instant() {
        let note = parse_note(&PathBuf::from("t.org"), "* Title\nBody.\n").unwrap();
        let now = Utc::now();
        let once = normalize(&note, now);
        let twice = normalize(&once, now);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_keeps_existing_id_and_created() {
        let raw = ":PROPERTIES:\n:ID: keep-me\n:CREATED: [2024-01-15 Mon 10:30]\n:END:\n* T\n";
        let note = parse_note(&PathBuf::from("t.org"), raw).unwrap();
        let fixed = normalize(&note, Utc::now());
        assert_eq!(fixed.id.as_deref(), Some("keep-me"));
        assert_eq!(fixed.property("CREATED"), Some("[2024-01-15 Mon 10:30]"));
    }

    #[test]
    fn format_issues_flags_each_missing_piece() {
        let note = parse_note(&PathBuf::from("t.org"), "* Title\nBody.\n").unwrap();
        let issues = format_issues(&note);
        assert!(issues.contains(&"missing properties block"));
        assert!(issues.contains(&"missing id"));
        assert!(issues.contains(&"missing created timestamp"));
        assert!(!issues.contains(&"missing title"));
    }

    #[test]
    fn well_formed_note_has_no_issues() {
        let raw = ":PROPERTIES:\n:ID: x\n:CREATED: [2024-01-15 Mon 10:30]\n:END:\n* T\nBody.\n";
        let note = parse_note(&PathBuf::from("t.org"), raw).unwrap();
        assert!(format_issues(&note).is_empty());
    }

    #[test]
    fn title_from_path_cleans_separators() {
        assert_eq!(title_from_path(Path::new("daily_notes-2024.org")), "daily notes 2024");
        assert_eq!(title_from_path(Path::new("")), "Untitled");
    }
}
