//! Temporary garden fixtures.

use std::fmt::Write as _;
use std::path::Path;

use tempfile::TempDir;

/// Create a temporary garden populated with the provided files.
///
/// Each entry is `(relative_path, file_contents)`. Directories are
/// created automatically. The returned [`TempDir`] cleans up the garden
/// when dropped.
pub fn create_garden_with_files(files: &[(&str, &str)]) -> std::io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    write_files(temp_dir.path(), files)?;
    Ok(temp_dir)
}

/// Write fixture files under an existing root.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
    for (relative_path, contents) in files {
        let file_path = root.join(relative_path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, contents)?;
    }
    Ok(())
}

/// Render a canonical well-formed note.
///
/// `links` are appended to the body as `[[id:...]]` references.
pub fn note_file(id: &str, title: &str, tags: &[&str], body: &str, links: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(":PROPERTIES:\n");
    let _ = writeln!(out, ":ID: {id}");
    let _ = writeln!(out, ":CREATED: [2024-01-15 Mon 10:30]");
    let _ = writeln!(out, ":UPDATED: [2024-06-01 Sat 09:00]");
    if !tags.is_empty() {
        let _ = writeln!(out, ":TAGS: :{}:", tags.join(":"));
    }
    out.push_str(":END:\n");
    let _ = writeln!(out, "* {title}");
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    for link in links {
        let _ = writeln!(out, "See [[id:{link}]].");
    }
    out
}

/// Like [`note_file`] but carrying embedding properties with a current
/// `EMBED_AT`, so the embedding reads as fresh. `links` are appended to
/// the body as `[[id:...]]` references.
pub fn note_file_with_embedding(
    id: &str,
    title: &str,
    vector: &[f32],
    model: &str,
    body: &str,
    links: &[&str],
) -> String {
    let rendered: Vec<String> = vector.iter().map(|v| format!("{v}")).collect();
    let now = chrono::Utc::now().format("[%Y-%m-%d %a %H:%M]");
    let mut out = String::new();
    out.push_str(":PROPERTIES:\n");
    let _ = writeln!(out, ":ID: {id}");
    let _ = writeln!(out, ":CREATED: [2024-01-15 Mon 10:30]");
    let _ = writeln!(out, ":UPDATED: {now}");
    let _ = writeln!(out, ":EMBEDDING: [{}]", rendered.join(", "));
    let _ = writeln!(out, ":EMBED_MODEL: {model}");
    let _ = writeln!(out, ":EMBED_AT: {now}");
    out.push_str(":END:\n");
    let _ = writeln!(out, "* {title}");
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    for link in links {
        let _ = writeln!(out, "See [[id:{link}]].");
    }
    out
}
