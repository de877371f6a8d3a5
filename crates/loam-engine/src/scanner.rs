//! Corpus scanning: files on disk to an immutable [`CorpusState`].
//!
//! Reading and parsing fan out over the blocking pool, bounded by the
//! CPU count; the results are folded into one state under a single
//! owner. Per-note failures become warnings, never scan failures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use loam_config::LoamConfig;
use loam_core::health::{score_note, ScoreParams};
use loam_core::note::{PROP_EMBEDDING, PROP_EMBED_AT, PROP_EMBED_MODEL};
use loam_core::{CorpusState, ImplicitCategory, LoamError, Note, NoteMetadata, Result};
use loam_parser::{format_issues, parse_org_timestamp, read_note};

/// Tags that classify rather than categorize; they never form an
/// implicit category of their own.
const STRUCTURAL_TAGS: [&str; 3] = ["source", "literature", "no_agents"];

pub struct Scanner {
    config: Arc<LoamConfig>,
}

struct ParsedNote {
    meta: NoteMetadata,
}

impl Scanner {
    pub fn new(config: Arc<LoamConfig>) -> Self {
        Self { config }
    }

    /// Walk the corpus root and build a fresh world state.
    pub async fn scan(&self) -> Result<CorpusState> {
        let paths = self.collect_paths()?;
        debug!("scanning {} note files", paths.len());

        let parallelism = num_cpus::get().max(1);
        let results: Vec<std::result::Result<ParsedNote, String>> = stream::iter(paths)
            .map(|path| {
                let config = Arc::clone(&self.config);
                async move {
                    tokio::task::spawn_blocking(move || read_and_project(&path, &config))
                        .await
                        .unwrap_or_else(|e| Err(format!("scan worker failed: {e}")))
                }
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;

        let mut warnings = Vec::new();
        let mut notes: BTreeMap<String, NoteMetadata> = BTreeMap::new();
        for result in results {
            match result {
                Ok(parsed) => {
                    let id = parsed.meta.note_id.clone();
                    if let Some(existing) = notes.get(&id) {
                        warnings.push(format!(
                            "duplicate id {id}: {:?} shadows {:?}",
                            existing.path, parsed.meta.path
                        ));
                        continue;
                    }
                    notes.insert(id, parsed.meta);
                }
                Err(warning) => {
                    warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }

        link_notes(&mut notes);
        self.score_notes(&mut notes);

        let categories = implicit_categories(&notes, self.config.min_category_size);
        let mut state =
            CorpusState::from_notes(notes, self.config.stale_threshold_days, warnings);
        state.implicit_categories = categories;
        Ok(state)
    }

    fn collect_paths(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/**/*.{}",
            self.config.notes_root.display(),
            self.config.note_extension
        );
        let walker = glob::glob(&pattern).map_err(|e| LoamError::MalformedFile {
            path: self.config.notes_root.clone(),
            detail: format!("bad scan pattern: {e}"),
        })?;

        let internal = &self.config.internal_dir;
        let mut paths: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok())
            .filter(|path| {
                !path
                    .components()
                    .any(|c| c.as_os_str().to_str() == Some(internal.as_str()))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn score_notes(&self, notes: &mut BTreeMap<String, NoteMetadata>) {
        let params = ScoreParams {
            stale_threshold_days: self.config.stale_threshold_days,
            target_links: self.config.target_links,
            embed_model: self.config.embed_model.clone(),
            embeddings_max_age_days: self.config.embeddings_max_age_days,
        };
        for meta in notes.values_mut() {
            meta.health_score = score_note(&self.config.health_weights, meta, &params);
        }
    }
}

/// Parse one file into its projection. Errors come back as the warning
/// string the scan records.
fn read_and_project(path: &Path, config: &LoamConfig) -> std::result::Result<ParsedNote, String> {
    let note = read_note(path).map_err(|e| e.to_string())?;
    let mtime = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    Ok(ParsedNote {
        meta: project(&note, mtime, config),
    })
}

/// Derive the planning-time projection of one parsed note. Link fields
/// are filled in later, once all notes are known.
fn project(note: &Note, mtime: Option<DateTime<Utc>>, config: &LoamConfig) -> NoteMetadata {
    let note_id = note
        .id
        .clone()
        .unwrap_or_else(|| format!("path:{}", note.path.display()));

    let has_embedding = note
        .property(PROP_EMBEDDING)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
        || note.body.contains(&format!(":{PROP_EMBEDDING}:"));
    let embed_model = note.property(PROP_EMBED_MODEL).map(str::to_string);
    let embed_at = note.property(PROP_EMBED_AT).and_then(parse_org_timestamp);

    let effective_update = note.updated.or(note.created).or(mtime);
    let stale_days = effective_update
        .map(|at| (Utc::now() - at).num_days().max(0))
        .unwrap_or(0);

    let outbound_links: Vec<String> = note
        .outbound_links
        .iter()
        .filter(|target| Some(target.as_str()) != note.id.as_deref())
        .cloned()
        .collect();

    let tags_canonical = note
        .tags
        .iter()
        .all(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));

    NoteMetadata {
        note_id,
        path: note.path.clone(),
        note_type: note.note_type(),
        has_embedding,
        embed_model,
        embed_at,
        format_ok: format_issues(note).is_empty(),
        has_properties: note.has_properties_block,
        has_title: note.title.is_some(),
        title: note.title.clone(),
        outbound_links,
        inbound_links: Vec::new(),
        link_count: 0,
        is_orphan: false,
        tags: note.tags.clone(),
        tags_canonical,
        provenance_ok: note.id.is_some() && note.created.is_some() && note.updated.is_some(),
        created_at: note.created,
        updated_at: note.updated,
        stale_days,
        agents_disabled: note.agents_disabled(),
        health_score: 0.0,
    }
}

/// Invert outbound links into inbound lists, then recompute link counts
/// and the orphan predicate.
fn link_notes(notes: &mut BTreeMap<String, NoteMetadata>) {
    let mut inbound: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (id, meta) in notes.iter() {
        for target in &meta.outbound_links {
            if target == id || !notes.contains_key(target) {
                continue;
            }
            let entry = inbound.entry(target.clone()).or_default();
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }
    for (id, meta) in notes.iter_mut() {
        meta.inbound_links = inbound.remove(id).unwrap_or_default();
        meta.link_count = meta.outbound_links.len() + meta.inbound_links.len();
        meta.is_orphan = meta.link_count == 0;
    }
}

/// Group notes by shared tag into implicit categories. A category's hub
/// is a member that at least half of the other members link to.
fn implicit_categories(
    notes: &BTreeMap<String, NoteMetadata>,
    min_category_size: usize,
) -> Vec<ImplicitCategory> {
    let mut by_tag: BTreeMap<&str, Vec<&NoteMetadata>> = BTreeMap::new();
    for meta in notes.values() {
        for tag in &meta.tags {
            if STRUCTURAL_TAGS.contains(&tag.as_str()) {
                continue;
            }
            by_tag.entry(tag.as_str()).or_default().push(meta);
        }
    }

    by_tag
        .into_iter()
        .filter(|(_, members)| members.len() >= min_category_size.max(1))
        .map(|(tag, members)| {
            let member_ids: Vec<String> =
                members.iter().map(|m| m.note_id.clone()).collect();
            let needed = members.len().saturating_sub(1).div_ceil(2);
            let hub_id = members
                .iter()
                .find(|candidate| {
                    let inbound_from_members = candidate
                        .inbound_links
                        .iter()
                        .filter(|src| member_ids.contains(src))
                        .count();
                    inbound_from_members >= needed && needed > 0
                })
                .map(|m| m.note_id.clone());
            ImplicitCategory {
                theme: tag.to_string(),
                note_ids: member_ids,
                hub_id,
            }
        })
        .collect()
}
