//! Derived projections: per-note metadata and the aggregate world state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::note::NoteType;

/// Planning-time projection of one note. Built once per scan, immutable
/// within a planning cycle, supplanted by a fresh projection after each
/// action that changes files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    /// The note id, or a `path:`-prefixed sentinel for notes that have no
    /// id yet (they gain one during formatting normalization).
    pub note_id: String,
    pub path: PathBuf,
    pub note_type: NoteType,
    pub has_embedding: bool,
    pub embed_model: Option<String>,
    pub embed_at: Option<DateTime<Utc>>,
    pub format_ok: bool,
    pub has_properties: bool,
    pub has_title: bool,
    pub title: Option<String>,
    pub outbound_links: Vec<String>,
    pub inbound_links: Vec<String>,
    /// Inbound plus outbound, self-links excluded.
    pub link_count: usize,
    pub is_orphan: bool,
    pub tags: Vec<String>,
    pub tags_canonical: bool,
    /// Has id, created and updated.
    pub provenance_ok: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Whole days since the effective last update (updated, else created,
    /// else file mtime).
    pub stale_days: i64,
    pub agents_disabled: bool,
    pub health_score: f64,
}

impl NoteMetadata {
    /// True when the note has a synthetic path-derived id.
    pub fn missing_id(&self) -> bool {
        self.note_id.starts_with("path:")
    }
}

/// Per-note structural analysis produced by the discovery action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub note_id: String,
    pub section_count: usize,
    pub body_len: usize,
    /// 0.0..=1.0 confidence that the note should be split.
    pub split_confidence: f64,
    pub summary: Option<String>,
}

/// Notes whose contents overlap enough to merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub note_ids: Vec<String>,
    /// Minimum pairwise cosine similarity within the group.
    pub similarity: f64,
}

/// Orphan notes that cluster around a shared theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanCluster {
    pub note_ids: Vec<String>,
    pub theme: Option<String>,
}

/// A latent category discovered from tags and link structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicitCategory {
    pub theme: String,
    pub note_ids: Vec<String>,
    /// The designated hub note, when one exists.
    pub hub_id: Option<String>,
}

/// A proposed hub for a category that has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubCandidate {
    pub theme: String,
    pub member_ids: Vec<String>,
}

/// Immutable aggregate world state for one planning cycle.
///
/// State transitions produce a new `CorpusState`; actions never mutate a
/// state they were handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CorpusState {
    pub notes: BTreeMap<String, NoteMetadata>,
    pub total_notes: usize,
    pub notes_with_embeddings: usize,
    pub notes_with_stale_embeddings: usize,
    pub notes_with_format_issues: usize,
    pub orphan_notes: usize,
    pub stale_notes: usize,
    /// Arithmetic mean across notes, `no_agents` notes excluded.
    pub mean_health_score: f64,
    /// Pending proposals in the store at scan time, incremented by
    /// proposal-class actions as they run.
    pub pending_proposals: usize,
    /// Per-file scan warnings (malformed notes, unreadable files).
    pub warnings: Vec<String>,

    // Discovery fields, populated by AnalyzeNoteStructure and carried
    // forward across transitions.
    pub structure_analyses: Vec<StructureAnalysis>,
    pub merge_groups: Vec<MergeGroup>,
    pub orphan_clusters: Vec<OrphanCluster>,
    pub implicit_categories: Vec<ImplicitCategory>,
    pub hub_candidates: Vec<HubCandidate>,
}

impl CorpusState {
    /// Build a state from note projections, computing all aggregates.
    pub fn from_notes(
        notes: BTreeMap<String, NoteMetadata>,
        stale_threshold_days: i64,
        warnings: Vec<String>,
    ) -> Self {
        let total_notes = notes.len();
        let notes_with_embeddings = notes.values().filter(|n| n.has_embedding).count();
        let notes_with_format_issues = notes.values().filter(|n| !n.format_ok).count();
        let orphan_notes = notes.values().filter(|n| n.is_orphan).count();
        let stale_notes = notes
            .values()
            .filter(|n| n.stale_days > stale_threshold_days)
            .count();
        // Embeddings whose recorded age exceeds the freshness window. An
        // absent EMBED_AT is unknown age, not stale.
        let notes_with_stale_embeddings = notes
            .values()
            .filter(|n| n.has_embedding)
            .filter(|n| {
                n.embed_at
                    .map(|at| (Utc::now() - at).num_days() > stale_threshold_days)
                    .unwrap_or(false)
            })
            .count();

        let scored: Vec<f64> = notes
            .values()
            .filter(|n| !n.agents_disabled)
            .map(|n| n.health_score)
            .collect();
        let mean_health_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        Self {
            notes,
            total_notes,
            notes_with_embeddings,
            notes_with_stale_embeddings,
            notes_with_format_issues,
            orphan_notes,
            stale_notes,
            mean_health_score,
            pending_proposals: 0,
            warnings,
            structure_analyses: Vec::new(),
            merge_groups: Vec::new(),
            orphan_clusters: Vec::new(),
            hub_candidates: Vec::new(),
            implicit_categories: Vec::new(),
        }
    }

    /// Orphan share of the corpus as a percentage, 0.0 for an empty one.
    pub fn orphan_percentage(&self) -> f64 {
        if self.total_notes == 0 {
            0.0
        } else {
            self.orphan_notes as f64 * 100.0 / self.total_notes as f64
        }
    }

    /// Notes eligible for automated modification: not `no_agents`.
    pub fn eligible_notes(&self) -> impl Iterator<Item = &NoteMetadata> {
        self.notes.values().filter(|n| !n.agents_disabled)
    }

    /// Copy the discovery fields of a predecessor state into this one.
    /// Used by actions that rescan files but must not lose analysis
    /// results produced earlier in the same cycle.
    pub fn carry_discoveries_from(mut self, prior: &CorpusState) -> Self {
        self.structure_analyses = prior.structure_analyses.clone();
        self.merge_groups = prior.merge_groups.clone();
        self.orphan_clusters = prior.orphan_clusters.clone();
        self.implicit_categories = prior.implicit_categories.clone();
        self.hub_candidates = prior.hub_candidates.clone();
        self.pending_proposals = prior.pending_proposals;
        self
    }
}
