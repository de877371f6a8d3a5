//! Per-note and corpus health scoring.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::metadata::NoteMetadata;
use crate::note::NoteType;

/// Weight of each health component. Defaults sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub embedding: f64,
    pub embedding_fresh: f64,
    pub format: f64,
    pub properties: f64,
    pub title: f64,
    pub provenance: f64,
    pub canonical_tags: f64,
    pub freshness: f64,
    pub links: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            embedding: 20.0,
            embedding_fresh: 10.0,
            format: 15.0,
            properties: 10.0,
            title: 10.0,
            provenance: 10.0,
            canonical_tags: 5.0,
            freshness: 10.0,
            links: 10.0,
        }
    }
}

impl HealthWeights {
    /// The highest score a note can reach.
    pub fn max_total(&self) -> f64 {
        self.embedding
            + self.embedding_fresh
            + self.format
            + self.properties
            + self.title
            + self.provenance
            + self.canonical_tags
            + self.freshness
            + self.links
    }
}

/// Scoring inputs that come from configuration rather than the note.
#[derive(Debug, Clone)]
pub struct ScoreParams {
    pub stale_threshold_days: i64,
    pub target_links: usize,
    pub embed_model: String,
    pub embeddings_max_age_days: i64,
}

/// Source notes cannot be restructured, so they are capped below the
/// maximum a permanent note can reach.
pub const SOURCE_CAP_PENALTY: f64 = 10.0;

/// Weighted sum over the note's health components.
///
/// An embedding with no recorded model or timestamp is treated as being
/// of unknown provenance, not as stale; the freshness component only
/// penalizes a recorded mismatch or a recorded age beyond the window.
pub fn score_note(weights: &HealthWeights, meta: &NoteMetadata, params: &ScoreParams) -> f64 {
    let mut score = 0.0;

    if meta.has_embedding {
        score += weights.embedding;
        if embedding_fresh(meta, params) {
            score += weights.embedding_fresh;
        }
    }
    if meta.format_ok {
        score += weights.format;
    }
    if meta.has_properties {
        score += weights.properties;
    }
    if meta.has_title {
        score += weights.title;
    }
    if meta.provenance_ok {
        score += weights.provenance;
    }
    if meta.tags_canonical {
        score += weights.canonical_tags;
    }

    let threshold = params.stale_threshold_days.max(1) as f64;
    let staleness = (meta.stale_days.max(0) as f64 / threshold).min(1.0);
    score += weights.freshness * (1.0 - staleness);

    let target = params.target_links.max(1) as f64;
    score += weights.links * (meta.link_count as f64 / target).min(1.0);

    if meta.note_type == NoteType::Source {
        score = score.min(weights.max_total() - SOURCE_CAP_PENALTY);
    }
    score
}

fn embedding_fresh(meta: &NoteMetadata, params: &ScoreParams) -> bool {
    let model_ok = meta
        .embed_model
        .as_deref()
        .map(|m| m == params.embed_model)
        .unwrap_or(true);
    let age_ok = meta
        .embed_at
        .map(|at| (Utc::now() - at).num_days() <= params.embeddings_max_age_days)
        .unwrap_or(true);
    model_ok && age_ok
}
