//! The planner's vocabulary: effect tags and precondition predicates.
//!
//! Effects are opaque labels actions declare to signal what they
//! accomplish; the planner matches them against goal requirements.
//! Preconditions are queryable predicates over the corpus state plus
//! the effects accumulated so far in the partial plan.

use std::collections::BTreeSet;

use loam_config::LoamConfig;
use loam_core::note::NoteType;
use loam_core::{CorpusState, NoteMetadata};

/// What an action accomplishes, as matched by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectTag {
    FormatOk,
    EmbeddingsFresh,
    OrphansReduced,
    StructureAnalyzed,
    CoherenceImproved,
    RedundancyReduced,
    HierarchyEstablished,
    /// Created fragments and merged bodies need re-embedding.
    InvalidatesEmbeddings,
}

impl EffectTag {
    pub fn name(&self) -> &'static str {
        match self {
            EffectTag::FormatOk => "FormatOk",
            EffectTag::EmbeddingsFresh => "EmbeddingsFresh",
            EffectTag::OrphansReduced => "OrphansReduced",
            EffectTag::StructureAnalyzed => "StructureAnalyzed",
            EffectTag::CoherenceImproved => "CoherenceImproved",
            EffectTag::RedundancyReduced => "RedundancyReduced",
            EffectTag::HierarchyEstablished => "HierarchyEstablished",
            EffectTag::InvalidatesEmbeddings => "InvalidatesEmbeddings",
        }
    }
}

/// True when formatting normalization may touch this note.
pub fn needs_formatting(meta: &NoteMetadata) -> bool {
    !meta.format_ok && !meta.agents_disabled && meta.note_type != NoteType::Source
}

/// Embedding computation writes provenance properties into the note,
/// so the suppressed and the byte-immutable are both out.
pub fn embeddable(meta: &NoteMetadata) -> bool {
    !meta.agents_disabled && meta.note_type != NoteType::Source
}

/// A recorded embedding is stale when its recorded model differs from
/// the configured one or its recorded age exceeds the window. Absent
/// records are unknown, not stale.
pub fn embedding_stale(meta: &NoteMetadata, config: &LoamConfig) -> bool {
    if !meta.has_embedding {
        return false;
    }
    let model_mismatch = meta
        .embed_model
        .as_deref()
        .map(|m| m != config.embed_model)
        .unwrap_or(false);
    let too_old = meta
        .embed_at
        .map(|at| (chrono::Utc::now() - at).num_days() > config.embeddings_max_age_days)
        .unwrap_or(false);
    model_mismatch || too_old
}

/// True when the note should go through embedding computation.
pub fn needs_embedding(meta: &NoteMetadata, config: &LoamConfig) -> bool {
    embeddable(meta) && (!meta.has_embedding || embedding_stale(meta, config))
}

/// True when link suggestion may target this orphan.
pub fn linkable_orphan(meta: &NoteMetadata) -> bool {
    meta.is_orphan
        && !meta.agents_disabled
        && meta.note_type != NoteType::Source
        && !meta.missing_id()
}

/// Predicates actions declare. Some are satisfiable by planning another
/// action first; the rest only the world can satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// At least one eligible note has format issues.
    NotesNeedFormatting,
    /// At least one eligible note is missing an embedding or holds a
    /// stale one.
    EmbeddingsMissingOrStale,
    /// Every eligible note has a fresh embedding, or a prior action in
    /// the plan produces them.
    EmbeddingsFresh,
    /// At least one orphan is eligible for link suggestions.
    OrphansPresent,
    /// Structure analysis results are on the state, or a prior action
    /// produces them.
    StructureAnalyzed,
    /// An analysis flagged a split candidate above the confidence bar.
    SplitCandidatesFound,
    /// Discovery produced at least one merge group.
    MergeGroupsFound,
    /// Discovery produced orphan clusters, or a prior analysis will.
    OrphanClustersFound,
}

impl Precondition {
    /// Evaluate against the state plus the effects accumulated in the
    /// current partial plan.
    pub fn holds(
        &self,
        state: &CorpusState,
        effects: &BTreeSet<EffectTag>,
        config: &LoamConfig,
    ) -> bool {
        match self {
            Precondition::NotesNeedFormatting => {
                state.notes.values().any(needs_formatting)
            }
            Precondition::EmbeddingsMissingOrStale => state
                .notes
                .values()
                .any(|meta| needs_embedding(meta, config)),
            Precondition::EmbeddingsFresh => {
                effects.contains(&EffectTag::EmbeddingsFresh)
                    || state
                        .notes
                        .values()
                        .filter(|meta| embeddable(meta))
                        .all(|meta| meta.has_embedding && !embedding_stale(meta, config))
            }
            Precondition::OrphansPresent => state.notes.values().any(linkable_orphan),
            Precondition::StructureAnalyzed => {
                effects.contains(&EffectTag::StructureAnalyzed)
                    || !state.structure_analyses.is_empty()
            }
            Precondition::SplitCandidatesFound => state
                .structure_analyses
                .iter()
                .any(|a| a.split_confidence >= config.split_confidence_threshold),
            Precondition::MergeGroupsFound => !state.merge_groups.is_empty(),
            Precondition::OrphanClustersFound => {
                effects.contains(&EffectTag::StructureAnalyzed)
                    || !state.orphan_clusters.is_empty()
            }
        }
    }

    /// The effect that would make an unmet instance of this predicate
    /// hold, when one exists. World-only predicates return `None` and
    /// cannot be satisfied by sub-planning.
    pub fn satisfiable_by(&self) -> Option<EffectTag> {
        match self {
            Precondition::EmbeddingsFresh => Some(EffectTag::EmbeddingsFresh),
            Precondition::StructureAnalyzed | Precondition::OrphanClustersFound => {
                Some(EffectTag::StructureAnalyzed)
            }
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Precondition::NotesNeedFormatting => "notes with format issues exist",
            Precondition::EmbeddingsMissingOrStale => "notes missing fresh embeddings exist",
            Precondition::EmbeddingsFresh => "all eligible notes have fresh embeddings",
            Precondition::OrphansPresent => "orphan notes exist",
            Precondition::StructureAnalyzed => "structure analysis is available",
            Precondition::SplitCandidatesFound => "split candidates were found",
            Precondition::MergeGroupsFound => "merge groups were found",
            Precondition::OrphanClustersFound => "orphan clusters were found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn meta(id: &str) -> NoteMetadata {
        NoteMetadata {
            note_id: id.to_string(),
            path: PathBuf::from(format!("{id}.org")),
            note_type: NoteType::Permanent,
            has_embedding: true,
            embed_model: None,
            embed_at: None,
            format_ok: true,
            has_properties: true,
            has_title: true,
            title: Some(id.to_string()),
            outbound_links: Vec::new(),
            inbound_links: Vec::new(),
            link_count: 0,
            is_orphan: false,
            tags: Vec::new(),
            tags_canonical: true,
            provenance_ok: true,
            created_at: None,
            updated_at: None,
            stale_days: 0,
            agents_disabled: false,
            health_score: 50.0,
        }
    }

    fn state_of(metas: Vec<NoteMetadata>) -> CorpusState {
        let notes: BTreeMap<String, NoteMetadata> = metas
            .into_iter()
            .map(|m| (m.note_id.clone(), m))
            .collect();
        CorpusState::from_notes(notes, 90, Vec::new())
    }

    #[test]
    fn source_notes_never_need_formatting() {
        let mut broken = meta("a");
        broken.format_ok = false;
        broken.note_type = NoteType::Source;
        assert!(!needs_formatting(&broken));

        broken.note_type = NoteType::Permanent;
        assert!(needs_formatting(&broken));

        broken.agents_disabled = true;
        assert!(!needs_formatting(&broken));
    }

    #[test]
    fn embedding_staleness_requires_a_recorded_mismatch() {
        let config = LoamConfig::default();
        let mut m = meta("a");
        assert!(!embedding_stale(&m, &config));

        m.embed_model = Some("other".into());
        assert!(embedding_stale(&m, &config));

        m.embed_model = Some(config.embed_model.clone());
        m.embed_at = Some(chrono::Utc::now() - chrono::Duration::days(400));
        assert!(embedding_stale(&m, &config));
    }

    #[test]
    fn embeddings_fresh_holds_via_accumulated_effect() {
        let config = LoamConfig::default();
        let mut missing = meta("a");
        missing.has_embedding = false;
        let state = state_of(vec![missing]);

        let empty = BTreeSet::new();
        assert!(!Precondition::EmbeddingsFresh.holds(&state, &empty, &config));

        let mut effects = BTreeSet::new();
        effects.insert(EffectTag::EmbeddingsFresh);
        assert!(Precondition::EmbeddingsFresh.holds(&state, &effects, &config));
    }

    #[test]
    fn disabled_notes_do_not_block_embedding_freshness() {
        let config = LoamConfig::default();
        let mut disabled = meta("a");
        disabled.has_embedding = false;
        disabled.agents_disabled = true;
        let state = state_of(vec![disabled, meta("b")]);
        assert!(Precondition::EmbeddingsFresh.holds(&state, &BTreeSet::new(), &config));
    }

    #[test]
    fn orphan_eligibility_excludes_sources_and_sentinels() {
        let mut orphan = meta("a");
        orphan.is_orphan = true;
        assert!(linkable_orphan(&orphan));

        orphan.note_type = NoteType::Source;
        assert!(!linkable_orphan(&orphan));

        let mut sentinel = meta("path:x.org");
        sentinel.note_id = "path:x.org".into();
        sentinel.is_orphan = true;
        assert!(!linkable_orphan(&sentinel));
    }

    #[test]
    fn world_only_predicates_are_not_plannable() {
        assert_eq!(Precondition::NotesNeedFormatting.satisfiable_by(), None);
        assert_eq!(Precondition::SplitCandidatesFound.satisfiable_by(), None);
        assert_eq!(
            Precondition::EmbeddingsFresh.satisfiable_by(),
            Some(EffectTag::EmbeddingsFresh)
        );
        assert_eq!(
            Precondition::OrphanClustersFound.satisfiable_by(),
            Some(EffectTag::StructureAnalyzed)
        );
    }
}
