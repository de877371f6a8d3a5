//! Structural discovery and the split/merge proposal actions.
//!
//! `AnalyzeNoteStructure` mutates no files: it reads cached embeddings
//! and note bodies, then returns a state with the discovery fields
//! populated. `SplitNote` and `MergeNotes` turn those discoveries into
//! Pending proposals.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use loam_core::embedding::{cosine_similarity, parse_vector};
use loam_core::note::{NoteType, PROP_EMBEDDING};
use loam_core::{
    CorpusState, MergeGroup, NoteMetadata, OrphanCluster, ProposalStats, Result,
    StructureAnalysis,
};
use loam_parser::{read_note, serialize};

use crate::effects::{linkable_orphan, EffectTag, Precondition};

use super::{Action, ActionContext, ActionOutcome, Safety};

/// Tags that classify rather than theme a cluster.
const STRUCTURAL_TAGS: [&str; 3] = ["source", "literature", "no_agents"];

/// Split a body into its leading text and `** ` sections. Each section
/// keeps its heading line.
fn split_sections(body: &str) -> (String, Vec<String>) {
    let mut leading = String::new();
    let mut sections: Vec<String> = Vec::new();
    for line in body.split_inclusive('\n') {
        let bare = line.strip_suffix('\n').unwrap_or(line);
        if bare.starts_with("** ") {
            sections.push(line.to_string());
        } else if let Some(current) = sections.last_mut() {
            current.push_str(line);
        } else {
            leading.push_str(line);
        }
    }
    (leading, sections)
}

/// Confidence that a note covers more than one topic. Purely structural:
/// section count and body size.
fn split_confidence(section_count: usize, body_len: usize) -> f64 {
    if section_count < 2 || body_len < 1500 {
        return 0.0;
    }
    let sections = (section_count as f64 / 5.0).min(1.0);
    let length = (body_len as f64 / 6000.0).min(1.0);
    0.5 * sections + 0.5 * length
}

pub struct AnalyzeNoteStructure {
    ctx: ActionContext,
}

impl AnalyzeNoteStructure {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    /// Vector for a note: cache first, then the `EMBEDDING` property.
    async fn vector_for(&self, meta: &NoteMetadata) -> Option<Vec<f32>> {
        if let Ok(Some(record)) = self.ctx.cache.get(&meta.note_id).await {
            if !record.vector.is_empty() {
                return Some(record.vector);
            }
        }
        let note = read_note(&meta.path).ok()?;
        note.property(PROP_EMBEDDING).and_then(parse_vector)
    }

    /// Greedy grouping of ids whose pairwise similarity clears `threshold`
    /// against the group seed.
    fn cluster(
        vectors: &BTreeMap<String, Vec<f32>>,
        ids: &[String],
        threshold: f64,
    ) -> Vec<Vec<String>> {
        let mut assigned: BTreeSet<&String> = BTreeSet::new();
        let mut clusters = Vec::new();
        for seed in ids {
            if assigned.contains(seed) {
                continue;
            }
            let Some(seed_vec) = vectors.get(seed) else {
                continue;
            };
            let mut members = vec![seed.clone()];
            assigned.insert(seed);
            for other in ids {
                if assigned.contains(other) {
                    continue;
                }
                let Some(other_vec) = vectors.get(other) else {
                    continue;
                };
                if cosine_similarity(seed_vec, other_vec) >= threshold {
                    members.push(other.clone());
                    assigned.insert(other);
                }
            }
            if members.len() >= 2 {
                clusters.push(members);
            }
        }
        clusters
    }

    /// The most common non-structural tag among the members, if any.
    fn common_tag(state: &CorpusState, members: &[String]) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for id in members {
            let Some(meta) = state.notes.get(id) else { continue };
            for tag in &meta.tags {
                if STRUCTURAL_TAGS.contains(&tag.as_str()) {
                    continue;
                }
                *counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|(tag, count)| (*count, std::cmp::Reverse(*tag)))
            .filter(|(_, count)| *count >= 2)
            .map(|(tag, _)| tag.to_string())
    }

    async fn cluster_theme(&self, state: &CorpusState, members: &[String]) -> Option<String> {
        if let Some(tag) = Self::common_tag(state, members) {
            return Some(tag);
        }
        let chat = self.ctx.chat.as_ref()?;
        let titles: Vec<&str> = members
            .iter()
            .filter_map(|id| state.notes.get(id))
            .filter_map(|m| m.title.as_deref())
            .collect();
        let reply = chat
            .complete(
                "You name the shared theme of a group of note titles in at most four words. \
                 Answer with the theme only.",
                &titles.join("\n"),
            )
            .await;
        match reply {
            Ok(theme) if !theme.trim().is_empty() => Some(theme.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("cluster theme unavailable: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Action for AnalyzeNoteStructure {
    fn name(&self) -> &'static str {
        "AnalyzeNoteStructure"
    }

    fn safety(&self) -> Safety {
        Safety::Safe
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        3.0 + 0.5 * state.total_notes as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[Precondition::EmbeddingsFresh]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::StructureAnalyzed]
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        let eligible: Vec<&NoteMetadata> = state.eligible_notes().collect();
        if eligible.is_empty() {
            return Ok(ActionOutcome::no_op(state, "nothing to analyze"));
        }

        let mut vectors: BTreeMap<String, Vec<f32>> = BTreeMap::new();
        for meta in &eligible {
            if let Some(vector) = self.vector_for(meta).await {
                vectors.insert(meta.note_id.clone(), vector);
            }
        }

        // Per-note structural shape.
        let mut analyses = Vec::new();
        for meta in &eligible {
            if meta.note_type == NoteType::Source {
                continue;
            }
            let Ok(note) = read_note(&meta.path) else { continue };
            let (_, sections) = split_sections(&note.body);
            analyses.push(StructureAnalysis {
                note_id: meta.note_id.clone(),
                section_count: sections.len(),
                body_len: note.body.len(),
                split_confidence: split_confidence(sections.len(), note.body.len()),
                summary: None,
            });
        }

        // Content overlap across the whole corpus.
        let all_ids: Vec<String> = vectors.keys().cloned().collect();
        let merge_groups: Vec<MergeGroup> = Self::cluster(
            &vectors,
            &all_ids,
            self.ctx.config.merge_similarity,
        )
        .into_iter()
        .map(|note_ids| {
            let similarity = note_ids
                .windows(2)
                .map(|pair| cosine_similarity(&vectors[&pair[0]], &vectors[&pair[1]]))
                .fold(f64::INFINITY, f64::min);
            MergeGroup {
                note_ids,
                similarity,
            }
        })
        .collect();

        // Orphans that cluster around a theme.
        let orphan_ids: Vec<String> = state
            .notes
            .values()
            .filter(|m| linkable_orphan(m))
            .map(|m| m.note_id.clone())
            .collect();
        let mut orphan_clusters = Vec::new();
        for members in Self::cluster(
            &vectors,
            &orphan_ids,
            f64::from(self.ctx.config.similarity_threshold),
        ) {
            let theme = self.cluster_theme(state, &members).await;
            orphan_clusters.push(OrphanCluster {
                note_ids: members,
                theme,
            });
        }

        let message = format!(
            "analyzed {} notes: {} split candidates, {} merge groups, {} orphan clusters",
            analyses.len(),
            analyses
                .iter()
                .filter(|a| a.split_confidence >= self.ctx.config.split_confidence_threshold)
                .count(),
            merge_groups.len(),
            orphan_clusters.len(),
        );
        debug!("{message}");

        let mut new_state = state.clone();
        new_state.structure_analyses = analyses;
        new_state.merge_groups = merge_groups;
        new_state.hub_candidates = orphan_clusters
            .iter()
            .filter_map(|c| {
                c.theme.as_ref().map(|theme| loam_core::HubCandidate {
                    theme: theme.clone(),
                    member_ids: c.note_ids.clone(),
                })
            })
            .collect();
        new_state.orphan_clusters = orphan_clusters;

        Ok(ActionOutcome {
            state: new_state,
            message,
        })
    }
}

pub struct SplitNote {
    ctx: ActionContext,
}

impl SplitNote {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

const SPLIT_ACTION: &str = "SplitNote";

#[async_trait]
impl Action for SplitNote {
    fn name(&self) -> &'static str {
        SPLIT_ACTION
    }

    fn safety(&self) -> Safety {
        Safety::Proposal
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        8.0 + state
            .structure_analyses
            .iter()
            .filter(|a| a.split_confidence >= self.ctx.config.split_confidence_threshold)
            .count() as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[
            Precondition::StructureAnalyzed,
            Precondition::SplitCandidatesFound,
        ]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::CoherenceImproved, EffectTag::InvalidatesEmbeddings]
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        let threshold = self.ctx.config.split_confidence_threshold;
        let candidates: Vec<&StructureAnalysis> = state
            .structure_analyses
            .iter()
            .filter(|a| a.split_confidence >= threshold)
            .collect();
        if candidates.is_empty() {
            return Ok(ActionOutcome::no_op(state, "no split candidates"));
        }

        let mut created = 0usize;
        for analysis in candidates {
            let Some(meta) = state.notes.get(&analysis.note_id) else {
                continue;
            };
            if meta.agents_disabled || meta.note_type == NoteType::Source || meta.missing_id() {
                continue;
            }
            if self.ctx.patches.has_pending(&meta.note_id, SPLIT_ACTION)? {
                continue;
            }

            let note = read_note(&meta.path)?;
            let (leading, sections) = split_sections(&note.body);
            if sections.len() < 2 {
                continue;
            }

            // Keep the first section in place; the rest become linked
            // fragments, materialized by whoever approves the proposal.
            let mut revised_body = leading;
            revised_body.push_str(&sections[0]);
            revised_body.push_str("\n** Split out\n");
            let mut fragment_titles = Vec::new();
            for section in &sections[1..] {
                let heading = section
                    .lines()
                    .next()
                    .unwrap_or("** Fragment")
                    .trim_start_matches('*')
                    .trim();
                let fragment_id = Uuid::new_v4().to_string();
                revised_body.push_str(&format!("- [[id:{fragment_id}][{heading}]]\n"));
                fragment_titles.push(heading.to_string());
            }

            let mut revised_note = note.clone();
            revised_note.body = revised_body;
            let revised = serialize(&revised_note);

            let rationale = format!(
                "splits {} sections out of a {}-byte note (confidence {:.2}): {}",
                sections.len() - 1,
                analysis.body_len,
                analysis.split_confidence,
                fragment_titles.join(", "),
            );
            self.ctx.patches.create_proposal(
                &meta.note_id,
                &meta.path,
                SPLIT_ACTION,
                &rationale,
                &note.raw,
                &revised,
                ProposalStats::of(&note.raw, meta.outbound_links.len()),
                ProposalStats::of(&revised, meta.outbound_links.len() + sections.len() - 1),
            )?;
            created += 1;
        }

        if created == 0 {
            return Ok(ActionOutcome::no_op(state, "split proposals already pending"));
        }
        let mut new_state = state.clone();
        new_state.pending_proposals += created;
        Ok(ActionOutcome {
            state: new_state,
            message: format!("proposed splitting {created} notes"),
        })
    }
}

pub struct MergeNotes {
    ctx: ActionContext,
}

impl MergeNotes {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    /// The group member that absorbs the others: most linked, then
    /// oldest, then smallest id.
    fn primary<'a>(state: &'a CorpusState, group: &MergeGroup) -> Option<&'a NoteMetadata> {
        group
            .note_ids
            .iter()
            .filter_map(|id| state.notes.get(id))
            .filter(|m| !m.agents_disabled && m.note_type != NoteType::Source && !m.missing_id())
            .max_by(|a, b| {
                a.link_count
                    .cmp(&b.link_count)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.note_id.cmp(&a.note_id))
            })
    }
}

const MERGE_ACTION: &str = "MergeNotes";

#[async_trait]
impl Action for MergeNotes {
    fn name(&self) -> &'static str {
        MERGE_ACTION
    }

    fn safety(&self) -> Safety {
        Safety::Proposal
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        8.0 + state.merge_groups.len() as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[Precondition::StructureAnalyzed, Precondition::MergeGroupsFound]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::RedundancyReduced, EffectTag::InvalidatesEmbeddings]
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        if state.merge_groups.is_empty() {
            return Ok(ActionOutcome::no_op(state, "no merge groups"));
        }

        let mut created = 0usize;
        for group in &state.merge_groups {
            if group.similarity < self.ctx.config.merge_similarity {
                continue;
            }
            let Some(primary) = Self::primary(state, group) else {
                continue;
            };
            if self.ctx.patches.has_pending(&primary.note_id, MERGE_ACTION)? {
                continue;
            }

            let primary_note = read_note(&primary.path)?;
            let mut revised_note = primary_note.clone();
            let mut absorbed = Vec::new();
            for id in &group.note_ids {
                if *id == primary.note_id {
                    continue;
                }
                let Some(member) = state.notes.get(id) else { continue };
                let Ok(note) = read_note(&member.path) else { continue };
                revised_note.body.push_str(&format!(
                    "\n** Merged from {}\n{}",
                    note.title.as_deref().unwrap_or(id),
                    note.body,
                ));
                absorbed.push(id.clone());
            }
            if absorbed.is_empty() {
                continue;
            }

            let revised = serialize(&revised_note);
            let rationale = format!(
                "absorbs {} (minimum pairwise similarity {:.2}); the absorbed notes can be \
                 archived once applied",
                absorbed.join(", "),
                group.similarity,
            );
            self.ctx.patches.create_proposal(
                &primary.note_id,
                &primary.path,
                MERGE_ACTION,
                &rationale,
                &primary_note.raw,
                &revised,
                ProposalStats::of(&primary_note.raw, primary.outbound_links.len()),
                ProposalStats::of(&revised, primary.outbound_links.len()),
            )?;
            created += 1;
        }

        if created == 0 {
            return Ok(ActionOutcome::no_op(state, "merge proposals already pending"));
        }
        let mut new_state = state.clone();
        new_state.pending_proposals += created;
        Ok(ActionOutcome {
            state: new_state,
            message: format!("proposed merging {created} groups"),
        })
    }
}
