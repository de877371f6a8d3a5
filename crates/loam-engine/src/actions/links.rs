//! Proposal action: suggest links for orphan notes.
//!
//! For each orphan the semantic service is queried with the note's
//! content; the chat service phrases a short rationale per suggested
//! link. The result is one Pending proposal per orphan carrying a diff
//! that appends a links section. Files are never written directly.

use futures::stream::{self, StreamExt};

use async_trait::async_trait;
use tracing::{debug, warn};

use loam_core::{
    CorpusState, LoamError, Note, NoteMetadata, ProposalStats, Result, SearchHit, ServiceKind,
};
use loam_parser::{read_note, serialize};

use crate::effects::{linkable_orphan, EffectTag, Precondition};

use super::{Action, ActionContext, ActionOutcome, Safety};

const ACTION_NAME: &str = "SuggestLinks";

struct Draft {
    note_id: String,
    path: std::path::PathBuf,
    rationale: String,
    original: String,
    revised: String,
    before: ProposalStats,
    after: ProposalStats,
}

pub struct SuggestLinks {
    ctx: ActionContext,
}

impl SuggestLinks {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    async fn link_rationale(&self, source: &Note, hit: &SearchHit) -> String {
        let fallback = format!("related content (similarity {:.2})", hit.similarity);
        let Some(chat) = &self.ctx.chat else {
            return fallback;
        };
        let system =
            "You explain in one or two sentences why two notes in a personal knowledge base \
             should link to each other. Answer with the explanation only.";
        let user = format!(
            "Note A is titled {:?} and begins: {}\n\nNote B is titled {:?}.",
            source.title.as_deref().unwrap_or("untitled"),
            source.content_preview(240),
            hit.title,
        );
        match chat.complete(system, &user).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => fallback,
            Err(e) => {
                warn!("chat rationale unavailable: {e}");
                fallback
            }
        }
    }

    /// Build the proposal draft for one orphan. `Ok(None)` means the
    /// service had nothing good enough to suggest.
    async fn draft_for(&self, meta: &NoteMetadata) -> Result<Option<Draft>> {
        let semantic = self
            .ctx
            .semantic
            .as_ref()
            .ok_or_else(|| LoamError::ServiceUnavailable {
                service: ServiceKind::Semantic.name().to_string(),
            })?;
        let config = &self.ctx.config;

        let note = read_note(&meta.path)?;
        let query = format!(
            "{} {}",
            note.title.as_deref().unwrap_or(""),
            note.content_preview(300)
        );
        let hits = semantic
            .semantic_search(
                query.trim(),
                config.max_links_per_note + 5,
                config.similarity_threshold,
            )
            .await?;

        let candidates: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| hit.node_id != meta.note_id)
            .filter(|hit| !meta.outbound_links.contains(&hit.node_id))
            .filter(|hit| hit.similarity >= config.similarity_threshold)
            .take(config.max_links_per_note)
            .collect();
        if candidates.is_empty() {
            debug!("no link candidates for {}", meta.note_id);
            return Ok(None);
        }

        let mut section = String::from("\n** Related\n");
        let mut rationales = Vec::new();
        for hit in &candidates {
            let rationale = self.link_rationale(&note, hit).await;
            section.push_str(&format!("- [[id:{}][{}]]: {}\n", hit.node_id, hit.title, rationale));
            rationales.push(format!("{}: {rationale}", hit.title));
        }

        let mut revised_note = note.clone();
        revised_note.body.push_str(&section);
        let revised = serialize(&revised_note);

        Ok(Some(Draft {
            note_id: meta.note_id.clone(),
            path: meta.path.clone(),
            rationale: rationales.join("\n"),
            before: ProposalStats::of(&note.raw, meta.outbound_links.len()),
            after: ProposalStats::of(&revised, meta.outbound_links.len() + candidates.len()),
            original: note.raw,
            revised,
        }))
    }
}

#[async_trait]
impl Action for SuggestLinks {
    fn name(&self) -> &'static str {
        ACTION_NAME
    }

    fn safety(&self) -> Safety {
        Safety::Proposal
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        let orphans = state.notes.values().filter(|m| linkable_orphan(m)).count();
        5.0 + 2.0 * orphans as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[Precondition::OrphansPresent, Precondition::EmbeddingsFresh]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::OrphansReduced]
    }

    fn required_service(&self) -> Option<ServiceKind> {
        Some(ServiceKind::Semantic)
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        let orphans: Vec<&NoteMetadata> = state
            .notes
            .values()
            .filter(|m| linkable_orphan(m))
            .collect();
        if orphans.is_empty() {
            return Ok(ActionOutcome::no_op(state, "no eligible orphans"));
        }

        // Duplicate guard first, so reruns are cheap no-ops.
        let mut fresh_targets = Vec::new();
        for meta in orphans {
            if self.ctx.patches.has_pending(&meta.note_id, ACTION_NAME)? {
                debug!("proposal already pending for {}", meta.note_id);
                continue;
            }
            fresh_targets.push(meta.clone());
        }
        if fresh_targets.is_empty() {
            return Ok(ActionOutcome::no_op(state, "proposals already pending"));
        }

        let concurrency = self.ctx.config.max_concurrent_external_calls.max(1);
        let drafts: Vec<Result<Option<Draft>>> = stream::iter(fresh_targets)
            .map(|meta| async move { self.draft_for(&meta).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut created = 0usize;
        let mut skipped = 0usize;
        let mut errors: Vec<LoamError> = Vec::new();
        for draft in drafts {
            match draft {
                Ok(Some(draft)) => {
                    match self.ctx.patches.create_proposal(
                        &draft.note_id,
                        &draft.path,
                        ACTION_NAME,
                        &draft.rationale,
                        &draft.original,
                        &draft.revised,
                        draft.before,
                        draft.after,
                    ) {
                        Ok(_) => created += 1,
                        Err(LoamError::DuplicateProposal { .. }) => skipped += 1,
                        Err(e) => errors.push(e),
                    }
                }
                Ok(None) => skipped += 1,
                Err(e) => errors.push(e),
            }
        }

        if created == 0 {
            if let Some(first) = errors.into_iter().next() {
                return Err(first);
            }
            return Ok(ActionOutcome::no_op(state, "no link suggestions available"));
        }

        let mut new_state = state.clone();
        new_state.pending_proposals += created;
        let mut message = format!("proposed links for {created} orphans");
        if skipped > 0 {
            message.push_str(&format!(", {skipped} skipped"));
        }
        if !errors.is_empty() {
            message.push_str(&format!(", {} failed", errors.len()));
        }
        Ok(ActionOutcome {
            state: new_state,
            message,
        })
    }
}
