//! Safe action: delegate embedding computation to the semantic service
//! and mirror the results into the local cache.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use loam_core::embedding::parse_vector;
use loam_core::note::{PROP_EMBEDDING, PROP_EMBED_MODEL};
use loam_core::{CorpusState, LoamError, Result, ServiceKind, StoredEmbedding};
use loam_parser::read_note;

use crate::effects::{needs_embedding, EffectTag, Precondition};

use super::{Action, ActionContext, ActionOutcome, Safety};

pub struct ComputeEmbeddings {
    ctx: ActionContext,
}

impl ComputeEmbeddings {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    /// Mirror embedding vectors from note properties into the cache.
    /// Per-note failures are tolerated; the sync reports what it could.
    async fn sync_cache(&self, state: &CorpusState) -> usize {
        let mut cached = 0usize;
        for meta in state.notes.values().filter(|m| m.has_embedding) {
            let note = match read_note(&meta.path) {
                Ok(note) => note,
                Err(e) => {
                    warn!("cache sync skipped {:?}: {e}", meta.path);
                    continue;
                }
            };
            let Some(vector) = note.property(PROP_EMBEDDING).and_then(parse_vector) else {
                continue;
            };
            let record = StoredEmbedding {
                note_id: meta.note_id.clone(),
                chunk_hash: note.content_hash(),
                model: note
                    .property(PROP_EMBED_MODEL)
                    .unwrap_or(&self.ctx.config.embed_model)
                    .to_string(),
                vector,
                created_at: meta.embed_at.unwrap_or_else(Utc::now),
                content_preview: note.content_preview(120),
            };
            match self.ctx.cache.put(&record).await {
                Ok(()) => cached += 1,
                Err(e) => warn!("cache write failed for {}: {e}", meta.note_id),
            }
        }
        cached
    }
}

#[async_trait]
impl Action for ComputeEmbeddings {
    fn name(&self) -> &'static str {
        "ComputeEmbeddings"
    }

    fn safety(&self) -> Safety {
        Safety::Safe
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        let missing = state
            .notes
            .values()
            .filter(|m| needs_embedding(m, &self.ctx.config))
            .count();
        2.0 + 2.0 * missing as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[Precondition::EmbeddingsMissingOrStale]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::EmbeddingsFresh]
    }

    fn required_service(&self) -> Option<ServiceKind> {
        Some(ServiceKind::Semantic)
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        let needing: Vec<_> = state
            .notes
            .values()
            .filter(|m| needs_embedding(m, &self.ctx.config))
            .collect();
        if needing.is_empty() {
            return Ok(ActionOutcome::no_op(state, "all embeddings are fresh"));
        }

        let semantic = self
            .ctx
            .semantic
            .as_ref()
            .ok_or_else(|| LoamError::ServiceUnavailable {
                service: ServiceKind::Semantic.name().to_string(),
            })?;

        let reported = semantic.generate_embeddings(false).await?;
        debug!("semantic service reports {reported} notes embedded");

        let new_state = self.ctx.rescan(state).await?;
        let cached = self.sync_cache(&new_state).await;

        let still_missing = new_state
            .notes
            .values()
            .filter(|m| needs_embedding(m, &self.ctx.config))
            .count();
        let mut message = format!("embedded {reported} notes, cached {cached} vectors");
        if still_missing > 0 {
            // Partial success is still success; the summary says so.
            message.push_str(&format!(", {still_missing} still missing"));
        }
        Ok(ActionOutcome {
            state: new_state,
            message,
        })
    }
}
