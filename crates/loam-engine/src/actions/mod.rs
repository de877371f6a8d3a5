//! The action catalog.
//!
//! Actions are trait objects in an explicit registry; lookup by name is
//! a table scan, never reflection. Every action is idempotent: executed
//! on a state where its preconditions no longer hold, it returns Ok with
//! a message that begins with "no-op".

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use loam_config::LoamConfig;
use loam_core::{ChatService, CorpusState, EmbeddingCache, Result, SemanticService, ServiceKind};

use crate::effects::{EffectTag, Precondition};
use crate::patch_store::PatchStore;
use crate::scanner::Scanner;

mod embeddings;
mod hubs;
mod links;
mod normalize;
mod structure;

pub use embeddings::ComputeEmbeddings;
pub use hubs::ProposeHubNotes;
pub use links::SuggestLinks;
pub use normalize::NormalizeFormatting;
pub use structure::{AnalyzeNoteStructure, MergeNotes, SplitNote};

/// Whether the system may apply the action without human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Safety {
    Safe,
    Proposal,
}

/// What an execute call hands back: the successor state and a summary.
pub struct ActionOutcome {
    pub state: CorpusState,
    pub message: String,
}

impl ActionOutcome {
    /// The idempotent answer for an action whose work is already done.
    pub fn no_op(state: &CorpusState, detail: &str) -> Self {
        Self {
            state: state.clone(),
            message: format!("no-op: {detail}"),
        }
    }
}

/// Collaborators shared by all actions. Cloning is cheap; everything is
/// behind an `Arc`.
#[derive(Clone)]
pub struct ActionContext {
    pub config: Arc<LoamConfig>,
    pub scanner: Arc<Scanner>,
    pub patches: Arc<PatchStore>,
    pub semantic: Option<Arc<dyn SemanticService>>,
    pub chat: Option<Arc<dyn ChatService>>,
    pub cache: Arc<dyn EmbeddingCache>,
}

impl ActionContext {
    /// Rescan the corpus, carrying this cycle's discovery results into
    /// the fresh state.
    pub async fn rescan(&self, prior: &CorpusState) -> Result<CorpusState> {
        Ok(self.scanner.scan().await?.carry_discoveries_from(prior))
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;
    fn safety(&self) -> Safety;
    /// Strictly positive cost over the given state; the planner rejects
    /// zero-cost candidates.
    fn cost(&self, state: &CorpusState) -> f64;
    fn preconditions(&self) -> &'static [Precondition];
    fn effects(&self) -> &'static [EffectTag];
    /// The external service this action's execute path requires, if any.
    fn required_service(&self) -> Option<ServiceKind> {
        None
    }
    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome>;
}

/// Check every declared precondition against state plus accumulated
/// plan effects.
pub fn preconditions_hold(
    action: &dyn Action,
    state: &CorpusState,
    effects: &BTreeSet<EffectTag>,
    config: &LoamConfig,
) -> bool {
    action
        .preconditions()
        .iter()
        .all(|p| p.holds(state, effects, config))
}

/// First declared precondition that fails, for skip reporting.
pub fn first_unmet_precondition(
    action: &dyn Action,
    state: &CorpusState,
    effects: &BTreeSet<EffectTag>,
    config: &LoamConfig,
) -> Option<Precondition> {
    action
        .preconditions()
        .iter()
        .find(|p| !p.holds(state, effects, config))
        .copied()
}

/// Explicit action registration. The planner and executor both consume
/// this table; nothing else instantiates actions.
pub fn action_catalog(ctx: &ActionContext) -> Vec<Arc<dyn Action>> {
    vec![
        Arc::new(NormalizeFormatting::new(ctx.clone())),
        Arc::new(ComputeEmbeddings::new(ctx.clone())),
        Arc::new(SuggestLinks::new(ctx.clone())),
        Arc::new(AnalyzeNoteStructure::new(ctx.clone())),
        Arc::new(SplitNote::new(ctx.clone())),
        Arc::new(MergeNotes::new(ctx.clone())),
        Arc::new(ProposeHubNotes::new(ctx.clone())),
    ]
}

/// Table lookup by name.
pub fn find_action<'a>(
    catalog: &'a [Arc<dyn Action>],
    name: &str,
) -> Option<&'a Arc<dyn Action>> {
    catalog.iter().find(|a| a.name() == name)
}
