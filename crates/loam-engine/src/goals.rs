//! The goal catalog.
//!
//! Goals are plain records behind a trait: a name, a priority, the
//! effect tags that contribute to satisfying them, and an evaluation
//! against the current state. Registration is explicit in
//! [`goal_catalog`]; there is no runtime discovery.

use std::sync::Arc;

use loam_config::LoamConfig;
use loam_core::CorpusState;

use crate::effects::{embeddable, embedding_stale, needs_formatting, EffectTag};

/// Four-valued goal status. `Blocked` means a prerequisite goal is
/// itself unsatisfied; the planner skips such goals this cycle rather
/// than chase them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Satisfied,
    Unsatisfied,
    Blocked,
    NotApplicable,
}

pub trait Goal: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> u32;
    /// Effects that contribute to satisfying this goal.
    fn required_effects(&self) -> &'static [EffectTag];
    fn evaluate(&self, state: &CorpusState, config: &LoamConfig) -> GoalStatus;
}

/// Explicit goal registration.
pub fn goal_catalog(config: &LoamConfig) -> Vec<Arc<dyn Goal>> {
    let mut goals: Vec<Arc<dyn Goal>> = vec![
        Arc::new(MaintainHealthyCorpus),
        Arc::new(EnsureEmbeddingsFresh),
        Arc::new(EnforceFormattingPolicy),
        Arc::new(ReduceOrphans),
    ];
    if config.enable_hierarchy_goal {
        goals.push(Arc::new(EstablishHierarchy));
    }
    goals
}

/// Drive corpus mean health to the configured target.
pub struct MaintainHealthyCorpus;

impl Goal for MaintainHealthyCorpus {
    fn name(&self) -> &'static str {
        "MaintainHealthyCorpus"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn required_effects(&self) -> &'static [EffectTag] {
        &[
            EffectTag::FormatOk,
            EffectTag::EmbeddingsFresh,
            EffectTag::OrphansReduced,
            EffectTag::CoherenceImproved,
            EffectTag::RedundancyReduced,
        ]
    }

    fn evaluate(&self, state: &CorpusState, config: &LoamConfig) -> GoalStatus {
        if state.total_notes == 0 {
            return GoalStatus::NotApplicable;
        }
        if state.mean_health_score >= f64::from(config.target_health) {
            GoalStatus::Satisfied
        } else {
            GoalStatus::Unsatisfied
        }
    }
}

/// Every eligible note carries a fresh embedding.
pub struct EnsureEmbeddingsFresh;

impl Goal for EnsureEmbeddingsFresh {
    fn name(&self) -> &'static str {
        "EnsureEmbeddingsFresh"
    }

    fn priority(&self) -> u32 {
        90
    }

    fn required_effects(&self) -> &'static [EffectTag] {
        &[EffectTag::EmbeddingsFresh]
    }

    fn evaluate(&self, state: &CorpusState, config: &LoamConfig) -> GoalStatus {
        if state.total_notes == 0 {
            return GoalStatus::NotApplicable;
        }
        let all_fresh = state
            .notes
            .values()
            .filter(|meta| embeddable(meta))
            .all(|meta| meta.has_embedding && !embedding_stale(meta, config));
        if all_fresh {
            GoalStatus::Satisfied
        } else {
            GoalStatus::Unsatisfied
        }
    }
}

/// No eligible note has format issues. Source notes are outside the
/// policy because normalization may not touch them.
pub struct EnforceFormattingPolicy;

impl Goal for EnforceFormattingPolicy {
    fn name(&self) -> &'static str {
        "EnforceFormattingPolicy"
    }

    fn priority(&self) -> u32 {
        70
    }

    fn required_effects(&self) -> &'static [EffectTag] {
        &[EffectTag::FormatOk]
    }

    fn evaluate(&self, state: &CorpusState, _config: &LoamConfig) -> GoalStatus {
        if state.total_notes == 0 {
            return GoalStatus::NotApplicable;
        }
        if state.notes.values().any(needs_formatting) {
            GoalStatus::Unsatisfied
        } else {
            GoalStatus::Satisfied
        }
    }
}

/// Keep the orphan share under the configured threshold.
pub struct ReduceOrphans;

impl Goal for ReduceOrphans {
    fn name(&self) -> &'static str {
        "ReduceOrphans"
    }

    fn priority(&self) -> u32 {
        60
    }

    fn required_effects(&self) -> &'static [EffectTag] {
        &[EffectTag::OrphansReduced]
    }

    fn evaluate(&self, state: &CorpusState, config: &LoamConfig) -> GoalStatus {
        if state.total_notes == 0 {
            return GoalStatus::NotApplicable;
        }
        if state.orphan_percentage() <= config.acceptable_orphan_percentage {
            GoalStatus::Satisfied
        } else {
            GoalStatus::Unsatisfied
        }
    }
}

/// Every implicit category of meaningful size has a designated hub.
/// Blocked while orphan reduction is still unsatisfied.
pub struct EstablishHierarchy;

impl Goal for EstablishHierarchy {
    fn name(&self) -> &'static str {
        "EstablishHierarchy"
    }

    fn priority(&self) -> u32 {
        70
    }

    fn required_effects(&self) -> &'static [EffectTag] {
        &[EffectTag::HierarchyEstablished]
    }

    fn evaluate(&self, state: &CorpusState, config: &LoamConfig) -> GoalStatus {
        if state.total_notes == 0 {
            return GoalStatus::NotApplicable;
        }
        if ReduceOrphans.evaluate(state, config) == GoalStatus::Unsatisfied {
            return GoalStatus::Blocked;
        }
        let all_hubbed = state
            .implicit_categories
            .iter()
            .filter(|c| c.note_ids.len() >= config.min_category_size)
            .all(|c| c.hub_id.is_some());
        if all_hubbed {
            GoalStatus::Satisfied
        } else {
            GoalStatus::Unsatisfied
        }
    }
}
