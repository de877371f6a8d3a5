//! Plan execution: sequential, failure-tolerant, never aborting.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use loam_config::LoamConfig;
use loam_core::{CorpusState, JournalEntry, SemanticService};

use crate::actions::{find_action, first_unmet_precondition, Action, Safety};
use crate::effects::EffectTag;
use crate::planner::Plan;

/// The reason recorded when an action's preconditions fail at run time.
pub const SKIP_PRECONDITIONS: &str = "Preconditions no longer met";

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub action: String,
    pub success: bool,
    pub skipped: bool,
    pub message: String,
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub records: Vec<ActionRecord>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub state: CorpusState,
}

impl ExecutionResult {
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped",
            self.succeeded, self.failed, self.skipped
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Skip proposal-class actions entirely.
    pub safe_only: bool,
}

pub struct Executor {
    config: Arc<LoamConfig>,
    catalog: Vec<Arc<dyn Action>>,
    semantic: Option<Arc<dyn SemanticService>>,
}

impl Executor {
    pub fn new(
        config: Arc<LoamConfig>,
        catalog: Vec<Arc<dyn Action>>,
        semantic: Option<Arc<dyn SemanticService>>,
    ) -> Self {
        Self {
            config,
            catalog,
            semantic,
        }
    }

    /// Run the plan in order. Each action sees the state left by its
    /// predecessor; a failure is recorded and the plan continues.
    pub async fn run(
        &self,
        plan: &Plan,
        state: CorpusState,
        options: ExecuteOptions,
    ) -> ExecutionResult {
        let mut result = ExecutionResult {
            records: Vec::new(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            state,
        };
        // Effects produced by successful actions this run; precondition
        // re-checks see them alongside the evolving state.
        let mut effects: BTreeSet<EffectTag> = BTreeSet::new();

        for step in &plan.steps {
            let Some(action) = find_action(&self.catalog, &step.action) else {
                result.failed += 1;
                result.records.push(ActionRecord {
                    action: step.action.clone(),
                    success: false,
                    skipped: false,
                    message: "not in the action catalog".to_string(),
                });
                continue;
            };

            if options.safe_only && action.safety() == Safety::Proposal {
                result.skipped += 1;
                result.records.push(ActionRecord {
                    action: step.action.clone(),
                    success: false,
                    skipped: true,
                    message: "skipped in safe-only mode".to_string(),
                });
                continue;
            }

            // Earlier actions (or their failures) may have invalidated
            // what the planner assumed.
            if let Some(unmet) =
                first_unmet_precondition(action.as_ref(), &result.state, &effects, &self.config)
            {
                debug!(
                    "skipping {}: {} ({})",
                    step.action,
                    SKIP_PRECONDITIONS,
                    unmet.describe()
                );
                result.skipped += 1;
                result.records.push(ActionRecord {
                    action: step.action.clone(),
                    success: false,
                    skipped: true,
                    message: SKIP_PRECONDITIONS.to_string(),
                });
                continue;
            }

            match action.execute(&result.state).await {
                Ok(outcome) => {
                    info!("{}: {}", step.action, outcome.message);
                    result.succeeded += 1;
                    effects.extend(action.effects().iter().copied());
                    result.records.push(ActionRecord {
                        action: step.action.clone(),
                        success: true,
                        skipped: false,
                        message: outcome.message,
                    });
                    result.state = outcome.state;
                }
                Err(e) => {
                    warn!("{} failed: {e}", step.action);
                    result.failed += 1;
                    result.records.push(ActionRecord {
                        action: step.action.clone(),
                        success: false,
                        skipped: false,
                        message: e.to_string(),
                    });
                }
            }
        }

        if self.config.journal_summaries {
            self.journal(&result).await;
        }
        result
    }

    /// Best-effort execution summary for the daily journal collaborator.
    async fn journal(&self, result: &ExecutionResult) {
        let Some(semantic) = &self.semantic else {
            return;
        };
        if result.records.is_empty() {
            return;
        }
        let entry = JournalEntry {
            timestamp: Utc::now(),
            title: "Garden tending".to_string(),
            points: result
                .records
                .iter()
                .map(|r| format!("{}: {}", r.action, r.message))
                .collect(),
            next_steps: Vec::new(),
            tags: vec!["loam".to_string()],
        };
        if let Err(e) = semantic.add_daily_entry(&entry).await {
            warn!("journal entry failed: {e}");
        }
    }
}
