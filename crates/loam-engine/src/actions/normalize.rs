//! Safe action: bring note formatting up to policy.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use loam_core::{CorpusState, Result};
use loam_parser::{normalize, read_note, serialize, write_note};

use crate::effects::{needs_formatting, EffectTag, Precondition};

use super::{Action, ActionContext, ActionOutcome, Safety};

/// Ensure properties block, id, created/updated timestamps and a title
/// on every eligible note. Backs up each file before rewriting it.
pub struct NormalizeFormatting {
    ctx: ActionContext,
}

impl NormalizeFormatting {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Action for NormalizeFormatting {
    fn name(&self) -> &'static str {
        "NormalizeFormatting"
    }

    fn safety(&self) -> Safety {
        Safety::Safe
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        1.0 + state.notes.values().filter(|m| needs_formatting(m)).count() as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[Precondition::NotesNeedFormatting]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::FormatOk]
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        let targets: Vec<_> = state
            .notes
            .values()
            .filter(|m| needs_formatting(m))
            .map(|m| m.path.clone())
            .collect();
        if targets.is_empty() {
            return Ok(ActionOutcome::no_op(state, "no notes need formatting"));
        }

        let now = Utc::now();
        let mut fixed = 0usize;
        let mut failures: Vec<String> = Vec::new();
        for path in targets {
            // File I/O is short and local; no need to leave the task.
            let result = (|| -> Result<bool> {
                let note = read_note(&path)?;
                let normalized = normalize(&note, now);
                if serialize(&normalized) == note.raw {
                    return Ok(false);
                }
                self.ctx.patches.backup(&path)?;
                write_note(&normalized)?;
                Ok(true)
            })();
            match result {
                Ok(true) => {
                    fixed += 1;
                    debug!("normalized {:?}", path);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("normalization skipped {:?}: {e}", path);
                    failures.push(format!("{}: {e}", path.display()));
                }
            }
        }

        let new_state = self.ctx.rescan(state).await?;
        let mut message = format!("normalized {fixed} notes");
        if !failures.is_empty() {
            message.push_str(&format!(", {} failed", failures.len()));
        }
        Ok(ActionOutcome {
            state: new_state,
            message,
        })
    }
}
