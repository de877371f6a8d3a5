//! Proposal action: hub notes for themed orphan clusters.
//!
//! A hub is a new note that links every member of a cluster, giving a
//! flat set of orphans a point of entry. The proposal's diff creates
//! the file from scratch; nothing exists on disk until it is applied.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use loam_core::note::{PROP_CREATED, PROP_ID, PROP_UPDATED};
use loam_core::{CorpusState, Note, OrphanCluster, ProposalStats, Result};
use loam_parser::{format_org_timestamp, serialize};

use crate::effects::{EffectTag, Precondition};

use super::{Action, ActionContext, ActionOutcome, Safety};

const ACTION_NAME: &str = "ProposeHubNotes";

/// Filesystem- and id-safe slug for a theme.
fn slug(theme: &str) -> String {
    let mut out = String::new();
    for c in theme.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "cluster".to_string()
    } else {
        out
    }
}

pub struct ProposeHubNotes {
    ctx: ActionContext,
}

impl ProposeHubNotes {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    fn hub_content(&self, hub_id: &str, theme: &str, cluster: &OrphanCluster, state: &CorpusState) -> String {
        let now = Utc::now();
        let mut hub = Note::empty(
            self.ctx
                .config
                .notes_root
                .join(format!("{}.org", slug(theme))),
        );
        hub.set_property(PROP_ID, hub_id);
        hub.set_property(PROP_CREATED, format_org_timestamp(now));
        hub.set_property(PROP_UPDATED, format_org_timestamp(now));
        hub.id = Some(hub_id.to_string());
        hub.title = Some(theme.to_string());
        let mut body = String::new();
        for member in &cluster.note_ids {
            let title = state
                .notes
                .get(member)
                .and_then(|m| m.title.as_deref())
                .unwrap_or(member);
            body.push_str(&format!("- [[id:{member}][{title}]]\n"));
        }
        hub.body = body;
        serialize(&hub)
    }
}

#[async_trait]
impl Action for ProposeHubNotes {
    fn name(&self) -> &'static str {
        ACTION_NAME
    }

    fn safety(&self) -> Safety {
        Safety::Proposal
    }

    fn cost(&self, state: &CorpusState) -> f64 {
        10.0 + state.orphan_clusters.len() as f64
    }

    fn preconditions(&self) -> &'static [Precondition] {
        &[Precondition::OrphanClustersFound]
    }

    fn effects(&self) -> &'static [EffectTag] {
        &[EffectTag::HierarchyEstablished]
    }

    async fn execute(&self, state: &CorpusState) -> Result<ActionOutcome> {
        if state.orphan_clusters.is_empty() {
            return Ok(ActionOutcome::no_op(state, "no orphan clusters"));
        }

        let mut created = 0usize;
        for cluster in &state.orphan_clusters {
            if cluster.note_ids.len() < 2 {
                continue;
            }
            let theme = cluster
                .theme
                .clone()
                .unwrap_or_else(|| format!("cluster of {} notes", cluster.note_ids.len()));

            // A theme-derived id keeps the duplicate guard effective
            // across planning cycles.
            let hub_id = format!("hub-{}", slug(&theme));
            if self.ctx.patches.has_pending(&hub_id, ACTION_NAME)? {
                debug!("hub proposal already pending for {theme}");
                continue;
            }

            let content = self.hub_content(&hub_id, &theme, cluster, state);
            let path = self
                .ctx
                .config
                .notes_root
                .join(format!("{}.org", slug(&theme)));
            let rationale = format!(
                "creates a hub note for {} orphans sharing the theme {:?}",
                cluster.note_ids.len(),
                theme,
            );
            self.ctx.patches.create_proposal(
                &hub_id,
                &path,
                ACTION_NAME,
                &rationale,
                "",
                &content,
                ProposalStats::default(),
                ProposalStats::of(&content, cluster.note_ids.len()),
            )?;
            created += 1;
        }

        if created == 0 {
            return Ok(ActionOutcome::no_op(state, "hub proposals already pending"));
        }
        let mut new_state = state.clone();
        new_state.pending_proposals += created;
        Ok(ActionOutcome {
            state: new_state,
            message: format!("proposed {created} hub notes"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_filesystem_safe() {
        assert_eq!(slug("Rust Async Programming"), "rust-async-programming");
        assert_eq!(slug("C++ & templates!"), "c-templates");
        assert_eq!(slug("!!!"), "cluster");
    }
}
