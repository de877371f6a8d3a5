//! Advisory change records emitted by proposal-class actions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a proposal. `Pending -> {Approved, Rejected}` and
/// `Approved -> Applied` are driven by an external collaborator; the
/// engine never auto-approves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

/// Coarse shape of a note before and after a proposed change, so a
/// reviewer can judge the size of the edit without reading the diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStats {
    pub bytes: usize,
    pub lines: usize,
    pub links: usize,
}

impl ProposalStats {
    pub fn of(content: &str, links: usize) -> Self {
        Self {
            bytes: content.len(),
            lines: content.lines().count(),
            links,
        }
    }
}

/// A reviewable change. The unified diff itself is persisted as a
/// sibling `.patch` file; `patch` carries it in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub note_id: String,
    pub path: PathBuf,
    pub action_name: String,
    pub rationale: String,
    pub proposed_at: DateTime<Utc>,
    pub status: ProposalStatus,
    pub before_stats: ProposalStats,
    pub after_stats: ProposalStats,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub patch: String,
}

impl Proposal {
    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_lines_and_bytes() {
        let stats = ProposalStats::of("one\ntwo\n", 3);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.bytes, 8);
        assert_eq!(stats.links, 3);
    }

    #[test]
    fn status_round_trips_through_json() {
        let json = serde_json::to_string(&ProposalStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: ProposalStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProposalStatus::Pending);
    }
}
