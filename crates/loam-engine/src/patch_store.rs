//! Backups, unified diffs and the proposal lifecycle store.
//!
//! Rooted at `<notes_root>/.loam` with two subdirectories: `backups/`
//! holds pre-write copies of note files, `proposals/` holds one JSON
//! record plus one `.patch` file per proposal.

use std::path::{Path, PathBuf};

use chrono::Utc;
use similar::TextDiff;
use tracing::debug;
use uuid::Uuid;

use loam_core::{LoamError, Proposal, ProposalStats, ProposalStatus, Result};

pub struct PatchStore {
    backups: PathBuf,
    proposals: PathBuf,
}

impl PatchStore {
    /// Open the store, creating its directories idempotently.
    pub fn open(base: &Path) -> Result<Self> {
        let backups = base.join("backups");
        let proposals = base.join("proposals");
        std::fs::create_dir_all(&backups).map_err(|e| LoamError::io(&backups, e))?;
        std::fs::create_dir_all(&proposals).map_err(|e| LoamError::io(&proposals, e))?;
        Ok(Self { backups, proposals })
    }

    /// Copy a file into `backups/<basename>.<timestamp>.bak` and return
    /// the backup path.
    pub fn backup(&self, path: &Path) -> Result<PathBuf> {
        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed");
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut backup_path = self.backups.join(format!("{basename}.{stamp}.bak"));
        let mut counter = 1;
        while backup_path.exists() {
            backup_path = self
                .backups
                .join(format!("{basename}.{stamp}.{counter}.bak"));
            counter += 1;
        }
        std::fs::copy(path, &backup_path).map_err(|e| LoamError::io(path, e))?;
        debug!("backed up {:?} to {:?}", path, backup_path);
        Ok(backup_path)
    }

    /// Line-based unified diff with three lines of context. Header paths
    /// are `original/<id>` and `revised/<id>`.
    pub fn diff(original: &str, revised: &str, note_id: &str) -> String {
        let text_diff = TextDiff::from_lines(original, revised);
        let mut unified = text_diff.unified_diff();
        unified
            .context_radius(3)
            .header(&format!("original/{note_id}"), &format!("revised/{note_id}"));
        unified.to_string()
    }

    /// Create a Pending proposal, persisting the record and its diff as
    /// sibling files. Fails with `DuplicateProposal` when a Pending
    /// proposal for the same (note, action) already exists.
    #[allow(clippy::too_many_arguments)]
    pub fn create_proposal(
        &self,
        note_id: &str,
        path: &Path,
        action_name: &str,
        rationale: &str,
        original: &str,
        revised: &str,
        before_stats: ProposalStats,
        after_stats: ProposalStats,
    ) -> Result<Proposal> {
        if self.has_pending(note_id, action_name)? {
            return Err(LoamError::DuplicateProposal {
                note_id: note_id.to_string(),
                action: action_name.to_string(),
            });
        }

        let proposal = Proposal {
            id: Uuid::new_v4().to_string(),
            note_id: note_id.to_string(),
            path: path.to_path_buf(),
            action_name: action_name.to_string(),
            rationale: rationale.to_string(),
            proposed_at: Utc::now(),
            status: ProposalStatus::Pending,
            before_stats,
            after_stats,
            patch: Self::diff(original, revised, note_id),
        };

        let stem = self.file_stem(&proposal);
        let record_path = self.proposals.join(format!("{stem}.json"));
        let patch_path = self.proposals.join(format!("{stem}.patch"));

        let mut record = proposal.clone();
        record.patch = String::new();
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&record_path, json).map_err(|e| LoamError::io(&record_path, e))?;
        std::fs::write(&patch_path, &proposal.patch).map_err(|e| LoamError::io(&patch_path, e))?;

        debug!(
            "proposal {} ({}) recorded for note {}",
            proposal.id, action_name, note_id
        );
        Ok(proposal)
    }

    /// True iff a Pending proposal of this (note, action) pair exists.
    pub fn has_pending(&self, note_id: &str, action_name: &str) -> Result<bool> {
        Ok(self
            .list(Some(ProposalStatus::Pending))?
            .iter()
            .any(|p| p.note_id == note_id && p.action_name == action_name))
    }

    pub fn count_pending(&self) -> Result<usize> {
        Ok(self.list(Some(ProposalStatus::Pending))?.len())
    }

    /// All stored proposals, optionally filtered by status. The `patch`
    /// field is left empty; use [`PatchStore::get`] for the diff.
    pub fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>> {
        let mut proposals = Vec::new();
        let entries =
            std::fs::read_dir(&self.proposals).map_err(|e| LoamError::io(&self.proposals, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| LoamError::io(&self.proposals, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|e| LoamError::io(&path, e))?;
            let proposal: Proposal = serde_json::from_str(&raw)?;
            if status.map(|s| proposal.status == s).unwrap_or(true) {
                proposals.push(proposal);
            }
        }
        proposals.sort_by(|a, b| a.proposed_at.cmp(&b.proposed_at).then(a.id.cmp(&b.id)));
        Ok(proposals)
    }

    /// Load one proposal with its patch text.
    pub fn get(&self, proposal_id: &str) -> Result<Option<Proposal>> {
        let Some(mut proposal) = self
            .list(None)?
            .into_iter()
            .find(|p| p.id == proposal_id)
        else {
            return Ok(None);
        };
        let patch_path = self.proposals.join(format!("{}.patch", self.file_stem(&proposal)));
        proposal.patch =
            std::fs::read_to_string(&patch_path).map_err(|e| LoamError::io(&patch_path, e))?;
        Ok(Some(proposal))
    }

    /// Persist a status transition and return the updated record.
    pub fn update_status(&self, proposal_id: &str, status: ProposalStatus) -> Result<Proposal> {
        let Some(mut proposal) = self.get(proposal_id)? else {
            return Err(LoamError::StaleProposal {
                id: proposal_id.to_string(),
            });
        };
        proposal.status = status;
        let record_path = self
            .proposals
            .join(format!("{}.json", self.file_stem(&proposal)));
        let mut record = proposal.clone();
        record.patch = String::new();
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&record_path, json).map_err(|e| LoamError::io(&record_path, e))?;
        Ok(proposal)
    }

    /// Delete record and patch files of Rejected proposals. Returns how
    /// many were removed.
    pub fn prune_rejected(&self) -> Result<usize> {
        let rejected = self.list(Some(ProposalStatus::Rejected))?;
        for proposal in &rejected {
            let stem = self.file_stem(proposal);
            for ext in ["json", "patch"] {
                let path = self.proposals.join(format!("{stem}.{ext}"));
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|e| LoamError::io(&path, e))?;
                }
            }
        }
        Ok(rejected.len())
    }

    fn file_stem(&self, proposal: &Proposal) -> String {
        format!("{}-{}", sanitize(&proposal.note_id), proposal.id)
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, PatchStore) {
        let dir = TempDir::new().unwrap();
        let store = PatchStore::open(&dir.path().join(".loam")).unwrap();
        (dir, store)
    }

    fn stats() -> ProposalStats {
        ProposalStats::of("one\ntwo\n", 0)
    }

    #[test]
    fn open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join(".loam");
        PatchStore::open(&base).unwrap();
        PatchStore::open(&base).unwrap();
        assert!(base.join("backups").is_dir());
        assert!(base.join("proposals").is_dir());
    }

    #[test]
    fn backup_copies_with_timestamped_name() {
        let (dir, store) = store();
        let note = dir.path().join("c.org");
        std::fs::write(&note, "* C\n").unwrap();

        let backup = store.backup(&note).unwrap();
        assert!(backup.exists());
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("c.org."));
        assert!(name.ends_with(".bak"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "* C\n");
    }

    #[test]
    fn repeated_backups_in_one_second_do_not_collide() {
        let (dir, store) = store();
        let note = dir.path().join("c.org");
        std::fs::write(&note, "* C\n").unwrap();
        let first = store.backup(&note).unwrap();
        let second = store.backup(&note).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn diff_uses_original_revised_headers() {
        let diff = PatchStore::diff("a\nb\n", "a\nc\n", "note-1");
        assert!(diff.contains("--- original/note-1"));
        assert!(diff.contains("+++ revised/note-1"));
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));
    }

    #[test]
    fn create_proposal_persists_record_and_patch() {
        let (dir, store) = store();
        let proposal = store
            .create_proposal(
                "n-1",
                &dir.path().join("n.org"),
                "SuggestLinks",
                "because",
                "old\n",
                "new\n",
                stats(),
                stats(),
            )
            .unwrap();

        assert_eq!(proposal.status, ProposalStatus::Pending);
        assert!(proposal.patch.contains("+new"));

        let listed = store.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].patch.is_empty());

        let loaded = store.get(&proposal.id).unwrap().unwrap();
        assert_eq!(loaded.patch, proposal.patch);
    }

    #[test]
    fn duplicate_pending_proposal_is_rejected() {
        let (dir, store) = store();
        let path = dir.path().join("n.org");
        store
            .create_proposal("n-1", &path, "SuggestLinks", "r", "a\n", "b\n", stats(), stats())
            .unwrap();

        let err = store
            .create_proposal("n-1", &path, "SuggestLinks", "r", "a\n", "c\n", stats(), stats())
            .unwrap_err();
        assert!(matches!(err, LoamError::DuplicateProposal { .. }));

        // A different action for the same note is fine.
        store
            .create_proposal("n-1", &path, "SplitNote", "r", "a\n", "c\n", stats(), stats())
            .unwrap();
        assert_eq!(store.count_pending().unwrap(), 2);
    }

    #[test]
    fn applied_proposal_no_longer_blocks_new_ones() {
        let (dir, store) = store();
        let path = dir.path().join("n.org");
        let first = store
            .create_proposal("n-1", &path, "SuggestLinks", "r", "a\n", "b\n", stats(), stats())
            .unwrap();
        store
            .update_status(&first.id, ProposalStatus::Applied)
            .unwrap();

        assert!(!store.has_pending("n-1", "SuggestLinks").unwrap());
        store
            .create_proposal("n-1", &path, "SuggestLinks", "r", "b\n", "c\n", stats(), stats())
            .unwrap();
    }

    #[test]
    fn prune_rejected_removes_files() {
        let (dir, store) = store();
        let path = dir.path().join("n.org");
        let p = store
            .create_proposal("n-1", &path, "SuggestLinks", "r", "a\n", "b\n", stats(), stats())
            .unwrap();
        store.update_status(&p.id, ProposalStatus::Rejected).unwrap();

        assert_eq!(store.prune_rejected().unwrap(), 1);
        assert!(store.list(None).unwrap().is_empty());
    }
}
