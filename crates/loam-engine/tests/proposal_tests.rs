//! Proposal lifecycle: apply, reject, stale detection, file creation.

mod common;

use common::{harness, hits_for};

use loam_core::test_support::fixtures::note_file;
use loam_core::{LoamError, ProposalStats, ProposalStatus};
use loam_engine::{ExecuteOptions, PatchStore};

async fn garden_with_link_proposals() -> common::Harness {
    let h = harness(&[
        ("a.org", &note_file("a-1", "Alpha", &[], "About soil health.\n", &[])),
        ("b.org", &note_file("b-1", "Beta", &[], "About composting.\n", &[])),
    ]);
    h.semantic
        .set_search_hits(hits_for(&[("a-1", "Alpha"), ("b-1", "Beta")]));
    h.engine.cycle(ExecuteOptions::default()).await.unwrap();
    h
}

#[tokio::test(flavor = "multi_thread")]
async fn applying_a_proposal_writes_the_file_and_backs_up() {
    let h = garden_with_link_proposals().await;
    let pending = h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap();
    assert_eq!(pending.len(), 2);

    let target = &pending[0];
    let before = std::fs::read_to_string(&target.path).unwrap();
    assert!(!before.contains("** Related"));

    let applied = h.engine.mark_applied(&target.id).unwrap();
    assert_eq!(applied.status, ProposalStatus::Applied);

    let after = std::fs::read_to_string(&target.path).unwrap();
    assert!(after.contains("** Related"));
    assert!(after.ends_with('\n'));

    // The pre-apply content is in a backup.
    let backups = std::fs::read_dir(h.garden.path().join(".loam/backups")).unwrap();
    assert!(backups.count() >= 1);

    // A second apply is refused: the proposal is no longer pending.
    let err = h.engine.mark_applied(&target.id).unwrap_err();
    assert!(matches!(err, LoamError::PreconditionFailed { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn drifted_content_makes_the_proposal_stale() {
    let h = garden_with_link_proposals().await;
    let pending = h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap();
    let target = &pending[0];

    // Rewrite the body region the diff's context depends on.
    let drifted = std::fs::read_to_string(&target.path)
        .unwrap()
        .replace("About", "Concerning");
    std::fs::write(&target.path, drifted.clone()).unwrap();

    let err = h.engine.mark_applied(&target.id).unwrap_err();
    assert!(matches!(err, LoamError::StaleProposal { .. }));

    // The proposal stays Pending and the file is untouched.
    let still = h.engine.get_proposal(&target.id).unwrap().unwrap();
    assert_eq!(still.status, ProposalStatus::Pending);
    assert_eq!(std::fs::read_to_string(&target.path).unwrap(), drifted);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejecting_a_proposal_leaves_files_alone() {
    let h = garden_with_link_proposals().await;
    let pending = h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap();
    let target = &pending[0];
    let before = std::fs::read_to_string(&target.path).unwrap();

    let rejected = h.engine.mark_rejected(&target.id).unwrap();
    assert_eq!(rejected.status, ProposalStatus::Rejected);
    assert_eq!(std::fs::read_to_string(&target.path).unwrap(), before);

    // Rejection frees the (note, action) slot for a future proposal.
    assert_eq!(
        h.engine
            .list_proposals(Some(ProposalStatus::Pending))
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn creation_proposals_materialize_new_files() {
    let h = harness(&[("a.org", &note_file("a-1", "Alpha", &[], "Body.\n", &[]))]);

    // Hand-craft a hub-style creation proposal through a second store
    // handle on the same directory.
    let store = PatchStore::open(&h.garden.path().join(".loam")).unwrap();
    let hub_path = h.garden.path().join("gardening.org");
    let content = ":PROPERTIES:\n:ID: hub-gardening\n:END:\n* Gardening\n- [[id:a-1][Alpha]]\n";
    let proposal = store
        .create_proposal(
            "hub-gardening",
            &hub_path,
            "ProposeHubNotes",
            "creates a hub",
            "",
            content,
            ProposalStats::default(),
            ProposalStats::of(content, 1),
        )
        .unwrap();

    assert!(!hub_path.exists());
    h.engine.mark_applied(&proposal.id).unwrap();
    assert_eq!(std::fs::read_to_string(&hub_path).unwrap(), content);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_proposal_ids_are_reported() {
    let h = harness(&[]);
    let err = h.engine.mark_applied("does-not-exist").unwrap_err();
    assert!(matches!(err, LoamError::PreconditionFailed { .. }));
    assert!(h.engine.get_proposal("does-not-exist").unwrap().is_none());
}
