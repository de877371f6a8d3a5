//! End-to-end tending scenarios: scan, plan, execute over real files
//! with mock external services.

mod common;

use common::{harness, harness_with, hits_for};

use loam_core::test_support::fixtures::note_file;
use loam_core::test_support::mocks::ServiceFailure;
use loam_core::ProposalStatus;
use loam_engine::{ExecuteOptions, Safety, SKIP_PRECONDITIONS};

// === Scenario 1: empty corpus ===

#[tokio::test(flavor = "multi_thread")]
async fn empty_corpus_is_a_quiet_cycle() {
    let h = harness(&[]);

    let state = h.engine.scan().await.unwrap();
    assert_eq!(state.total_notes, 0);
    assert_eq!(state.mean_health_score, 0.0);

    let plan = h.engine.plan(&state).await;
    assert!(plan.is_empty());

    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions::default())
        .await;
    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 0);
    assert_eq!(result.skipped, 0);
}

// === Scenario 2: a malformed note does not fail the cycle ===

#[tokio::test(flavor = "multi_thread")]
async fn malformed_note_is_warned_and_skipped() {
    let h = harness(&[
        ("a.org", &note_file("a-1", "Alpha", &[], "Body.\n", &[])),
        ("b.org", "not a note"),
    ]);

    let state = h.engine.scan().await.unwrap();
    assert_eq!(state.total_notes, 1);
    assert_eq!(state.warnings.len(), 1);
    assert!(state.warnings[0].contains("b.org"));

    let plan = h.engine.plan(&state).await;
    assert!(!plan.is_empty());
    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions::default())
        .await;
    assert_eq!(result.failed, 0);
}

// === Scenario 3: formatting-only fix ===

#[tokio::test(flavor = "multi_thread")]
async fn formatting_fix_normalizes_and_backs_up() {
    let h = harness(&[("c.org", "* Example\nSome body prose.\n")]);

    let state = h.engine.scan().await.unwrap();
    let plan = h.engine.plan(&state).await;
    let step = plan
        .steps
        .iter()
        .find(|s| s.action == "NormalizeFormatting")
        .expect("plan should contain NormalizeFormatting");
    assert_eq!(step.safety, Safety::Safe);

    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions::default())
        .await;
    assert!(result
        .records
        .iter()
        .any(|r| r.action == "NormalizeFormatting" && r.success));

    let rescanned = h.engine.scan().await.unwrap();
    let meta = rescanned.notes.values().next().unwrap();
    assert!(meta.format_ok);
    assert!(!meta.missing_id());
    assert!(meta.created_at.is_some());

    let backups: Vec<_> = std::fs::read_dir(h.garden.path().join(".loam/backups"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        backups.iter().any(|name| name.starts_with("c.org.") && name.ends_with(".bak")),
        "expected a c.org backup, found {backups:?}"
    );
}

// === Scenario 4: orphan links become proposals, not writes ===

fn four_orphans() -> Vec<(&'static str, String)> {
    vec![
        ("a.org", note_file("a-1", "Alpha", &[], "About soil health.\n", &[])),
        ("b.org", note_file("b-1", "Beta", &[], "About composting.\n", &[])),
        ("c.org", note_file("c-1", "Gamma", &[], "About mulching.\n", &[])),
        ("d.org", note_file("d-1", "Delta", &[], "About watering.\n", &[])),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn orphan_suggestions_plan_safe_before_proposal() {
    let files_owned = four_orphans();
    let files: Vec<(&str, &str)> = files_owned.iter().map(|(p, c)| (*p, c.as_str())).collect();
    let h = harness(&files);
    h.semantic.set_search_hits(hits_for(&[
        ("a-1", "Alpha"),
        ("b-1", "Beta"),
        ("c-1", "Gamma"),
        ("d-1", "Delta"),
    ]));

    let state = h.engine.scan().await.unwrap();
    let plan = h.engine.plan(&state).await;
    let names: Vec<&str> = plan.steps.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(names, vec!["ComputeEmbeddings", "SuggestLinks"]);
    assert_eq!(plan.steps[0].safety, Safety::Safe);
    assert_eq!(plan.steps[1].safety, Safety::Proposal);

    // Safe-only execution leaves the orphans' bodies untouched and
    // creates no proposals.
    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions { safe_only: true })
        .await;
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped, 1);
    for (path, _) in &files {
        let content = std::fs::read_to_string(h.garden.path().join(path)).unwrap();
        assert!(!content.contains("** Related"));
    }
    assert!(h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap()
        .is_empty());

    // The follow-up full cycle emits exactly one Pending proposal per
    // orphan, each carrying a diff that adds a links section.
    let (_, result) = h.engine.cycle(ExecuteOptions::default()).await.unwrap();
    assert_eq!(result.failed, 0);
    let pending = h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap();
    assert_eq!(pending.len(), 4);
    for proposal in &pending {
        assert_eq!(proposal.action_name, "SuggestLinks");
        let full = h.engine.get_proposal(&proposal.id).unwrap().unwrap();
        assert!(full.patch.contains("+** Related"));
        assert!(full.patch.contains("+- [[id:"));
    }
}

// === Scenario 5: duplicate-proposal guard ===

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_the_cycle_creates_no_duplicate_proposals() {
    let files_owned = four_orphans();
    let files: Vec<(&str, &str)> = files_owned.iter().map(|(p, c)| (*p, c.as_str())).collect();
    let h = harness(&files);
    h.semantic.set_search_hits(hits_for(&[
        ("a-1", "Alpha"),
        ("b-1", "Beta"),
        ("c-1", "Gamma"),
        ("d-1", "Delta"),
    ]));

    h.engine.cycle(ExecuteOptions::default()).await.unwrap();
    let first = h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap()
        .len();
    assert_eq!(first, 4);

    h.engine.cycle(ExecuteOptions::default()).await.unwrap();
    let second = h
        .engine
        .list_proposals(Some(ProposalStatus::Pending))
        .unwrap()
        .len();
    assert_eq!(second, first);
}

// === Scenario 6: service timeout is non-fatal ===

#[tokio::test(flavor = "multi_thread")]
async fn timeout_fails_one_action_and_skips_the_dependent() {
    let files_owned = four_orphans();
    let files: Vec<(&str, &str)> = files_owned.iter().map(|(p, c)| (*p, c.as_str())).collect();
    let h = harness(&files);

    let state = h.engine.scan().await.unwrap();
    let plan = h.engine.plan(&state).await;
    assert!(plan.steps.iter().any(|s| s.action == "ComputeEmbeddings"));

    // The service is reachable but every call now times out.
    h.semantic.set_failure(Some(ServiceFailure::Timeout));
    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions::default())
        .await;

    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 1);

    let embed = result
        .records
        .iter()
        .find(|r| r.action == "ComputeEmbeddings")
        .unwrap();
    assert!(!embed.success);
    assert!(embed.message.contains("timeout"));

    let links = result
        .records
        .iter()
        .find(|r| r.action == "SuggestLinks")
        .unwrap();
    assert!(links.skipped);
    assert_eq!(links.message, SKIP_PRECONDITIONS);
}

// === Exclusions: no_agents and source notes ===

#[tokio::test(flavor = "multi_thread")]
async fn disabled_and_source_notes_are_never_rewritten() {
    // Both notes lack properties blocks entirely, so tag parsing cannot
    // help; mark them through the body-less TAGS form instead.
    let source = ":PROPERTIES:\n:TAGS: :source:\n:END:\nCaptured text, no title.\n";
    let disabled = ":PROPERTIES:\n:TAGS: :no_agents:\n:END:\nPrivate text, no title.\n";
    let h = harness(&[
        ("source.org", source),
        ("private.org", disabled),
        ("fixme.org", "* Fixable\nBody.\n"),
    ]);

    let (_, result) = h.engine.cycle(ExecuteOptions::default()).await.unwrap();
    assert!(result
        .records
        .iter()
        .any(|r| r.action == "NormalizeFormatting" && r.success));

    assert_eq!(
        std::fs::read_to_string(h.garden.path().join("source.org")).unwrap(),
        source
    );
    assert_eq!(
        std::fs::read_to_string(h.garden.path().join("private.org")).unwrap(),
        disabled
    );
    // The eligible note did get normalized.
    let fixed = std::fs::read_to_string(h.garden.path().join("fixme.org")).unwrap();
    assert!(fixed.contains(":ID:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_notes_do_not_drag_the_mean_down() {
    let h = harness_with(
        &[
            ("good.org", &note_file("g-1", "Good", &[], "Body.\n", &["h-1"])),
            ("hub.org", &note_file("h-1", "Hub", &[], "Body [[id:g-1]].\n", &[])),
            (
                "junk.org",
                ":PROPERTIES:\n:TAGS: :no_agents:\n:END:\nNo title here.\n",
            ),
        ],
        |b| b,
    );
    let state = h.engine.scan().await.unwrap();
    let disabled = state.notes.values().find(|m| m.agents_disabled).unwrap();
    assert!(disabled.health_score < 40.0);

    let mean_without_disabled: f64 = state
        .notes
        .values()
        .filter(|m| !m.agents_disabled)
        .map(|m| m.health_score)
        .sum::<f64>()
        / 2.0;
    assert!((state.mean_health_score - mean_without_disabled).abs() < 1e-9);
}
