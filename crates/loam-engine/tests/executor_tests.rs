//! Executor contract: sequential state threading, skip/fail/continue,
//! and action idempotence.

mod common;

use std::sync::Arc;

use common::harness;

use loam_config::LoamConfigBuilder;
use loam_core::test_support::fixtures::{create_garden_with_files, note_file};
use loam_core::test_support::mocks::{MemoryEmbeddingCache, MockSemanticService};
use loam_engine::actions::NormalizeFormatting;
use loam_engine::{Action, ActionContext, ExecuteOptions, PatchStore, Scanner};

fn bare_context(root: &std::path::Path) -> ActionContext {
    let config = Arc::new(
        LoamConfigBuilder::new()
            .notes_root(root)
            .embed_model("mock-embed")
            .build(),
    );
    ActionContext {
        scanner: Arc::new(Scanner::new(Arc::clone(&config))),
        patches: Arc::new(PatchStore::open(&config.internal_root()).unwrap()),
        semantic: None,
        chat: None,
        cache: Arc::new(MemoryEmbeddingCache::new()),
        config,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn actions_are_idempotent_no_ops_when_done() {
    // Nothing needs formatting here, so execute must answer "no-op".
    let garden = create_garden_with_files(&[(
        "a.org",
        &note_file("a-1", "Alpha", &[], "Body.\n", &[]),
    )])
    .unwrap();
    let ctx = bare_context(garden.path());
    let state = ctx.scanner.scan().await.unwrap();

    let action = NormalizeFormatting::new(ctx);
    let outcome = action.execute(&state).await.unwrap();
    assert!(outcome.message.starts_with("no-op"));
    assert_eq!(outcome.state, state);
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_actions_change_state_or_say_no_op() {
    let garden = create_garden_with_files(&[("broken.org", "* Broken\nBody.\n")]).unwrap();
    let ctx = bare_context(garden.path());
    let state = ctx.scanner.scan().await.unwrap();

    let action = NormalizeFormatting::new(ctx);
    let outcome = action.execute(&state).await.unwrap();
    assert!(
        outcome.state != state || outcome.message.starts_with("no-op"),
        "Ok outcome must progress the state or declare a no-op"
    );
    assert_ne!(outcome.state, state);
    assert_eq!(outcome.state.notes_with_format_issues, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn state_threads_through_successive_actions() {
    let h = harness(&[
        ("broken.org", "* Broken\nBody.\n"),
        ("a.org", &note_file("a-1", "Alpha", &[], "Body.\n", &[])),
    ]);
    let state = h.engine.scan().await.unwrap();
    assert_eq!(state.notes_with_format_issues, 1);
    assert_eq!(state.notes_with_embeddings, 0);

    let plan = h.engine.plan(&state).await;
    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions::default())
        .await;

    // NormalizeFormatting ran before ComputeEmbeddings and the final
    // state reflects both.
    assert_eq!(result.state.notes_with_format_issues, 0);
    assert_eq!(result.state.notes_with_embeddings, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_plan_entries_are_recorded_as_failures() {
    let h = harness(&[("a.org", &note_file("a-1", "Alpha", &[], "Body.\n", &[]))]);
    let state = h.engine.scan().await.unwrap();

    let mut plan = h.engine.plan(&state).await;
    plan.steps[0].action = "NotARealAction".to_string();

    let result = h
        .engine
        .execute(&plan, state, ExecuteOptions::default())
        .await;
    let record = result
        .records
        .iter()
        .find(|r| r.action == "NotARealAction")
        .unwrap();
    assert!(!record.success);
    assert!(!record.skipped);
    assert!(record.message.contains("catalog"));
}

#[tokio::test(flavor = "multi_thread")]
async fn journal_summary_is_posted_when_enabled() {
    let h = common::harness_with(
        &[("broken.org", "* Broken\nBody.\n")],
        |b| b,
    );
    // journal_summaries is off by default; flip it through a fresh
    // engine sharing the same garden and mocks.
    let config = LoamConfigBuilder::new()
        .notes_root(h.garden.path())
        .embed_model("mock-embed")
        .build();
    let mut config = config;
    config.journal_summaries = true;
    let semantic = Arc::new(MockSemanticService::with_garden_root(h.garden.path()));
    let engine = loam_engine::Engine::new(
        config,
        Some(semantic.clone() as Arc<dyn loam_core::SemanticService>),
        None,
        Arc::new(MemoryEmbeddingCache::new()) as Arc<dyn loam_core::EmbeddingCache>,
    )
    .unwrap();

    engine.cycle(ExecuteOptions::default()).await.unwrap();

    let journal = semantic.journal.lock().unwrap();
    assert_eq!(journal.len(), 1);
    assert!(journal[0]
        .points
        .iter()
        .any(|p| p.starts_with("NormalizeFormatting:")));
}
