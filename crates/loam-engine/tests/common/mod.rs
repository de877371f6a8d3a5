//! Shared harness for engine integration tests.

use std::sync::Arc;

use tempfile::TempDir;

use loam_config::{LoamConfig, LoamConfigBuilder};
use loam_core::test_support::fixtures::create_garden_with_files;
use loam_core::test_support::mocks::{MemoryEmbeddingCache, MockChatService, MockSemanticService};
use loam_core::SearchHit;
use loam_engine::Engine;

pub struct Harness {
    pub garden: TempDir,
    pub engine: Engine,
    pub semantic: Arc<MockSemanticService>,
    pub chat: Arc<MockChatService>,
    pub cache: Arc<MemoryEmbeddingCache>,
}

/// Engine over a temp garden with mock collaborators. The semantic mock
/// mirrors the real service: `generate_embeddings` writes embedding
/// properties into the note files.
pub fn harness(files: &[(&str, &str)]) -> Harness {
    harness_with(files, |builder| builder)
}

pub fn harness_with(
    files: &[(&str, &str)],
    configure: impl FnOnce(LoamConfigBuilder) -> LoamConfigBuilder,
) -> Harness {
    let garden = create_garden_with_files(files).expect("fixture garden");
    let semantic = Arc::new(MockSemanticService::with_garden_root(garden.path()));
    let chat = Arc::new(MockChatService::new());
    let cache = Arc::new(MemoryEmbeddingCache::new());

    let config: LoamConfig = configure(
        LoamConfigBuilder::new()
            .notes_root(garden.path())
            .embed_model("mock-embed"),
    )
    .build();
    let engine = Engine::new(
        config,
        Some(semantic.clone() as Arc<dyn loam_core::SemanticService>),
        Some(chat.clone() as Arc<dyn loam_core::ChatService>),
        cache.clone() as Arc<dyn loam_core::EmbeddingCache>,
    )
    .expect("engine");

    Harness {
        garden,
        engine,
        semantic,
        chat,
        cache,
    }
}

/// Search hits pointing at the given notes, all above the default
/// similarity threshold.
pub fn hits_for(notes: &[(&str, &str)]) -> Vec<SearchHit> {
    notes
        .iter()
        .map(|(id, title)| SearchHit {
            file: format!("{id}.org"),
            title: title.to_string(),
            similarity: 0.9,
            node_id: id.to_string(),
        })
        .collect()
}
