//! Contracts for the external collaborators the engine consumes.
//!
//! Core defines the traits; gateway crates implement them and the engine
//! receives them as `Arc<dyn ...>`. Every call may suspend and carries
//! the caller's timeout policy internally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::StoredEmbedding;
use crate::error::Result;

/// Which external service an action depends on, used by the planner's
/// reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    Semantic,
    Chat,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Semantic => "semantic",
            ServiceKind::Chat => "chat",
        }
    }
}

/// One semantic search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file: String,
    pub title: String,
    pub similarity: f32,
    pub node_id: String,
}

/// One contextual search hit with surrounding content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualHit {
    pub file: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub backlinks: Vec<String>,
    pub node_id: String,
}

/// A structured entry for the daily journal collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub points: Vec<String>,
    pub next_steps: Vec<String>,
    pub tags: Vec<String>,
}

/// The remote semantic-search service (JSON-RPC over HTTP).
#[async_trait]
pub trait SemanticService: Send + Sync {
    async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>>;

    async fn contextual_search(&self, query: &str, limit: usize) -> Result<Vec<ContextualHit>>;

    /// Ask the service to (re)compute embeddings. Returns the number of
    /// notes it reports having embedded.
    async fn generate_embeddings(&self, force: bool) -> Result<usize>;

    async fn add_daily_entry(&self, entry: &JournalEntry) -> Result<()>;

    /// Cheap reachability probe, done once per planning cycle.
    async fn is_available(&self) -> bool;
}

/// The remote chat service: one (system, user) pair in, one completion
/// out. The engine templates prompts internally and never exposes a
/// generic chat surface.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    async fn is_available(&self) -> bool;
}

/// Local persistent store of embeddings by note id.
#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    async fn get(&self, note_id: &str) -> Result<Option<StoredEmbedding>>;

    /// Replace-on-insert semantics.
    async fn put(&self, embedding: &StoredEmbedding) -> Result<()>;

    async fn remove(&self, note_id: &str) -> Result<()>;

    /// Freshness check per the policy on [`StoredEmbedding::is_fresh`].
    async fn is_fresh(
        &self,
        note_id: &str,
        model: &str,
        chunk_hash: &str,
        max_age_days: i64,
    ) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}
