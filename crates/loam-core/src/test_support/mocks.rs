//! Deterministic mock implementations of the collaborator traits.
//!
//! The mocks are in-memory, track their calls for assertions, and
//! support error injection so tests can exercise the non-fatal failure
//! paths without a network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::embedding::StoredEmbedding;
use crate::error::{LoamError, Result};
use crate::note::{PROP_EMBEDDING, PROP_EMBED_AT, PROP_EMBED_MODEL};
use crate::traits::{
    ChatService, ContextualHit, EmbeddingCache, JournalEntry, SearchHit, SemanticService,
};

/// Failure to inject into the next calls of a mock service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceFailure {
    Unavailable,
    Timeout,
    Error(i64, String),
}

impl ServiceFailure {
    fn to_error(&self, service: &str) -> LoamError {
        match self {
            ServiceFailure::Unavailable => LoamError::ServiceUnavailable {
                service: service.to_string(),
            },
            ServiceFailure::Timeout => LoamError::ServiceTimeout {
                service: service.to_string(),
            },
            ServiceFailure::Error(code, message) => LoamError::ServiceError {
                service: service.to_string(),
                code: *code,
                message: message.clone(),
            },
        }
    }
}

/// Mock of the remote semantic-search service.
///
/// When created with [`MockSemanticService::with_garden_root`], the mock
/// mirrors the real service's observable behavior: `generate_embeddings`
/// writes `EMBEDDING` / `EMBED_MODEL` / `EMBED_AT` properties into every
/// note file that lacks them, so a rescan sees the notes as embedded.
#[derive(Default)]
pub struct MockSemanticService {
    garden_root: Option<PathBuf>,
    hits: Mutex<Vec<SearchHit>>,
    contextual: Mutex<Vec<ContextualHit>>,
    failure: Mutex<Option<ServiceFailure>>,
    available: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
    pub journal: Mutex<Vec<JournalEntry>>,
}

impl MockSemanticService {
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn with_garden_root(root: impl Into<PathBuf>) -> Self {
        Self {
            garden_root: Some(root.into()),
            available: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn set_search_hits(&self, hits: Vec<SearchHit>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn set_contextual_hits(&self, hits: Vec<ContextualHit>) {
        *self.contextual.lock().unwrap() = hits;
    }

    /// Inject a failure returned by every subsequent call.
    pub fn set_failure(&self, failure: Option<ServiceFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Control the reachability probe independently of call failures.
    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }

    fn check_failure(&self) -> Result<()> {
        if let Some(failure) = self.failure.lock().unwrap().as_ref() {
            return Err(failure.to_error("semantic"));
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Deterministic per-file pseudo-vector so similarity math has
    /// something to chew on without a real model.
    fn pseudo_vector(name: &str) -> Vec<f32> {
        let seed: u32 = name.bytes().map(u32::from).sum();
        vec![
            (seed % 97) as f32 / 97.0,
            ((seed / 3) % 89) as f32 / 89.0,
            ((seed / 7) % 83) as f32 / 83.0,
        ]
    }

    fn embed_files_under(root: &Path) -> std::io::Result<usize> {
        let mut embedded = 0;
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("org") {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };
                if content.contains(&format!(":{PROP_EMBEDDING}:")) {
                    continue;
                }
                // The real service honors suppression tags: source notes
                // are byte-immutable, no_agents notes are untouchable.
                if content.contains(":source:") || content.contains(":no_agents:") {
                    continue;
                }
                let Some(end) = content.find("\n:END:") else {
                    continue;
                };
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("note")
                    .to_string();
                let vector: Vec<String> = Self::pseudo_vector(&name)
                    .iter()
                    .map(|v| format!("{v}"))
                    .collect();
                let stamp = Utc::now().format("[%Y-%m-%d %a %H:%M]");
                let inserted = format!(
                    "\n:{PROP_EMBEDDING}: [{}]\n:{PROP_EMBED_MODEL}: mock-embed\n:{PROP_EMBED_AT}: {stamp}",
                    vector.join(", ")
                );
                let mut updated = content.clone();
                updated.insert_str(end, &inserted);
                std::fs::write(&path, updated)?;
                embedded += 1;
            }
        }
        Ok(embedded)
    }
}

#[async_trait]
impl SemanticService for MockSemanticService {
    async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        _threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        self.record(format!("semantic_search:{query}"));
        self.check_failure()?;
        let hits = self.hits.lock().unwrap();
        Ok(hits.iter().take(limit).cloned().collect())
    }

    async fn contextual_search(&self, query: &str, limit: usize) -> Result<Vec<ContextualHit>> {
        self.record(format!("contextual_search:{query}"));
        self.check_failure()?;
        let hits = self.contextual.lock().unwrap();
        Ok(hits.iter().take(limit).cloned().collect())
    }

    async fn generate_embeddings(&self, force: bool) -> Result<usize> {
        self.record(format!("generate_embeddings:force={force}"));
        self.check_failure()?;
        match &self.garden_root {
            Some(root) => Self::embed_files_under(root)
                .map_err(|e| LoamError::io(root.clone(), e)),
            None => Ok(0),
        }
    }

    async fn add_daily_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.record(format!("add_daily_entry:{}", entry.title));
        self.check_failure()?;
        self.journal.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }
}

/// Mock chat service returning a canned completion.
pub struct MockChatService {
    reply: Mutex<String>,
    failure: Mutex<Option<ServiceFailure>>,
    available: Mutex<bool>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl Default for MockChatService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatService {
    pub fn new() -> Self {
        Self {
            reply: Mutex::new("These notes cover closely related material.".to_string()),
            failure: Mutex::new(None),
            available: Mutex::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.lock().unwrap() = reply.into();
    }

    pub fn set_failure(&self, failure: Option<ServiceFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }
}

#[async_trait]
impl ChatService for MockChatService {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        if let Some(failure) = self.failure.lock().unwrap().as_ref() {
            return Err(failure.to_error("chat"));
        }
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }
}

/// In-memory embedding cache with replace-on-insert semantics.
#[derive(Default)]
pub struct MemoryEmbeddingCache {
    records: Mutex<HashMap<String, StoredEmbedding>>,
}

impl MemoryEmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmbeddingCache for MemoryEmbeddingCache {
    async fn get(&self, note_id: &str) -> Result<Option<StoredEmbedding>> {
        Ok(self.records.lock().unwrap().get(note_id).cloned())
    }

    async fn put(&self, embedding: &StoredEmbedding) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(embedding.note_id.clone(), embedding.clone());
        Ok(())
    }

    async fn remove(&self, note_id: &str) -> Result<()> {
        self.records.lock().unwrap().remove(note_id);
        Ok(())
    }

    async fn is_fresh(
        &self,
        note_id: &str,
        model: &str,
        chunk_hash: &str,
        max_age_days: i64,
    ) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(note_id)
            .map(|r| r.is_fresh(model, chunk_hash, max_age_days))
            .unwrap_or(false))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().unwrap().len())
    }
}
