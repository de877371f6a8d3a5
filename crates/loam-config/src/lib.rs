//! Configuration for the Loam engine.
//!
//! The engine consumes a plain configuration bag; loading it from disk
//! is the caller's concern. `LoamConfig::load` covers the common case:
//! a TOML file with every field optional, falling back to defaults when
//! the file does not exist.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use loam_core::HealthWeights;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// All tunables the engine reads. Every field has a default so a bare
/// `[]` config file (or none at all) yields a working setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoamConfig {
    /// Root of the note corpus.
    pub notes_root: PathBuf,
    /// Embedding cache location. Defaults to `<internal_dir>/embeddings.db`
    /// under the notes root when unset.
    pub embeddings_db: Option<PathBuf>,
    /// Corpus mean health the planner drives toward.
    pub target_health: u32,
    pub embeddings_max_age_days: i64,
    pub stale_threshold_days: i64,
    pub acceptable_orphan_percentage: f64,
    pub health_weights: HealthWeights,
    pub semantic_service_base_url: Option<String>,
    pub chat_service_base_url: Option<String>,
    /// Model requested from the chat service.
    pub chat_model: String,
    pub request_timeout_ms: u64,
    pub max_chain_depth: usize,
    pub max_concurrent_external_calls: usize,

    /// File extension of note files, without the dot.
    pub note_extension: String,
    /// Name of the tool's own subdirectory under the notes root; paths
    /// containing it are excluded from scans.
    pub internal_dir: String,
    /// Embedding model considered current for freshness checks.
    pub embed_model: String,
    /// Minimum similarity for suggested links and orphan clustering.
    pub similarity_threshold: f32,
    /// Suggested links per note, at most.
    pub max_links_per_note: usize,
    /// Pairwise similarity at which notes become merge candidates.
    pub merge_similarity: f64,
    /// Split confidence a structure analysis must reach before SplitNote
    /// will propose anything.
    pub split_confidence_threshold: f64,
    /// Implicit categories smaller than this get no hub.
    pub min_category_size: usize,
    /// The hierarchy goal is opt-in.
    pub enable_hierarchy_goal: bool,
    /// Link count at which the health link component saturates.
    pub target_links: usize,
    /// Post an execution summary to the daily journal collaborator.
    pub journal_summaries: bool,
}

impl Default for LoamConfig {
    fn default() -> Self {
        Self {
            notes_root: PathBuf::from("."),
            embeddings_db: None,
            target_health: 85,
            embeddings_max_age_days: 30,
            stale_threshold_days: 90,
            acceptable_orphan_percentage: 10.0,
            health_weights: HealthWeights::default(),
            semantic_service_base_url: None,
            chat_service_base_url: None,
            chat_model: "llama3.2".to_string(),
            request_timeout_ms: 30_000,
            max_chain_depth: 8,
            max_concurrent_external_calls: 4,
            note_extension: "org".to_string(),
            internal_dir: ".loam".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            similarity_threshold: 0.78,
            max_links_per_note: 5,
            merge_similarity: 0.9,
            split_confidence_threshold: 0.7,
            min_category_size: 3,
            enable_hierarchy_goal: false,
            target_links: 3,
            journal_summaries: false,
        }
    }
}

impl LoamConfig {
    /// Load from a TOML file. A missing file falls back to defaults;
    /// unparseable TOML is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Root of the tool's internal state (backups, proposals, cache).
    pub fn internal_root(&self) -> PathBuf {
        self.notes_root.join(&self.internal_dir)
    }

    /// Resolved embedding cache path.
    pub fn embeddings_db_path(&self) -> PathBuf {
        self.embeddings_db
            .clone()
            .unwrap_or_else(|| self.internal_root().join("embeddings.db"))
    }
}

/// Builder for programmatically constructing configs in tests.
#[derive(Default)]
pub struct LoamConfigBuilder {
    config: LoamConfig,
}

impl LoamConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.notes_root = path.into();
        self
    }

    pub fn target_health(mut self, target: u32) -> Self {
        self.config.target_health = target;
        self
    }

    pub fn semantic_service(mut self, url: impl Into<String>) -> Self {
        self.config.semantic_service_base_url = Some(url.into());
        self
    }

    pub fn chat_service(mut self, url: impl Into<String>) -> Self {
        self.config.chat_service_base_url = Some(url.into());
        self
    }

    pub fn enable_hierarchy(mut self, enabled: bool) -> Self {
        self.config.enable_hierarchy_goal = enabled;
        self
    }

    pub fn embed_model(mut self, model: impl Into<String>) -> Self {
        self.config.embed_model = model.into();
        self
    }

    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.config.max_chain_depth = depth;
        self
    }

    pub fn build(self) -> LoamConfig {
        self.config
    }
}
