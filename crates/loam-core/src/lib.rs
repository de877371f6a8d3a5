//! Core types and contracts for the Loam garden engine.
//!
//! This crate defines the domain model (notes, derived metadata, corpus
//! state, proposals, stored embeddings), the health scoring model, the
//! closed error enum, and the traits through which the engine consumes
//! external collaborators (semantic search, chat, embedding cache).
//!
//! Leaf crates implement the traits; higher-level crates inject the
//! implementations. Core never depends on a concrete gateway.

pub mod embedding;
pub mod error;
pub mod health;
pub mod metadata;
pub mod note;
pub mod proposal;
pub mod traits;

#[cfg(feature = "test-utils")]
pub mod test_support;

pub use embedding::StoredEmbedding;
pub use error::{LoamError, Result};
pub use health::HealthWeights;
pub use metadata::{
    CorpusState, HubCandidate, ImplicitCategory, MergeGroup, NoteMetadata, OrphanCluster,
    StructureAnalysis,
};
pub use note::{Note, NoteType};
pub use proposal::{Proposal, ProposalStats, ProposalStatus};
pub use traits::{
    ChatService, ContextualHit, EmbeddingCache, JournalEntry, SearchHit, SemanticService,
    ServiceKind,
};
