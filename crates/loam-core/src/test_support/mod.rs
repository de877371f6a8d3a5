//! Shared testing utilities for Loam components.
//!
//! These helpers create temporary gardens with predictable content so
//! tests across crates can exercise scanning, planning and execution
//! without duplicating setup logic.

pub mod fixtures;
pub mod mocks;

pub use fixtures::{create_garden_with_files, note_file, note_file_with_embedding};
pub use mocks::{MemoryEmbeddingCache, MockChatService, MockSemanticService, ServiceFailure};
