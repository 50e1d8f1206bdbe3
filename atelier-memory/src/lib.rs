//! Atelier Memory - per-project vector store
//!
//! Each project accumulates a memory of generated code, design decisions,
//! user preferences, and constraints. Records carry a 384-dimension
//! embedding from a bundled deterministic hashed-token encoder; searches
//! rank by cosine similarity. Collections persist as one JSON file per
//! project and are deleted with the project.

pub mod context;
pub mod domain;
pub mod embedding;
pub mod registry;
pub mod store;

pub use domain::{ConstraintSeverity, MemoryError, MemoryRecord, SearchHit};
pub use embedding::{cosine_similarity, embed, EMBEDDING_DIM};
pub use registry::MemoryRegistry;
pub use store::ProjectMemory;
