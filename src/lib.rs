//! Atelier - AI-driven application builder
//!
//! This is the embeddable facade over the generation engine: collaborator
//! layers (HTTP API, UI) link against [`AppService`] and its contracts.
//! For the individual subsystems see the member crates.

mod app;

pub use app::{AppService, ProjectStatus};
pub use atelier_core::{Config, ProjectId};

// Re-export for convenience
pub use atelier_core;
pub use atelier_engine;
pub use atelier_llm;
pub use atelier_memory;
pub use atelier_patch;
pub use atelier_preview;
pub use atelier_validate;
pub use atelier_vfs;
