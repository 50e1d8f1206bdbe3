//! Engine error taxonomy

use atelier_llm::LlmError;
use atelier_memory::MemoryError;
use atelier_vfs::VfsError;

/// Errors surfaced by the generate and edit pipelines.
///
/// Recoverable conditions (schema violations, patch downgrades, validation
/// failures inside the repair budget) are handled inside the pipelines and
/// never reach the caller as errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No provider can serve the Core task (fatal for generation) or the
    /// Edit task (re-raised to the caller)
    #[error("No provider available: {0}")]
    ProviderUnavailable(String),

    /// Upstream LLM failure that survived the router's fallback attempt
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("VFS operation failed: {0}")]
    Vfs(#[from] VfsError),

    #[error("Memory operation failed: {0}")]
    Memory(#[from] MemoryError),

    /// Edit requested against a project with no files
    #[error("Project {0} has no files to edit")]
    EmptyProject(String),
}
