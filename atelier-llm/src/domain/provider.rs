//! LLM Provider trait and related types
//!
//! Core abstraction over text-completion backends. Adapters implement this
//! trait; the router selects among them per task.

use async_trait::async_trait;

use crate::domain::error::LlmError;
use crate::domain::messages::{CompletionRequest, CompletionResponse};

/// Provider capability flags
#[derive(Debug, Clone, Default)]
pub struct ProviderCapabilities {
    /// Supports streaming responses
    pub streaming: bool,
    /// Supports vision/image input
    pub vision: bool,
    /// Maximum context window size (tokens)
    pub max_context_tokens: u32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
}

impl ProviderCapabilities {
    /// Capabilities for a text-only model
    pub fn text_only(max_context: u32, max_output: u32) -> Self {
        Self {
            streaming: true,
            vision: false,
            max_context_tokens: max_context,
            max_output_tokens: max_output,
        }
    }

    /// Capabilities for a vision-capable model
    pub fn with_vision(max_context: u32, max_output: u32) -> Self {
        Self {
            streaming: true,
            vision: true,
            max_context_tokens: max_context,
            max_output_tokens: max_output,
        }
    }
}

/// Metadata about a provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider identifier (e.g., "gemini", "groq")
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    pub capabilities: ProviderCapabilities,
}

/// Core trait for LLM providers
///
/// Object-safe; used with dynamic dispatch via `Arc<dyn LlmProvider>`.
/// Adapters map transport failures onto [`LlmError`] and do not retry
/// internally; retry and fallback policy belongs to the router's callers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider metadata
    fn info(&self) -> ProviderInfo;

    /// Whether credentials are present and the adapter can accept requests.
    ///
    /// Circuit-breaker state is layered on top of this by the router.
    fn is_available(&self) -> bool;

    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Get the default model for this provider
    fn default_model(&self) -> &str;
}
