//! Shared mock providers for pipeline tests

use async_trait::async_trait;
use std::collections::HashMap;

use atelier_llm::{
    CompletionRequest, CompletionResponse, LlmError, LlmProvider, ProviderCapabilities,
    ProviderInfo, Role, Usage,
};

/// Provider returning a fixed reply for every call
pub struct FixedProvider {
    reply: String,
}

impl FixedProvider {
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for FixedProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "fixed-mock",
            name: "Fixed Mock",
            capabilities: ProviderCapabilities::text_only(32_768, 8192),
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            model: "mock-model".to_string(),
            text: self.reply.clone(),
            usage: Usage::default(),
        })
    }
}

/// Provider that answers based on which agent's system prompt it sees.
///
/// Keyed by the role marker in the system message ("You are BACKEND" maps
/// to key "BACKEND"). Unknown roles get the `fallback` reply.
pub struct RoleScriptedProvider {
    replies: HashMap<&'static str, String>,
    fallback: String,
}

impl RoleScriptedProvider {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn on_role(mut self, role: &'static str, reply: impl Into<String>) -> Self {
        self.replies.insert(role, reply.into());
        self
    }

    fn reply_for(&self, request: &CompletionRequest) -> String {
        let system_text = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.text())
            .unwrap_or_default();

        for (role, reply) in &self.replies {
            if system_text.contains(&format!("You are {}", role)) {
                return reply.clone();
            }
        }
        self.fallback.clone()
    }
}

#[async_trait]
impl LlmProvider for RoleScriptedProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "scripted-mock",
            name: "Role Scripted Mock",
            capabilities: ProviderCapabilities::text_only(32_768, 8192),
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            model: "mock-model".to_string(),
            text: self.reply_for(&request),
            usage: Usage::default(),
        })
    }
}
