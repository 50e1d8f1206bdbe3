//! OpenAI-compatible provider adapter
//!
//! One adapter covers every chat-completions backend speaking the OpenAI
//! wire shape: Groq, Cerebras, OpenRouter, and local Ollama servers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::domain::{
    CompletionRequest, CompletionResponse, LlmError, LlmProvider, ProviderCapabilities,
    ProviderInfo, Usage,
};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible chat-completions adapter
pub struct OpenAiCompatProvider {
    client: Client,
    id: &'static str,
    display_name: &'static str,
    base_url: String,
    api_key: Option<String>,
    model: String,
    capabilities: ProviderCapabilities,
}

impl OpenAiCompatProvider {
    fn build_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client with custom timeout, using default client");
                Client::new()
            })
    }

    fn new(
        id: &'static str,
        display_name: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        capabilities: ProviderCapabilities,
    ) -> Self {
        Self {
            client: Self::build_client(),
            id,
            display_name,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            capabilities,
        }
    }

    /// Groq: fast code-generation models
    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "groq",
            "Groq",
            "https://api.groq.com/openai/v1",
            Some(api_key.into()),
            model,
            ProviderCapabilities::text_only(131_072, 8192),
        )
    }

    /// Cerebras: reasoning specialist
    pub fn cerebras(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "cerebras",
            "Cerebras",
            "https://api.cerebras.ai/v1",
            Some(api_key.into()),
            model,
            ProviderCapabilities::text_only(65_536, 8192),
        )
    }

    /// OpenRouter: multi-model fallback
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "openrouter",
            "OpenRouter",
            "https://openrouter.ai/api/v1",
            Some(api_key.into()),
            model,
            ProviderCapabilities::text_only(131_072, 8192),
        )
    }

    /// Local Ollama server (no credentials)
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self::new(
            "ollama",
            "Ollama",
            format!("{}/v1", base),
            None,
            model,
            ProviderCapabilities::text_only(32_768, 8192),
        )
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn to_wire_request(&self, request: &CompletionRequest) -> WireRequest {
        let messages = request
            .messages
            .iter()
            .map(|msg| WireMessage {
                role: msg.role.as_str().to_string(),
                content: msg.text(),
            })
            .collect();

        WireRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn parse_wire_response(&self, response: WireResponse) -> CompletionResponse {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            model: response.model,
            text,
            usage,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id,
            name: self.display_name,
            capabilities: self.capabilities.clone(),
        }
    }

    fn is_available(&self) -> bool {
        // Ollama carries no key; a configured base URL is its credential.
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(true)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if request.has_image() && !self.capabilities.vision {
            return Err(LlmError::InvalidRequest(format!(
                "{} does not accept image input",
                self.display_name
            )));
        }

        let url = self.chat_url();
        let wire_request = self.to_wire_request(&request);

        debug!(provider = self.id, model = %wire_request.model, "Sending chat completion request");

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.json(&wire_request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(LlmError::rate_limited(text));
            } else if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LlmError::auth(text));
            } else if status.as_u16() >= 500 {
                return Err(LlmError::ServiceUnavailable(text));
            }

            error!(provider = self.id, status = %status, "API error: {}", text);
            return Err(LlmError::InvalidRequest(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let wire_response: WireResponse = response.json().await?;
        Ok(self.parse_wire_response(wire_response))
    }
}

// === Wire types ===

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: String,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
