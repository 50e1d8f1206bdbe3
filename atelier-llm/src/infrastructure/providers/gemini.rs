//! Google AI Studio (Gemini) provider adapter
//!
//! The vision-capable adapter: image edits and image-guided generations
//! route here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::domain::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, LlmProvider,
    ProviderCapabilities, ProviderInfo, Role, Usage,
};

/// Google AI Studio (Gemini) provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client with custom timeout, using default client");
                Client::new()
            });

        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    /// Create with custom base URL (for testing or proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    /// Convert our request format to Gemini's format
    fn to_gemini_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let contents: Vec<GeminiContent> = request
            .messages
            .iter()
            .filter(|msg| msg.role != Role::System)
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "model",
                    _ => "user",
                };

                let parts: Vec<GeminiPart> = msg
                    .content
                    .iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => GeminiPart::Text { text: text.clone() },
                        ContentBlock::Image { data, media_type } => GeminiPart::InlineData {
                            inline_data: GeminiInlineData {
                                mime_type: media_type.clone(),
                                data: data.clone(),
                            },
                        },
                    })
                    .collect();

                GeminiContent {
                    role: role.to_string(),
                    parts,
                }
            })
            .collect();

        // Gemini carries the system prompt out of band
        let system_instruction = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| GeminiSystemInstruction {
                parts: vec![GeminiPart::Text { text: m.text() }],
            });

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            }),
        }
    }

    fn from_gemini_response(
        &self,
        response: GeminiResponse,
        model: &str,
    ) -> Result<CompletionResponse, LlmError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No candidates in response".to_string()))?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|part| match part {
                        GeminiPart::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            model: model.to_string(),
            text,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "gemini",
            name: "Google Gemini",
            capabilities: ProviderCapabilities::with_vision(1_048_576, 8192),
        }
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let url = self.build_url(&model);
        let gemini_request = self.to_gemini_request(&request);

        debug!(model = %model, "Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await?;

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

            error!(status = %status, "Gemini API error: {}", text);
            return Err(LlmError::InvalidRequest(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        self.from_gemini_response(gemini_response, &model)
    }
}

// === Gemini API Types ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;

    #[test]
    fn test_provider_info() {
        let provider = GeminiProvider::new("test-key", "gemini-2.0-flash");
        let info = provider.info();
        assert_eq!(info.id, "gemini");
        assert!(info.capabilities.vision);
    }

    #[test]
    fn test_availability_requires_key() {
        assert!(GeminiProvider::new("key", "m").is_available());
        assert!(!GeminiProvider::new("", "m").is_available());
    }

    #[test]
    fn test_build_url_embeds_key_and_model() {
        let provider = GeminiProvider::new("secret", "gemini-2.0-flash");
        let url = provider.build_url("gemini-2.0-flash");
        assert!(url.contains("models/gemini-2.0-flash:generateContent"));
        assert!(url.ends_with("key=secret"));
    }

    #[test]
    fn test_system_prompt_lifted_out_of_contents() {
        let provider = GeminiProvider::new("k", "m");
        let request = CompletionRequest::new()
            .with_system("be terse")
            .with_user("hello");
        let wire = provider.to_gemini_request(&request);
        assert_eq!(wire.contents.len(), 1);
        assert!(wire.system_instruction.is_some());
    }

    #[test]
    fn test_image_becomes_inline_data() {
        let provider = GeminiProvider::new("k", "m");
        let request = CompletionRequest::new().with_message(
            Message::user("match this design")
                .with_content(ContentBlock::image("aGVsbG8=", "image/png")),
        );
        let wire = provider.to_gemini_request(&request);
        let parts = &wire.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[1], GeminiPart::InlineData { .. }));
    }
}
