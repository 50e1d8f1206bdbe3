//! Provider adapter implementations

pub mod gemini;
pub mod openai_compat;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use atelier_core::config::LlmConfig;

use crate::domain::LlmProvider;

/// Build every adapter the configuration enables, priority order preserved.
///
/// An adapter is constructed whenever its credential (or base URL, for
/// Ollama) is present; bare environment variables back up the config keys.
/// The router applies its own health policy on top.
pub fn providers_from_config(config: &LlmConfig) -> Vec<Arc<dyn LlmProvider>> {
    let credential = |configured: &Option<String>, env_key: &str| {
        configured
            .clone()
            .or_else(|| std::env::var(env_key).ok())
            .filter(|key| !key.is_empty())
    };

    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

    if let Some(key) = credential(&config.gemini_api_key, "GEMINI_API_KEY") {
        providers.push(Arc::new(GeminiProvider::new(key, &config.gemini_model)));
    }
    if let Some(key) = credential(&config.groq_api_key, "GROQ_API_KEY") {
        providers.push(Arc::new(OpenAiCompatProvider::groq(key, &config.groq_model)));
    }
    if let Some(key) = credential(&config.cerebras_api_key, "CEREBRAS_API_KEY") {
        providers.push(Arc::new(OpenAiCompatProvider::cerebras(
            key,
            &config.cerebras_model,
        )));
    }
    if let Some(key) = credential(&config.openrouter_api_key, "OPENROUTER_API_KEY") {
        providers.push(Arc::new(OpenAiCompatProvider::openrouter(
            key,
            &config.openrouter_model,
        )));
    }
    if let Some(base_url) = credential(&config.ollama_base_url, "OLLAMA_BASE_URL") {
        providers.push(Arc::new(OpenAiCompatProvider::ollama(
            base_url,
            &config.ollama_model,
        )));
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_yields_no_providers() {
        let config = LlmConfig::default();
        assert!(providers_from_config(&config).is_empty());
    }

    #[test]
    fn test_keys_enable_adapters() {
        let config = LlmConfig {
            groq_api_key: Some("k".into()),
            ollama_base_url: Some("http://localhost:11434".into()),
            ..Default::default()
        };
        let providers = providers_from_config(&config);
        assert_eq!(providers.len(), 2);
        assert!(providers.iter().all(|p| p.is_available()));
    }
}
