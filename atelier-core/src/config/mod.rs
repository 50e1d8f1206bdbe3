//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub router: RouterConfig,
    pub engine: EngineConfig,
    pub validation: ValidationConfig,
    pub memory: MemoryConfig,
    pub preview: PreviewConfig,
    pub storage: StorageConfig,
    /// Relaxes collaborator-layer CORS and enables verbose logs.
    pub debug: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (tracing EnvFilter syntax)
    pub level: String,
    /// Emit one-line compact output instead of the default formatter
    pub compact: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            compact: false,
        }
    }
}

/// LLM provider credentials and models
///
/// A provider is enabled when its credential is present (Ollama is enabled
/// when a base URL is configured).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub cerebras_api_key: Option<String>,
    pub cerebras_model: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
    /// Per-request completion cap passed to providers
    pub max_tokens: u32,
    /// Upper bound on a single provider call
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            groq_api_key: None,
            groq_model: "llama-3.3-70b-versatile".to_string(),
            cerebras_api_key: None,
            cerebras_model: "llama3.1-70b".to_string(),
            openrouter_api_key: None,
            openrouter_model: "meta-llama/llama-3.3-70b-instruct:free".to_string(),
            ollama_base_url: None,
            ollama_model: "qwen2.5-coder:14b".to_string(),
            max_tokens: 8192,
            request_timeout_seconds: 120,
        }
    }
}

/// Router health policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Consecutive failures before a provider is skipped
    pub circuit_breaker_threshold: u32,
    /// Seconds before a circuit-broken provider is re-probed
    pub reprobe_interval_seconds: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_threshold: 3,
            reprobe_interval_seconds: 60,
        }
    }
}

/// Orchestrator behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Auto-fix iterations before validation failures are downgraded to warnings
    pub max_repair_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 3,
        }
    }
}

/// Validation pipeline budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Per-validator timeout
    pub validator_timeout_seconds: u64,
    /// Total budget for the test-runner adjunct
    pub test_timeout_seconds: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validator_timeout_seconds: 60,
            test_timeout_seconds: 120,
        }
    }
}

/// Project memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding one collection file per project
    pub directory: PathBuf,
    /// Character cap applied to assembled generation context
    pub context_char_budget: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/memory"),
            context_char_budget: 4096,
        }
    }
}

/// Preview sandbox settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub port_range_start: u16,
    pub port_range_end: u16,
    /// Hard expiry for a preview environment, minutes
    pub expiry_minutes: i64,
    /// Idle expiry (no access), minutes
    pub idle_minutes: i64,
    /// Watcher poll interval, milliseconds
    pub poll_interval_ms: u64,
    /// Container build + health-probe budget, seconds
    pub build_timeout_seconds: u64,
    /// Memory cap for service containers, MiB
    pub memory_limit_mb: u64,
    /// Memory cap for static-site containers, MiB
    pub static_memory_limit_mb: u64,
    /// CPU share for service containers
    pub cpus: f64,
    /// Ceiling on simultaneously running previews
    pub max_previews: usize,
    /// Bridge network name for preview containers
    pub network: String,
    /// Directory for per-preview working trees
    pub directory: PathBuf,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            port_range_start: 8100,
            port_range_end: 8200,
            expiry_minutes: 60,
            idle_minutes: 30,
            poll_interval_ms: 2000,
            build_timeout_seconds: 120,
            memory_limit_mb: 512,
            static_memory_limit_mb: 256,
            cpus: 0.5,
            max_previews: 10,
            network: "atelier-preview".to_string(),
            directory: PathBuf::from("data/previews"),
        }
    }
}

/// On-disk layout for exports and snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Per-project working directories for export and test execution
    pub work_directory: PathBuf,
    /// VFS snapshot directory; `None` disables persistence across restarts
    pub vfs_snapshot_directory: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_directory: PathBuf::from("data/projects"),
            vfs_snapshot_directory: Some(PathBuf::from("data/vfs")),
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Sources, later wins: `config/default`, `config/{ENV}`, `config/local`,
    /// environment variables prefixed `ATELIER` with `__` separators.
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("ATELIER").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_preview_range() {
        let config = PreviewConfig::default();
        assert_eq!(config.port_range_start, 8100);
        assert_eq!(config.port_range_end, 8200);
        assert!(config.port_range_start < config.port_range_end);
    }

    #[test]
    fn test_llm_defaults_have_no_credentials() {
        let config = LlmConfig::default();
        assert!(config.gemini_api_key.is_none());
        assert!(config.ollama_base_url.is_none());
        assert_eq!(config.max_tokens, 8192);
    }
}
