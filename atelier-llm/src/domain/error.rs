//! LLM-specific error types
//!
//! Typed errors for provider operations. The router and orchestrator branch
//! on these to decide between retry, fallback, and surfacing.

use std::fmt;

/// LLM operation error
#[derive(Debug, Clone)]
pub enum LlmError {
    /// Authentication failed (invalid API key, expired token)
    Authentication(String),

    /// Rate limited by the provider
    RateLimited {
        /// Seconds to wait before retrying (if provided)
        retry_after: Option<u64>,
        message: String,
    },

    /// Request was invalid (bad parameters, too many tokens)
    InvalidRequest(String),

    /// Network/connection error
    Network(String),

    /// Request timed out
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// Service temporarily unavailable (5xx)
    ServiceUnavailable(String),

    /// Provider returned an unexpected response body
    InvalidResponse(String),

    /// Credentials missing or provider misconfigured
    Configuration(String),

    /// No provider satisfies the request (task unsupported, vision required,
    /// or every candidate circuit-broken)
    NoProvider(String),

    /// Generic/unknown error
    Other(String),
}

impl LlmError {
    /// Check if this error is retryable on the same or another provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Network(_)
                | LlmError::Timeout { .. }
                | LlmError::ServiceUnavailable(_)
        )
    }

    /// Get retry-after duration if available
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            LlmError::RateLimited { retry_after, .. } => {
                retry_after.map(std::time::Duration::from_secs)
            }
            _ => None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            retry_after: None,
            message: message.into(),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            LlmError::RateLimited {
                message,
                retry_after,
            } => {
                if let Some(secs) = retry_after {
                    write!(f, "Rate limited: {} (retry after {}s)", message, secs)
                } else {
                    write!(f, "Rate limited: {}", message)
                }
            }
            LlmError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            LlmError::Network(msg) => write!(f, "Network error: {}", msg),
            LlmError::Timeout { seconds } => write!(f, "Request timed out after {}s", seconds),
            LlmError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            LlmError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            LlmError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            LlmError::NoProvider(msg) => write!(f, "No provider available: {}", msg),
            LlmError::Other(msg) => write!(f, "LLM error: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout { seconds: 0 }
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(format!("JSON parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LlmError::Authentication("invalid key".to_string());
        assert_eq!(err.to_string(), "Authentication failed: invalid key");

        let err = LlmError::RateLimited {
            retry_after: Some(30),
            message: "too many requests".to_string(),
        };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::network("connection reset").is_retryable());
        assert!(LlmError::timeout(30).is_retryable());
        assert!(LlmError::rate_limited("quota exceeded").is_retryable());

        assert!(!LlmError::auth("bad key").is_retryable());
        assert!(!LlmError::InvalidRequest("bad params".to_string()).is_retryable());
        assert!(!LlmError::InvalidResponse("not json".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let err = LlmError::RateLimited {
            retry_after: Some(60),
            message: "quota".to_string(),
        };
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(60)));

        assert_eq!(LlmError::network("failed").retry_after(), None);
    }
}
