//! Configuration validation module

use crate::config::{Config, EngineConfig, MemoryConfig, PreviewConfig, ValidationConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Preview configuration error: {message}")]
    Preview { message: String },

    #[error("Memory configuration error: {message}")]
    Memory { message: String },

    #[error("Engine configuration error: {message}")]
    Engine { message: String },

    #[error("Validation configuration error: {message}")]
    Validation { message: String },
}

impl ValidationError {
    pub fn preview(message: impl Into<String>) -> Self {
        Self::Preview {
            message: message.into(),
        }
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl Validate for PreviewConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.port_range_start == 0 {
            return Err(ValidationError::preview("Port range start must be non-zero"));
        }
        if self.port_range_start >= self.port_range_end {
            return Err(ValidationError::preview(format!(
                "Port range start {} must be below end {}",
                self.port_range_start, self.port_range_end
            )));
        }
        if self.max_previews == 0 {
            return Err(ValidationError::preview("max_previews must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::preview("poll_interval_ms must be non-zero"));
        }
        if !(self.cpus > 0.0) {
            return Err(ValidationError::preview("cpus must be positive"));
        }
        Ok(())
    }
}

impl Validate for MemoryConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.context_char_budget == 0 {
            return Err(ValidationError::memory(
                "context_char_budget must be non-zero",
            ));
        }
        Ok(())
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_repair_attempts == 0 {
            return Err(ValidationError::engine(
                "max_repair_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Validate for ValidationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.validator_timeout_seconds == 0 || self.test_timeout_seconds == 0 {
            return Err(ValidationError::validation(
                "validator and test timeouts must be non-zero",
            ));
        }
        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.preview.validate()?;
        self.memory.validate()?;
        self.engine.validate()?;
        self.validation.validate()?;
        Ok(())
    }
}
