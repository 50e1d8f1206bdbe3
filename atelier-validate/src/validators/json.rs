//! JSON structural validator

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::domain::{ValidationIssue, ValidationResult};
use crate::validators::{applicable_files, Validator};

/// Structural check over every `.json` artifact (package manifests,
/// configuration files).
pub struct JsonValidator;

#[async_trait]
impl Validator for JsonValidator {
    fn name(&self) -> &'static str {
        "json-structure"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let mut issues = Vec::new();

        for (path, content) in applicable_files(files, self.extensions()) {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
                issues.push(
                    ValidationIssue::error(self.name(), path, e.to_string())
                        .at(e.line() as u32, e.column() as u32)
                        .with_rule("invalid-json"),
                );
            }
        }

        ValidationResult {
            validator: self.name().to_string(),
            passed: issues.is_empty(),
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }
}
