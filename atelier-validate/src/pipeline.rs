//! The validation pipeline
//!
//! Applicable validators run concurrently, each under a timeout; their
//! results merge into one report ordered by validator name, so the same
//! file set always yields the same verdict and issue multiset.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use atelier_core::config::ValidationConfig;

use crate::domain::{PipelineReport, ValidationResult};
use crate::validators::{
    matches_extension, BanditValidator, BlackValidator, EslintValidator, JsonValidator,
    JsSyntaxValidator, MypyValidator, PrettierValidator, PythonSyntaxValidator, TscValidator,
    Validator,
};

/// Registry of validators with concurrent execution
pub struct ValidationPipeline {
    validators: Vec<Arc<dyn Validator>>,
    validator_timeout: Duration,
}

impl ValidationPipeline {
    /// Empty pipeline; register validators explicitly
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            validators: Vec::new(),
            validator_timeout: Duration::from_secs(config.validator_timeout_seconds),
        }
    }

    /// Pipeline with the bundled validators plus every external tool
    /// validator (each gates itself on availability at run time).
    pub fn with_default_validators(config: &ValidationConfig) -> Self {
        let tool_timeout = Duration::from_secs(config.validator_timeout_seconds);
        let mut pipeline = Self::new(config);
        pipeline.register(Arc::new(PythonSyntaxValidator));
        pipeline.register(Arc::new(JsSyntaxValidator));
        pipeline.register(Arc::new(JsonValidator));
        pipeline.register(Arc::new(MypyValidator::new(tool_timeout)));
        pipeline.register(Arc::new(BanditValidator::new(tool_timeout)));
        pipeline.register(Arc::new(BlackValidator::new(tool_timeout)));
        pipeline.register(Arc::new(EslintValidator::new(tool_timeout)));
        pipeline.register(Arc::new(PrettierValidator::new(tool_timeout)));
        pipeline.register(Arc::new(TscValidator::new(tool_timeout)));
        pipeline
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    fn applicable<'a>(
        &'a self,
        files: &BTreeMap<String, String>,
    ) -> Vec<&'a Arc<dyn Validator>> {
        self.validators
            .iter()
            .filter(|v| v.is_available())
            .filter(|v| {
                files
                    .keys()
                    .any(|path| matches_extension(path, v.extensions()))
            })
            .collect()
    }

    /// Run every applicable validator concurrently and merge the results.
    pub async fn validate_and_report(&self, files: &BTreeMap<String, String>) -> PipelineReport {
        let start = Instant::now();
        let applicable = self.applicable(files);

        debug!(
            validators = applicable.len(),
            files = files.len(),
            "Starting validation run"
        );

        let runs = applicable.iter().map(|validator| {
            let name = validator.name();
            async move {
                match tokio::time::timeout(self.validator_timeout, validator.validate(files)).await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(validator = name, "Validator timed out");
                        ValidationResult {
                            validator: name.to_string(),
                            passed: false,
                            issues: Vec::new(),
                            execution_time_ms: self.validator_timeout.as_millis() as u64,
                            error: Some("Validator timed out".to_string()),
                        }
                    }
                }
            }
        });

        let mut results: Vec<ValidationResult> = join_all(runs).await;
        // Deterministic merge order regardless of completion order
        results.sort_by(|a, b| a.validator.cmp(&b.validator));

        // The verdict tracks Error-severity issues; a crashed or timed-out
        // tool is recorded on its result but does not block on its own.
        let passed = results.iter().all(|r| r.error_count() == 0);

        let report = PipelineReport {
            passed,
            results,
            total_time_ms: start.elapsed().as_millis() as u64,
            tests: None,
        };

        info!(
            passed = report.passed,
            errors = report.error_count(),
            warnings = report.warning_count(),
            elapsed_ms = report.total_time_ms,
            "Validation run complete"
        );

        report
    }

    /// Apply every fixable validator's `auto_fix` and fold the corrected
    /// contents into a single map of changed files.
    pub async fn apply_auto_fixes(
        &self,
        files: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut merged = files.clone();
        let mut changed = BTreeMap::new();

        for validator in self.validators.iter().filter(|v| v.is_available() && v.can_fix()) {
            if let Some(fixed) = validator.auto_fix(&merged).await {
                for (path, content) in fixed {
                    merged.insert(path.clone(), content.clone());
                    changed.insert(path, content);
                }
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    fn bundled_pipeline() -> ValidationPipeline {
        let mut pipeline = ValidationPipeline::new(&ValidationConfig::default());
        pipeline.register(Arc::new(PythonSyntaxValidator));
        pipeline.register(Arc::new(JsSyntaxValidator));
        pipeline.register(Arc::new(JsonValidator));
        pipeline
    }

    #[tokio::test]
    async fn test_syntax_error_fails_pipeline() {
        let pipeline = bundled_pipeline();
        let report = pipeline
            .validate_and_report(&files(&[
                ("good.py", "def f():\n    return 1\n"),
                ("bad.py", "def g(:\n"),
            ]))
            .await;

        assert!(!report.passed);
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file.as_deref(), Some("bad.py"));
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_clean_files_pass() {
        let pipeline = bundled_pipeline();
        let report = pipeline
            .validate_and_report(&files(&[
                ("main.py", "def f():\n    return 1\n"),
                ("package.json", r#"{"name": "app"}"#),
            ]))
            .await;

        assert!(report.passed);
        assert_eq!(report.error_count(), 0);
    }

    #[tokio::test]
    async fn test_results_ordered_by_validator_name() {
        let pipeline = bundled_pipeline();
        let report = pipeline
            .validate_and_report(&files(&[
                ("main.py", "x = 1\n"),
                ("app.js", "const x = 1;\n"),
                ("cfg.json", "{}"),
            ]))
            .await;

        let names: Vec<&str> = report.results.iter().map(|r| r.validator.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_determinism_same_input_same_verdict() {
        let pipeline = bundled_pipeline();
        let set = files(&[("bad.py", "def g(:\n"), ("ok.json", "{}")]);

        let first = pipeline.validate_and_report(&set).await;
        let second = pipeline.validate_and_report(&set).await;

        assert_eq!(first.passed, second.passed);
        assert_eq!(first.error_count(), second.error_count());
        let first_msgs: Vec<String> = first.issues().map(|i| i.message.clone()).collect();
        let second_msgs: Vec<String> = second.issues().map(|i| i.message.clone()).collect();
        assert_eq!(first_msgs, second_msgs);
    }

    #[tokio::test]
    async fn test_inapplicable_validators_do_not_run() {
        let pipeline = bundled_pipeline();
        let report = pipeline
            .validate_and_report(&files(&[("README.md", "# hi")]))
            .await;
        assert!(report.passed);
        assert!(report.results.is_empty());
    }
}
