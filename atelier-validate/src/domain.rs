//! Validation domain types

use serde::Serialize;

/// Validation issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A single validation issue
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub validator: String,
    pub severity: Severity,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    /// Rule or check identifier, e.g. "syntax-error", "B603"
    pub rule: String,
    pub fixable: bool,
}

impl ValidationIssue {
    pub fn error(
        validator: impl Into<String>,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validator: validator.into(),
            severity: Severity::Error,
            file: Some(file.into()),
            line: None,
            column: None,
            message: message.into(),
            rule: String::new(),
            fixable: false,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }
}

/// Result of one validator run
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub validator: String,
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
    pub execution_time_ms: u64,
    /// Tool-level failure (crash, unparseable output); issues may be partial
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn passing(validator: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            validator: validator.into(),
            passed: true,
            issues: Vec::new(),
            execution_time_ms,
            error: None,
        }
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }
}

/// Aggregated outcome of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub passed: bool,
    /// Per-validator results, ordered by validator name
    pub results: Vec<ValidationResult>,
    pub total_time_ms: u64,
    /// Attached by the test-runner adjunct when test files were detected
    pub tests: Option<TestRunResult>,
}

impl PipelineReport {
    /// Every issue across validators
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.results.iter().flat_map(|r| r.issues.iter())
    }

    /// Error-severity issues only (the auto-fix loop's input)
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues()
            .filter(|i| i.severity == Severity::Error)
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().map(|r| r.error_count()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.results.iter().map(|r| r.warning_count()).sum()
    }
}

/// Structured result from the test-runner adjunct
#[derive(Debug, Clone, Serialize)]
pub struct TestRunResult {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub success: bool,
    /// Coverage percentage when the tool reports one
    pub coverage: Option<f64>,
    pub duration_ms: u64,
    /// Captured runner output (tail)
    pub output: String,
}
