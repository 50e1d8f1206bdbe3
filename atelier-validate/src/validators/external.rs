//! External-tool validators
//!
//! Each wraps a command-line tool and activates only when the binary is on
//! PATH. Files are exported to a scratch directory, the tool runs there,
//! and its output is mapped back onto the in-memory paths. A tool crash is
//! reported on the result but does not fail the pipeline; only parsed
//! findings do.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{Severity, ValidationIssue, ValidationResult};
use crate::validators::{applicable_files, Validator};

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) struct ToolOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Run a tool in a working directory with a hard timeout.
pub(crate) async fn run_tool(
    program: &str,
    args: &[&str],
    dir: &Path,
    timeout: Duration,
) -> std::io::Result<ToolOutput> {
    let mut command = Command::new(program);
    command.args(args).current_dir(dir).kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => {
            let output = output?;
            Ok(ToolOutput {
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                timed_out: false,
            })
        }
        Err(_) => {
            warn!(program, ?timeout, "Tool timed out");
            Ok(ToolOutput {
                status: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            })
        }
    }
}

/// Materialise a file subset under a scratch directory
pub(crate) fn write_files(dir: &Path, files: &BTreeMap<&str, &str>) -> std::io::Result<()> {
    for (path, content) in files {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, content)?;
    }
    Ok(())
}

fn tool_available(name: &str) -> bool {
    which::which(name).is_ok()
}

fn failed_result(name: &str, start: Instant, error: String) -> ValidationResult {
    ValidationResult {
        validator: name.to_string(),
        passed: true,
        issues: Vec::new(),
        execution_time_ms: start.elapsed().as_millis() as u64,
        error: Some(error),
    }
}

/// Strip scratch-directory and `./` prefixes from a tool-reported path
fn normalise_path(raw: &str, dir: &Path) -> String {
    let raw = raw.trim();
    let without_dir = raw
        .strip_prefix(&format!("{}/", dir.display()))
        .unwrap_or(raw);
    without_dir.strip_prefix("./").unwrap_or(without_dir).to_string()
}

// ── mypy ────────────────────────────────────────────────────────────

/// Python type checker (mypy)
pub struct MypyValidator {
    timeout: Duration,
}

impl MypyValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for MypyValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl Validator for MypyValidator {
    fn name(&self) -> &'static str {
        "mypy"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn is_available(&self) -> bool {
        tool_available("mypy")
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return ValidationResult::passing(self.name(), 0);
        }

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };
        if let Err(e) = write_files(dir.path(), &applicable) {
            return failed_result(self.name(), start, e.to_string());
        }

        let output = match run_tool(
            "mypy",
            &[
                "--ignore-missing-imports",
                "--no-error-summary",
                "--show-column-numbers",
                ".",
            ],
            dir.path(),
            self.timeout,
        )
        .await
        {
            Ok(output) if !output.timed_out => output,
            Ok(_) => return failed_result(self.name(), start, "mypy timed out".to_string()),
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };

        // Format: path:line:col: severity: message
        let mut issues = Vec::new();
        for line in output.stdout.lines() {
            let mut parts = line.splitn(5, ':');
            let (Some(path), Some(row), Some(col), Some(kind), Some(message)) = (
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
            ) else {
                continue;
            };

            let (Ok(row), Ok(col)) = (row.trim().parse::<u32>(), col.trim().parse::<u32>()) else {
                continue;
            };

            let severity = match kind.trim() {
                "error" => Severity::Error,
                "warning" => Severity::Warning,
                _ => Severity::Info,
            };

            issues.push(ValidationIssue {
                validator: self.name().to_string(),
                severity,
                file: Some(normalise_path(path, dir.path())),
                line: Some(row),
                column: Some(col),
                message: message.trim().to_string(),
                rule: "type-check".to_string(),
                fixable: false,
            });
        }

        let error_count = issues.iter().filter(|i| i.severity == Severity::Error).count();
        ValidationResult {
            validator: self.name().to_string(),
            passed: error_count == 0,
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }
}

// ── bandit ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditFinding>,
}

#[derive(Deserialize)]
struct BanditFinding {
    filename: String,
    line_number: u32,
    issue_severity: String,
    issue_text: String,
    test_id: String,
}

/// Python security scanner (bandit).
///
/// HIGH/MEDIUM/LOW map onto Error/Warning/Info.
pub struct BanditValidator {
    timeout: Duration,
}

impl BanditValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for BanditValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl Validator for BanditValidator {
    fn name(&self) -> &'static str {
        "bandit"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn is_available(&self) -> bool {
        tool_available("bandit")
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return ValidationResult::passing(self.name(), 0);
        }

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };
        if let Err(e) = write_files(dir.path(), &applicable) {
            return failed_result(self.name(), start, e.to_string());
        }

        let output = match run_tool(
            "bandit",
            &["-r", ".", "-f", "json", "-q"],
            dir.path(),
            self.timeout,
        )
        .await
        {
            Ok(output) if !output.timed_out => output,
            Ok(_) => return failed_result(self.name(), start, "bandit timed out".to_string()),
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };

        let report: BanditReport = match serde_json::from_str(&output.stdout) {
            Ok(report) => report,
            Err(e) => {
                return failed_result(
                    self.name(),
                    start,
                    format!("Unparseable bandit output: {}", e),
                )
            }
        };

        let issues: Vec<ValidationIssue> = report
            .results
            .into_iter()
            .map(|finding| {
                let severity = match finding.issue_severity.to_uppercase().as_str() {
                    "HIGH" => Severity::Error,
                    "MEDIUM" => Severity::Warning,
                    _ => Severity::Info,
                };
                ValidationIssue {
                    validator: self.name().to_string(),
                    severity,
                    file: Some(normalise_path(&finding.filename, dir.path())),
                    line: Some(finding.line_number),
                    column: None,
                    message: finding.issue_text,
                    rule: finding.test_id,
                    fixable: false,
                }
            })
            .collect();

        let error_count = issues.iter().filter(|i| i.severity == Severity::Error).count();
        ValidationResult {
            validator: self.name().to_string(),
            passed: error_count == 0,
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }
}

// ── black ───────────────────────────────────────────────────────────

/// Python formatter (black), auto-fixable
pub struct BlackValidator {
    timeout: Duration,
}

impl BlackValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for BlackValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl Validator for BlackValidator {
    fn name(&self) -> &'static str {
        "black"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn is_available(&self) -> bool {
        tool_available("black")
    }

    fn can_fix(&self) -> bool {
        true
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return ValidationResult::passing(self.name(), 0);
        }

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };
        if let Err(e) = write_files(dir.path(), &applicable) {
            return failed_result(self.name(), start, e.to_string());
        }

        let output = match run_tool("black", &["--check", "--quiet", "."], dir.path(), self.timeout)
            .await
        {
            Ok(output) if !output.timed_out => output,
            Ok(_) => return failed_result(self.name(), start, "black timed out".to_string()),
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };

        // "would reformat <path>" lines land on stderr
        let issues: Vec<ValidationIssue> = output
            .stderr
            .lines()
            .filter_map(|line| line.strip_prefix("would reformat "))
            .map(|path| ValidationIssue {
                validator: self.name().to_string(),
                severity: Severity::Warning,
                file: Some(normalise_path(path, dir.path())),
                line: None,
                column: None,
                message: "File is not formatted".to_string(),
                rule: "format".to_string(),
                fixable: true,
            })
            .collect();

        ValidationResult {
            validator: self.name().to_string(),
            passed: true,
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }

    async fn auto_fix(
        &self,
        files: &BTreeMap<String, String>,
    ) -> Option<BTreeMap<String, String>> {
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return None;
        }

        let dir = tempfile::tempdir().ok()?;
        write_files(dir.path(), &applicable).ok()?;

        let output = run_tool("black", &["--quiet", "."], dir.path(), self.timeout)
            .await
            .ok()?;
        if output.timed_out {
            return None;
        }

        let mut fixed = BTreeMap::new();
        for path in applicable.keys() {
            if let Ok(content) = std::fs::read_to_string(dir.path().join(path)) {
                if files.get(*path).map(|c| c != &content).unwrap_or(false) {
                    fixed.insert(path.to_string(), content);
                }
            }
        }

        debug!(fixed = fixed.len(), "black auto-fix complete");
        if fixed.is_empty() {
            None
        } else {
            Some(fixed)
        }
    }
}

// ── eslint ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EslintFileReport {
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Deserialize)]
struct EslintMessage {
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
    severity: u8,
    message: String,
    #[serde(rename = "ruleId")]
    rule_id: Option<String>,
}

/// JavaScript linter (eslint)
pub struct EslintValidator {
    timeout: Duration,
}

impl EslintValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for EslintValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl Validator for EslintValidator {
    fn name(&self) -> &'static str {
        "eslint"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx"]
    }

    fn is_available(&self) -> bool {
        tool_available("eslint")
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return ValidationResult::passing(self.name(), 0);
        }

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };
        if let Err(e) = write_files(dir.path(), &applicable) {
            return failed_result(self.name(), start, e.to_string());
        }

        let output =
            match run_tool("eslint", &["--format", "json", "."], dir.path(), self.timeout).await {
                Ok(output) if !output.timed_out => output,
                Ok(_) => return failed_result(self.name(), start, "eslint timed out".to_string()),
                Err(e) => return failed_result(self.name(), start, e.to_string()),
            };

        // Exit 2 means eslint itself failed (usually missing config)
        if output.status == Some(2) || output.stdout.trim().is_empty() {
            return failed_result(self.name(), start, output.stderr.trim().to_string());
        }

        let reports: Vec<EslintFileReport> = match serde_json::from_str(&output.stdout) {
            Ok(reports) => reports,
            Err(e) => {
                return failed_result(
                    self.name(),
                    start,
                    format!("Unparseable eslint output: {}", e),
                )
            }
        };

        let mut issues = Vec::new();
        for report in reports {
            let file = normalise_path(&report.file_path, dir.path());
            for message in report.messages {
                issues.push(ValidationIssue {
                    validator: self.name().to_string(),
                    severity: if message.severity >= 2 {
                        Severity::Error
                    } else {
                        Severity::Warning
                    },
                    file: Some(file.clone()),
                    line: Some(message.line),
                    column: Some(message.column),
                    message: message.message,
                    rule: message.rule_id.unwrap_or_default(),
                    fixable: false,
                });
            }
        }

        let error_count = issues.iter().filter(|i| i.severity == Severity::Error).count();
        ValidationResult {
            validator: self.name().to_string(),
            passed: error_count == 0,
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }
}

// ── prettier ────────────────────────────────────────────────────────

/// JavaScript formatter (prettier), auto-fixable
pub struct PrettierValidator {
    timeout: Duration,
}

impl PrettierValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for PrettierValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl Validator for PrettierValidator {
    fn name(&self) -> &'static str {
        "prettier"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "css", "html"]
    }

    fn is_available(&self) -> bool {
        tool_available("prettier")
    }

    fn can_fix(&self) -> bool {
        true
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return ValidationResult::passing(self.name(), 0);
        }

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };
        if let Err(e) = write_files(dir.path(), &applicable) {
            return failed_result(self.name(), start, e.to_string());
        }

        let output = match run_tool("prettier", &["--check", "."], dir.path(), self.timeout).await {
            Ok(output) if !output.timed_out => output,
            Ok(_) => return failed_result(self.name(), start, "prettier timed out".to_string()),
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };

        let issues: Vec<ValidationIssue> = output
            .stderr
            .lines()
            .chain(output.stdout.lines())
            .filter_map(|line| line.strip_prefix("[warn] "))
            .filter(|path| !path.contains(' '))
            .map(|path| ValidationIssue {
                validator: self.name().to_string(),
                severity: Severity::Warning,
                file: Some(normalise_path(path, dir.path())),
                line: None,
                column: None,
                message: "File is not formatted".to_string(),
                rule: "format".to_string(),
                fixable: true,
            })
            .collect();

        ValidationResult {
            validator: self.name().to_string(),
            passed: true,
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }

    async fn auto_fix(
        &self,
        files: &BTreeMap<String, String>,
    ) -> Option<BTreeMap<String, String>> {
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return None;
        }

        let dir = tempfile::tempdir().ok()?;
        write_files(dir.path(), &applicable).ok()?;

        let output = run_tool("prettier", &["--write", "."], dir.path(), self.timeout)
            .await
            .ok()?;
        if output.timed_out {
            return None;
        }

        let mut fixed = BTreeMap::new();
        for path in applicable.keys() {
            if let Ok(content) = std::fs::read_to_string(dir.path().join(path)) {
                if files.get(*path).map(|c| c != &content).unwrap_or(false) {
                    fixed.insert(path.to_string(), content);
                }
            }
        }

        if fixed.is_empty() {
            None
        } else {
            Some(fixed)
        }
    }
}

// ── tsc ─────────────────────────────────────────────────────────────

/// TypeScript compiler check (tsc --noEmit)
pub struct TscValidator {
    timeout: Duration,
}

impl TscValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TscValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl Validator for TscValidator {
    fn name(&self) -> &'static str {
        "tsc"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx"]
    }

    fn is_available(&self) -> bool {
        tool_available("tsc")
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let start = Instant::now();
        let applicable = applicable_files(files, self.extensions());
        if applicable.is_empty() {
            return ValidationResult::passing(self.name(), 0);
        }

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };
        if let Err(e) = write_files(dir.path(), &applicable) {
            return failed_result(self.name(), start, e.to_string());
        }

        let output = match run_tool(
            "tsc",
            &["--noEmit", "--pretty", "false", "--jsx", "react-jsx"],
            dir.path(),
            self.timeout,
        )
        .await
        {
            Ok(output) if !output.timed_out => output,
            Ok(_) => return failed_result(self.name(), start, "tsc timed out".to_string()),
            Err(e) => return failed_result(self.name(), start, e.to_string()),
        };

        // Format: path(line,col): error TSxxxx: message
        let mut issues = Vec::new();
        for line in output.stdout.lines() {
            let Some((location, rest)) = line.split_once("): ") else {
                continue;
            };
            let Some((path, position)) = location.split_once('(') else {
                continue;
            };
            let Some((row, col)) = position.split_once(',') else {
                continue;
            };
            let (Ok(row), Ok(col)) = (row.parse::<u32>(), col.parse::<u32>()) else {
                continue;
            };

            let (rule, message) = match rest.split_once(": ") {
                Some((code, msg)) => (code.trim_start_matches("error ").to_string(), msg),
                None => ("tsc".to_string(), rest),
            };

            issues.push(ValidationIssue {
                validator: self.name().to_string(),
                severity: Severity::Error,
                file: Some(normalise_path(path, dir.path())),
                line: Some(row),
                column: Some(col),
                message: message.to_string(),
                rule,
                fixable: false,
            });
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
