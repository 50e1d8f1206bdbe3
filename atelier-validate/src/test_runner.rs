//! Test-runner adjunct
//!
//! When the generated file set contains test files, they run in an isolated
//! temp directory under a total time budget. The structured result is
//! attached to the validation report; a missing test tool degrades to a
//! skipped run, never a pipeline failure.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use atelier_core::config::ValidationConfig;

use crate::domain::TestRunResult;
use crate::validators::external::{run_tool, write_files};

/// Executes generated test suites (pytest)
pub struct TestRunner {
    timeout: Duration,
}

impl TestRunner {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.test_timeout_seconds),
        }
    }

    /// Whether a path names a test file
    pub fn is_test_file(path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        (file_name.starts_with("test_") && file_name.ends_with(".py"))
            || file_name.ends_with("_test.py")
            || file_name.ends_with(".test.js")
            || file_name.ends_with(".test.jsx")
    }

    fn has_python_tests(files: &BTreeMap<String, String>) -> bool {
        files
            .keys()
            .any(|path| Self::is_test_file(path) && path.ends_with(".py"))
    }

    /// Run detected test files; `None` when the set contains none or no
    /// runner tool is installed.
    pub async fn run(&self, files: &BTreeMap<String, String>) -> Option<TestRunResult> {
        if !Self::has_python_tests(files) {
            debug!("No test files detected");
            return None;
        }
        if which::which("pytest").is_err() {
            debug!("pytest not installed, skipping test run");
            return None;
        }

        let start = Instant::now();
        let dir = tempfile::tempdir().ok()?;
        let all: BTreeMap<&str, &str> = files
            .iter()
            .map(|(p, c)| (p.as_str(), c.as_str()))
            .collect();
        write_files(dir.path(), &all).ok()?;

        let output = run_tool(
            "pytest",
            &["-v", "--tb=short", "--no-header"],
            dir.path(),
            self.timeout,
        )
        .await
        .ok()?;

        let duration_ms = start.elapsed().as_millis() as u64;

        if output.timed_out {
            return Some(TestRunResult {
                passed: 0,
                failed: 0,
                skipped: 0,
                success: false,
                coverage: None,
                duration_ms,
                output: "Test run timed out".to_string(),
            });
        }

        let combined = format!("{}{}", output.stdout, output.stderr);
        let (passed, failed, skipped) = Self::parse_summary(&combined);
        let coverage = Self::parse_coverage(&combined);

        let result = TestRunResult {
            passed,
            failed,
            skipped,
            // Exit 5 means no tests were collected
            success: failed == 0 && matches!(output.status, Some(0) | Some(5)),
            coverage,
            duration_ms,
            output: Self::tail(&combined, 4096),
        };

        info!(
            passed = result.passed,
            failed = result.failed,
            skipped = result.skipped,
            success = result.success,
            "Test run complete"
        );

        Some(result)
    }

    /// Parse the pytest summary line, e.g. "3 passed, 1 failed in 0.12s"
    fn parse_summary(output: &str) -> (u32, u32, u32) {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for line in output.lines().rev() {
            if !line.contains("passed") && !line.contains("failed") && !line.contains("skipped") {
                continue;
            }

            let cleaned = line.replace(['=', ','], " ");
            let tokens: Vec<&str> = cleaned.split_whitespace().collect();
            for window in tokens.windows(2) {
                if let Ok(count) = window[0].parse::<u32>() {
                    match window[1] {
                        "passed" => passed = count,
                        "failed" | "error" | "errors" => failed += count,
                        "skipped" => skipped = count,
                        _ => {}
                    }
                }
            }

            if passed + failed + skipped > 0 {
                break;
            }
        }

        (passed, failed, skipped)
    }

    /// Parse a coverage total line when pytest-cov is active
    fn parse_coverage(output: &str) -> Option<f64> {
        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("TOTAL") {
                if let Some(percent) = trimmed.split_whitespace().last() {
                    return percent.trim_end_matches('%').parse().ok();
                }
            }
        }
        None
    }

    fn tail(text: &str, max: usize) -> String {
        if text.len() <= max {
            text.to_string()
        } else {
            let start = text.len() - max;
            // Snap to a char boundary
            let start = (start..text.len())
                .find(|i| text.is_char_boundary(*i))
                .unwrap_or(start);
            text[start..].to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_file_detection() {
        assert!(TestRunner::is_test_file("backend/test_main.py"));
        assert!(TestRunner::is_test_file("api_test.py"));
        assert!(TestRunner::is_test_file("src/App.test.jsx"));
        assert!(!TestRunner::is_test_file("backend/main.py"));
        assert!(!TestRunner::is_test_file("tests.md"));
        assert!(!TestRunner::is_test_file("contest.py"));
    }

    #[test]
    fn test_parse_summary_mixed() {
        let output = "===== 3 passed, 1 failed, 2 skipped in 0.12s =====";
        assert_eq!(TestRunner::parse_summary(output), (3, 1, 2));
    }

    #[test]
    fn test_parse_summary_passed_only() {
        let output = "collected 4 items\n\n===== 4 passed in 0.05s =====";
        assert_eq!(TestRunner::parse_summary(output), (4, 0, 0));
    }

    #[test]
    fn test_parse_coverage() {
        let output = "file.py   10   2   80%\nTOTAL   100   15   85%";
        assert_eq!(TestRunner::parse_coverage(output), Some(85.0));
    }

    #[tokio::test]
    async fn test_no_test_files_returns_none() {
        let runner = TestRunner::new(&ValidationConfig::default());
        let files: BTreeMap<String, String> =
            [("main.py".to_string(), "x = 1".to_string())].into();
        assert!(runner.run(&files).await.is_none());
    }
}
