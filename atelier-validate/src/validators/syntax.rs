//! Bundled syntax validators backed by tree-sitter
//!
//! These always run: a generated file that does not parse should never
//! reach a commit without the auto-fix loop seeing it.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use crate::domain::{ValidationIssue, ValidationResult};
use crate::validators::{applicable_files, Validator};

/// Collect the top-most ERROR/missing nodes of a parse tree.
///
/// Descent stops at an ERROR node so cascading children do not flood the
/// report.
fn syntax_errors(root: Node, max_per_file: usize) -> Vec<(u32, u32, String)> {
    let mut errors = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if errors.len() >= max_per_file {
            break;
        }

        if node.is_error() {
            let pos = node.start_position();
            errors.push((
                pos.row as u32 + 1,
                pos.column as u32 + 1,
                "Syntax error".to_string(),
            ));
            continue;
        }
        if node.is_missing() {
            let pos = node.start_position();
            errors.push((
                pos.row as u32 + 1,
                pos.column as u32 + 1,
                format!("Missing {}", node.kind()),
            ));
            continue;
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        // Reverse so errors surface in document order
        for child in children.into_iter().rev() {
            if child.has_error() {
                stack.push(child);
            }
        }
    }

    errors
}

fn validate_with_grammar(
    name: &'static str,
    language: &Language,
    rule: &str,
    files: BTreeMap<&str, &str>,
) -> ValidationResult {
    let start = Instant::now();
    let mut issues = Vec::new();

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(language) {
        return ValidationResult {
            validator: name.to_string(),
            passed: false,
            issues,
            execution_time_ms: start.elapsed().as_millis() as u64,
            error: Some(format!("Failed to load grammar: {}", e)),
        };
    }

    for (path, content) in files {
        let Some(tree) = parser.parse(content, None) else {
            issues.push(
                ValidationIssue::error(name, path, "Parser returned no tree").with_rule(rule),
            );
            continue;
        };

        let root = tree.root_node();
        if root.has_error() {
            for (line, column, message) in syntax_errors(root, 3) {
                issues.push(
                    ValidationIssue::error(name, path, message)
                        .at(line, column)
                        .with_rule(rule),
                );
            }
        }
    }

    debug!(validator = name, issues = issues.len(), "Syntax check complete");

    ValidationResult {
        validator: name.to_string(),
        passed: issues.is_empty(),
        issues,
        execution_time_ms: start.elapsed().as_millis() as u64,
        error: None,
    }
}

/// Python syntax check
pub struct PythonSyntaxValidator;

#[async_trait]
impl Validator for PythonSyntaxValidator {
    fn name(&self) -> &'static str {
        "python-syntax"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let applicable = applicable_files(files, self.extensions());
        validate_with_grammar(
            self.name(),
            &tree_sitter_python::LANGUAGE.into(),
            "syntax-error",
            applicable,
        )
    }
}

/// JavaScript/JSX syntax check
pub struct JsSyntaxValidator;

#[async_trait]
impl Validator for JsSyntaxValidator {
    fn name(&self) -> &'static str {
        "js-syntax"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx"]
    }

    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult {
        let applicable = applicable_files(files, self.extensions());
        validate_with_grammar(
            self.name(),
            &tree_sitter_javascript::LANGUAGE.into(),
            "syntax-error",
            applicable,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_valid_python_passes() {
        let result = PythonSyntaxValidator
            .validate(&files(&[("good.py", "def f():\n    return 1\n")]))
            .await;
        assert!(result.passed);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_broken_python_reports_error_with_location() {
        let result = PythonSyntaxValidator
            .validate(&files(&[
                ("good.py", "def f():\n    return 1\n"),
                ("bad.py", "def g(:\n"),
            ]))
            .await;

        assert!(!result.passed);
        assert_eq!(result.error_count(), 1);
        let issue = &result.issues[0];
        assert_eq!(issue.file.as_deref(), Some("bad.py"));
        assert!(issue.line.is_some());
    }

    #[tokio::test]
    async fn test_non_python_files_ignored() {
        let result = PythonSyntaxValidator
            .validate(&files(&[("notes.md", "# not python ( at all")]))
            .await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_valid_jsx_passes() {
        let result = JsSyntaxValidator
            .validate(&files(&[(
                "App.jsx",
                "export default function App() { return <div>hi</div>; }\n",
            )]))
            .await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_broken_js_fails() {
        let result = JsSyntaxValidator
            .validate(&files(&[("app.js", "function ( {")]))
            .await;
        assert!(!result.passed);
    }
}
