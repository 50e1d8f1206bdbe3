//! Atelier Patch - structure-preserving minimal edits
//!
//! Iterative edits should not rewrite whole files when one definition
//! changed. This crate compares two versions of a source file at the AST
//! level (Python, via tree-sitter) and reduces the change to the smallest
//! patch that reproduces it: a single added or replaced top-level function
//! or class. Anything wider, any parse failure, and any unsupported
//! language degrades to a full replacement.

mod python;

pub use python::{generate_patch, supports_structured_patch};

use serde::{Deserialize, Serialize};

/// A minimal description of a file change.
///
/// Always applicable to some version of the file: appliers that cannot
/// honour a structured variant fall back to the full content carried by
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "patch_type", rename_all = "snake_case")]
pub enum Patch {
    FullReplace { content: String },
    FunctionAdd { name: String, source: String },
    FunctionReplace { name: String, source: String },
    ClassAdd { name: String, source: String },
    ClassReplace { name: String, source: String },
}

impl Patch {
    pub fn full_replace(content: impl Into<String>) -> Self {
        Self::FullReplace {
            content: content.into(),
        }
    }

    /// Whether this patch preserves the untouched remainder of the file
    pub fn is_structure_preserving(&self) -> bool {
        !matches!(self, Patch::FullReplace { .. })
    }

    /// The wire tag of this variant
    pub fn kind(&self) -> &'static str {
        match self {
            Patch::FullReplace { .. } => "full_replace",
            Patch::FunctionAdd { .. } => "function_add",
            Patch::FunctionReplace { .. } => "function_replace",
            Patch::ClassAdd { .. } => "class_add",
            Patch::ClassReplace { .. } => "class_replace",
        }
    }

    /// Target definition name, when there is one
    pub fn target(&self) -> Option<&str> {
        match self {
            Patch::FullReplace { .. } => None,
            Patch::FunctionAdd { name, .. }
            | Patch::FunctionReplace { name, .. }
            | Patch::ClassAdd { name, .. }
            | Patch::ClassReplace { name, .. } => Some(name),
        }
    }
}

/// Patch application error
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Patch not applicable: {0}")]
    Inapplicable(String),

    #[error("Parse failure: {0}")]
    Parse(String),
}

/// Apply a patch to the previous file content.
///
/// Fails with [`PatchError::Inapplicable`] when the target definition is
/// missing or the old content no longer parses; the caller then substitutes
/// the full proposed content.
pub fn apply_patch(old_content: &str, patch: &Patch) -> Result<String, PatchError> {
    match patch {
        Patch::FullReplace { content } => Ok(content.clone()),
        Patch::FunctionAdd { source, .. } | Patch::ClassAdd { source, .. } => {
            Ok(format!("{}\n\n\n{}\n", old_content.trim_end(), source))
        }
        Patch::FunctionReplace { name, source } | Patch::ClassReplace { name, source } => {
            python::replace_definition(old_content, name, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_replace_returns_content() {
        let patch = Patch::full_replace("new body");
        assert_eq!(apply_patch("old body", &patch).unwrap(), "new body");
        assert!(!patch.is_structure_preserving());
        assert!(patch.target().is_none());
    }

    #[test]
    fn test_add_appends_with_separator() {
        let patch = Patch::FunctionAdd {
            name: "bar".to_string(),
            source: "def bar():\n    return 42".to_string(),
        };
        let result = apply_patch("def foo():\n    pass\n", &patch).unwrap();
        assert!(result.contains("def foo():"));
        assert!(result.contains("\n\n\ndef bar():"));
    }

    #[test]
    fn test_serde_tags_are_snake_case() {
        let patch = Patch::FunctionReplace {
            name: "calculate".to_string(),
            source: "def calculate(x):\n    return x * 3".to_string(),
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["patch_type"], "function_replace");
        assert_eq!(json["name"], "calculate");
    }
}
