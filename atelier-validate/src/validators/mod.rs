//! Validator implementations

pub mod external;
pub mod json;
pub mod syntax;

pub use external::{
    BanditValidator, BlackValidator, EslintValidator, MypyValidator, PrettierValidator,
    TscValidator,
};
pub use json::JsonValidator;
pub use syntax::{JsSyntaxValidator, PythonSyntaxValidator};

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::ValidationResult;

/// A pluggable check over a file set
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extensions this validator applies to, without dots
    fn extensions(&self) -> &'static [&'static str];

    /// Whether the validator can run (external tool present)
    fn is_available(&self) -> bool {
        true
    }

    /// Validate the applicable subset of `files`
    async fn validate(&self, files: &BTreeMap<String, String>) -> ValidationResult;

    /// Whether `auto_fix` is implemented
    fn can_fix(&self) -> bool {
        false
    }

    /// Return corrected contents for the files this validator can repair
    async fn auto_fix(
        &self,
        _files: &BTreeMap<String, String>,
    ) -> Option<BTreeMap<String, String>> {
        None
    }
}

/// Extension-based applicability shared by all validators
pub(crate) fn matches_extension(filepath: &str, extensions: &[&str]) -> bool {
    filepath
        .rsplit('.')
        .next()
        .map(|ext| extensions.contains(&ext))
        .unwrap_or(false)
}

/// Filter a file set down to a validator's extensions
pub(crate) fn applicable_files<'a>(
    files: &'a BTreeMap<String, String>,
    extensions: &[&str],
) -> BTreeMap<&'a str, &'a str> {
    files
        .iter()
        .filter(|(path, _)| matches_extension(path, extensions))
        .map(|(path, content)| (path.as_str(), content.as_str()))
        .collect()
}
