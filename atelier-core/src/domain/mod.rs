//! Shared domain identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque project identifier.
///
/// Every per-project registry (VFS, memory, previews, watchers) is keyed by
/// this value; it also seeds commit digests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ProjectId::generate(), ProjectId::generate());
    }

    #[test]
    fn test_round_trips_through_serde() {
        let id = ProjectId::from("proj-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"proj-1\"");
        let back: ProjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
