//! VFS domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File status in the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Unchanged,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Unchanged => "unchanged",
        }
    }
}

/// A file in the VFS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub path: String,
    pub content: String,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileNode {
    pub fn added(path: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            content: content.into(),
            status: FileStatus::Added,
            created_at: now,
            modified_at: now,
        }
    }
}

/// An immutable snapshot of the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// First 8 hex chars of sha1(project_id, commit wall-clock)
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Deep copy of the non-deleted tree at commit time, statuses Unchanged
    pub files: BTreeMap<String, FileNode>,
    pub parent_id: Option<String>,
}

/// One path's change between two states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DiffEntry {
    Added {
        content: String,
    },
    Modified {
        old_content: String,
        new_content: String,
    },
    Deleted,
}

/// Summary of the working tree
#[derive(Debug, Clone, Serialize)]
pub struct VfsStatus {
    pub project_id: String,
    pub current_branch: String,
    pub current_commit: Option<String>,
    pub total_files: usize,
    pub changed_files: usize,
    pub changes: BTreeMap<String, FileStatus>,
    pub total_commits: usize,
    pub branches: Vec<String>,
}

/// One line of commit history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub files_count: usize,
    pub parent_id: Option<String>,
}

/// VFS operation error
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Branch already exists: {0}")]
    BranchExists(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot serialization error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_node_timestamps_agree() {
        let node = FileNode::added("a.py", "x = 1");
        assert_eq!(node.status, FileStatus::Added);
        assert_eq!(node.created_at, node.modified_at);
    }

    #[test]
    fn test_diff_entry_serialization_tags() {
        let entry = DiffEntry::Added {
            content: "x".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "added");

        let entry = DiffEntry::Deleted;
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "deleted");
    }
}
