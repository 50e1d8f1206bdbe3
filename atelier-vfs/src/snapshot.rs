//! JSON snapshot persistence
//!
//! VFS state is in-memory; snapshots make it survive a process restart.
//! Commit ids are stored verbatim, so they are stable across restore.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use atelier_core::ProjectId;

use crate::domain::{Commit, FileNode, VfsError};
use crate::vfs::VirtualFileSystem;

/// Serialized form of a whole VFS
#[derive(Debug, Serialize, Deserialize)]
pub struct VfsSnapshot {
    pub project_id: ProjectId,
    pub current_branch: String,
    pub current_commit_id: Option<String>,
    pub branches: BTreeMap<String, Option<String>>,
    pub files: BTreeMap<String, FileNode>,
    pub commits: Vec<Commit>,
}

impl VfsSnapshot {
    pub fn capture(vfs: &VirtualFileSystem) -> Self {
        let (files, commits, branches) = vfs.parts();
        Self {
            project_id: vfs.project_id().clone(),
            current_branch: vfs.current_branch().to_string(),
            current_commit_id: vfs.current_commit_id().map(|s| s.to_string()),
            branches: branches.clone(),
            files: files.clone(),
            commits: commits.clone(),
        }
    }

    pub fn restore(self) -> VirtualFileSystem {
        VirtualFileSystem::from_parts(
            self.project_id,
            self.files,
            self.commits,
            self.current_commit_id,
            self.branches,
            self.current_branch,
        )
    }
}

impl VirtualFileSystem {
    /// Save the whole state as a JSON snapshot
    pub fn save_to_json(&self, path: &Path) -> Result<(), VfsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VfsError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let snapshot = VfsSnapshot::capture(self);
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json).map_err(|source| VfsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        info!(project_id = %self.project_id(), path = %path.display(), "Saved VFS snapshot");
        Ok(())
    }

    /// Load a VFS from a JSON snapshot
    pub fn load_from_json(path: &Path) -> Result<Self, VfsError> {
        let json = std::fs::read_to_string(path).map_err(|source| VfsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot: VfsSnapshot = serde_json::from_str(&json)?;

        info!(project_id = %snapshot.project_id, path = %path.display(), "Loaded VFS snapshot");
        Ok(snapshot.restore())
    }
}
