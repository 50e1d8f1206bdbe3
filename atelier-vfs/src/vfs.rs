//! The virtual file system

use chrono::Utc;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use atelier_core::ProjectId;

use crate::domain::{
    Commit, DiffEntry, FileNode, FileStatus, HistoryEntry, VfsError, VfsStatus,
};

/// In-memory file system with git-like commit history.
///
/// Supports commit/rollback, basic branching, diff generation, and
/// export/import against a real directory. One instance per project,
/// owned by the [`crate::VfsRegistry`].
#[derive(Debug, Clone)]
pub struct VirtualFileSystem {
    project_id: ProjectId,
    /// Current working tree
    files: BTreeMap<String, FileNode>,
    commits: Vec<Commit>,
    current_commit_id: Option<String>,
    /// branch name -> commit id
    branches: BTreeMap<String, Option<String>>,
    current_branch: String,
}

impl VirtualFileSystem {
    pub fn new(project_id: ProjectId) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert("main".to_string(), None);

        Self {
            project_id,
            files: BTreeMap::new(),
            commits: Vec::new(),
            current_commit_id: None,
            branches,
            current_branch: "main".to_string(),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn current_commit_id(&self) -> Option<&str> {
        self.current_commit_id.as_deref()
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    /// Write or update a file in the working tree.
    ///
    /// A new path enters as Added; an existing path transitions to Modified
    /// only when the content actually changed.
    pub fn write_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();

        match self.files.get(&path) {
            Some(existing) if existing.content == content => {}
            Some(existing) => {
                let created_at = existing.created_at;
                self.files.insert(
                    path.clone(),
                    FileNode {
                        path,
                        content,
                        status: FileStatus::Modified,
                        created_at,
                        modified_at: Utc::now(),
                    },
                );
            }
            None => {
                self.files.insert(path.clone(), FileNode::added(path, content));
            }
        }
    }

    /// Read a file's current content
    pub fn read_file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|node| node.content.as_str())
    }

    /// Mark a file as deleted; it is excluded from exports and dropped at
    /// the next commit.
    pub fn delete_file(&mut self, path: &str) {
        if let Some(node) = self.files.get_mut(path) {
            node.status = FileStatus::Deleted;
        }
    }

    /// Current non-deleted path -> content map
    pub fn list_files(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .filter(|(_, node)| node.status != FileStatus::Deleted)
            .map(|(path, node)| (path.clone(), node.content.clone()))
            .collect()
    }

    /// Files with a non-Unchanged status
    pub fn changed_files(&self) -> BTreeMap<String, FileStatus> {
        self.files
            .iter()
            .filter(|(_, node)| node.status != FileStatus::Unchanged)
            .map(|(path, node)| (path.clone(), node.status))
            .collect()
    }

    /// Create a commit snapshot and return its id.
    pub fn commit(&mut self, message: impl Into<String>) -> String {
        let message = message.into();
        let timestamp = Utc::now();
        let commit_id = self.next_commit_id(&timestamp.to_rfc3339());

        // Deep-copy the non-deleted tree with statuses reset
        let snapshot: BTreeMap<String, FileNode> = self
            .files
            .iter()
            .filter(|(_, node)| node.status != FileStatus::Deleted)
            .map(|(path, node)| {
                (
                    path.clone(),
                    FileNode {
                        status: FileStatus::Unchanged,
                        ..node.clone()
                    },
                )
            })
            .collect();

        let commit = Commit {
            id: commit_id.clone(),
            message: message.clone(),
            timestamp,
            files: snapshot,
            parent_id: self.current_commit_id.clone(),
        };

        self.commits.push(commit);
        self.current_commit_id = Some(commit_id.clone());
        self.branches
            .insert(self.current_branch.clone(), Some(commit_id.clone()));

        // Working tree mirrors the snapshot
        self.files.retain(|_, node| node.status != FileStatus::Deleted);
        for node in self.files.values_mut() {
            node.status = FileStatus::Unchanged;
        }

        info!(project_id = %self.project_id, commit_id = %commit_id, message = %message, "Created commit");
        commit_id
    }

    fn next_commit_id(&self, timestamp: &str) -> String {
        let mut salt = 0u32;
        loop {
            let input = if salt == 0 {
                format!("{}-{}", self.project_id, timestamp)
            } else {
                format!("{}-{}-{}", self.project_id, timestamp, salt)
            };
            let digest = Sha1::digest(input.as_bytes());
            let id = hex::encode(digest)[..8].to_string();
            // Ids must be unique within a project's history
            if !self.commits.iter().any(|c| c.id == id) {
                return id;
            }
            salt += 1;
        }
    }

    /// Find a commit by id
    pub fn find_commit(&self, commit_id: &str) -> Option<&Commit> {
        self.commits.iter().find(|c| c.id == commit_id)
    }

    /// Restore the working tree from a historical commit.
    ///
    /// The history is untouched; the current commit id advances to the
    /// target.
    pub fn rollback(&mut self, commit_id: &str) -> Result<(), VfsError> {
        let restored: BTreeMap<String, FileNode> = self
            .find_commit(commit_id)
            .ok_or_else(|| VfsError::CommitNotFound(commit_id.to_string()))?
            .files
            .iter()
            .map(|(path, node)| {
                (
                    path.clone(),
                    FileNode {
                        status: FileStatus::Unchanged,
                        ..node.clone()
                    },
                )
            })
            .collect();

        self.files = restored;
        self.current_commit_id = Some(commit_id.to_string());
        info!(project_id = %self.project_id, commit_id, "Rolled back");
        Ok(())
    }

    /// Diff the working tree against a commit, or against the empty tree
    /// when no commit is given.
    pub fn get_diff(
        &self,
        from_commit: Option<&str>,
    ) -> Result<BTreeMap<String, DiffEntry>, VfsError> {
        let Some(from_commit) = from_commit else {
            return Ok(self
                .files
                .iter()
                .filter(|(_, node)| node.status != FileStatus::Deleted)
                .map(|(path, node)| {
                    (
                        path.clone(),
                        DiffEntry::Added {
                            content: node.content.clone(),
                        },
                    )
                })
                .collect());
        };

        let old_commit = self
            .find_commit(from_commit)
            .ok_or_else(|| VfsError::CommitNotFound(from_commit.to_string()))?;
        let old_files = &old_commit.files;

        let mut diff = BTreeMap::new();

        for (path, node) in &self.files {
            if node.status == FileStatus::Deleted {
                continue;
            }
            match old_files.get(path) {
                None => {
                    diff.insert(
                        path.clone(),
                        DiffEntry::Added {
                            content: node.content.clone(),
                        },
                    );
                }
                Some(old) if old.content != node.content => {
                    diff.insert(
                        path.clone(),
                        DiffEntry::Modified {
                            old_content: old.content.clone(),
                            new_content: node.content.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }

        for path in old_files.keys() {
            let gone = match self.files.get(path) {
                None => true,
                Some(node) => node.status == FileStatus::Deleted,
            };
            if gone {
                diff.insert(path.clone(), DiffEntry::Deleted);
            }
        }

        Ok(diff)
    }

    /// Create a branch pointing at a commit (current commit by default)
    pub fn create_branch(
        &mut self,
        name: impl Into<String>,
        from_commit: Option<&str>,
    ) -> Result<(), VfsError> {
        let name = name.into();
        if self.branches.contains_key(&name) {
            return Err(VfsError::BranchExists(name));
        }

        let commit_id = match from_commit {
            Some(id) => {
                self.find_commit(id)
                    .ok_or_else(|| VfsError::CommitNotFound(id.to_string()))?;
                Some(id.to_string())
            }
            None => self.current_commit_id.clone(),
        };

        debug!(project_id = %self.project_id, branch = %name, ?commit_id, "Created branch");
        self.branches.insert(name, commit_id);
        Ok(())
    }

    /// Switch to a branch, restoring its commit when it has one
    pub fn switch_branch(&mut self, name: &str) -> Result<(), VfsError> {
        let commit_id = self
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| VfsError::BranchNotFound(name.to_string()))?;

        if let Some(ref id) = commit_id {
            let id = id.clone();
            self.rollback(&id)?;
        }

        self.current_branch = name.to_string();
        info!(project_id = %self.project_id, branch = name, "Switched branch");
        Ok(())
    }

    /// Materialise the non-deleted working tree under a directory
    pub fn export_to_disk(&self, base_path: &Path) -> Result<(), VfsError> {
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source| VfsError::Io {
                path,
                source,
            }
        };

        std::fs::create_dir_all(base_path).map_err(io_err(base_path))?;

        for (path, node) in &self.files {
            if node.status == FileStatus::Deleted {
                continue;
            }

            let file_path = base_path.join(path);
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            std::fs::write(&file_path, &node.content).map_err(io_err(&file_path))?;
        }

        info!(project_id = %self.project_id, files = self.files.len(), path = %base_path.display(), "Exported tree");
        Ok(())
    }

    /// Ingest every file under a directory into the working tree
    pub fn import_from_disk(&mut self, base_path: &Path) -> Result<(), VfsError> {
        for entry in WalkDir::new(base_path) {
            let entry = entry.map_err(|e| VfsError::Io {
                path: base_path.display().to_string(),
                source: std::io::Error::other(e.to_string()),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(base_path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            let content =
                std::fs::read_to_string(entry.path()).map_err(|source| VfsError::Io {
                    path: entry.path().display().to_string(),
                    source,
                })?;

            self.write_file(relative, content);
        }

        info!(project_id = %self.project_id, files = self.files.len(), path = %base_path.display(), "Imported tree");
        Ok(())
    }

    /// Summarise the working tree
    pub fn get_status(&self) -> VfsStatus {
        let changes = self.changed_files();
        VfsStatus {
            project_id: self.project_id.to_string(),
            current_branch: self.current_branch.clone(),
            current_commit: self.current_commit_id.clone(),
            total_files: self.files.len(),
            changed_files: changes.len(),
            changes,
            total_commits: self.commits.len(),
            branches: self.branches.keys().cloned().collect(),
        }
    }

    /// Most recent commits, newest first
    pub fn get_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.commits
            .iter()
            .rev()
            .take(limit)
            .map(|commit| HistoryEntry {
                id: commit.id.clone(),
                message: commit.message.clone(),
                timestamp: commit.timestamp,
                files_count: commit.files.len(),
                parent_id: commit.parent_id.clone(),
            })
            .collect()
    }

    /// Total number of commits
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub(crate) fn parts(
        &self,
    ) -> (
        &BTreeMap<String, FileNode>,
        &Vec<Commit>,
        &BTreeMap<String, Option<String>>,
    ) {
        (&self.files, &self.commits, &self.branches)
    }

    pub(crate) fn from_parts(
        project_id: ProjectId,
        files: BTreeMap<String, FileNode>,
        commits: Vec<Commit>,
        current_commit_id: Option<String>,
        branches: BTreeMap<String, Option<String>>,
        current_branch: String,
    ) -> Self {
        Self {
            project_id,
            files,
            commits,
            current_commit_id,
            branches,
            current_branch,
        }
    }
}
