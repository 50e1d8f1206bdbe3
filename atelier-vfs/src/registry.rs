//! Supervised per-project VFS registry
//!
//! All access to a project's file system goes through this registry; there
//! is no module-level VFS state anywhere else. The `Arc<Mutex<_>>` handed
//! out doubles as the per-project advisory lock: the orchestrator holds it
//! across `write_file ... commit` so commits are totally ordered.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use atelier_core::ProjectId;

use crate::domain::VfsError;
use crate::vfs::VirtualFileSystem;

/// Registry of per-project virtual file systems
#[derive(Default)]
pub struct VfsRegistry {
    inner: RwLock<HashMap<ProjectId, Arc<Mutex<VirtualFileSystem>>>>,
}

impl VfsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the VFS for a project, creating it on first access
    pub async fn get_or_create(&self, project_id: &ProjectId) -> Arc<Mutex<VirtualFileSystem>> {
        {
            let map = self.inner.read().await;
            if let Some(vfs) = map.get(project_id) {
                return Arc::clone(vfs);
            }
        }

        let mut map = self.inner.write().await;
        Arc::clone(map.entry(project_id.clone()).or_insert_with(|| {
            info!(project_id = %project_id, "Created VFS");
            Arc::new(Mutex::new(VirtualFileSystem::new(project_id.clone())))
        }))
    }

    /// Get the VFS for a project if it exists
    pub async fn get(&self, project_id: &ProjectId) -> Option<Arc<Mutex<VirtualFileSystem>>> {
        self.inner.read().await.get(project_id).cloned()
    }

    /// Drop a project's VFS (project deletion)
    pub async fn remove(&self, project_id: &ProjectId) {
        if self.inner.write().await.remove(project_id).is_some() {
            info!(project_id = %project_id, "Removed VFS");
        }
    }

    /// Ids of every registered project
    pub async fn project_ids(&self) -> Vec<ProjectId> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Load every `*.json` snapshot under a directory into the registry.
    ///
    /// Unreadable snapshots are skipped with a warning; a missing directory
    /// is not an error.
    pub async fn restore_snapshots(&self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match VirtualFileSystem::load_from_json(&path) {
                Ok(vfs) => {
                    let project_id = vfs.project_id().clone();
                    self.inner
                        .write()
                        .await
                        .insert(project_id, Arc::new(Mutex::new(vfs)));
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "Skipping unreadable VFS snapshot");
                }
            }
        }
    }

    /// Save one snapshot per project under a directory
    pub async fn save_snapshots(&self, dir: &Path) -> Result<(), VfsError> {
        let map = self.inner.read().await;
        for (project_id, vfs) in map.iter() {
            let path = dir.join(format!("{}.json", project_id));
            vfs.lock().await.save_to_json(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let registry = VfsRegistry::new();
        let id = ProjectId::from("p1");

        let first = registry.get_or_create(&id).await;
        first.lock().await.write_file("a.py", "1");

        let second = registry.get_or_create(&id).await;
        assert_eq!(second.lock().await.read_file("a.py"), Some("1"));
    }

    #[tokio::test]
    async fn test_remove_drops_state() {
        let registry = VfsRegistry::new();
        let id = ProjectId::from("p1");

        registry.get_or_create(&id).await;
        registry.remove(&id).await;
        assert!(registry.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_save_and_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VfsRegistry::new();
        let id = ProjectId::from("persisted");

        let vfs = registry.get_or_create(&id).await;
        let commit_id = {
            let mut guard = vfs.lock().await;
            guard.write_file("main.py", "print('x')");
            guard.commit("v1")
        };
        registry.save_snapshots(dir.path()).await.unwrap();

        let restored = VfsRegistry::new();
        restored.restore_snapshots(dir.path()).await;
        let vfs = restored.get(&id).await.expect("snapshot restored");
        let guard = vfs.lock().await;
        assert_eq!(guard.current_commit_id(), Some(commit_id.as_str()));
        assert_eq!(guard.read_file("main.py"), Some("print('x')"));
    }
}
