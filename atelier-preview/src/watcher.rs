//! Commit watcher
//!
//! One cooperative task per previewed project polls the VFS for a new
//! commit id. Each observed commit triggers exactly one rebuild request and
//! one broadcast [`ReloadEvent`]; external observers (the HTTP boundary)
//! subscribe to push reload notifications to clients.
//!
//! The watcher never holds a preview object: it knows only the project id
//! and asks the [`Rebuilder`] to act, which keeps the preview/watcher/VFS
//! relationship acyclic.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use atelier_core::config::PreviewConfig;
use atelier_core::ProjectId;
use atelier_vfs::VfsRegistry;

use crate::domain::PreviewError;
use crate::manager::PreviewManager;

/// Emitted once per observed commit during a preview's lifetime
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    pub project_id: ProjectId,
    pub commit_id: String,
}

/// The action a watcher takes on a new commit
#[async_trait]
pub trait Rebuilder: Send + Sync {
    async fn rebuild(
        &self,
        project_id: &ProjectId,
        files: BTreeMap<String, String>,
    ) -> Result<(), PreviewError>;
}

#[async_trait]
impl Rebuilder for PreviewManager {
    async fn rebuild(
        &self,
        project_id: &ProjectId,
        files: BTreeMap<String, String>,
    ) -> Result<(), PreviewError> {
        self.update_preview(project_id, files).await
    }
}

struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Registry of per-project commit watchers
pub struct WatcherRegistry {
    vfs: Arc<VfsRegistry>,
    rebuilder: Arc<dyn Rebuilder>,
    poll_interval: Duration,
    events: broadcast::Sender<ReloadEvent>,
    watchers: Mutex<HashMap<ProjectId, WatcherHandle>>,
}

impl WatcherRegistry {
    pub fn new(vfs: Arc<VfsRegistry>, rebuilder: Arc<dyn Rebuilder>, config: &PreviewConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            vfs,
            rebuilder,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            events,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to reload events across all projects
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Start watching a project, replacing any previous watcher for it
    pub async fn start(&self, project_id: &ProjectId) {
        self.stop(project_id).await;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let vfs = Arc::clone(&self.vfs);
        let rebuilder = Arc::clone(&self.rebuilder);
        let events = self.events.clone();
        let poll_interval = self.poll_interval;
        let id = project_id.clone();

        let task = tokio::spawn(async move {
            info!(project_id = %id, "Watcher started");

            let mut last_commit: Option<String> = match vfs.get(&id).await {
                Some(handle) => handle.lock().await.current_commit_id().map(String::from),
                None => None,
            };

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                let Some(handle) = vfs.get(&id).await else {
                    continue;
                };

                let (current, files) = {
                    let guard = handle.lock().await;
                    (
                        guard.current_commit_id().map(String::from),
                        guard.list_files(),
                    )
                };

                let Some(commit_id) = current else {
                    continue;
                };
                if last_commit.as_deref() == Some(commit_id.as_str()) {
                    continue;
                }

                debug!(
                    project_id = %id,
                    from = last_commit.as_deref().unwrap_or("none"),
                    to = %commit_id,
                    "Commit observed"
                );

                // One rebuild per observed commit; a failed rebuild leaves
                // the previous container serving and is only logged.
                if let Err(err) = rebuilder.rebuild(&id, files).await {
                    error!(project_id = %id, error = %err, "Preview rebuild failed");
                }

                let _ = events.send(ReloadEvent {
                    project_id: id.clone(),
                    commit_id: commit_id.clone(),
                });

                last_commit = Some(commit_id);
            }

            info!(project_id = %id, "Watcher stopped");
        });

        self.watchers.lock().await.insert(
            project_id.clone(),
            WatcherHandle {
                shutdown: shutdown_tx,
                task,
            },
        );
    }

    /// Stop a project's watcher, if any
    pub async fn stop(&self, project_id: &ProjectId) {
        if let Some(handle) = self.watchers.lock().await.remove(project_id) {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
    }

    /// Stop every watcher (component shutdown)
    pub async fn stop_all(&self) {
        let mut watchers = self.watchers.lock().await;
        for (_, handle) in watchers.drain() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
    }

    /// Whether a project currently has a watcher
    pub async fn is_watching(&self, project_id: &ProjectId) -> bool {
        self.watchers.lock().await.contains_key(project_id)
    }
}
