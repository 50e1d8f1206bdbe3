//! The application service facade
//!
//! One [`AppService`] owns every per-project registry (VFS, memory,
//! previews, watchers) plus the router and orchestrator. Collaborator
//! layers call these methods; nothing else holds project state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use atelier_core::{Config, ProjectId};
use atelier_engine::{
    EditOutcome, EditRequest, EngineError, GenerateRequest, Orchestrator,
};
use atelier_llm::{providers_from_config, ModelRouter, RouterStats};
use atelier_memory::MemoryRegistry;
use atelier_preview::{
    PreviewError, PreviewManager, PreviewSummary, ReloadEvent, WatcherRegistry,
};
use atelier_validate::{TestRunner, ValidationPipeline};
use atelier_vfs::VfsRegistry;

/// Externally visible project lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Generating,
    Ready,
    Failed,
}

/// The embeddable service exposing the engine's contracts
pub struct AppService {
    config: Config,
    router: Arc<ModelRouter>,
    vfs: Arc<VfsRegistry>,
    memory: Arc<MemoryRegistry>,
    previews: Arc<PreviewManager>,
    watchers: Arc<WatcherRegistry>,
    orchestrator: Arc<Orchestrator>,
    statuses: RwLock<HashMap<ProjectId, ProjectStatus>>,
    shutdown: watch::Sender<bool>,
    reaper: JoinHandle<()>,
}

impl AppService {
    /// Wire the whole engine from configuration.
    ///
    /// Restores VFS snapshots when a snapshot directory is configured.
    pub async fn new(config: Config) -> Arc<Self> {
        let providers = providers_from_config(&config.llm);
        info!(providers = providers.len(), "LLM providers configured");

        let router = Arc::new(ModelRouter::new(providers, config.router.clone()));
        let vfs = Arc::new(VfsRegistry::new());
        let memory = Arc::new(MemoryRegistry::new(&config.memory));
        let pipeline = Arc::new(ValidationPipeline::with_default_validators(
            &config.validation,
        ));
        let test_runner = Arc::new(TestRunner::new(&config.validation));

        let previews = Arc::new(PreviewManager::new(config.preview.clone()).await);
        let watchers = Arc::new(WatcherRegistry::new(
            Arc::clone(&vfs),
            Arc::clone(&previews) as Arc<dyn atelier_preview::Rebuilder>,
            &config.preview,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&router),
            Arc::clone(&vfs),
            Arc::clone(&memory),
            pipeline,
            test_runner,
            &config,
        ));

        if let Some(ref snapshot_dir) = config.storage.vfs_snapshot_directory {
            vfs.restore_snapshots(snapshot_dir).await;
            let restored = vfs.project_ids().await.len();
            if restored > 0 {
                info!(projects = restored, "Restored VFS snapshots");
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let reaper = previews.spawn_reaper(shutdown_rx);

        let service = Arc::new(Self {
            config,
            router,
            vfs,
            memory,
            previews,
            watchers,
            orchestrator,
            statuses: RwLock::new(HashMap::new()),
            shutdown,
            reaper,
        });

        // Projects restored from snapshots are ready as committed
        for project_id in service.vfs.project_ids().await {
            service
                .statuses
                .write()
                .await
                .insert(project_id, ProjectStatus::Ready);
        }

        service
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Start generating a project; returns immediately with its id.
    ///
    /// Progress is observable through [`AppService::project_status`].
    pub async fn generate_project(
        self: &Arc<Self>,
        project_name: impl Into<String>,
        spec: impl Into<String>,
        image_data: Option<String>,
    ) -> ProjectId {
        let project_id = ProjectId::generate();
        let request = GenerateRequest {
            project_id: project_id.clone(),
            project_name: project_name.into(),
            spec: spec.into(),
            image_data,
        };

        self.statuses
            .write()
            .await
            .insert(project_id.clone(), ProjectStatus::Pending);

        let service = Arc::clone(self);
        let id = project_id.clone();
        tokio::spawn(async move {
            service
                .statuses
                .write()
                .await
                .insert(id.clone(), ProjectStatus::Generating);

            let status = match service.orchestrator.generate(request).await {
                Ok(outcome) => {
                    info!(project_id = %id, commit_id = %outcome.commit_id, "Project generated");
                    ProjectStatus::Ready
                }
                Err(error) => {
                    error!(project_id = %id, %error, "Generation failed");
                    ProjectStatus::Failed
                }
            };

            service.statuses.write().await.insert(id, status);
        });

        project_id
    }

    /// Current lifecycle state of a project
    pub async fn project_status(&self, project_id: &ProjectId) -> Option<ProjectStatus> {
        self.statuses.read().await.get(project_id).copied()
    }

    /// The project's files as of the latest commit
    pub async fn project_files(
        &self,
        project_id: &ProjectId,
    ) -> Option<BTreeMap<String, String>> {
        let vfs = self.vfs.get(project_id).await?;
        let guard = vfs.lock().await;
        Some(guard.list_files())
    }

    /// Apply a natural-language edit; returns the changed files.
    pub async fn edit_project(
        &self,
        project_id: &ProjectId,
        instruction: impl Into<String>,
        image_data: Option<String>,
        files: Option<BTreeMap<String, String>>,
    ) -> Result<EditOutcome, EngineError> {
        let request = EditRequest {
            project_id: project_id.clone(),
            project_name: project_id.to_string(),
            instruction: instruction.into(),
            image_data,
            files,
        };
        self.orchestrator.edit(request).await
    }

    // ── Preview ─────────────────────────────────────────────────────

    /// Create (or replace) a live preview and start its commit watcher.
    pub async fn create_preview(
        &self,
        project_id: &ProjectId,
        files: Option<BTreeMap<String, String>>,
    ) -> Result<PreviewSummary, PreviewError> {
        let files = match files {
            Some(files) if !files.is_empty() => files,
            _ => self
                .project_files(project_id)
                .await
                .unwrap_or_default(),
        };
        if files.is_empty() {
            return Err(PreviewError::NotFound(project_id.clone()));
        }

        let summary = self.previews.create_preview(project_id, files).await?;
        self.watchers.start(project_id).await;
        Ok(summary)
    }

    /// Preview status; counts as an access for the idle reaper
    pub async fn preview_status(&self, project_id: &ProjectId) -> Option<PreviewSummary> {
        self.previews.touch(project_id).await;
        self.previews.get(project_id).await
    }

    /// Recent preview log lines
    pub async fn preview_logs(&self, project_id: &ProjectId, n: usize) -> Option<Vec<String>> {
        self.previews.touch(project_id).await;
        self.previews.logs(project_id, n).await
    }

    /// Force a rebuild with the given (or latest) files
    pub async fn update_preview(
        &self,
        project_id: &ProjectId,
        files: Option<BTreeMap<String, String>>,
    ) -> Result<(), PreviewError> {
        let files = match files {
            Some(files) if !files.is_empty() => files,
            _ => self
                .project_files(project_id)
                .await
                .unwrap_or_default(),
        };
        self.previews.update_preview(project_id, files).await
    }

    /// Stop a project's preview and watcher. Idempotent.
    pub async fn stop_preview(&self, project_id: &ProjectId) -> Result<(), PreviewError> {
        self.watchers.stop(project_id).await;
        self.previews.stop_preview(project_id).await
    }

    /// Push stream of reload events, one per observed commit
    pub fn subscribe_reloads(&self) -> broadcast::Receiver<ReloadEvent> {
        self.watchers.subscribe()
    }

    /// Materialise a project's latest commit under its working directory
    /// and return the path (used for ZIP export and local test runs by
    /// collaborator layers).
    pub async fn export_project(
        &self,
        project_id: &ProjectId,
    ) -> Option<std::path::PathBuf> {
        let vfs = self.vfs.get(project_id).await?;
        let target = self
            .config
            .storage
            .work_directory
            .join(project_id.to_string());

        let guard = vfs.lock().await;
        match guard.export_to_disk(&target) {
            Ok(()) => Some(target),
            Err(error) => {
                error!(project_id = %project_id, %error, "Export failed");
                None
            }
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Tear down everything a project owns
    pub async fn delete_project(&self, project_id: &ProjectId) {
        if let Err(error) = self.stop_preview(project_id).await {
            warn!(project_id = %project_id, %error, "Failed to stop preview during delete");
        }
        self.vfs.remove(project_id).await;
        if let Err(error) = self.memory.delete_project(project_id).await {
            warn!(project_id = %project_id, %error, "Failed to delete project memory");
        }
        self.statuses.write().await.remove(project_id);
        info!(project_id = %project_id, "Project deleted");
    }

    /// Router health statistics for status surfaces
    pub async fn router_stats(&self) -> RouterStats {
        self.router.stats().await
    }

    /// Whether previews can be served at all
    pub fn preview_available(&self) -> bool {
        self.previews.is_available()
    }

    /// Graceful shutdown: stop watchers and the reaper, save snapshots.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.watchers.stop_all().await;
        self.reaper.abort();

        if let Some(ref snapshot_dir) = self.config.storage.vfs_snapshot_directory {
            if let Err(error) = self.vfs.save_snapshots(snapshot_dir).await {
                error!(%error, "Failed to save VFS snapshots");
            }
        }
        info!("Service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> (Arc<AppService>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.memory.directory = dir.path().join("memory");
        config.storage.vfs_snapshot_directory = None;
        config.preview.directory = dir.path().join("previews");
        (AppService::new(config).await, dir)
    }

    #[tokio::test]
    async fn test_generate_transitions_status() {
        let (service, _dir) = service().await;

        // No providers configured: generation fails, status reflects it
        let id = service.generate_project("App", "an app", None).await;
        assert!(service.project_status(&id).await.is_some());

        for _ in 0..50 {
            if service.project_status(&id).await == Some(ProjectStatus::Failed) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("generation never settled");
    }

    #[tokio::test]
    async fn test_unknown_project_has_no_status_or_files() {
        let (service, _dir) = service().await;
        let ghost = ProjectId::from("ghost");
        assert!(service.project_status(&ghost).await.is_none());
        assert!(service.project_files(&ghost).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_project_clears_state() {
        let (service, _dir) = service().await;
        let id = service.generate_project("App", "an app", None).await;
        service.delete_project(&id).await;
        assert!(service.project_status(&id).await.is_none());
    }
}
