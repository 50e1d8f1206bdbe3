//! Preview environment manager
//!
//! Owns every [`PreviewEnvironment`]: creation (detect, synthesize
//! Dockerfile, build, run, probe), rebuilds on update, idempotent stop,
//! and the background reaper that removes expired or idle previews.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use atelier_core::config::PreviewConfig;
use atelier_core::ProjectId;

use crate::docker::{dockerfile_for, DockerCli, RunSpec};
use crate::domain::{PreviewEnvironment, PreviewError, PreviewStatus, PreviewSummary, ProjectType};
use crate::ports::PortAllocator;

const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Manager of ephemeral preview containers
pub struct PreviewManager {
    config: PreviewConfig,
    docker_available: bool,
    registry: Mutex<HashMap<ProjectId, PreviewEnvironment>>,
    ports: PortAllocator,
}

impl PreviewManager {
    /// Probe the Docker daemon and construct the manager
    pub async fn new(config: PreviewConfig) -> Self {
        let docker_available = DockerCli::available().await;
        if docker_available {
            if let Err(error) = DockerCli::ensure_network(&config.network).await {
                warn!(%error, "Failed to prepare preview network");
            }
        } else {
            warn!("Docker unavailable, preview subsystem disabled");
        }
        Self::with_docker(config, docker_available)
    }

    /// Construct with an explicit availability flag (embedding and tests)
    pub fn with_docker(config: PreviewConfig, docker_available: bool) -> Self {
        let ports = PortAllocator::new(config.port_range_start, config.port_range_end);
        Self {
            config,
            docker_available,
            registry: Mutex::new(HashMap::new()),
            ports,
        }
    }

    /// Whether the subsystem can serve previews at all
    pub fn is_available(&self) -> bool {
        self.docker_available
    }

    /// Number of previews currently creating or running
    pub async fn active_count(&self) -> usize {
        self.registry
            .lock()
            .await
            .values()
            .filter(|e| matches!(e.status, PreviewStatus::Creating | PreviewStatus::Running))
            .count()
    }

    /// Create (or replace) the preview for a project.
    ///
    /// On build failure the environment stays registered with Error status
    /// and the error propagates.
    pub async fn create_preview(
        &self,
        project_id: &ProjectId,
        files: BTreeMap<String, String>,
    ) -> Result<PreviewSummary, PreviewError> {
        if !self.docker_available {
            return Err(PreviewError::DockerUnavailable);
        }

        // Replace semantics: tear down any previous preview first
        self.stop_preview(project_id).await?;

        if self.active_count().await >= self.config.max_previews {
            return Err(PreviewError::TooManyPreviews(self.config.max_previews));
        }

        let mut env = PreviewEnvironment::new(project_id.clone());
        env.add_log("Creating preview environment");
        let preview_dir = self.config.directory.join(&env.preview_id);
        self.registry.lock().await.insert(project_id.clone(), env);

        match self.provision(project_id, &preview_dir, &files).await {
            Ok(()) => {
                let registry = self.registry.lock().await;
                Ok(registry
                    .get(project_id)
                    .expect("environment registered above")
                    .summary())
            }
            Err(error) => {
                self.mark_error(project_id, &error).await;
                Err(error)
            }
        }
    }

    async fn provision(
        &self,
        project_id: &ProjectId,
        preview_dir: &Path,
        files: &BTreeMap<String, String>,
    ) -> Result<(), PreviewError> {
        write_tree(preview_dir, files)?;
        self.log(project_id, format!("Wrote {} files", files.len())).await;

        let project_type = ProjectType::detect(files);
        self.log(project_id, format!("Detected project type: {}", project_type.as_str()))
            .await;

        if !files.contains_key("Dockerfile") {
            let dockerfile = dockerfile_for(project_type, files);
            std::fs::write(preview_dir.join("Dockerfile"), dockerfile).map_err(|source| {
                PreviewError::Io {
                    path: preview_dir.display().to_string(),
                    source,
                }
            })?;
        }

        let port = self.ports.allocate().await?;

        let (image_tag, container_name) = {
            let mut registry = self.registry.lock().await;
            let env = registry
                .get_mut(project_id)
                .ok_or_else(|| PreviewError::NotFound(project_id.clone()))?;
            env.project_type = Some(project_type);
            env.port = Some(port);
            (env.image_tag.clone(), env.container_name.clone())
        };

        self.build_and_run(
            project_id,
            &image_tag,
            &container_name,
            preview_dir,
            project_type,
            port,
        )
        .await?;

        let url = format!("http://localhost:{}", port);
        {
            let mut registry = self.registry.lock().await;
            if let Some(env) = registry.get_mut(project_id) {
                env.status = PreviewStatus::Running;
                env.url = Some(url.clone());
                env.add_log(format!("Preview running at {}", url));
            }
        }

        Ok(())
    }

    async fn build_and_run(
        &self,
        project_id: &ProjectId,
        image_tag: &str,
        container_name: &str,
        preview_dir: &Path,
        project_type: ProjectType,
        port: u16,
    ) -> Result<(), PreviewError> {
        let build_budget = Duration::from_secs(self.config.build_timeout_seconds);

        self.log(project_id, "Building container image").await;
        DockerCli::build_image(image_tag, preview_dir, build_budget).await?;

        // The previous container (if any) keeps serving until the new image
        // built successfully.
        DockerCli::remove_container(container_name).await?;

        let memory_mb = match project_type {
            ProjectType::StaticSite => self.config.static_memory_limit_mb,
            _ => self.config.memory_limit_mb,
        };

        let container_id = DockerCli::run_container(RunSpec {
            image: image_tag,
            name: container_name,
            host_port: port,
            container_port: project_type.container_port(),
            network: &self.config.network,
            memory_mb,
            cpus: self.config.cpus,
            labels: vec![
                ("atelier".to_string(), "preview".to_string()),
                ("project_id".to_string(), project_id.to_string()),
            ],
        })
        .await?;

        {
            let mut registry = self.registry.lock().await;
            if let Some(env) = registry.get_mut(project_id) {
                env.container_id = Some(container_id);
                env.add_log(format!("Container started: {}", container_name));
            }
        }

        self.log(project_id, "Waiting for container health").await;
        if !probe_port(port, build_budget).await {
            DockerCli::remove_container(container_name).await?;
            return Err(PreviewError::HealthProbeFailed(port));
        }

        Ok(())
    }

    /// Rebuild a project's preview with new files.
    ///
    /// The image builds before the old container is removed, so a failed
    /// build leaves the last good container serving.
    pub async fn update_preview(
        &self,
        project_id: &ProjectId,
        files: BTreeMap<String, String>,
    ) -> Result<(), PreviewError> {
        if !self.docker_available {
            return Err(PreviewError::DockerUnavailable);
        }

        let (preview_id, image_tag, container_name, port, project_type) = {
            let registry = self.registry.lock().await;
            let env = registry
                .get(project_id)
                .ok_or_else(|| PreviewError::NotFound(project_id.clone()))?;
            (
                env.preview_id.clone(),
                env.image_tag.clone(),
                env.container_name.clone(),
                env.port.ok_or_else(|| PreviewError::NotFound(project_id.clone()))?,
                env.project_type.unwrap_or(ProjectType::StaticSite),
            )
        };

        let preview_dir = self.config.directory.join(&preview_id);
        write_tree(&preview_dir, &files)?;
        if !files.contains_key("Dockerfile") {
            let dockerfile = dockerfile_for(ProjectType::detect(&files), &files);
            std::fs::write(preview_dir.join("Dockerfile"), dockerfile).map_err(|source| {
                PreviewError::Io {
                    path: preview_dir.display().to_string(),
                    source,
                }
            })?;
        }

        self.log(project_id, "Rebuilding preview").await;
        match self
            .build_and_run(
                project_id,
                &image_tag,
                &container_name,
                &preview_dir,
                project_type,
                port,
            )
            .await
        {
            Ok(()) => {
                let mut registry = self.registry.lock().await;
                if let Some(env) = registry.get_mut(project_id) {
                    env.status = PreviewStatus::Running;
                    env.add_log("Rebuild complete");
                }
                Ok(())
            }
            Err(error) => {
                self.mark_error(project_id, &error).await;
                Err(error)
            }
        }
    }

    /// Stop and remove a project's preview. Idempotent.
    pub async fn stop_preview(&self, project_id: &ProjectId) -> Result<(), PreviewError> {
        let Some(env) = self.registry.lock().await.remove(project_id) else {
            return Ok(());
        };

        info!(project_id = %project_id, preview_id = %env.preview_id, "Stopping preview");

        if self.docker_available {
            DockerCli::remove_container(&env.container_name).await?;
            DockerCli::remove_image(&env.image_tag).await?;
        }

        if let Some(port) = env.port {
            self.ports.release(port).await;
        }

        let preview_dir = self.config.directory.join(&env.preview_id);
        if preview_dir.exists() {
            if let Err(error) = std::fs::remove_dir_all(&preview_dir) {
                warn!(path = %preview_dir.display(), %error, "Failed to remove preview directory");
            }
        }

        Ok(())
    }

    /// Current preview summary, if any
    pub async fn get(&self, project_id: &ProjectId) -> Option<PreviewSummary> {
        self.registry
            .lock()
            .await
            .get(project_id)
            .map(|env| env.summary())
    }

    /// Record an access so the idle reaper leaves the preview alone
    pub async fn touch(&self, project_id: &ProjectId) {
        if let Some(env) = self.registry.lock().await.get_mut(project_id) {
            env.touch();
        }
    }

    /// Recent log lines for a preview
    pub async fn logs(&self, project_id: &ProjectId, n: usize) -> Option<Vec<String>> {
        self.registry
            .lock()
            .await
            .get(project_id)
            .map(|env| env.recent_logs(n))
    }

    async fn log(&self, project_id: &ProjectId, message: impl Into<String>) {
        if let Some(env) = self.registry.lock().await.get_mut(project_id) {
            env.add_log(message);
        }
    }

    async fn mark_error(&self, project_id: &ProjectId, error: &PreviewError) {
        let mut registry = self.registry.lock().await;
        if let Some(env) = registry.get_mut(project_id) {
            env.status = PreviewStatus::Error;
            env.error_message = Some(error.to_string());
            env.add_log(format!("Error: {}", error));
        }
    }

    /// Remove every expired or idle preview; returns how many were reaped
    pub async fn reap_expired(&self) -> usize {
        let stale: Vec<ProjectId> = {
            let registry = self.registry.lock().await;
            registry
                .iter()
                .filter(|(_, env)| {
                    env.is_expired(self.config.expiry_minutes)
                        || env.is_idle(self.config.idle_minutes)
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut reaped = 0;
        for project_id in stale {
            info!(project_id = %project_id, "Reaping stale preview");
            if let Err(error) = self.stop_preview(&project_id).await {
                error!(project_id = %project_id, %error, "Failed to reap preview");
            } else {
                reaped += 1;
            }
        }
        reaped
    }

    /// Background loop removing stale previews until shutdown
    pub fn spawn_reaper(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(REAPER_INTERVAL) => {
                        manager.reap_expired().await;
                    }
                }
            }
            info!("Preview reaper stopped");
        })
    }
}

/// Materialise a file map under a directory
fn write_tree(dir: &Path, files: &BTreeMap<String, String>) -> Result<(), PreviewError> {
    let io_err = |path: PathBuf| {
        move |source| PreviewError::Io {
            path: path.display().to_string(),
            source,
        }
    };

    std::fs::create_dir_all(dir).map_err(io_err(dir.to_path_buf()))?;
    for (path, content) in files {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent.to_path_buf()))?;
        }
        std::fs::write(&full, content).map_err(io_err(full.clone()))?;
    }
    Ok(())
}

async fn probe_port(port: u16, budget: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
