//! Preview domain types

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::info;

use atelier_core::ProjectId;

/// Maximum retained log lines per preview
const LOG_RING_CAPACITY: usize = 200;

/// Preview lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Creating,
    Running,
    Stopped,
    Error,
}

/// Project type detected by file signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    PythonService,
    ReactSpa,
    NodeService,
    StaticSite,
}

impl ProjectType {
    /// Detect the project type from a file set.
    ///
    /// A backend dependency manifest wins over a frontend package manifest;
    /// anything unrecognised serves as a static site.
    pub fn detect(files: &BTreeMap<String, String>) -> Self {
        let has_any = |names: &[&str]| names.iter().any(|n| files.contains_key(*n));

        if has_any(&[
            "requirements.txt",
            "backend/requirements.txt",
            "pyproject.toml",
            "backend/pyproject.toml",
        ]) {
            return ProjectType::PythonService;
        }

        for pkg_path in ["package.json", "frontend/package.json"] {
            if let Some(content) = files.get(pkg_path) {
                let declares_react = serde_json::from_str::<serde_json::Value>(content)
                    .ok()
                    .and_then(|pkg| {
                        pkg.get("dependencies")
                            .and_then(|deps| deps.get("react"))
                            .map(|_| true)
                    })
                    .unwrap_or(false);
                return if declares_react {
                    ProjectType::ReactSpa
                } else {
                    ProjectType::NodeService
                };
            }
        }

        ProjectType::StaticSite
    }

    /// The port the container's dev command listens on
    pub fn container_port(&self) -> u16 {
        match self {
            ProjectType::PythonService => 8000,
            ProjectType::ReactSpa | ProjectType::NodeService => 3000,
            ProjectType::StaticSite => 80,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::PythonService => "python-service",
            ProjectType::ReactSpa => "react-spa",
            ProjectType::NodeService => "node-service",
            ProjectType::StaticSite => "static-site",
        }
    }
}

/// A live preview environment
#[derive(Debug)]
pub struct PreviewEnvironment {
    pub project_id: ProjectId,
    /// 8-char random token
    pub preview_id: String,
    pub container_name: String,
    pub container_id: Option<String>,
    pub image_tag: String,
    pub project_type: Option<ProjectType>,
    pub status: PreviewStatus,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub error_message: Option<String>,
    logs: VecDeque<String>,
}

impl PreviewEnvironment {
    pub fn new(project_id: ProjectId) -> Self {
        let preview_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let now = Utc::now();
        Self {
            container_name: format!("atelier-preview-{}", preview_id),
            image_tag: format!("atelier-preview-{}", preview_id),
            project_id,
            preview_id,
            container_id: None,
            project_type: None,
            status: PreviewStatus::Creating,
            port: None,
            url: None,
            created_at: now,
            last_accessed: now,
            error_message: None,
            logs: VecDeque::new(),
        }
    }

    /// Hard expiry check
    pub fn is_expired(&self, expiry_minutes: i64) -> bool {
        Utc::now() - self.created_at > Duration::minutes(expiry_minutes)
    }

    /// Idle expiry check (no access in the window)
    pub fn is_idle(&self, idle_minutes: i64) -> bool {
        Utc::now() - self.last_accessed > Duration::minutes(idle_minutes)
    }

    /// Record an access
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    /// Append to the log ring
    pub fn add_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(preview_id = %self.preview_id, "{}", message);

        let stamped = format!("[{}] {}", Utc::now().format("%H:%M:%S"), message);
        if self.logs.len() >= LOG_RING_CAPACITY {
            self.logs.pop_front();
        }
        self.logs.push_back(stamped);
    }

    /// Most recent log lines, oldest first
    pub fn recent_logs(&self, n: usize) -> Vec<String> {
        let skip = self.logs.len().saturating_sub(n);
        self.logs.iter().skip(skip).cloned().collect()
    }

    pub fn summary(&self) -> PreviewSummary {
        PreviewSummary {
            project_id: self.project_id.to_string(),
            preview_id: self.preview_id.clone(),
            status: self.status,
            project_type: self.project_type.map(|t| t.as_str()),
            port: self.port,
            url: self.url.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serializable view of a preview for status surfaces
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSummary {
    pub project_id: String,
    pub preview_id: String,
    pub status: PreviewStatus,
    pub project_type: Option<&'static str>,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Preview subsystem error
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Docker daemon unavailable")]
    DockerUnavailable,

    #[error("Container build failed: {0}")]
    BuildFailed(String),

    #[error("Health probe failed: container never became reachable on port {0}")]
    HealthProbeFailed(u16),

    #[error("No free port in the configured range")]
    PortsExhausted,

    #[error("Too many active previews (limit {0})")]
    TooManyPreviews(usize),

    #[error("No preview for project {0}")]
    NotFound(ProjectId),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
