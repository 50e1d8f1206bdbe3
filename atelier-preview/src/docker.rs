//! Docker CLI driver
//!
//! Containers are controlled through the `docker` binary rather than a
//! daemon socket client: build, run with resource caps on a dedicated
//! bridge network, logs, and removal. Every call has a hard timeout.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{PreviewError, ProjectType};

const CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters for `docker run`
pub struct RunSpec<'a> {
    pub image: &'a str,
    pub name: &'a str,
    pub host_port: u16,
    pub container_port: u16,
    pub network: &'a str,
    pub memory_mb: u64,
    pub cpus: f64,
    pub labels: Vec<(String, String)>,
}

/// Thin wrapper over the `docker` binary
pub struct DockerCli;

impl DockerCli {
    async fn run(args: &[&str], timeout: Duration) -> Result<(i32, String, String), PreviewError> {
        let mut command = Command::new("docker");
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| PreviewError::BuildFailed(format!("docker {} timed out", args[0])))?
            .map_err(|_| PreviewError::DockerUnavailable)?;

        Ok((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    /// Whether the daemon answers at all
    pub async fn available() -> bool {
        matches!(Self::run(&["version", "--format", "{{.Server.Version}}"], CLI_TIMEOUT).await,
            Ok((0, _, _)))
    }

    /// Create the bridge network when it does not exist yet
    pub async fn ensure_network(name: &str) -> Result<(), PreviewError> {
        let (code, _, _) = Self::run(&["network", "inspect", name], CLI_TIMEOUT).await?;
        if code == 0 {
            return Ok(());
        }

        let (code, _, stderr) = Self::run(
            &["network", "create", "--driver", "bridge", name],
            CLI_TIMEOUT,
        )
        .await?;
        // A concurrent creator may have won the race
        if code != 0 && !stderr.contains("already exists") {
            return Err(PreviewError::BuildFailed(format!(
                "Failed to create network {}: {}",
                name,
                stderr.trim()
            )));
        }

        debug!(network = name, "Preview network ready");
        Ok(())
    }

    /// Build an image from a directory containing a Dockerfile
    pub async fn build_image(
        tag: &str,
        dir: &Path,
        timeout: Duration,
    ) -> Result<(), PreviewError> {
        let dir_str = dir.display().to_string();
        let (code, _, stderr) = Self::run(
            &["build", "--rm", "-t", tag, &dir_str],
            timeout,
        )
        .await?;

        if code != 0 {
            let tail: String = stderr
                .lines()
                .rev()
                .take(10)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(PreviewError::BuildFailed(tail));
        }

        debug!(tag, "Image built");
        Ok(())
    }

    /// Start a detached container with port mapping and resource caps
    pub async fn run_container(spec: RunSpec<'_>) -> Result<String, PreviewError> {
        let port_mapping = format!("{}:{}", spec.host_port, spec.container_port);
        let memory = format!("{}m", spec.memory_mb);
        let cpus = format!("{}", spec.cpus);

        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.into(),
            "-p".into(),
            port_mapping,
            "--network".into(),
            spec.network.into(),
            "--memory".into(),
            memory,
            "--cpus".into(),
            cpus,
        ];
        for (key, value) in &spec.labels {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.image.into());

        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let (code, stdout, stderr) = Self::run(&arg_refs, CLI_TIMEOUT).await?;

        if code != 0 {
            return Err(PreviewError::BuildFailed(format!(
                "docker run failed: {}",
                stderr.trim()
            )));
        }

        Ok(stdout.trim().to_string())
    }

    /// Force-remove a container; missing containers are not an error
    pub async fn remove_container(name: &str) -> Result<(), PreviewError> {
        let (code, _, stderr) = Self::run(&["rm", "-f", name], CLI_TIMEOUT).await?;
        if code != 0 && !stderr.contains("No such container") {
            warn!(container = name, stderr = %stderr.trim(), "Failed to remove container");
        }
        Ok(())
    }

    /// Remove an image; missing images are not an error
    pub async fn remove_image(tag: &str) -> Result<(), PreviewError> {
        let (_, _, _) = Self::run(&["rmi", "-f", tag], CLI_TIMEOUT).await?;
        Ok(())
    }

    /// Tail a container's logs
    pub async fn container_logs(name: &str, tail: usize) -> Result<String, PreviewError> {
        let tail_arg = tail.to_string();
        let (code, stdout, stderr) =
            Self::run(&["logs", "--tail", &tail_arg, name], CLI_TIMEOUT).await?;
        if code != 0 {
            return Err(PreviewError::BuildFailed(format!(
                "docker logs failed: {}",
                stderr.trim()
            )));
        }
        // Container logs interleave stdout and stderr
        Ok(format!("{}{}", stdout, stderr))
    }
}

/// Synthesize a Dockerfile for a detected project type.
///
/// Generated trees occasionally ship their own Dockerfile; callers keep it
/// when present and only fall back to these.
pub fn dockerfile_for(project_type: ProjectType, files: &BTreeMap<String, String>) -> String {
    match project_type {
        ProjectType::PythonService => {
            let requirements = [
                "requirements.txt",
                "backend/requirements.txt",
            ]
            .into_iter()
            .find(|p| files.contains_key(*p))
            .unwrap_or("requirements.txt");

            let app_dir = match requirements.rsplit_once('/') {
                Some((dir, _)) => dir,
                None => ".",
            };

            format!(
                "FROM python:3.12-slim\n\
                 WORKDIR /app\n\
                 COPY . .\n\
                 RUN pip install --no-cache-dir -r {requirements}\n\
                 EXPOSE 8000\n\
                 CMD [\"uvicorn\", \"main:app\", \"--host\", \"0.0.0.0\", \"--port\", \"8000\", \"--reload\", \"--app-dir\", \"{app_dir}\"]\n"
            )
        }
        ProjectType::ReactSpa | ProjectType::NodeService => {
            let package = ["package.json", "frontend/package.json"]
                .into_iter()
                .find(|p| files.contains_key(*p))
                .unwrap_or("package.json");

            let app_dir = match package.rsplit_once('/') {
                Some((dir, _)) => dir,
                None => ".",
            };

            format!(
                "FROM node:20-alpine\n\
                 WORKDIR /app\n\
                 COPY . .\n\
                 RUN cd {app_dir} && npm install\n\
                 EXPOSE 3000\n\
                 CMD [\"sh\", \"-c\", \"cd {app_dir} && npm run dev -- --host 0.0.0.0 --port 3000\"]\n"
            )
        }
        ProjectType::StaticSite => "FROM nginx:alpine\n\
             COPY . /usr/share/nginx/html\n\
             EXPOSE 80\n"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn test_python_dockerfile_points_at_backend_dir() {
        let set = files(&[("backend/requirements.txt", "fastapi")]);
        let dockerfile = dockerfile_for(ProjectType::PythonService, &set);
        assert!(dockerfile.contains("-r backend/requirements.txt"));
        assert!(dockerfile.contains("--app-dir\", \"backend\""));
        assert!(dockerfile.contains("EXPOSE 8000"));
    }

    #[test]
    fn test_react_dockerfile_uses_frontend_dir() {
        let set = files(&[("frontend/package.json", "{}")]);
        let dockerfile = dockerfile_for(ProjectType::ReactSpa, &set);
        assert!(dockerfile.contains("cd frontend && npm install"));
        assert!(dockerfile.contains("EXPOSE 3000"));
    }

    #[test]
    fn test_static_dockerfile() {
        let dockerfile = dockerfile_for(ProjectType::StaticSite, &BTreeMap::new());
        assert!(dockerfile.contains("nginx"));
        assert!(dockerfile.contains("EXPOSE 80"));
    }
}
