//! Facade contract tests that need no providers and no Docker

use atelier::{AppService, Config, ProjectId, ProjectStatus};

async fn service() -> (std::sync::Arc<AppService>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.memory.directory = dir.path().join("memory");
    config.preview.directory = dir.path().join("previews");
    config.storage.vfs_snapshot_directory = Some(dir.path().join("vfs"));
    (AppService::new(config).await, dir)
}

#[tokio::test]
async fn test_generation_without_providers_fails_cleanly() {
    let (service, _dir) = service().await;

    let id = service.generate_project("TodoApp", "a todo list", None).await;
    // Pending or already Generating depending on task scheduling
    assert!(service.project_status(&id).await.is_some());

    // With no providers the Core task has no router decision: fatal
    for _ in 0..100 {
        if service.project_status(&id).await == Some(ProjectStatus::Failed) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("generation never settled");
}

#[tokio::test]
async fn test_edit_on_missing_project_errors() {
    let (service, _dir) = service().await;
    let result = service
        .edit_project(&ProjectId::from("ghost"), "do anything", None, None)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_preview_endpoints_degrade_without_docker() {
    let (service, _dir) = service().await;
    if service.preview_available() {
        // A local Docker daemon would turn this into a live-build test
        eprintln!("Docker available, skipping unavailability check");
        return;
    }

    let ghost = ProjectId::from("ghost");
    assert!(service.preview_status(&ghost).await.is_none());
    assert!(service.create_preview(&ghost, None).await.is_err());
    // Stop stays idempotent even with the subsystem down
    service.stop_preview(&ghost).await.unwrap();
}

#[tokio::test]
async fn test_reload_subscription_outlives_projects() {
    let (service, _dir) = service().await;
    let receiver = service.subscribe_reloads();
    drop(receiver);
    // A second subscription is always possible
    let _receiver = service.subscribe_reloads();
}
