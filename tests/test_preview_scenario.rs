//! Full preview lifecycle against a real Docker daemon.
//!
//! Ignored by default; run with `cargo test -- --ignored` on a machine with
//! Docker. The watcher causality half of this scenario runs daemon-free in
//! `atelier-preview`'s unit tests.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::config::PreviewConfig;
use atelier_core::ProjectId;
use atelier_preview::{PreviewManager, PreviewStatus, Rebuilder, WatcherRegistry};
use atelier_vfs::VfsRegistry;

fn python_service_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "main.py",
            "from fastapi import FastAPI\n\napp = FastAPI()\n\n\n@app.get(\"/\")\ndef root():\n    return {\"status\": \"ok\"}\n",
        ),
        ("requirements.txt", "fastapi\nuvicorn[standard]\n"),
    ]
}

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn test_preview_create_edit_reload_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = PreviewConfig {
        directory: dir.path().to_path_buf(),
        poll_interval_ms: 500,
        ..Default::default()
    };

    let manager = Arc::new(PreviewManager::new(config.clone()).await);
    assert!(manager.is_available(), "Docker daemon required");

    let vfs = Arc::new(VfsRegistry::new());
    let project_id = ProjectId::from("preview-e2e");

    let handle = vfs.get_or_create(&project_id).await;
    {
        let mut guard = handle.lock().await;
        for (path, content) in python_service_files() {
            guard.write_file(path, content);
        }
        guard.commit("initial");
    }

    // Create the preview: Running, URL on a port in the configured range
    let files = handle.lock().await.list_files();
    let summary = manager.create_preview(&project_id, files).await.unwrap();
    assert_eq!(summary.status, PreviewStatus::Running);
    let port = summary.port.unwrap();
    assert!((config.port_range_start..=config.port_range_end).contains(&port));
    assert_eq!(summary.url, Some(format!("http://localhost:{}", port)));

    // Watch and commit an edit: exactly one reload event arrives
    let watchers = WatcherRegistry::new(
        Arc::clone(&vfs),
        Arc::clone(&manager) as Arc<dyn Rebuilder>,
        &config,
    );
    let mut events = watchers.subscribe();
    watchers.start(&project_id).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let commit_id = {
        let mut guard = handle.lock().await;
        guard.write_file(
            "main.py",
            "from fastapi import FastAPI\n\napp = FastAPI()\n\n\n@app.get(\"/\")\ndef root():\n    return {\"status\": \"updated\"}\n",
        );
        guard.commit("edit backend entry")
    };

    let event = tokio::time::timeout(
        Duration::from_secs(config.build_timeout_seconds + 10),
        events.recv(),
    )
    .await
    .expect("reload within poll interval plus rebuild budget")
    .unwrap();
    assert_eq!(event.commit_id, commit_id);

    let summary = manager.get(&project_id).await.unwrap();
    assert_eq!(summary.status, PreviewStatus::Running);

    watchers.stop_all().await;
    manager.stop_preview(&project_id).await.unwrap();
    assert!(manager.get(&project_id).await.is_none());
}
