//! Edit pipeline tests: minimal patches, commits, failure semantics

mod common;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use atelier_core::config::Config;
use atelier_core::ProjectId;
use atelier_engine::{EditRequest, EngineError, Orchestrator};
use atelier_llm::{LlmProvider, ModelRouter};
use atelier_memory::MemoryRegistry;
use atelier_validate::validators::PythonSyntaxValidator;
use atelier_validate::{TestRunner, ValidationPipeline};
use atelier_vfs::VfsRegistry;

use common::mocks::RoleScriptedProvider;

fn harness(
    providers: Vec<Arc<dyn LlmProvider>>,
    dir: &Path,
) -> (Orchestrator, Arc<VfsRegistry>) {
    let mut config = Config::default();
    config.memory.directory = dir.join("memory");

    let router = Arc::new(ModelRouter::new(providers, config.router.clone()));
    let vfs = Arc::new(VfsRegistry::new());
    let memory = Arc::new(MemoryRegistry::new(&config.memory));

    let mut pipeline = ValidationPipeline::new(&config.validation);
    pipeline.register(Arc::new(PythonSyntaxValidator));
    let pipeline = Arc::new(pipeline);

    let orchestrator = Orchestrator::new(
        router,
        Arc::clone(&vfs),
        memory,
        pipeline,
        Arc::new(TestRunner::new(&config.validation)),
        &config,
    );

    (orchestrator, vfs)
}

async fn seed_project(vfs: &VfsRegistry, project_id: &ProjectId, files: &[(&str, &str)]) {
    let handle = vfs.get_or_create(project_id).await;
    let mut guard = handle.lock().await;
    for (path, content) in files {
        guard.write_file(*path, *content);
    }
    guard.commit("seed");
}

fn edit_request(project_id: &str, instruction: &str) -> EditRequest {
    EditRequest {
        project_id: ProjectId::from(project_id),
        project_name: "App".to_string(),
        instruction: instruction.to_string(),
        image_data: None,
        files: None,
    }
}

/// A single changed function arrives as a structure-preserving patch.
#[tokio::test]
async fn test_edit_reduces_to_function_replace() {
    let old = "def calculate(x):\n    return x * 2\n\n\ndef other():\n    return 0\n";
    let new = "def calculate(x):\n    return x * 3\n\n\ndef other():\n    return 0\n";

    let reply = serde_json::json!({ "backend/main.py": new });
    let provider = RoleScriptedProvider::new("ignored").on_role("EDIT", reply.to_string());

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, vfs) = harness(vec![Arc::new(provider) as Arc<dyn LlmProvider>], dir.path());

    let project_id = ProjectId::from("edit-1");
    seed_project(&vfs, &project_id, &[("backend/main.py", old)]).await;

    let outcome = orchestrator
        .edit(edit_request("edit-1", "multiply by three"))
        .await
        .unwrap();

    assert_eq!(outcome.patches["backend/main.py"], "function_replace");
    assert_eq!(outcome.changed_files["backend/main.py"], new);
    assert!(outcome.commit_id.is_some());

    // The VFS advanced to the edit commit
    let handle = vfs.get(&project_id).await.unwrap();
    let guard = handle.lock().await;
    assert_eq!(guard.read_file("backend/main.py"), Some(new));
    assert_eq!(guard.commit_count(), 2);
    assert!(guard.get_history(1)[0].message.starts_with("Edit: multiply"));
}

/// Files the agent did not mention stay untouched.
#[tokio::test]
async fn test_edit_leaves_unmentioned_files_alone() {
    let reply = serde_json::json!({ "frontend/src/App.jsx": "export default () => <b>red</b>;" });
    let provider = RoleScriptedProvider::new("ignored").on_role("EDIT", reply.to_string());

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, vfs) = harness(vec![Arc::new(provider) as Arc<dyn LlmProvider>], dir.path());

    let project_id = ProjectId::from("edit-2");
    seed_project(
        &vfs,
        &project_id,
        &[
            ("frontend/src/App.jsx", "export default () => <b>blue</b>;"),
            ("backend/main.py", "x = 1\n"),
        ],
    )
    .await;

    let outcome = orchestrator
        .edit(edit_request("edit-2", "make the button red"))
        .await
        .unwrap();

    assert_eq!(outcome.changed_files.len(), 1);
    assert_eq!(outcome.patches["frontend/src/App.jsx"], "full_replace");

    let handle = vfs.get(&project_id).await.unwrap();
    assert_eq!(handle.lock().await.read_file("backend/main.py"), Some("x = 1\n"));
}

/// Proposing identical content produces no commit.
#[tokio::test]
async fn test_noop_edit_creates_no_commit() {
    let content = "def f():\n    return 1\n";
    let reply = serde_json::json!({ "backend/main.py": content });
    let provider = RoleScriptedProvider::new("ignored").on_role("EDIT", reply.to_string());

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, vfs) = harness(vec![Arc::new(provider) as Arc<dyn LlmProvider>], dir.path());

    let project_id = ProjectId::from("edit-3");
    seed_project(&vfs, &project_id, &[("backend/main.py", content)]).await;

    let outcome = orchestrator
        .edit(edit_request("edit-3", "change nothing"))
        .await
        .unwrap();

    assert!(outcome.commit_id.is_none());
    assert!(outcome.changed_files.is_empty());

    let handle = vfs.get(&project_id).await.unwrap();
    assert_eq!(handle.lock().await.commit_count(), 1);
}

/// An empty project cannot be edited.
#[tokio::test]
async fn test_edit_empty_project_fails() {
    let provider = RoleScriptedProvider::new("ignored");
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, _vfs) = harness(vec![Arc::new(provider) as Arc<dyn LlmProvider>], dir.path());

    let err = orchestrator
        .edit(edit_request("ghost", "do something"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyProject(_)));
}

/// With no provider for the Edit task the error re-raises to the caller.
#[tokio::test]
async fn test_edit_without_provider_re_raises() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, vfs) = harness(vec![], dir.path());

    let project_id = ProjectId::from("edit-4");
    seed_project(&vfs, &project_id, &[("backend/main.py", "x = 1\n")]).await;

    let err = orchestrator
        .edit(edit_request("edit-4", "anything"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ProviderUnavailable(_)));
}

/// Explicit file sets bypass the VFS load.
#[tokio::test]
async fn test_edit_accepts_explicit_files() {
    let reply = serde_json::json!({ "notes.md": "updated" });
    let provider = RoleScriptedProvider::new("ignored").on_role("EDIT", reply.to_string());

    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, _vfs) = harness(vec![Arc::new(provider) as Arc<dyn LlmProvider>], dir.path());

    let mut files = BTreeMap::new();
    files.insert("notes.md".to_string(), "original".to_string());

    let mut request = edit_request("edit-5", "update the notes");
    request.files = Some(files);

    let outcome = orchestrator.edit(request).await.unwrap();
    assert_eq!(outcome.changed_files["notes.md"], "updated");
}
