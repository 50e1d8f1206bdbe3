//! The edit pipeline
//!
//! Load the current tree, ask the Edit agent for new contents of the files
//! that must change, reduce each proposal to a structure-preserving patch
//! where the language allows, commit, and re-validate off the critical
//! path.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use atelier_core::ProjectId;
use atelier_llm::LlmError;
use atelier_patch::{apply_patch, generate_patch, supports_structured_patch};

use crate::application::generate::{language_of, Orchestrator};
use crate::domain::agent::AgentContext;
use crate::domain::error::EngineError;
use crate::domain::manifest::AgentRole;
use crate::infrastructure::agents::Agent;

/// Input to one edit
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub project_id: ProjectId,
    pub project_name: String,
    /// Natural-language change instruction
    pub instruction: String,
    /// Optional base64 reference image
    pub image_data: Option<String>,
    /// Explicit file set; loaded from the VFS when absent
    pub files: Option<BTreeMap<String, String>>,
}

/// Result of a completed edit
#[derive(Debug)]
pub struct EditOutcome {
    /// Commit created for the change; `None` when nothing changed
    pub commit_id: Option<String>,
    /// filepath -> new content, only for files that actually changed
    pub changed_files: BTreeMap<String, String>,
    /// filepath -> applied patch kind
    pub patches: BTreeMap<String, &'static str>,
}

impl Orchestrator {
    /// Apply a natural-language edit to a project.
    ///
    /// Unlike generation there is no template fallback here: a provider
    /// failure re-raises to the caller.
    #[instrument(skip(self, request), fields(project_id = %request.project_id))]
    pub async fn edit(&self, request: EditRequest) -> Result<EditOutcome, EngineError> {
        let EditRequest {
            project_id,
            project_name,
            instruction,
            image_data,
            files,
        } = request;

        let files = match files.filter(|f| !f.is_empty()) {
            Some(files) => files,
            None => match self.vfs().get(&project_id).await {
                Some(vfs) => vfs.lock().await.list_files(),
                None => BTreeMap::new(),
            },
        };
        if files.is_empty() {
            return Err(EngineError::EmptyProject(project_id.to_string()));
        }

        let memory_context = self
            .memory()
            .context_for_generation(&project_id, &instruction)
            .await
            .unwrap_or_default();

        let mut ctx = AgentContext::new(project_id.clone(), project_name.clone(), instruction.clone());
        ctx.files = files.clone();
        ctx.image_data = image_data;
        ctx.memory_context = memory_context;
        ctx.edit_instruction = Some(instruction.clone());

        let agent = Agent::for_role(AgentRole::Edit);
        let message = agent
            .execute(self.router(), &ctx, self.max_tokens)
            .await
            .map_err(|error| match error {
                LlmError::NoProvider(msg) => EngineError::ProviderUnavailable(msg),
                other => EngineError::Llm(other),
            })?;

        if message.artifacts.is_empty() {
            return Err(EngineError::Llm(LlmError::InvalidResponse(
                "Edit agent returned no file artifacts".to_string(),
            )));
        }

        let mut changed_files = BTreeMap::new();
        let mut patches = BTreeMap::new();

        for (path, proposed) in message.artifacts {
            let final_content = match files.get(&path) {
                Some(old) if supports_structured_patch(&path) => {
                    let patch = generate_patch(old, &proposed, &path);
                    patches.insert(path.clone(), patch.kind());

                    if patch.is_structure_preserving() {
                        match apply_patch(old, &patch) {
                            Ok(content) => content,
                            Err(error) => {
                                // PatchInapplicable: downgrade to the full proposal
                                warn!(path = %path, %error, "Patch application failed, using full replacement");
                                proposed
                            }
                        }
                    } else {
                        proposed
                    }
                }
                _ => {
                    patches.insert(path.clone(), "full_replace");
                    proposed
                }
            };

            if files.get(&path) != Some(&final_content) {
                changed_files.insert(path, final_content);
            }
        }

        if changed_files.is_empty() {
            info!("Edit produced no effective change");
            return Ok(EditOutcome {
                commit_id: None,
                changed_files,
                patches,
            });
        }

        let commit_id = {
            let vfs = self.vfs().get_or_create(&project_id).await;
            let mut guard = vfs.lock().await;
            for (path, content) in &changed_files {
                guard.write_file(path.clone(), content.clone());
            }
            guard.commit(format!("Edit: {}", truncate(&instruction, 60)))
        };

        self.revalidate_in_background(&files, &changed_files);
        self.store_edit_memory(&project_id, &changed_files).await;

        info!(commit_id = %commit_id, files = changed_files.len(), "Edit committed");

        Ok(EditOutcome {
            commit_id: Some(commit_id),
            changed_files,
            patches,
        })
    }

    /// Post-edit validation is advisory and must not delay the reload.
    fn revalidate_in_background(
        &self,
        base: &BTreeMap<String, String>,
        changed: &BTreeMap<String, String>,
    ) {
        let mut snapshot = base.clone();
        snapshot.extend(changed.clone());
        let pipeline = Arc::clone(self.pipeline());

        tokio::spawn(async move {
            let report = pipeline.validate_and_report(&snapshot).await;
            if report.passed {
                info!("Post-edit validation passed");
            } else {
                warn!(errors = report.error_count(), "Post-edit validation found issues");
            }
        });
    }

    async fn store_edit_memory(
        &self,
        project_id: &ProjectId,
        changed_files: &BTreeMap<String, String>,
    ) {
        let Ok(memory) = self.memory().get_or_create(project_id).await else {
            return;
        };
        let mut guard = memory.lock().await;
        for (path, content) in changed_files {
            if let Some(language) = language_of(path) {
                let _ = guard.store_code(path.as_str(), content.as_str(), language);
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let end = (0..=max).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    &text[..end]
}
