//! The generate pipeline
//!
//! Memory prefetch, Core plan, specialists in fixed order, validation gate
//! with a bounded repair loop, commit, memory writeback. Agent order is
//! strictly sequential so later agents see earlier artifacts; the VFS mutex
//! is held across write and commit so commits stay totally ordered per
//! project.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use atelier_core::config::Config;
use atelier_core::ProjectId;
use atelier_llm::{LlmError, ModelRouter, TaskType};
use atelier_memory::MemoryRegistry;
use atelier_validate::{PipelineReport, TestRunner, ValidationPipeline};
use atelier_vfs::VfsRegistry;

use crate::domain::agent::{AgentContext, AgentMessage};
use crate::domain::error::EngineError;
use crate::domain::manifest::{AgentRole, ManifestParse, ProjectManifest};
use crate::infrastructure::agents::Agent;
use crate::infrastructure::templates;

/// Specialist execution order; `agents_needed` filters it
const SPECIALIST_ORDER: [AgentRole; 6] = [
    AgentRole::Arch,
    AgentRole::Backend,
    AgentRole::Uix,
    AgentRole::Test,
    AgentRole::Quality,
    AgentRole::Debug,
];

/// Input to one generation
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub project_id: ProjectId,
    pub project_name: String,
    pub spec: String,
    /// Optional base64 reference image
    pub image_data: Option<String>,
}

/// Result of a completed generation
#[derive(Debug)]
pub struct GenerateOutcome {
    pub commit_id: String,
    pub manifest: ProjectManifest,
    pub files: BTreeMap<String, String>,
    pub report: PipelineReport,
    /// Repair iterations consumed by the auto-fix loop
    pub repair_attempts: u32,
}

/// Sequences agents, mediates repair loops, and owns commit points
pub struct Orchestrator {
    router: Arc<ModelRouter>,
    vfs: Arc<VfsRegistry>,
    memory: Arc<MemoryRegistry>,
    pipeline: Arc<ValidationPipeline>,
    test_runner: Arc<TestRunner>,
    pub(crate) max_repair_attempts: u32,
    pub(crate) max_tokens: u32,
}

impl Orchestrator {
    pub fn new(
        router: Arc<ModelRouter>,
        vfs: Arc<VfsRegistry>,
        memory: Arc<MemoryRegistry>,
        pipeline: Arc<ValidationPipeline>,
        test_runner: Arc<TestRunner>,
        config: &Config,
    ) -> Self {
        Self {
            router,
            vfs,
            memory,
            pipeline,
            test_runner,
            max_repair_attempts: config.engine.max_repair_attempts,
            max_tokens: config.llm.max_tokens,
        }
    }

    pub(crate) fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub(crate) fn vfs(&self) -> &Arc<VfsRegistry> {
        &self.vfs
    }

    pub(crate) fn memory(&self) -> &Arc<MemoryRegistry> {
        &self.memory
    }

    pub(crate) fn pipeline(&self) -> &Arc<ValidationPipeline> {
        &self.pipeline
    }

    /// Run the full generation pipeline for a request.
    #[instrument(skip(self, request), fields(project_id = %request.project_id))]
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutcome, EngineError> {
        let GenerateRequest {
            project_id,
            project_name,
            spec,
            image_data,
        } = request;

        let memory_context = match self.memory.context_for_generation(&project_id, &spec).await {
            Ok(context) => context,
            Err(error) => {
                warn!(%error, "Memory context unavailable, continuing without");
                String::new()
            }
        };

        let mut ctx = AgentContext::new(project_id.clone(), project_name.clone(), spec.clone());
        ctx.image_data = image_data;
        ctx.memory_context = memory_context;

        let (manifest, core_message) = self.plan(&ctx).await?;
        ctx.absorb(core_message);
        info!(app_type = ?manifest.app_type, agents = manifest.agents_needed.len(), "Plan accepted");

        for role in SPECIALIST_ORDER {
            if !manifest.agents_needed.contains(&role) {
                continue;
            }
            let message = self.run_specialist(role, &ctx).await;
            info!(role = role.as_str(), artifacts = message.artifacts.len(), "Agent finished");
            ctx.absorb(message);
        }

        self.fill_required_files(&mut ctx);

        let (report, repair_attempts) = self.validate_with_repair(&mut ctx).await;

        let commit_id = {
            let vfs = self.vfs.get_or_create(&project_id).await;
            let mut guard = vfs.lock().await;
            for (path, content) in &ctx.files {
                guard.write_file(path.clone(), content.clone());
            }
            let message = if report.passed {
                format!("Initial generation: {}", project_name)
            } else {
                format!(
                    "Initial generation: {} ({} unresolved validation errors)",
                    project_name,
                    report.error_count()
                )
            };
            guard.commit(message)
        };

        self.store_memory(&project_id, &project_name, &manifest, &ctx.files)
            .await;

        info!(commit_id = %commit_id, files = ctx.files.len(), "Generation complete");

        Ok(GenerateOutcome {
            commit_id,
            manifest,
            files: ctx.files,
            report,
            repair_attempts,
        })
    }

    /// Core planning step.
    ///
    /// No Reasoning provider at all is fatal; an unusable plan falls back
    /// to the default manifest with reduced confidence.
    async fn plan(
        &self,
        ctx: &AgentContext,
    ) -> Result<(ProjectManifest, AgentMessage), EngineError> {
        let needs_vision = ctx.image_data.is_some();
        if let Err(error) = self.router.select(TaskType::Reasoning, needs_vision).await {
            return Err(EngineError::ProviderUnavailable(error.to_string()));
        }

        let agent = Agent::for_role(AgentRole::Core);

        let first = match agent.execute(&self.router, ctx, self.max_tokens).await {
            Ok(message) => message,
            Err(LlmError::NoProvider(msg)) => return Err(EngineError::ProviderUnavailable(msg)),
            Err(error) => {
                warn!(%error, "Core agent failed, using default manifest");
                return Ok(self.fallback_plan(ctx, error.to_string()));
            }
        };

        match ProjectManifest::parse_response(&first.content) {
            ManifestParse::Ok(manifest) => return Ok((*manifest, first)),
            ManifestParse::Retry(reason) => {
                info!(reason = %reason, "Core output unparseable, retrying once");
            }
            ManifestParse::Invalid(reason) => {
                warn!(reason = %reason, "Core produced an invalid manifest, using default");
                return Ok(self.fallback_plan(ctx, reason));
            }
        }

        if let Ok(second) = agent.execute(&self.router, ctx, self.max_tokens).await {
            if let ManifestParse::Ok(manifest) = ProjectManifest::parse_response(&second.content) {
                return Ok((*manifest, second));
            }
        }

        Ok(self.fallback_plan(ctx, "No valid manifest after retry".to_string()))
    }

    fn fallback_plan(&self, ctx: &AgentContext, reason: String) -> (ProjectManifest, AgentMessage) {
        let manifest = ProjectManifest::fallback(&ctx.project_name, &ctx.spec);
        let message = AgentMessage::new(AgentRole::Core, "Using default generation plan")
            .with_reasoning(reason)
            .with_confidence(0.5);
        (manifest, message)
    }

    /// Run one specialist; unusable output degrades to a role template.
    async fn run_specialist(&self, role: AgentRole, ctx: &AgentContext) -> AgentMessage {
        let agent = Agent::for_role(role);

        match agent.execute(&self.router, ctx, self.max_tokens).await {
            Ok(message) => {
                let needs_artifacts = matches!(
                    role,
                    AgentRole::Backend | AgentRole::Uix | AgentRole::Test
                );
                if needs_artifacts && message.artifacts.is_empty() {
                    warn!(role = role.as_str(), "Agent produced no artifacts, using template");
                    self.template_fallback(role, ctx)
                } else {
                    message
                }
            }
            Err(error) => {
                warn!(role = role.as_str(), %error, "Agent failed, using template");
                self.template_fallback(role, ctx)
            }
        }
    }

    fn template_fallback(&self, role: AgentRole, ctx: &AgentContext) -> AgentMessage {
        let message = AgentMessage::new(role, "Using template output").with_confidence(0.5);
        match role {
            AgentRole::Backend => {
                message.with_artifacts(templates::backend_artifacts(&ctx.project_name))
            }
            AgentRole::Uix => {
                message.with_artifacts(templates::frontend_artifacts(&ctx.project_name))
            }
            AgentRole::Test => message.with_artifacts(templates::test_artifacts(&ctx.project_name)),
            AgentRole::Arch => {
                // Fail soft: the manifest itself stands in for the architecture
                let plan = ctx
                    .message_from(AgentRole::Core)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                AgentMessage::new(role, plan)
                    .with_reasoning("Architecture pass skipped")
                    .with_confidence(0.5)
            }
            _ => message.with_confidence(0.2),
        }
    }

    /// Any required file a provider failed to deliver comes from the
    /// templates, so accepted manifests stay total over the required set.
    fn fill_required_files(&self, ctx: &mut AgentContext) {
        let mut defaults = templates::backend_artifacts(&ctx.project_name);
        defaults.extend(templates::frontend_artifacts(&ctx.project_name));

        for required in crate::domain::manifest::REQUIRED_FILES {
            if !ctx.files.contains_key(*required) {
                if let Some(content) = defaults.remove(*required) {
                    warn!(file = required, "Filling missing required file from template");
                    ctx.files.insert(required.to_string(), content);
                }
            }
        }
    }

    /// Validation gate plus the bounded agent repair loop.
    async fn validate_with_repair(&self, ctx: &mut AgentContext) -> (PipelineReport, u32) {
        let mut report = self.pipeline.validate_and_report(&ctx.files).await;

        // Mechanical fixes (formatters) before spending agent calls
        if !report.passed {
            let fixes = self.pipeline.apply_auto_fixes(&ctx.files).await;
            if !fixes.is_empty() {
                ctx.files.extend(fixes);
                report = self.pipeline.validate_and_report(&ctx.files).await;
            }
        }

        let mut attempts = 0u32;
        while !report.passed && attempts < self.max_repair_attempts {
            attempts += 1;
            ctx.validation_errors = format_issues(&report);
            info!(attempt = attempts, errors = report.error_count(), "Repair loop iteration");

            let mut repaired = false;
            for role in [AgentRole::Debug, AgentRole::Quality] {
                let agent = Agent::for_role(role);
                match agent.execute(&self.router, ctx, self.max_tokens).await {
                    Ok(message) if !message.artifacts.is_empty() => {
                        repaired = true;
                        ctx.absorb(message);
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(role = role.as_str(), %error, "Repair agent failed");
                    }
                }
            }

            if !repaired {
                // Nothing changed; more iterations would spin
                break;
            }
            report = self.pipeline.validate_and_report(&ctx.files).await;
        }

        if !report.passed {
            warn!(
                attempts,
                errors = report.error_count(),
                "Repair budget exhausted, committing with warnings"
            );
        }

        report.tests = self.test_runner.run(&ctx.files).await;
        (report, attempts)
    }

    /// Store generated code and the key decisions for future context.
    async fn store_memory(
        &self,
        project_id: &ProjectId,
        project_name: &str,
        manifest: &ProjectManifest,
        files: &BTreeMap<String, String>,
    ) {
        let memory = match self.memory.get_or_create(project_id).await {
            Ok(memory) => memory,
            Err(error) => {
                warn!(%error, "Memory unavailable, skipping writeback");
                return;
            }
        };

        let mut guard = memory.lock().await;
        for (path, content) in files {
            if let Some(language) = language_of(path) {
                if let Err(error) = guard.store_code(path.as_str(), content.as_str(), language) {
                    warn!(%error, path, "Failed to store code record");
                }
            }
        }

        let _ = guard.store_decision(
            format!("Generated {}", project_name),
            manifest.analysis.clone(),
        );
        let _ = guard.store_preference("stack", "backend", manifest.tech_stack.backend.as_str());
        let _ = guard.store_preference("stack", "frontend", manifest.tech_stack.frontend.as_str());
    }
}

/// Format Error-severity issues into repair directives
pub(crate) fn format_issues(report: &PipelineReport) -> Vec<String> {
    report
        .errors()
        .iter()
        .map(|issue| {
            format!(
                "{}:{}:{} [{}] {}",
                issue.file.as_deref().unwrap_or("<project>"),
                issue.line.unwrap_or(0),
                issue.column.unwrap_or(0),
                issue.validator,
                issue.message
            )
        })
        .collect()
}

/// Memory language tag for a generated file
pub(crate) fn language_of(path: &str) -> Option<&'static str> {
    match path.rsplit('.').next() {
        Some("py") => Some("python"),
        Some("js") | Some("jsx") => Some("javascript"),
        Some("html") => Some("html"),
        Some("css") => Some("css"),
        _ => None,
    }
}
