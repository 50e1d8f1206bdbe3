//! Agent system prompts and prompt builders
//!
//! Every artifact-producing agent shares one output contract: a JSON object
//! mapping file paths to complete file contents, nothing else.

use crate::domain::agent::AgentContext;
use crate::domain::manifest::AgentRole;

pub const CORE_SYSTEM_PROMPT: &str = r#"You are CORE, the lead product manager and orchestrator of an app-building team.
Analyze the user's request, identify implicit requirements, and produce a complete generation plan.

Respond with a single JSON object:
{
    "analysis": "brief analysis of requirements",
    "app_type": "one of: crud, ecommerce, dashboard, social, todo, blog, auth, booking, api",
    "features": ["feature 1", "feature 2", "feature 3"],
    "tech_stack": {"backend": "fastapi", "frontend": "react", "styling": "css"},
    "models": [{"name": "Item", "fields": {"id": "int", "title": "str"}}],
    "endpoints": [{"path": "/items", "method": "GET", "description": "List items", "response": "List[Item]"}],
    "files_to_generate": [{"path": "backend/main.py", "purpose": "FastAPI app"}],
    "integrations": [],
    "agents_needed": ["ARCH", "BACKEND", "UIX", "TEST", "QUALITY"],
    "priority": "what to build first"
}

files_to_generate must include: backend/main.py, backend/requirements.txt, frontend/src/App.jsx, frontend/package.json, frontend/index.html, frontend/vite.config.js, frontend/src/main.jsx.
Model names start uppercase; endpoint paths start with "/". Output only JSON."#;

pub const ARCH_SYSTEM_PROMPT: &str = r#"You are ARCH, the systems architect.
Refine the generation plan into a precise architecture: RESTful endpoints with request/response models, data models with field types, and a per-file purpose map.
Respond with a JSON object carrying "endpoints", "models", and "files". Output only JSON."#;

pub const BACKEND_SYSTEM_PROMPT: &str = r#"You are BACKEND, the senior Python engineer.
Generate a complete FastAPI backend: CORS middleware, pydantic models, full CRUD endpoints, in-memory storage, a /health endpoint, and proper HTTP status codes.
Respond with a JSON object mapping file paths to complete file contents:
{"backend/main.py": "...", "backend/requirements.txt": "..."}
Every file must be complete and runnable. Output only JSON."#;

pub const UIX_SYSTEM_PROMPT: &str = r#"You are UIX, the frontend engineer.
Generate a React single-page app served by Vite: component tree, bundler config, HTML entry, bootstrap module, and styling. Call the backend with fetch or axios.
Respond with a JSON object mapping file paths to complete file contents:
{"frontend/src/App.jsx": "...", "frontend/package.json": "...", "frontend/index.html": "...", "frontend/vite.config.js": "...", "frontend/src/main.jsx": "..."}
Output only JSON."#;

pub const TEST_SYSTEM_PROMPT: &str = r#"You are TEST, the test engineer.
Generate pytest unit tests for the backend endpoints using fastapi.testclient. Cover the happy path and one failure case per endpoint.
Respond with a JSON object mapping file paths to complete file contents:
{"backend/test_main.py": "..."}
Output only JSON."#;

pub const QUALITY_SYSTEM_PROMPT: &str = r#"You are QUALITY, the code quality and security reviewer.
You receive the current files and a list of validation issues. Fix the issues with minimal changes and return ONLY the files that changed.
Respond with a JSON object mapping file paths to complete corrected contents. Output only JSON."#;

pub const DEBUG_SYSTEM_PROMPT: &str = r#"You are DEBUG, the error-fixing specialist.
You receive the current files and a list of errors. Repair the failing files with minimal changes and return ONLY the files that changed.
Respond with a JSON object mapping file paths to complete corrected contents. Output only JSON."#;

pub const EDIT_SYSTEM_PROMPT: &str = r#"You are EDIT, the iterative refinement specialist.
You receive an existing project and a change instruction. Apply the smallest change that satisfies the instruction and return ONLY the files that must change, with their complete new contents.
Never drop existing functionality that the instruction does not mention.
Respond with a JSON object mapping file paths to complete file contents. Output only JSON."#;

const GENERATE_PROMPT: &str = r#"PROJECT: {project_name}
DESCRIPTION: {spec}
{memory_section}{plan_section}{files_section}"#;

const REPAIR_PROMPT: &str = r#"PROJECT: {project_name}

The following validation errors must be fixed:
{errors}

CURRENT FILES:
{files}

Return only the corrected files."#;

const EDIT_PROMPT: &str = r#"PROJECT: {project_name}

INSTRUCTION: {instruction}
{memory_section}
CURRENT FILES:
{files}

Return only the files that must change."#;

/// The system prompt bound to a role
pub fn system_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Core => CORE_SYSTEM_PROMPT,
        AgentRole::Arch => ARCH_SYSTEM_PROMPT,
        AgentRole::Backend => BACKEND_SYSTEM_PROMPT,
        AgentRole::Uix => UIX_SYSTEM_PROMPT,
        AgentRole::Test => TEST_SYSTEM_PROMPT,
        AgentRole::Quality => QUALITY_SYSTEM_PROMPT,
        AgentRole::Debug => DEBUG_SYSTEM_PROMPT,
        AgentRole::Edit => EDIT_SYSTEM_PROMPT,
    }
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// User prompt for a pipeline agent
    pub fn build(role: AgentRole, ctx: &AgentContext) -> String {
        match role {
            AgentRole::Quality | AgentRole::Debug => Self::build_repair(ctx),
            AgentRole::Edit => Self::build_edit(ctx),
            _ => Self::build_generate(role, ctx),
        }
    }

    fn build_generate(role: AgentRole, ctx: &AgentContext) -> String {
        let memory_section = if ctx.memory_context.is_empty() {
            String::new()
        } else {
            format!("\nPROJECT MEMORY:\n{}\n", ctx.memory_context)
        };

        // Downstream agents see the plans produced upstream
        let plan_section = match role {
            AgentRole::Core => String::new(),
            _ => {
                let mut sections = String::new();
                if let Some(core) = ctx.message_from(AgentRole::Core) {
                    sections.push_str(&format!("\nGENERATION PLAN:\n{}\n", core.content));
                }
                if role != AgentRole::Arch {
                    if let Some(arch) = ctx.message_from(AgentRole::Arch) {
                        sections.push_str(&format!("\nARCHITECTURE:\n{}\n", arch.content));
                    }
                }
                sections
            }
        };

        let files_section = if ctx.files.is_empty() || role == AgentRole::Core {
            String::new()
        } else {
            format!("\nFILES SO FAR:\n{}\n", Self::render_files(ctx))
        };

        let mut prompt = GENERATE_PROMPT
            .replace("{project_name}", &ctx.project_name)
            .replace("{spec}", &ctx.spec)
            .replace("{memory_section}", &memory_section)
            .replace("{plan_section}", &plan_section)
            .replace("{files_section}", &files_section);

        if ctx.image_data.is_some() {
            prompt.push_str(
                "\nA reference design image is attached. Match its visual structure.",
            );
        }

        prompt
    }

    fn build_repair(ctx: &AgentContext) -> String {
        REPAIR_PROMPT
            .replace("{project_name}", &ctx.project_name)
            .replace("{errors}", &ctx.validation_errors.join("\n"))
            .replace("{files}", &Self::render_files(ctx))
    }

    fn build_edit(ctx: &AgentContext) -> String {
        let memory_section = if ctx.memory_context.is_empty() {
            String::new()
        } else {
            format!("\nPROJECT MEMORY:\n{}\n", ctx.memory_context)
        };

        EDIT_PROMPT
            .replace("{project_name}", &ctx.project_name)
            .replace(
                "{instruction}",
                ctx.edit_instruction.as_deref().unwrap_or(""),
            )
            .replace("{memory_section}", &memory_section)
            .replace("{files}", &Self::render_files(ctx))
    }

    fn render_files(ctx: &AgentContext) -> String {
        ctx.files
            .iter()
            .map(|(path, content)| format!("--- {} ---\n{}", path, content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
