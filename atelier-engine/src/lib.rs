//! Atelier Engine - the generation and iteration pipelines
//!
//! The engine turns a natural-language spec into a working project tree and
//! applies minimal edits afterwards. The Core agent plans a
//! [`ProjectManifest`], specialist agents emit file artifacts in a fixed
//! order, the validation pipeline gates every merge with a bounded auto-fix
//! loop, and project memory feeds context back into later generations.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::edit::{EditOutcome, EditRequest};
pub use application::generate::{GenerateOutcome, GenerateRequest};
pub use application::Orchestrator;
pub use domain::agent::{AgentContext, AgentMessage};
pub use domain::error::EngineError;
pub use domain::manifest::{
    AgentRole, ApiEndpoint, AppType, DataModel, FileSpec, ManifestParse, ProjectManifest,
    TechStack, REQUIRED_FILES,
};
