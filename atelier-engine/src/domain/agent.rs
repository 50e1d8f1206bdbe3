//! Agent messages and execution context

use serde::Serialize;
use std::collections::BTreeMap;

use atelier_core::ProjectId;

use crate::domain::manifest::AgentRole;

/// Output of one agent run
#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    pub role: AgentRole,
    /// Human-readable content (plan text, summary)
    pub content: String,
    /// Short reasoning summary
    pub reasoning: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// filepath -> proposed content
    pub artifacts: BTreeMap<String, String>,
}

impl AgentMessage {
    pub fn new(role: AgentRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            reasoning: String::new(),
            confidence: 0.0,
            artifacts: BTreeMap::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_artifacts(mut self, artifacts: BTreeMap<String, String>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

/// Transient context threaded through one pipeline run.
///
/// Later agents see everything earlier agents produced; nothing here
/// outlives the request.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub project_id: ProjectId,
    pub project_name: String,
    /// The raw user specification
    pub spec: String,
    /// Optional base64 reference image
    pub image_data: Option<String>,
    /// Current file tree (existing files plus accumulated artifacts)
    pub files: BTreeMap<String, String>,
    /// Messages from agents that already ran
    pub messages: Vec<AgentMessage>,
    /// Pre-fetched memory context, empty for fresh projects
    pub memory_context: String,
    /// Formatted Error-severity issues for repair agents
    pub validation_errors: Vec<String>,
    /// Natural-language instruction for the Edit agent
    pub edit_instruction: Option<String>,
}

impl AgentContext {
    pub fn new(project_id: ProjectId, project_name: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            project_id,
            project_name: project_name.into(),
            spec: spec.into(),
            image_data: None,
            files: BTreeMap::new(),
            messages: Vec::new(),
            memory_context: String::new(),
            validation_errors: Vec::new(),
            edit_instruction: None,
        }
    }

    /// Latest message from a given role
    pub fn message_from(&self, role: AgentRole) -> Option<&AgentMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Record a message and fold its artifacts into the file view
    pub fn absorb(&mut self, message: AgentMessage) {
        for (path, content) in &message.artifacts {
            self.files.insert(path.clone(), content.clone());
        }
        self.messages.push(message);
    }
}
