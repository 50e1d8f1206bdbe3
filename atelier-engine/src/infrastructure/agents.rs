//! Agents as values
//!
//! An agent is a role, a task binding, and a system prompt over one shared
//! execution path: build the role prompt, ask the router for the agent's
//! declared task, call the provider, and extract artifacts tolerantly.
//! Failure policy (template fallbacks, fatal roles) belongs to the
//! orchestrator, not here.

use tracing::debug;

use atelier_llm::{
    CompletionRequest, ContentBlock, LlmError, Message, ModelRouter, ResponseParser, TaskType,
};

use crate::domain::agent::{AgentContext, AgentMessage};
use crate::domain::manifest::AgentRole;
use crate::infrastructure::prompts::{system_prompt, PromptBuilder};

/// A role-specialised agent
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    pub role: AgentRole,
    pub task: TaskType,
    pub system_prompt: &'static str,
}

impl Agent {
    /// Compose the agent for a role from the shared base
    pub fn for_role(role: AgentRole) -> Self {
        Self {
            role,
            task: role.task(),
            system_prompt: system_prompt(role),
        }
    }

    /// Roles that forward an attached reference image to the provider
    fn accepts_image(&self) -> bool {
        matches!(
            self.role,
            AgentRole::Core | AgentRole::Uix | AgentRole::Edit
        )
    }

    /// Run the agent once against the router.
    ///
    /// Image data rides along only for vision-relevant roles; the router
    /// then refuses to pick a non-vision provider rather than dropping it.
    pub async fn execute(
        &self,
        router: &ModelRouter,
        ctx: &AgentContext,
        max_tokens: u32,
    ) -> Result<AgentMessage, LlmError> {
        let user_prompt = PromptBuilder::build(self.role, ctx);

        let mut user = Message::user(user_prompt);
        if let Some(ref image) = ctx.image_data {
            if self.accepts_image() {
                user = user.with_content(ContentBlock::image(image.clone(), "image/png"));
            }
        }

        let request = CompletionRequest::new()
            .with_message(Message::system(self.system_prompt))
            .with_message(user)
            .with_max_tokens(max_tokens)
            .with_temperature(0.3);

        let response = router.execute(self.task, request).await?;
        debug!(role = self.role.as_str(), chars = response.text.len(), "Agent response received");

        Ok(self.interpret(response.text))
    }

    /// Turn raw model output into an agent message.
    ///
    /// Reasoning roles keep their plan as content; artifact roles get the
    /// tolerant extractor, and an unusable reply surfaces as an empty
    /// artifact map with low confidence.
    fn interpret(&self, text: String) -> AgentMessage {
        match self.role {
            AgentRole::Core | AgentRole::Arch => AgentMessage::new(self.role, text)
                .with_reasoning("Plan produced")
                .with_confidence(0.9),
            _ => match ResponseParser::parse_artifacts(&text) {
                Some(artifacts) => {
                    let summary = format!("Produced {} files", artifacts.len());
                    AgentMessage::new(self.role, summary)
                        .with_reasoning("Artifacts extracted")
                        .with_confidence(if artifacts.len() > 1 { 0.9 } else { 0.6 })
                        .with_artifacts(artifacts)
                }
                None => AgentMessage::new(self.role, text)
                    .with_reasoning("No artifacts in response")
                    .with_confidence(0.2),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_role_binds_task_and_prompt() {
        let agent = Agent::for_role(AgentRole::Backend);
        assert_eq!(agent.task, TaskType::Code);
        assert!(agent.system_prompt.contains("BACKEND"));

        let agent = Agent::for_role(AgentRole::Core);
        assert_eq!(agent.task, TaskType::Reasoning);
    }

    #[test]
    fn test_interpret_artifacts() {
        let agent = Agent::for_role(AgentRole::Backend);
        let message =
            agent.interpret(r#"{"backend/main.py": "x = 1", "backend/requirements.txt": "fastapi"}"#.to_string());
        assert_eq!(message.artifacts.len(), 2);
        assert!(message.confidence > 0.8);
    }

    #[test]
    fn test_interpret_prose_yields_empty_artifacts() {
        let agent = Agent::for_role(AgentRole::Backend);
        let message = agent.interpret("Sorry, I cannot do that.".to_string());
        assert!(message.artifacts.is_empty());
        assert!(message.confidence < 0.5);
    }

    #[test]
    fn test_interpret_reasoning_keeps_content() {
        let agent = Agent::for_role(AgentRole::Core);
        let message = agent.interpret("{\"app_type\": \"todo\"}".to_string());
        assert!(message.content.contains("todo"));
        assert!(message.artifacts.is_empty());
    }

    #[test]
    fn test_image_roles() {
        assert!(Agent::for_role(AgentRole::Edit).accepts_image());
        assert!(Agent::for_role(AgentRole::Uix).accepts_image());
        assert!(!Agent::for_role(AgentRole::Backend).accepts_image());
    }
}
