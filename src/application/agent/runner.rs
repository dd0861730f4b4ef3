use super::errors::AgentError;
use super::models::{AgentOptions, AgentOutcome, AgentStep};
use crate::application::client::{ModelGateway, summarise};
use crate::application::conversation::Conversation;
use crate::application::tooling::ToolDispatcher;
use crate::model::ModelProvider;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One agent session: owns its conversation and drives the tool loop.
pub struct Agent<P: ModelProvider> {
    gateway: ModelGateway<P>,
    dispatcher: ToolDispatcher,
    conversation: Conversation,
    options: AgentOptions,
    tools: Vec<Value>,
    session_id: String,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(
        gateway: ModelGateway<P>,
        dispatcher: ToolDispatcher,
        system_prompt: impl Into<String>,
        options: AgentOptions,
    ) -> Self {
        let tools = dispatcher.registry().openai_tools();
        Self {
            gateway,
            dispatcher,
            conversation: Conversation::with_system_prompt(system_prompt),
            options,
            tools,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.conversation.set_system_prompt(prompt);
    }

    /// Forget the history (keeping the system prompt) and start a new session id.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.session_id = Uuid::new_v4().to_string();
        info!(session_id = %self.session_id, "Conversation reset");
    }

    /// Run one user turn to completion.
    ///
    /// Only a gateway failure is an error. The messages appended before the
    /// failure stay in the conversation and remain well formed.
    pub async fn run(&mut self, prompt: impl Into<String>) -> Result<AgentOutcome, AgentError> {
        let prompt = prompt.into();
        let max_iterations = self.options.max_iterations.max(1);
        info!(
            session_id = %self.session_id,
            prompt = %summarise(&prompt),
            max_iterations,
            "Agent run started"
        );
        self.conversation.append_user(prompt);

        let mut steps = Vec::new();
        let mut iterations = 0;
        loop {
            let response = self
                .gateway
                .send(self.conversation.snapshot(), &self.tools)
                .await?;
            iterations += 1;

            if response.tool_requests.is_empty() {
                self.conversation
                    .append_assistant(response.content.clone(), Vec::new());
                info!(
                    session_id = %self.session_id,
                    iterations,
                    tool_steps = steps.len(),
                    "Agent produced final response"
                );
                return Ok(self.outcome(response.content, iterations, false, steps));
            }

            debug!(
                iteration = iterations,
                requests = response.tool_requests.len(),
                "Dispatching tool batch"
            );
            self.conversation
                .append_assistant(response.content.clone(), response.tool_requests.clone());
            for request in &response.tool_requests {
                let result = self
                    .dispatcher
                    .dispatch(&request.name, &request.arguments)
                    .await;
                self.conversation
                    .append_tool_result(request.id.clone(), result.to_json());
                steps.push(AgentStep::record(request, &result));
            }

            if iterations >= max_iterations {
                warn!(
                    session_id = %self.session_id,
                    iterations,
                    "Iteration ceiling reached before the model finished"
                );
                return Ok(self.outcome(response.content, iterations, true, steps));
            }
        }
    }

    fn outcome(
        &self,
        content: String,
        iterations: usize,
        ceiling_reached: bool,
        steps: Vec<AgentStep>,
    ) -> AgentOutcome {
        AgentOutcome {
            session_id: self.session_id.clone(),
            content,
            iterations,
            ceiling_reached,
            steps,
        }
    }
}
