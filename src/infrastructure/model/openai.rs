//! OpenAI-compatible client implementation (DeepSeek, OpenAI, Groq, Mistral, ...)

use super::base::HttpClientBase;
use super::traits::ModelProvider;
use super::types::{ModelError, ModelRequest, ModelResponse, ToolChoice};
use crate::config::ModelProviderConfig;
use crate::types::{ChatMessage, MessageRole, ToolRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

/// Chat-completions client speaking the OpenAI function-calling dialect.
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
}

impl OpenAIClient {
    pub fn from_config(config: &ModelProviderConfig) -> Self {
        Self {
            base: HttpClientBase::new(
                config.id.clone(),
                config.endpoint.clone(),
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            ),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAIClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url("");
        let payload = OpenAIRequest::from(&request);

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to OpenAI-compatible provider"
        );

        let response: OpenAIResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!("Received response from OpenAI-compatible provider");

        response.into_model_response(&self.base.id)
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    stream: bool,
}

impl From<&ModelRequest> for OpenAIRequest {
    fn from(value: &ModelRequest) -> Self {
        let tool_choice = if value.tools.is_empty() {
            None
        } else {
            value.tool_choice
        };
        Self {
            model: value.model.clone(),
            messages: value.messages.iter().map(to_openai_message).collect(),
            temperature: value.temperature,
            max_tokens: value.max_tokens,
            tools: value.tools.clone(),
            tool_choice,
            stream: false,
        }
    }
}

fn to_openai_message(message: &ChatMessage) -> Value {
    match message.role {
        MessageRole::Assistant if !message.tool_requests.is_empty() => {
            let calls: Vec<Value> = message
                .tool_requests
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({
                "role": "assistant",
                "content": content,
                "tool_calls": calls,
            })
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({
            "role": role.as_str(),
            "content": message.content,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OpenAIResponse {
    fn into_model_response(self, provider: &str) -> Result<ModelResponse, ModelError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::invalid_response(provider, "response has no choices"))?;
        let message = choice
            .message
            .ok_or_else(|| ModelError::invalid_response(provider, "choice has no message"))?;

        let tool_requests = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                // Some compatible servers send arguments as an object instead of a string.
                let arguments = match call.function.arguments {
                    Value::String(text) => text,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                ToolRequest::new(call.id, call.function.name, arguments)
            })
            .collect();

        Ok(ModelResponse {
            content: message.content.unwrap_or_default(),
            tool_requests,
            finish_reason: choice.finish_reason,
        })
    }
}
