//! Model types - Request, Response, and Error types

use crate::types::{ChatMessage, ToolRequest};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// How the model may pick tools for a turn. Only `auto` is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
}

/// Model request for a single chat-completion round trip
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Function schemas advertised to the model, already in wire form.
    pub tools: Vec<Value>,
    pub tool_choice: Option<ToolChoice>,
}

/// Model response from a single round trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_requests: Vec<ToolRequest>,
    pub finish_reason: Option<String>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_requests: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    pub fn with_tools(content: impl Into<String>, tool_requests: Vec<ToolRequest>) -> Self {
        Self {
            content: content.into(),
            tool_requests,
            finish_reason: Some("tool_calls".to_string()),
        }
    }
}

/// Model errors. Every variant is a gateway failure for the current turn.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingApiKey { provider } => {
                format!("Provider '{provider}' needs an API key. Set DEEPSEEK_API_KEY or model.api_key in the config.")
            }
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to model provider '{provider}'.")
                } else if source.is_timeout() {
                    format!("Request to '{provider}' timed out. Try again shortly.")
                } else if let Some(status) = source.status() {
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            format!("Provider '{provider}' rejected the API key ({}).", status.as_u16())
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            format!("Provider '{provider}' is rate limiting requests. Try again later.")
                        }
                        StatusCode::NOT_FOUND => format!("Endpoint for '{provider}' was not found."),
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            format!("Provider '{provider}' is currently unavailable.")
                        }
                        _ => format!("Request to '{provider}' failed with status {}.", status.as_u16()),
                    }
                } else {
                    format!("Network error while calling '{provider}'.")
                }
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("Response from '{provider}' could not be understood.")
            }
        }
    }
}
