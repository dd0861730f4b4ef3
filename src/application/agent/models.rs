use crate::application::tooling::{ToolErrorKind, ToolResult};
use crate::config::AppConfig;
use crate::types::ToolRequest;
use serde::Serialize;
use serde_json::Value;

const DEFAULT_MAX_ITERATIONS: usize = 10;

/// One dispatched tool call, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub input: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentStep {
    pub(crate) fn record(request: &ToolRequest, result: &ToolResult) -> Self {
        let input = serde_json::from_str(&request.arguments)
            .unwrap_or_else(|_| Value::String(request.arguments.clone()));
        Self {
            tool: request.name.clone(),
            input,
            success: result.ok,
            output: result.payload.clone().unwrap_or(Value::Null),
            error_kind: result.error_kind,
            message: result.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub session_id: String,
    pub content: String,
    /// Model round trips used by this turn.
    pub iterations: usize,
    pub ceiling_reached: bool,
    pub steps: Vec<AgentStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOptions {
    /// Round trips allowed per user turn.
    pub max_iterations: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl From<&AppConfig> for AgentOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_iterations: config.max_iterations.max(1),
        }
    }
}
