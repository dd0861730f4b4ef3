use crate::infrastructure::files::FileError;
use crate::infrastructure::git::GitError;
use crate::infrastructure::github::GitHubError;
use crate::infrastructure::shell::ShellError;
use crate::infrastructure::workspace::WorkspaceError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a tool handler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    Timeout(String),
}

impl From<ShellError> for HandlerError {
    fn from(err: ShellError) -> Self {
        match err {
            ShellError::Rejected { .. } => HandlerError::Rejected(err.to_string()),
            ShellError::Timeout { .. } => HandlerError::Timeout(err.to_string()),
            ShellError::InvalidName(_) => HandlerError::InvalidArguments(err.to_string()),
            other => HandlerError::Failed(other.to_string()),
        }
    }
}

impl From<GitError> for HandlerError {
    fn from(err: GitError) -> Self {
        HandlerError::Failed(err.to_string())
    }
}

impl From<GitHubError> for HandlerError {
    fn from(err: GitHubError) -> Self {
        HandlerError::Failed(format!("{} ({err})", err.user_message()))
    }
}

impl From<FileError> for HandlerError {
    fn from(err: FileError) -> Self {
        HandlerError::Failed(err.to_string())
    }
}

impl From<WorkspaceError> for HandlerError {
    fn from(err: WorkspaceError) -> Self {
        HandlerError::Failed(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    RejectedDangerous,
    CollaboratorFailure,
    Timeout,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::InvalidArguments => "invalid_arguments",
            ToolErrorKind::RejectedDangerous => "rejected_dangerous",
            ToolErrorKind::CollaboratorFailure => "collaborator_failure",
            ToolErrorKind::Timeout => "timeout",
        }
    }
}

/// Normalised outcome of one tool call. Serialised verbatim into the
/// tool-role message that answers the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({
                "ok": false,
                "error_kind": ToolErrorKind::CollaboratorFailure.as_str(),
                "error_message": err.to_string(),
            })
            .to_string()
        })
    }
}

impl From<HandlerError> for ToolResult {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::InvalidArguments(msg) => {
                ToolResult::failure(ToolErrorKind::InvalidArguments, msg)
            }
            HandlerError::Rejected(msg) => ToolResult::failure(ToolErrorKind::RejectedDangerous, msg),
            HandlerError::Failed(msg) => ToolResult::failure(ToolErrorKind::CollaboratorFailure, msg),
            HandlerError::Timeout(msg) => ToolResult::failure(ToolErrorKind::Timeout, msg),
        }
    }
}
