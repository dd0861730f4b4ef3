//! Model traits

use super::types::{ModelError, ModelRequest, ModelResponse};
use async_trait::async_trait;

/// A chat-completion endpoint able to return tool calls.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// Send one chat request and wait for the complete response.
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
