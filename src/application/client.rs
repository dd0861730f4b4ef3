use crate::config::ModelProviderConfig;
use crate::model::{ModelError, ModelProvider, ModelRequest, ModelResponse, ToolChoice};
use crate::types::ChatMessage;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Settings applied to every round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&ModelProviderConfig> for GatewayConfig {
    fn from(config: &ModelProviderConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// One model round trip per [`ModelGateway::send`]. Errors are returned to
/// the caller as-is; nothing is retried here.
pub struct ModelGateway<P: ModelProvider> {
    provider: Arc<P>,
    config: GatewayConfig,
}

impl<P: ModelProvider> Clone for ModelGateway<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            config: self.config.clone(),
        }
    }
}

impl<P: ModelProvider> ModelGateway<P> {
    pub fn new(provider: P, config: GatewayConfig) -> Self {
        Self::from_shared(Arc::new(provider), config)
    }

    pub fn from_shared(provider: Arc<P>, config: GatewayConfig) -> Self {
        Self { provider, config }
    }

    pub async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ModelResponse, ModelError> {
        let request = ModelRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: tools.to_vec(),
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
        };

        debug!(
            provider = self.provider.id(),
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending model request"
        );
        let response = self.provider.chat(request).await?;
        info!(
            provider = self.provider.id(),
            tool_requests = response.tool_requests.len(),
            finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
            preview = %summarise(&response.content),
            "Model responded"
        );
        Ok(response)
    }
}

/// Single-line preview of `text` for logs.
pub(crate) fn summarise(text: &str) -> String {
    const SNIPPET_LIMIT: usize = 160;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "(empty)".to_string();
    }
    let single_line = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = single_line.chars();
    let mut result: String = chars.by_ref().take(SNIPPET_LIMIT).collect();
    if chars.next().is_some() {
        result.push('…');
    }
    result
}
