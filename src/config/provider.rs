//! Model provider and GitHub connection settings.

use super::defaults::{
    DEFAULT_GITHUB_API_URL, DEFAULT_GITHUB_TIMEOUT_SECS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_MODEL_ENDPOINT, DEFAULT_PROVIDER_ID, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEMPERATURE,
};
use serde::Deserialize;

/// Connection to an OpenAI-compatible chat-completions endpoint.
///
/// ```toml
/// [model]
/// id = "deepseek"
/// endpoint = "https://api.deepseek.com/v1/chat/completions"
/// model = "deepseek-chat"
/// temperature = 0.7
/// max_tokens = 2000
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProviderConfig {
    pub id: String,
    /// Full URL of the chat-completions endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelProviderConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROVIDER_ID.to_string(),
            endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
    /// Owner used when a tool names a repository without `owner/`.
    pub owner: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            token: None,
            owner: None,
            timeout_secs: DEFAULT_GITHUB_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct RawProviderConfig {
    pub(super) id: Option<String>,
    pub(super) endpoint: Option<String>,
    pub(super) api_key: Option<String>,
    pub(super) model: Option<String>,
    pub(super) temperature: Option<f32>,
    pub(super) max_tokens: Option<u32>,
    pub(super) timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct RawGitHubConfig {
    pub(super) api_url: Option<String>,
    pub(super) token: Option<String>,
    pub(super) owner: Option<String>,
    pub(super) timeout_secs: Option<u64>,
}

impl From<RawProviderConfig> for ModelProviderConfig {
    fn from(raw: RawProviderConfig) -> Self {
        let defaults = Self::default();
        Self {
            id: raw.id.unwrap_or(defaults.id),
            endpoint: raw.endpoint.unwrap_or(defaults.endpoint),
            api_key: non_blank(raw.api_key),
            model: raw.model.unwrap_or(defaults.model),
            temperature: raw.temperature.unwrap_or(defaults.temperature),
            max_tokens: raw.max_tokens.unwrap_or(defaults.max_tokens),
            timeout_secs: raw.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}

impl From<RawGitHubConfig> for GitHubConfig {
    fn from(raw: RawGitHubConfig) -> Self {
        let defaults = Self::default();
        Self {
            api_url: raw.api_url.unwrap_or(defaults.api_url),
            token: non_blank(raw.token),
            owner: non_blank(raw.owner),
            timeout_secs: raw.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}

pub(super) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
