use super::defaults::{DEFAULT_MAX_ITERATIONS, DEFAULT_SHELL_TIMEOUT_MS, DEFAULT_SYSTEM_PROMPT};
use super::error::ConfigError;
use super::provider::{GitHubConfig, ModelProviderConfig, non_blank};
use std::path::{Path, PathBuf};

/// Application configuration: `config/agent.toml` overlaid with environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub provider: ModelProviderConfig,
    pub github: GitHubConfig,
    /// Initial working directory; the process directory when unset.
    pub workspace: Option<PathBuf>,
    pub system_prompt: String,
    pub max_iterations: usize,
    pub shell_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ModelProviderConfig::default(),
            github: GitHubConfig::default(),
            workspace: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            shell_timeout_ms: DEFAULT_SHELL_TIMEOUT_MS,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        super::loader::parse_config(content, Path::new("<inline>"))
    }

    /// Overlay values from an environment lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));

        if let Some(key) = get("DEEPSEEK_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = get("DEEPSEEK_API_URL") {
            self.provider.endpoint = url;
        }
        if let Some(model) = get("DEEPSEEK_MODEL") {
            self.provider.model = model;
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(owner) = get("GITHUB_OWNER") {
            self.github.owner = Some(owner);
        }
        if let Some(url) = get("GITHUB_API_URL") {
            self.github.api_url = url;
        }
        if let Some(path) = get("WORKSPACE_PATH") {
            self.workspace = Some(expand_path(&path));
        }
    }

    /// Missing credentials. Features that need them fail per call instead of at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.provider.api_key.is_none() {
            warnings.push(format!(
                "No API key for model provider '{}'; set DEEPSEEK_API_KEY",
                self.provider.id
            ));
        }
        if self.github.token.is_none() {
            warnings.push(
                "GITHUB_TOKEN is not set; GitHub requests are unauthenticated and rate limited"
                    .to_string(),
            );
        }
        if self.github.owner.is_none() {
            warnings.push(
                "GITHUB_OWNER is not set; repositories must be given as owner/name".to_string(),
            );
        }
        warnings
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid {
                field: "model.temperature",
                reason: format!("{} is outside 0.0..=2.0", self.provider.temperature),
            });
        }
        if self.provider.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "model.endpoint",
                reason: "must not be empty".into(),
            });
        }
        if self.shell_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "shell_timeout_ms",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

pub(super) fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
