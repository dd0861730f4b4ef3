use super::app::{AppConfig, expand_path};
use super::defaults::{DEFAULT_CONFIG_PATH, ENV_PATH};
use super::error::ConfigError;
use super::provider::{RawGitHubConfig, RawProviderConfig};
use dotenvy::{dotenv, from_filename};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    pub system_prompt: Option<String>,
    pub workspace: Option<String>,
    pub max_iterations: Option<usize>,
    pub shell_timeout_ms: Option<u64>,
    #[serde(default)]
    pub model: RawProviderConfig,
    #[serde(default)]
    pub github: RawGitHubConfig,
}

/// Loads `config/.env` and `.env` into the process environment once.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
        let _ = dotenv();
    });
}

/// Load configuration from a file path and overlay the environment.
///
/// An explicit path must exist. The default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => match read_config(Path::new(DEFAULT_CONFIG_PATH)) {
            Err(ConfigError::NotFound { .. }) => {
                debug!("No configuration file found, using defaults");
                AppConfig::default()
            }
            other => other?,
        },
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_config(&content, path)
}

pub(super) fn parse_config(content: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let config = build(parsed);
    config.validate()?;
    Ok(config)
}

fn build(parsed: RawConfig) -> AppConfig {
    let defaults = AppConfig::default();
    AppConfig {
        provider: parsed.model.into(),
        github: parsed.github.into(),
        workspace: parsed
            .workspace
            .filter(|w| !w.trim().is_empty())
            .map(|w| expand_path(&w)),
        system_prompt: parsed
            .system_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(defaults.system_prompt),
        max_iterations: parsed.max_iterations.unwrap_or(defaults.max_iterations),
        shell_timeout_ms: parsed.shell_timeout_ms.unwrap_or(defaults.shell_timeout_ms),
    }
}
