pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod provider;

pub use app::AppConfig;
pub use defaults::DEFAULT_CONFIG_PATH as CONFIG_PATH;
pub use error::ConfigError;
pub use provider::{GitHubConfig, ModelProviderConfig};
