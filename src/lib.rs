pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{agent, client, conversation, stdio, tooling};
pub use cli::{Cli, RunMode};
pub use config::{AppConfig, GitHubConfig, ModelProviderConfig};
pub use domain::types;
pub use infrastructure::{model, rpc, workspace};

use agent::{Agent, AgentOptions};
use client::{GatewayConfig, ModelGateway};
use infrastructure::workspace::WorkingDirectory;
use model::OpenAIClient;
use rpc::McpServer;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use tokio::io::{self, BufReader};
use tooling::{ToolContext, ToolDispatcher, builtin_registry};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing(cli.mode.default_log_filter());
    info!("Starting github-agent");
    debug!(
        mode = ?cli.mode,
        config = ?cli.config,
        workspace = ?cli.workspace,
        "CLI arguments parsed"
    );

    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut config);
    for warning in config.warnings() {
        warn!("{warning}");
    }

    let workdir = WorkingDirectory::from_process();
    if let Some(path) = &config.workspace {
        workdir.change_directory(&path.to_string_lossy())?;
    }
    info!(workdir = %workdir.current().display(), "Working directory ready");

    let registry = builtin_registry(ToolContext::from_config(&config, workdir));
    let dispatcher = ToolDispatcher::new(Arc::new(registry));
    debug!(tools = dispatcher.registry().len(), "Tool registry built");

    match cli.mode {
        RunMode::Mcp => {
            info!("Starting MCP server on stdio");
            let server = McpServer::new(dispatcher);
            server
                .serve(BufReader::new(io::stdin()), io::stdout())
                .await?;
        }
        RunMode::Chat => {
            let mut agent = build_agent(&config, dispatcher);
            info!(session_id = agent.session_id(), "Launching interactive chat");
            stdio::run(&mut agent).await?;
        }
        RunMode::Once => {
            let prompt = load_prompt(&cli)?;
            let mut agent = build_agent(&config, dispatcher);
            info!("Executing single prompt");
            let outcome = agent.run(prompt).await.map_err(|err| {
                warn!(error = %err, "Agent run failed");
                err.user_message()
            })?;
            let output = json!({
                "session_id": outcome.session_id,
                "content": outcome.content,
                "iterations": outcome.iterations,
                "ceiling_reached": outcome.ceiling_reached,
                "tool_steps": outcome.steps,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        RunMode::Tools => {
            let catalog = dispatcher.registry().catalog();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
    }
    info!("github-agent finished");
    Ok(())
}

fn build_agent(config: &AppConfig, dispatcher: ToolDispatcher) -> Agent<OpenAIClient> {
    let provider = OpenAIClient::from_config(&config.provider);
    let gateway = ModelGateway::new(provider, GatewayConfig::from(&config.provider));
    Agent::new(
        gateway,
        dispatcher,
        config.system_prompt.clone(),
        AgentOptions::from(config),
    )
}

/// Install the stderr log subscriber once. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(model) = &cli.model {
        info!(model = model.as_str(), "Overriding model from CLI flag");
        config.provider.model = model.clone();
    }
    if let Some(system) = &cli.system {
        config.system_prompt = system.clone();
    }
    if let Some(workspace) = &cli.workspace {
        config.workspace = Some(shellexpand::tilde(workspace).into_owned().into());
    }
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path.display(), "Loading prompt from file");
        return non_empty_prompt(fs::read_to_string(path)?);
    }

    if !cli.prompt.is_empty() {
        return non_empty_prompt(cli.prompt.join(" "));
    }

    if !std::io::stdin().is_terminal() {
        info!("Reading prompt from standard input");
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return non_empty_prompt(buffer);
    }

    Err("prompt required via arguments, --prompt-file, or stdin".into())
}

fn non_empty_prompt(prompt: String) -> Result<String, Box<dyn Error>> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err("prompt is empty".into());
    }
    Ok(trimmed.to_string())
}
