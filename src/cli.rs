use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "github-agent",
    version,
    about = "Conversational Git, GitHub, filesystem and shell agent"
)]
pub struct Cli {
    /// Configuration file (defaults to config/agent.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, short, value_enum, default_value_t = RunMode::Chat)]
    pub mode: RunMode,
    /// Initial working directory for git, file and shell tools
    #[arg(long, short)]
    pub workspace: Option<String>,
    /// Model id override
    #[arg(long)]
    pub model: Option<String>,
    /// System prompt override
    #[arg(long)]
    pub system: Option<String>,
    /// Read the one-shot prompt from a file
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,
    /// Prompt for `--mode once`
    pub prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RunMode {
    /// Interactive chat on stdin/stdout
    Chat,
    /// MCP server over stdio
    Mcp,
    /// Run a single prompt and print the outcome as JSON
    Once,
    /// Print the tool catalog as JSON and exit
    Tools,
}

impl RunMode {
    /// Default log filter when `RUST_LOG` is unset. Logs go to stderr, but the
    /// interactive and MCP modes share the terminal or pipe with their output.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            RunMode::Chat | RunMode::Mcp => "warn",
            RunMode::Once => "info",
            RunMode::Tools => "warn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_chat_mode() {
        let cli = Cli::parse_from(["github-agent"]);
        assert_eq!(cli.mode, RunMode::Chat);
        assert!(cli.prompt.is_empty());
    }

    #[test]
    fn once_mode_collects_trailing_words() {
        let cli = Cli::parse_from([
            "github-agent",
            "--mode",
            "once",
            "--workspace",
            "~/code",
            "show",
            "git",
            "status",
        ]);
        assert_eq!(cli.mode, RunMode::Once);
        assert_eq!(cli.workspace.as_deref(), Some("~/code"));
        assert_eq!(cli.prompt.join(" "), "show git status");
    }

    #[test]
    fn tools_mode_is_quiet_by_default() {
        let cli = Cli::parse_from(["github-agent", "-m", "tools"]);
        assert_eq!(cli.mode, RunMode::Tools);
        assert_eq!(cli.mode.default_log_filter(), "warn");
    }
}
