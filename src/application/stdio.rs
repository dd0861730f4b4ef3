use crate::agent::{Agent, AgentOutcome, AgentStep};
use crate::model::ModelProvider;
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum LoopControl {
    Continue,
    Exit,
}

const SEPARATOR: &str = "────────────────────────────────────────────";

/// Interactive chat on the process stdin/stdout.
pub async fn run<P>(agent: &mut Agent<P>) -> Result<(), StdioError>
where
    P: ModelProvider,
{
    let stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    run_with_io(agent, stdin, &mut stdout).await
}

/// Chat loop over any line reader and writer. Returns at EOF or on an exit command.
pub async fn run_with_io<P, R, W>(
    agent: &mut Agent<P>,
    reader: R,
    writer: &mut W,
) -> Result<(), StdioError>
where
    P: ModelProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    print_banner(writer, agent).await?;

    loop {
        prompt(writer).await?;
        let Some(line) = lines.next_line().await? else {
            write_line(writer, "\nInput closed. Goodbye!").await?;
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match handle_command(input, agent, writer).await? {
            Some(LoopControl::Exit) => break,
            Some(LoopControl::Continue) => continue,
            None => handle_prompt(agent, input, writer).await?,
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Reserved words are matched case-insensitively; anything else goes to the model.
async fn handle_command<P, W>(
    input: &str,
    agent: &mut Agent<P>,
    writer: &mut W,
) -> Result<Option<LoopControl>, StdioError>
where
    P: ModelProvider,
    W: AsyncWrite + Unpin,
{
    let control = match input.to_lowercase().as_str() {
        "exit" | "quit" | "q" => {
            write_line(writer, "Goodbye!").await?;
            LoopControl::Exit
        }
        "clear" => {
            agent.reset();
            write_line(writer, "Conversation history cleared.").await?;
            LoopControl::Continue
        }
        "help" | "h" => {
            print_help(writer).await?;
            LoopControl::Continue
        }
        _ => return Ok(None),
    };
    Ok(Some(control))
}

async fn handle_prompt<P, W>(
    agent: &mut Agent<P>,
    input: &str,
    writer: &mut W,
) -> Result<(), StdioError>
where
    P: ModelProvider,
    W: AsyncWrite + Unpin,
{
    match agent.run(input).await {
        Ok(outcome) => print_outcome(writer, &outcome).await?,
        Err(err) => {
            error!(error = %err, "Agent turn failed");
            write_line(writer, &format!("Error: {}", err.user_message())).await?;
        }
    }
    write_line(writer, SEPARATOR).await?;
    Ok(())
}

async fn print_outcome<W: AsyncWrite + Unpin>(
    writer: &mut W,
    outcome: &AgentOutcome,
) -> io::Result<()> {
    print_tool_steps(writer, &outcome.steps).await?;
    if outcome.ceiling_reached {
        info!(iterations = outcome.iterations, "Showing partial answer");
        write_line(
            writer,
            &format!(
                "Warning: stopped after {} model round trips; the task may be incomplete.",
                outcome.iterations
            ),
        )
        .await?;
    }
    if !outcome.content.trim().is_empty() {
        write_line(writer, "Agent:").await?;
        write_line(writer, outcome.content.trim_end()).await?;
    }
    Ok(())
}

async fn print_tool_steps<W: AsyncWrite + Unpin>(
    writer: &mut W,
    steps: &[AgentStep],
) -> io::Result<()> {
    if steps.is_empty() {
        return Ok(());
    }

    write_line(writer, "Tool steps:").await?;
    for (index, step) in steps.iter().enumerate() {
        let status = if step.success { "ok" } else { "failed" };
        write_line(
            writer,
            &format!("  {}. {} [{}]", index + 1, step.tool, status),
        )
        .await?;
        if let Some(message) = &step.message {
            write_line(writer, &format!("     note: {message}")).await?;
        }
    }
    Ok(())
}

async fn print_banner<P, W>(writer: &mut W, agent: &Agent<P>) -> io::Result<()>
where
    P: ModelProvider,
    W: AsyncWrite + Unpin,
{
    write_line(writer, &format!("github-agent {}", env!("CARGO_PKG_VERSION"))).await?;
    write_line(
        writer,
        &format!(
            "{} tools available. Type a request and press Enter.",
            agent.dispatcher().registry().len()
        ),
    )
    .await?;
    write_line(writer, "Commands: exit, clear, help").await?;
    write_line(writer, SEPARATOR).await
}

async fn print_help<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    write_line(writer, "\nCommands:").await?;
    write_line(writer, "  exit | quit | q   Leave the session").await?;
    write_line(writer, "  clear             Clear the conversation history").await?;
    write_line(writer, "  help | h          Show this help").await?;
    write_line(writer, "\nExample requests:").await?;
    write_line(writer, "  Git:    show the repository status").await?;
    write_line(writer, "          show the last 10 commits").await?;
    write_line(writer, "          create a branch called feature-new").await?;
    write_line(writer, "          commit everything with message \"update code\"").await?;
    write_line(writer, "  GitHub: list the open pull requests of owner/repo").await?;
    write_line(writer, "          search for repositories about tokio").await?;
    write_line(writer, "  Files:  list the files in src, read Cargo.toml").await?;
    write_line(writer, "  Shell:  run cargo --version, go to the parent directory").await
}

async fn prompt<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    writer.write_all(b"you> ").await?;
    writer.flush().await
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentOptions;
    use crate::application::client::{GatewayConfig, ModelGateway};
    use crate::application::tooling::{ToolDispatcher, ToolRegistry};
    use crate::config::ModelProviderConfig;
    use crate::model::{ModelError, ModelRequest, ModelResponse};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct CountingProvider {
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl ModelProvider for CountingProvider {
        fn id(&self) -> &str {
            "counting"
        }

        async fn chat(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            let mut calls = self.calls.lock().await;
            *calls += 1;
            Ok(ModelResponse::text(format!("answer {calls}")))
        }
    }

    fn agent(provider: CountingProvider) -> Agent<CountingProvider> {
        Agent::new(
            ModelGateway::new(provider, GatewayConfig::from(&ModelProviderConfig::default())),
            ToolDispatcher::new(Arc::new(ToolRegistry::new())),
            "system",
            AgentOptions::default(),
        )
    }

    async fn drive(agent: &mut Agent<CountingProvider>, input: &str) -> String {
        let mut output = Vec::new();
        run_with_io(agent, input.as_bytes(), &mut output)
            .await
            .expect("repl runs");
        String::from_utf8(output).expect("utf8")
    }

    #[tokio::test]
    async fn prompt_is_answered_and_exit_stops_the_loop() {
        let provider = CountingProvider::default();
        let mut agent = agent(provider.clone());
        let output = drive(&mut agent, "hello\nEXIT\nnever sent\n").await;

        assert!(output.contains("answer 1"));
        assert!(output.contains("Goodbye!"));
        assert_eq!(*provider.calls.lock().await, 1);
    }

    #[tokio::test]
    async fn clear_resets_history_but_keeps_system_prompt() {
        let mut agent = agent(CountingProvider::default());
        let output = drive(&mut agent, "hello\nclear\n").await;

        assert!(output.contains("Conversation history cleared."));
        assert_eq!(agent.conversation().len(), 1);
        assert_eq!(agent.conversation().system_prompt(), Some("system"));
    }

    #[tokio::test]
    async fn help_does_not_reach_the_model() {
        let provider = CountingProvider::default();
        let mut agent = agent(provider.clone());
        let output = drive(&mut agent, "h\n\nhelp\n").await;

        assert!(output.contains("Example requests:"));
        assert!(output.contains("Input closed."));
        assert_eq!(*provider.calls.lock().await, 0);
    }
}
