// Orchestration tests: the agent loop driving the real built-in tools
// against a scripted model, inside a temporary workspace.

use async_trait::async_trait;
use github_agent::agent::{Agent, AgentOptions};
use github_agent::client::{GatewayConfig, ModelGateway};
use github_agent::config::{GitHubConfig, ModelProviderConfig};
use github_agent::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use github_agent::tooling::{ToolContext, ToolDispatcher, ToolErrorKind, builtin_registry};
use github_agent::types::{MessageRole, ToolRequest};
use github_agent::workspace::WorkingDirectory;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

#[derive(Clone)]
struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<ModelResponse>>>,
    recordings: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.recordings.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::invalid_response("scripted", "script exhausted"))
    }
}

fn tool_call(id: &str, name: &str, arguments: &str) -> ToolRequest {
    ToolRequest::new(id, name, arguments)
}

fn workspace() -> (TempDir, WorkingDirectory) {
    let root = tempfile::tempdir().expect("tempdir");
    fs::create_dir(root.path().join("project")).expect("mkdir");
    fs::write(root.path().join("project/README.md"), "# demo\n").expect("write");
    let workdir = WorkingDirectory::new(root.path().canonicalize().expect("canonical root"));
    (root, workdir)
}

fn build_agent(
    provider: ScriptedProvider,
    workdir: WorkingDirectory,
) -> Agent<ScriptedProvider> {
    let ctx = ToolContext::new(workdir, &GitHubConfig::default(), 5_000);
    let dispatcher = ToolDispatcher::new(Arc::new(builtin_registry(ctx)));
    Agent::new(
        ModelGateway::new(provider, GatewayConfig::from(&ModelProviderConfig::default())),
        dispatcher,
        "test system prompt",
        AgentOptions::default(),
    )
}

fn tool_payload(agent: &Agent<ScriptedProvider>, call_id: &str) -> Value {
    let message = agent
        .conversation()
        .snapshot()
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some(call_id))
        .expect("tool result present");
    serde_json::from_str(&message.content).expect("tool result is JSON")
}

#[tokio::test]
async fn directory_change_is_visible_to_later_file_tools() {
    let (_root, workdir) = workspace();
    let provider = ScriptedProvider::new(vec![
        ModelResponse::with_tools("", vec![tool_call("c1", "change_directory", r#"{"path":"project"}"#)]),
        ModelResponse::with_tools(
            "",
            vec![
                tool_call("c2", "list_files", "{}"),
                tool_call("c3", "read_file", r#"{"filePath":"README.md"}"#),
            ],
        ),
        ModelResponse::text("The project has a README."),
    ]);
    let mut agent = build_agent(provider.clone(), workdir.clone());

    let outcome = agent.run("what is in project?").await.expect("agent succeeds");

    assert_eq!(outcome.content, "The project has a README.");
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.steps.iter().all(|s| s.success));
    assert!(workdir.current().ends_with("project"));

    let listing = tool_payload(&agent, "c2");
    assert_eq!(listing["payload"]["count"], 1);
    assert_eq!(listing["payload"]["entries"][0]["name"], "README.md");

    let file = tool_payload(&agent, "c3");
    assert_eq!(file["payload"]["content"], "# demo\n");
}

#[tokio::test]
async fn dangerous_command_is_refused_and_the_turn_continues() {
    let (root, workdir) = workspace();
    let sentinel = root.path().join("project/README.md");
    let provider = ScriptedProvider::new(vec![
        ModelResponse::with_tools(
            "",
            vec![tool_call("c1", "execute_command", r#"{"command":"rm -rf /"}"#)],
        ),
        ModelResponse::text("I will not do that."),
    ]);
    let mut agent = build_agent(provider, workdir);

    let outcome = agent.run("delete everything").await.expect("agent succeeds");

    assert_eq!(outcome.content, "I will not do that.");
    assert_eq!(
        outcome.steps[0].error_kind,
        Some(ToolErrorKind::RejectedDangerous)
    );
    assert!(sentinel.exists());
    let history = agent.conversation().snapshot();
    assert_eq!(history.last().map(|m| m.role), Some(MessageRole::Assistant));
}

#[tokio::test]
async fn model_sees_the_tool_catalog() {
    let (_root, workdir) = workspace();
    let provider = ScriptedProvider::new(vec![ModelResponse::text("hi")]);
    let mut agent = build_agent(provider.clone(), workdir);
    agent.run("hello").await.expect("agent succeeds");

    let requests = provider.recordings.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tools.len(), 30);
    let has_commit = requests[0]
        .tools
        .iter()
        .any(|tool| tool["function"]["name"] == "git_commit");
    assert!(has_commit);
}

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn git_tools_follow_the_working_directory() {
    if !git_available() {
        return;
    }
    let (root, workdir) = workspace();
    let repo = root.path().join("project");
    let init = std::process::Command::new("git")
        .args(["init", "-q"])
        .current_dir(&repo)
        .status()
        .expect("git init");
    assert!(init.success());

    let provider = ScriptedProvider::new(vec![
        ModelResponse::with_tools("", vec![tool_call("c1", "change_directory", r#"{"path":"project"}"#)]),
        ModelResponse::with_tools("", vec![tool_call("c2", "git_status", "")]),
        ModelResponse::text("Untracked README."),
    ]);
    let mut agent = build_agent(provider, workdir);

    let outcome = agent.run("git status please").await.expect("agent succeeds");
    assert!(outcome.steps.iter().all(|s| s.success), "{:?}", outcome.steps);

    let status = tool_payload(&agent, "c2");
    let untracked = status["payload"]["untracked"].as_array().expect("array");
    assert!(untracked.iter().any(|path| path == "README.md"));
}
