//! Built-in tool set: git, GitHub, filesystem, shell and working-directory
//! tools, registered against one shared [`ToolContext`].

use super::descriptor::{ParamType, ToolDescriptor};
use super::error::HandlerError;
use super::registry::ToolRegistry;
use crate::config::{AppConfig, GitHubConfig};
use crate::infrastructure::files::FileInspector;
use crate::infrastructure::git::{DEFAULT_LOG_COUNT, DEFAULT_REMOTE, GitRunner};
use crate::infrastructure::github::{DEFAULT_COMMIT_COUNT, GitHubClient};
use crate::infrastructure::shell::ShellRunner;
use crate::infrastructure::workspace::WorkingDirectory;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;

/// Collaborators shared by every built-in tool. All filesystem-facing
/// collaborators hold clones of the same [`WorkingDirectory`].
#[derive(Clone)]
pub struct ToolContext {
    pub workdir: WorkingDirectory,
    pub git: GitRunner,
    pub github: GitHubClient,
    pub files: FileInspector,
    pub shell: ShellRunner,
    pub shell_timeout_ms: u64,
}

impl ToolContext {
    pub fn new(workdir: WorkingDirectory, github: &GitHubConfig, shell_timeout_ms: u64) -> Self {
        Self {
            git: GitRunner::new(workdir.clone()),
            github: GitHubClient::new(github),
            files: FileInspector::new(workdir.clone()),
            shell: ShellRunner::new(workdir.clone()),
            workdir,
            shell_timeout_ms,
        }
    }

    pub fn from_config(config: &AppConfig, workdir: WorkingDirectory) -> Self {
        Self::new(workdir, &config.github, config.shell_timeout_ms)
    }
}

/// Build the registry with every built-in tool.
pub fn builtin_registry(ctx: ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_all(&mut registry, Arc::new(ctx));
    registry
}

fn add<A, F, Fut>(
    registry: &mut ToolRegistry,
    ctx: &Arc<ToolContext>,
    descriptor: ToolDescriptor,
    handler: F,
) where
    A: for<'de> Deserialize<'de> + Send + 'static,
    F: Fn(Arc<ToolContext>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let ctx = ctx.clone();
    registry.register(descriptor, move |args: A| handler(ctx.clone(), args));
}

#[derive(Deserialize)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogArgs {
    max_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchNameArgs {
    branch_name: String,
}

#[derive(Deserialize)]
struct AddArgs {
    files: String,
}

#[derive(Deserialize)]
struct CommitArgs {
    message: String,
}

#[derive(Deserialize)]
struct RemoteArgs {
    remote: String,
    branch: Option<String>,
}

#[derive(Deserialize)]
struct RepoArgs {
    repo: String,
}

#[derive(Deserialize)]
struct RepoCountArgs {
    repo: String,
    count: u32,
}

#[derive(Deserialize)]
struct RepoStateArgs {
    repo: String,
    state: String,
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Deserialize)]
struct UserArgs {
    username: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    path: String,
    show_hidden: bool,
    recursive: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadArgs {
    file_path: String,
    max_lines: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    pattern: String,
    search_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfoArgs {
    file_path: String,
}

#[derive(Deserialize)]
struct CommandArgs {
    command: String,
    timeout: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandsArgs {
    commands: Vec<String>,
    stop_on_error: bool,
}

#[derive(Deserialize)]
struct HistoryArgs {
    count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandNameArgs {
    command_name: String,
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|err| HandlerError::Failed(err.to_string()))
}

impl RemoteArgs {
    fn validate(&self) -> Result<(), HandlerError> {
        require_ref_name("remote", &self.remote)?;
        match &self.branch {
            Some(branch) => require_ref_name("branch", branch),
            None => Ok(()),
        }
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<(), HandlerError> {
    if value.trim().is_empty() {
        Err(HandlerError::InvalidArguments(format!(
            "'{name}' must not be empty"
        )))
    } else {
        Ok(())
    }
}

/// Branch and remote names go to git as positional arguments, so a leading
/// `-` would be parsed as an option.
fn require_ref_name(name: &str, value: &str) -> Result<(), HandlerError> {
    require_non_empty(name, value)?;
    if value.trim_start().starts_with('-') {
        return Err(HandlerError::InvalidArguments(format!(
            "'{name}' must not start with '-'"
        )));
    }
    Ok(())
}

fn state_filter(state: &str) -> Result<(), HandlerError> {
    match state {
        "open" | "closed" | "all" => Ok(()),
        other => Err(HandlerError::InvalidArguments(format!(
            "state must be open, closed or all, got '{other}'"
        ))),
    }
}

pub fn register_all(registry: &mut ToolRegistry, ctx: Arc<ToolContext>) {
    register_git(registry, &ctx);
    register_github(registry, &ctx);
    register_files(registry, &ctx);
    register_shell(registry, &ctx);
    register_workspace(registry, &ctx);
}

fn register_git(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    add(
        registry,
        ctx,
        ToolDescriptor::new(
            "git_status",
            "Show the state of the Git repository in the working directory: branch, staged, modified and untracked files",
        ),
        |ctx, _: NoArgs| async move { to_value(ctx.git.status().await?) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_log", "Show the Git commit history").optional(
            "maxCount",
            ParamType::Integer,
            "Maximum number of commits to show",
            Some(json!(DEFAULT_LOG_COUNT)),
        ),
        |ctx, args: LogArgs| async move { to_value(ctx.git.log(args.max_count).await?) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_branch", "List local Git branches and the current branch"),
        |ctx, _: NoArgs| async move { to_value(ctx.git.branch().await?) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_checkout", "Switch to an existing Git branch").required(
            "branchName",
            ParamType::String,
            "Branch to switch to",
        ),
        |ctx, args: BranchNameArgs| async move {
            require_ref_name("branchName", &args.branch_name)?;
            let message = ctx.git.checkout(&args.branch_name).await?;
            Ok::<_, HandlerError>(json!({ "message": message, "branch": args.branch_name }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_create_branch", "Create a new Git branch and switch to it")
            .required("branchName", ParamType::String, "Name of the new branch"),
        |ctx, args: BranchNameArgs| async move {
            require_ref_name("branchName", &args.branch_name)?;
            let message = ctx.git.create_branch(&args.branch_name).await?;
            Ok::<_, HandlerError>(json!({ "message": message, "branch": args.branch_name }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_add", "Stage files for the next commit").optional(
            "files",
            ParamType::String,
            "Space-separated paths to stage; \".\" stages everything",
            Some(json!(".")),
        ),
        |ctx, args: AddArgs| async move {
            let message = ctx.git.add(&args.files).await?;
            Ok::<_, HandlerError>(json!({ "message": message }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_commit", "Commit the staged changes").required(
            "message",
            ParamType::String,
            "Commit message",
        ),
        |ctx, args: CommitArgs| async move {
            require_non_empty("message", &args.message)?;
            to_value(ctx.git.commit(&args.message).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_push", "Push local commits to a remote")
            .optional(
                "remote",
                ParamType::String,
                "Remote name",
                Some(json!(DEFAULT_REMOTE)),
            )
            .optional("branch", ParamType::String, "Branch to push", None),
        |ctx, args: RemoteArgs| async move {
            args.validate()?;
            let message = ctx.git.push(&args.remote, args.branch.as_deref()).await?;
            Ok::<_, HandlerError>(json!({ "message": message }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_pull", "Pull the latest changes from a remote")
            .optional(
                "remote",
                ParamType::String,
                "Remote name",
                Some(json!(DEFAULT_REMOTE)),
            )
            .optional("branch", ParamType::String, "Branch to pull", None),
        |ctx, args: RemoteArgs| async move {
            args.validate()?;
            let message = ctx.git.pull(&args.remote, args.branch.as_deref()).await?;
            Ok::<_, HandlerError>(json!({ "message": message }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_diff", "Show unstaged changes in the working tree"),
        |ctx, _: NoArgs| async move {
            let diff = ctx.git.diff().await?;
            Ok::<_, HandlerError>(json!({ "empty": diff.trim().is_empty(), "diff": diff }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_stash", "Stash the current working-tree changes"),
        |ctx, _: NoArgs| async move { Ok::<_, HandlerError>(json!({ "message": ctx.git.stash().await? })) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("git_stash_pop", "Apply and drop the most recent stash"),
        |ctx, _: NoArgs| async move { Ok::<_, HandlerError>(json!({ "message": ctx.git.stash_pop().await? })) },
    );
}

fn register_github(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    const REPO: &str = "Repository as name (uses the configured owner) or owner/name";
    const STATE: &str = "State filter: open, closed or all";

    add(
        registry,
        ctx,
        ToolDescriptor::new("github_get_repo", "Get details of a GitHub repository")
            .required("repo", ParamType::String, REPO),
        |ctx, args: RepoArgs| async move { to_value(ctx.github.get_repository(&args.repo).await?) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("github_get_commits", "Get recent commits of a GitHub repository")
            .required("repo", ParamType::String, REPO)
            .optional(
                "count",
                ParamType::Integer,
                "Number of commits",
                Some(json!(DEFAULT_COMMIT_COUNT)),
            ),
        |ctx, args: RepoCountArgs| async move {
            to_value(ctx.github.get_recent_commits(&args.repo, args.count).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("github_get_branches", "List branches of a GitHub repository")
            .required("repo", ParamType::String, REPO),
        |ctx, args: RepoArgs| async move { to_value(ctx.github.get_branches(&args.repo).await?) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("github_get_prs", "List pull requests of a GitHub repository")
            .required("repo", ParamType::String, REPO)
            .optional("state", ParamType::String, STATE, Some(json!("open"))),
        |ctx, args: RepoStateArgs| async move {
            state_filter(&args.state)?;
            to_value(ctx.github.get_pull_requests(&args.repo, &args.state).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("github_get_issues", "List issues (not pull requests) of a GitHub repository")
            .required("repo", ParamType::String, REPO)
            .optional("state", ParamType::String, STATE, Some(json!("open"))),
        |ctx, args: RepoStateArgs| async move {
            state_filter(&args.state)?;
            to_value(ctx.github.get_issues(&args.repo, &args.state).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("github_search_repos", "Search GitHub repositories").required(
            "query",
            ParamType::String,
            "Search keywords",
        ),
        |ctx, args: QueryArgs| async move {
            require_non_empty("query", &args.query)?;
            to_value(ctx.github.search_repositories(&args.query).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("github_get_user", "Get a GitHub user's profile").optional(
            "username",
            ParamType::String,
            "User name; the authenticated user when omitted",
            None,
        ),
        |ctx, args: UserArgs| async move {
            to_value(ctx.github.get_user_info(args.username.as_deref()).await?)
        },
    );
}

fn register_files(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    add(
        registry,
        ctx,
        ToolDescriptor::new(
            "list_files",
            "List files and directories; dependency and build directories are skipped",
        )
        .optional("path", ParamType::String, "Directory to list", Some(json!(".")))
        .optional("showHidden", ParamType::Boolean, "Include dot files", Some(json!(false)))
        .optional("recursive", ParamType::Boolean, "Descend into subdirectories", Some(json!(false))),
        |ctx, args: ListArgs| async move {
            to_value(
                ctx.files
                    .list_files(&args.path, args.show_hidden, args.recursive)
                    .await?,
            )
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("read_file", "Read a text file (up to 10 MB)")
            .required("filePath", ParamType::String, "File to read")
            .optional(
                "maxLines",
                ParamType::Integer,
                "Maximum lines to return; 0 returns the whole file",
                Some(json!(0)),
            ),
        |ctx, args: ReadArgs| async move {
            to_value(ctx.files.read_file(&args.file_path, args.max_lines).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new(
            "search_files",
            "Find files by name using * and ? wildcards, case-insensitive",
        )
        .required("pattern", ParamType::String, "Name pattern, e.g. *.rs")
        .optional("searchPath", ParamType::String, "Directory to search", Some(json!("."))),
        |ctx, args: SearchArgs| async move {
            require_non_empty("pattern", &args.pattern)?;
            to_value(ctx.files.search_files(&args.pattern, &args.search_path).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new(
            "get_file_info",
            "Show size, timestamps and permissions of a file or directory",
        )
        .required("filePath", ParamType::String, "Path to inspect"),
        |ctx, args: FileInfoArgs| async move {
            to_value(ctx.files.get_file_info(&args.file_path).await?)
        },
    );
}

fn register_shell(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    add(
        registry,
        ctx,
        ToolDescriptor::new(
            "execute_command",
            "Run a shell command in the working directory; destructive commands are refused",
        )
        .required("command", ParamType::String, "Command line to run")
        .optional(
            "timeout",
            ParamType::Integer,
            "Timeout in milliseconds",
            Some(json!(ctx.shell_timeout_ms)),
        ),
        |ctx, args: CommandArgs| async move {
            require_non_empty("command", &args.command)?;
            let timeout = args.timeout.unwrap_or(ctx.shell_timeout_ms).max(1);
            to_value(ctx.shell.execute_command(&args.command, timeout).await?)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("execute_commands", "Run several shell commands one after another")
            .required("commands", ParamType::Array, "Commands to run in order")
            .items(ParamType::String)
            .optional(
                "stopOnError",
                ParamType::Boolean,
                "Stop at the first failing command",
                Some(json!(false)),
            ),
        |ctx, args: CommandsArgs| async move {
            if args.commands.is_empty() {
                return Err(HandlerError::InvalidArguments(
                    "'commands' must not be empty".into(),
                ));
            }
            let report = ctx
                .shell
                .execute_commands(&args.commands, args.stop_on_error, ctx.shell_timeout_ms)
                .await;
            to_value(report)
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("get_command_history", "Show recently executed commands, newest first")
            .optional("count", ParamType::Integer, "Number of entries", Some(json!(10))),
        |ctx, args: HistoryArgs| async move { to_value(ctx.shell.history(args.count)) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("check_command_exists", "Check whether a command is available on PATH")
            .required("commandName", ParamType::String, "Command name"),
        |ctx, args: CommandNameArgs| async move {
            to_value(ctx.shell.check_command_exists(&args.command_name).await?)
        },
    );
}

fn register_workspace(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    add(
        registry,
        ctx,
        ToolDescriptor::new(
            "change_directory",
            "Change the working directory used by git, file and shell tools",
        )
        .required("path", ParamType::String, "Relative, absolute or ~-prefixed path"),
        |ctx, args: PathArgs| async move {
            require_non_empty("path", &args.path)?;
            let previous = ctx.workdir.current();
            let path = ctx.workdir.change_directory(&args.path)?;
            Ok::<_, HandlerError>(json!({
                "path": path.display().to_string(),
                "previous": previous.display().to_string(),
            }))
        },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("show_current_directory", "Show the current working directory"),
        |ctx, _: NoArgs| async move { to_value(ctx.workdir.report()) },
    );
    add(
        registry,
        ctx,
        ToolDescriptor::new("go_to_parent_directory", "Move the working directory up one level"),
        |ctx, _: NoArgs| async move {
            let path = ctx.workdir.go_to_parent()?;
            Ok::<_, HandlerError>(json!({ "path": path.display().to_string() }))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::dispatcher::ToolDispatcher;
    use crate::application::tooling::error::ToolErrorKind;

    const EXPECTED: [&str; 30] = [
        "git_status",
        "git_log",
        "git_branch",
        "git_checkout",
        "git_create_branch",
        "git_add",
        "git_commit",
        "git_push",
        "git_pull",
        "git_diff",
        "git_stash",
        "git_stash_pop",
        "github_get_repo",
        "github_get_commits",
        "github_get_branches",
        "github_get_prs",
        "github_get_issues",
        "github_search_repos",
        "github_get_user",
        "list_files",
        "read_file",
        "search_files",
        "get_file_info",
        "execute_command",
        "execute_commands",
        "get_command_history",
        "check_command_exists",
        "change_directory",
        "show_current_directory",
        "go_to_parent_directory",
    ];

    fn setup() -> (tempfile::TempDir, ToolContext, ToolDispatcher) {
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkingDirectory::new(root.path().canonicalize().expect("canon"));
        let ctx = ToolContext::new(workdir, &GitHubConfig::default(), 5_000);
        let dispatcher = ToolDispatcher::new(Arc::new(builtin_registry(ctx.clone())));
        (root, ctx, dispatcher)
    }

    #[test]
    fn registers_every_tool_in_order() {
        let (_root, _ctx, dispatcher) = setup();
        assert_eq!(dispatcher.registry().names(), EXPECTED.to_vec());
    }

    #[tokio::test]
    async fn change_directory_is_seen_by_file_tools() {
        let (root, ctx, dispatcher) = setup();
        std::fs::create_dir(root.path().join("sub")).expect("mkdir");
        std::fs::write(root.path().join("sub/inner.txt"), "hello").expect("write");

        let moved = dispatcher
            .dispatch("change_directory", r#"{"path": "sub"}"#)
            .await;
        assert!(moved.ok, "{moved:?}");
        assert!(ctx.workdir.current().ends_with("sub"));
        assert!(ctx.git.workdir().ends_with("sub"));

        let read = dispatcher
            .dispatch("read_file", r#"{"filePath": "inner.txt"}"#)
            .await;
        assert!(read.ok, "{read:?}");
        assert_eq!(read.payload.expect("payload")["content"], "hello");
    }

    #[tokio::test]
    async fn dangerous_command_is_rejected() {
        let (_root, _ctx, dispatcher) = setup();
        let result = dispatcher
            .dispatch("execute_command", r#"{"command": "rm -rf /"}"#)
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::RejectedDangerous));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_payload_contains_stdout() {
        let (_root, _ctx, dispatcher) = setup();
        let result = dispatcher
            .dispatch("execute_command", r#"{"command": "echo hi"}"#)
            .await;
        assert!(result.ok, "{result:?}");
        assert_eq!(result.payload.expect("payload")["stdout"], "hi\n");
    }

    #[tokio::test]
    async fn execute_commands_requires_string_elements() {
        let (_root, _ctx, dispatcher) = setup();
        let result = dispatcher
            .dispatch("execute_commands", r#"{"commands": ["ls", 3]}"#)
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn github_repo_without_owner_fails_cleanly() {
        let (_root, _ctx, dispatcher) = setup();
        let result = dispatcher
            .dispatch("github_get_repo", r#"{"repo": "agent"}"#)
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::CollaboratorFailure));
    }

    #[tokio::test]
    async fn option_like_ref_names_never_reach_git() {
        let (_root, _ctx, dispatcher) = setup();
        let cases = [
            ("git_checkout", r#"{"branchName": "-f"}"#),
            ("git_create_branch", r#"{"branchName": "--orphan=x"}"#),
            ("git_push", r#"{"remote": "--mirror"}"#),
            ("git_pull", r#"{"remote": "origin", "branch": "--rebase"}"#),
        ];
        for (tool, args) in cases {
            let result = dispatcher.dispatch(tool, args).await;
            assert_eq!(
                result.error_kind,
                Some(ToolErrorKind::InvalidArguments),
                "{tool}: {result:?}"
            );
            assert!(
                result
                    .error_message
                    .as_deref()
                    .unwrap_or_default()
                    .contains("must not start with '-'")
            );
        }
    }

    #[tokio::test]
    async fn invalid_state_filter_is_rejected() {
        let (_root, _ctx, dispatcher) = setup();
        let result = dispatcher
            .dispatch("github_get_prs", r#"{"repo": "a/b", "state": "merged"}"#)
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::InvalidArguments));
    }
}
