pub const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";
pub const ENV_PATH: &str = "config/.env";

pub const DEFAULT_PROVIDER_ID: &str = "deepseek";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_MODEL_ENDPOINT: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_SHELL_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a capable assistant for GitHub, Git and local system work. You can:
1. Run Git commands in the current working directory (status, log, branch, commit, push, pull, diff, stash).
2. Query GitHub repositories (commits, branches, pull requests, issues) and search repositories and users.
3. Inspect the local filesystem (list directories, read files, search by name, show file details).
4. Execute terminal commands and scripts.
5. Change, show and move up the working directory.

When the user asks for something:
- Work out what they want and pick the right tools.
- Present results clearly and concisely.
- If a required argument is missing, ask the user for it.
- Use execute_command freely for terminal requests; obviously destructive commands are refused.

You can work in several steps. Call tools one after another and let each result decide the next
step, for example list files and then read one of them, or check the status before committing.
You have at most 10 steps per request."#;
