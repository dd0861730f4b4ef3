//! GitHub REST v3 client used by the `github_*` tools.

use crate::config::GitHubConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const PULLS_PER_PAGE: u32 = 20;
const ISSUES_PER_PAGE: u32 = 20;
const SEARCH_PER_PAGE: u32 = 10;
pub const DEFAULT_COMMIT_COUNT: u32 = 10;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("repository '{repo}' has no owner and GITHUB_OWNER is not set")]
    MissingOwner { repo: String },
    #[error("a GitHub token is required for this request")]
    MissingToken,
    #[error("GitHub request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("GitHub returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl GitHubError {
    pub fn user_message(&self) -> String {
        match self {
            GitHubError::MissingOwner { repo } => {
                format!("Use 'owner/{repo}' or set GITHUB_OWNER.")
            }
            GitHubError::MissingToken => "Set GITHUB_TOKEN to use this GitHub feature.".into(),
            GitHubError::Network(err) if err.is_timeout() => "GitHub request timed out.".into(),
            GitHubError::Network(_) => "Could not reach the GitHub API.".into(),
            GitHubError::Status { status: 401, .. } => "GitHub rejected the token (401).".into(),
            GitHubError::Status { status: 403, .. } => {
                "GitHub refused the request (403), possibly a rate limit.".into()
            }
            GitHubError::Status { status: 404, .. } => "GitHub resource not found (404).".into(),
            GitHubError::Status { status, message } => format!("GitHub error {status}: {message}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub default_branch: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    pub html_url: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchInfo {
    pub name: String,
    pub protected: bool,
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IssueInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub labels: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RepoSearchHit {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    pub html_url: String,
}

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawCommit {
    sha: String,
    html_url: String,
    commit: RawCommitDetail,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    message: String,
    author: Option<RawSignature>,
}

#[derive(Deserialize)]
struct RawSignature {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct RawBranch {
    name: String,
    #[serde(default)]
    protected: bool,
    commit: RawSha,
}

#[derive(Deserialize)]
struct RawSha {
    sha: String,
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    state: String,
    user: Option<RawUser>,
    created_at: Option<String>,
    html_url: String,
    #[serde(default)]
    labels: Vec<RawLabel>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Deserialize)]
struct RawSearch {
    #[serde(default)]
    items: Vec<RawSearchItem>,
}

#[derive(Deserialize)]
struct RawSearchItem {
    name: String,
    full_name: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    html_url: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    owner: Option<String>,
    has_token: bool,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("github-agent/", env!("CARGO_PKG_VERSION"))),
        );
        let token = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            if let Ok(mut value) = HeaderValue::from_str(&format!("token {token}")) {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone().filter(|o| !o.trim().is_empty()),
            has_token: token.is_some(),
        }
    }

    /// `name` is prefixed with the configured owner; `owner/name` is used as is.
    pub fn repo_path(&self, repo: &str) -> Result<String, GitHubError> {
        let repo = repo.trim().trim_matches('/');
        if repo.contains('/') {
            return Ok(repo.to_string());
        }
        match &self.owner {
            Some(owner) => Ok(format!("{owner}/{repo}")),
            None => Err(GitHubError::MissingOwner {
                repo: repo.to_string(),
            }),
        }
    }

    pub async fn get_repository(&self, repo: &str) -> Result<RepositoryInfo, GitHubError> {
        let path = format!("repos/{}", self.repo_path(repo)?);
        self.get_json(self.request(&path)).await
    }

    pub async fn get_recent_commits(
        &self,
        repo: &str,
        count: u32,
    ) -> Result<Vec<CommitInfo>, GitHubError> {
        let path = format!("repos/{}/commits", self.repo_path(repo)?);
        let raw: Vec<RawCommit> = self
            .get_json(self.request(&path).query(&[("per_page", count.clamp(1, 100))]))
            .await?;
        Ok(raw.into_iter().map(CommitInfo::from).collect())
    }

    pub async fn get_branches(&self, repo: &str) -> Result<Vec<BranchInfo>, GitHubError> {
        let path = format!("repos/{}/branches", self.repo_path(repo)?);
        let raw: Vec<RawBranch> = self.get_json(self.request(&path)).await?;
        Ok(raw
            .into_iter()
            .map(|b| BranchInfo {
                name: b.name,
                protected: b.protected,
                sha: short_sha(&b.commit.sha),
            })
            .collect())
    }

    pub async fn get_pull_requests(
        &self,
        repo: &str,
        state: &str,
    ) -> Result<Vec<PullRequestInfo>, GitHubError> {
        let path = format!("repos/{}/pulls", self.repo_path(repo)?);
        let raw: Vec<RawIssue> = self
            .get_json(
                self.request(&path)
                    .query(&[("state", state)])
                    .query(&[("per_page", PULLS_PER_PAGE)]),
            )
            .await?;
        Ok(raw
            .into_iter()
            .map(|pr| PullRequestInfo {
                number: pr.number,
                title: pr.title,
                state: pr.state,
                author: pr.user.map(|u| u.login),
                created_at: pr.created_at,
                url: pr.html_url,
            })
            .collect())
    }

    /// Issues only: the issues endpoint also returns pull requests, which are dropped.
    pub async fn get_issues(&self, repo: &str, state: &str) -> Result<Vec<IssueInfo>, GitHubError> {
        let path = format!("repos/{}/issues", self.repo_path(repo)?);
        let raw: Vec<RawIssue> = self
            .get_json(
                self.request(&path)
                    .query(&[("state", state)])
                    .query(&[("per_page", ISSUES_PER_PAGE)]),
            )
            .await?;
        Ok(issues_only(raw))
    }

    pub async fn search_repositories(&self, query: &str) -> Result<Vec<RepoSearchHit>, GitHubError> {
        let raw: RawSearch = self
            .get_json(
                self.request("search/repositories")
                    .query(&[("q", query)])
                    .query(&[("per_page", SEARCH_PER_PAGE)]),
            )
            .await?;
        Ok(raw
            .items
            .into_iter()
            .map(|item| RepoSearchHit {
                name: item.name,
                full_name: item.full_name,
                description: item.description,
                stars: item.stargazers_count,
                forks: item.forks_count,
                url: item.html_url,
            })
            .collect())
    }

    /// Look up `username`, or the authenticated user when none is given.
    pub async fn get_user_info(&self, username: Option<&str>) -> Result<UserInfo, GitHubError> {
        let path = match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(name) => format!("users/{name}"),
            None if self.has_token => "user".to_string(),
            None => return Err(GitHubError::MissingToken),
        };
        self.get_json(self.request(&path)).await
    }

    fn request(&self, path: &str) -> RequestBuilder {
        self.http.get(format!("{}/{}", self.api_url, path))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GitHubError> {
        let response = request.send().await?;
        let status = response.status();
        info!(status = status.as_u16(), url = %response.url(), "GitHub API response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        let parsed = response.json::<T>().await?;
        debug!("Decoded GitHub API payload");
        Ok(parsed)
    }
}

impl From<RawCommit> for CommitInfo {
    fn from(raw: RawCommit) -> Self {
        let (author, date) = match raw.commit.author {
            Some(sig) => (sig.name, sig.date),
            None => (None, None),
        };
        Self {
            sha: short_sha(&raw.sha),
            message: raw.commit.message,
            author,
            date,
            url: raw.html_url,
        }
    }
}

fn issues_only(raw: Vec<RawIssue>) -> Vec<IssueInfo> {
    raw.into_iter()
        .filter(|issue| issue.pull_request.is_none())
        .map(|issue| IssueInfo {
            number: issue.number,
            title: issue.title,
            state: issue.state,
            author: issue.user.map(|u| u.login),
            created_at: issue.created_at,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            url: issue.html_url,
        })
        .collect()
}

fn status_error(status: StatusCode, body: &str) -> GitHubError {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
    GitHubError::Status {
        status: status.as_u16(),
        message,
    }
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(owner: Option<&str>, token: Option<&str>) -> GitHubConfig {
        GitHubConfig {
            api_url: "https://api.github.com/".into(),
            owner: owner.map(String::from),
            token: token.map(String::from),
            timeout_secs: 5,
        }
    }

    #[test]
    fn repo_path_prefixes_owner() {
        let client = GitHubClient::new(&config(Some("octo"), None));
        assert_eq!(client.repo_path("agent").expect("path"), "octo/agent");
        assert_eq!(client.repo_path("rust-lang/rust").expect("path"), "rust-lang/rust");
    }

    #[test]
    fn repo_without_owner_is_an_error() {
        let client = GitHubClient::new(&config(None, None));
        assert!(matches!(
            client.repo_path("agent"),
            Err(GitHubError::MissingOwner { .. })
        ));
    }

    #[test]
    fn request_urls_join_api_base() {
        let client = GitHubClient::new(&config(Some("octo"), Some("secret")));
        let request = client
            .request("repos/octo/agent")
            .build()
            .expect("request");
        assert_eq!(request.url().as_str(), "https://api.github.com/repos/octo/agent");
        assert!(client.has_token);
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let client = GitHubClient::new(&config(Some("octo"), Some("  ")));
        assert!(!client.has_token);
    }

    #[tokio::test]
    async fn authenticated_user_requires_token() {
        let client = GitHubClient::new(&config(Some("octo"), None));
        assert!(matches!(
            client.get_user_info(None).await,
            Err(GitHubError::MissingToken)
        ));
    }

    #[test]
    fn issues_endpoint_drops_pull_requests() {
        let raw: Vec<RawIssue> = serde_json::from_value(json!([
            {"number": 1, "title": "bug", "state": "open", "user": {"login": "a"},
             "created_at": "2024-01-01T00:00:00Z", "html_url": "u1",
             "labels": [{"name": "bug"}]},
            {"number": 2, "title": "pr", "state": "open", "user": {"login": "b"},
             "created_at": null, "html_url": "u2", "labels": [],
             "pull_request": {"url": "x"}}
        ]))
        .expect("deserialize");
        let issues = issues_only(raw);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
        assert_eq!(issues[0].labels, vec!["bug"]);
    }

    #[test]
    fn commit_mapping_shortens_sha() {
        let raw: RawCommit = serde_json::from_value(json!({
            "sha": "0123456789abcdef",
            "html_url": "https://github.com/o/r/commit/0123456",
            "commit": {"message": "init", "author": {"name": "Ada", "date": "2024-01-01T00:00:00Z"}}
        }))
        .expect("deserialize");
        let commit = CommitInfo::from(raw);
        assert_eq!(commit.sha, "0123456");
        assert_eq!(commit.author.as_deref(), Some("Ada"));
    }

    #[test]
    fn status_error_uses_api_message() {
        let err = status_error(StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#);
        match &err {
            GitHubError::Status { status, message } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.user_message().contains("404"));
    }
}
