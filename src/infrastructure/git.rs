//! Version-control runner: a thin async wrapper around the `git` binary,
//! always executed in the shared working directory.

use super::workspace::WorkingDirectory;
use serde::Serialize;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

pub const DEFAULT_LOG_COUNT: usize = 10;
pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("unexpected git output: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusReport {
    pub current: Option<String>,
    pub tracking: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<String>,
    pub untracked: Vec<String>,
    pub conflicted: Vec<String>,
    pub clean: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommitSummary {
    pub hash: String,
    pub date: String,
    pub message: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchReport {
    pub current: Option<String>,
    pub all: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommitReport {
    pub commit: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct GitRunner {
    workdir: WorkingDirectory,
}

impl GitRunner {
    pub fn new(workdir: WorkingDirectory) -> Self {
        Self { workdir }
    }

    pub fn workdir(&self) -> PathBuf {
        self.workdir.current()
    }

    pub async fn status(&self) -> Result<StatusReport, GitError> {
        let out = self
            .run_capture(&["status", "--porcelain=v1", "--branch", "-uall"])
            .await?;
        parse_status(&out)
    }

    pub async fn log(&self, max_count: usize) -> Result<Vec<CommitSummary>, GitError> {
        let count = format!("--max-count={}", max_count.max(1));
        let out = self
            .run_capture(&[
                "log",
                &count,
                "--date=iso-strict",
                "--pretty=format:%h%x1f%ad%x1f%an%x1f%s%x1e",
            ])
            .await?;
        parse_log(&out)
    }

    pub async fn branch(&self) -> Result<BranchReport, GitError> {
        let out = self
            .run_capture(&["branch", "--list", "--no-color"])
            .await?;
        let mut current = None;
        let mut all = Vec::new();
        for line in out.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(name) = trimmed.strip_prefix("* ") {
                current = Some(name.to_string());
                all.push(name.to_string());
            } else {
                all.push(trimmed.to_string());
            }
        }
        Ok(BranchReport { current, all })
    }

    pub async fn checkout(&self, branch: &str) -> Result<String, GitError> {
        info!(branch, "Checking out branch");
        self.run_checked(&["checkout", branch]).await?;
        Ok(format!("Switched to branch '{branch}'"))
    }

    pub async fn create_branch(&self, branch: &str) -> Result<String, GitError> {
        info!(branch, "Creating branch");
        self.run_checked(&["checkout", "-b", branch]).await?;
        Ok(format!("Created and switched to branch '{branch}'"))
    }

    /// Stage files. `files` is split on whitespace; `.` stages everything.
    pub async fn add(&self, files: &str) -> Result<String, GitError> {
        let mut args = vec!["add", "--"];
        let paths: Vec<&str> = files.split_whitespace().collect();
        if paths.is_empty() {
            args.push(".");
        } else {
            args.extend(paths);
        }
        self.run_checked(&args).await?;
        Ok(format!("Staged: {files}"))
    }

    pub async fn commit(&self, message: &str) -> Result<CommitReport, GitError> {
        let out = self.run_capture(&["commit", "-m", message]).await?;
        let hash = self
            .run_capture(&["rev-parse", "--short", "HEAD"])
            .await?
            .trim()
            .to_string();
        let summary = out
            .lines()
            .map(str::trim)
            .find(|line| line.contains("changed"))
            .unwrap_or_default()
            .to_string();
        Ok(CommitReport {
            commit: hash,
            summary,
        })
    }

    pub async fn push(&self, remote: &str, branch: Option<&str>) -> Result<String, GitError> {
        let mut args = vec!["push", remote];
        args.extend(branch);
        self.run_checked(&args).await?;
        Ok(format!("Pushed to {remote}"))
    }

    pub async fn pull(&self, remote: &str, branch: Option<&str>) -> Result<String, GitError> {
        let mut args = vec!["pull", remote];
        args.extend(branch);
        let out = self.run_capture(&args).await?;
        Ok(format!("Pulled from {remote}: {}", out.trim()))
    }

    pub async fn diff(&self) -> Result<String, GitError> {
        self.run_capture(&["diff", "--no-color"]).await
    }

    pub async fn stash(&self) -> Result<String, GitError> {
        let out = self.run_capture(&["stash", "push"]).await?;
        Ok(out.trim().to_string())
    }

    pub async fn stash_pop(&self) -> Result<String, GitError> {
        let out = self.run_capture(&["stash", "pop"]).await?;
        Ok(out.trim().to_string())
    }

    async fn run_capture(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run_checked(args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_checked(&self, args: &[&str]) -> Result<Output, GitError> {
        let workdir = self.workdir.current();
        debug!(args = ?args, workdir = %workdir.display(), "Running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: args.join(" "),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(GitError::Failed {
                command: args.join(" "),
                stderr,
            });
        }
        Ok(output)
    }
}

fn parse_status(out: &str) -> Result<StatusReport, GitError> {
    let mut report = StatusReport::default();
    for line in out.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix("## ") {
            parse_branch_header(header, &mut report);
            continue;
        }
        if let Some(path) = line.strip_prefix("?? ") {
            report.untracked.push(path.trim().to_string());
            continue;
        }
        if line.len() < 4 || !line.is_char_boundary(2) || !line.is_char_boundary(3) {
            return Err(GitError::Parse(format!("status line '{line}'")));
        }
        let code = &line[..2];
        let mut path = line[3..].trim().to_string();
        if let Some((_, new)) = path.split_once(" -> ") {
            path = new.trim().to_string();
        }
        let mut chars = code.chars();
        let index = chars.next().unwrap_or(' ');
        let worktree = chars.next().unwrap_or(' ');

        if matches!(code, "DD" | "AA" | "UU" | "AU" | "UA" | "DU" | "UD") {
            report.conflicted.push(path);
            continue;
        }
        if !matches!(index, ' ' | '?') {
            report.staged.push(path.clone());
        }
        match (index, worktree) {
            ('R', _) => report.renamed.push(path),
            ('A', _) => report.created.push(path),
            ('D', _) | (_, 'D') => report.deleted.push(path),
            ('M', _) | (_, 'M') => report.modified.push(path),
            _ => {}
        }
    }
    report.clean = report.staged.is_empty()
        && report.modified.is_empty()
        && report.created.is_empty()
        && report.deleted.is_empty()
        && report.renamed.is_empty()
        && report.untracked.is_empty()
        && report.conflicted.is_empty();
    Ok(report)
}

// Forms: "main", "main...origin/main [ahead 1, behind 2]", "No commits yet on main",
// "HEAD (no branch)".
fn parse_branch_header(header: &str, report: &mut StatusReport) {
    let header = header.trim();
    if let Some(name) = header
        .strip_prefix("No commits yet on ")
        .or_else(|| header.strip_prefix("Initial commit on "))
    {
        report.current = Some(name.to_string());
        return;
    }
    if header.starts_with("HEAD (no branch)") {
        return;
    }

    let (refs, counts) = match header.split_once(" [") {
        Some((refs, rest)) => (refs, Some(rest.trim_end_matches(']'))),
        None => (header, None),
    };
    match refs.split_once("...") {
        Some((local, upstream)) => {
            report.current = Some(local.to_string());
            report.tracking = Some(upstream.to_string());
        }
        None => report.current = Some(refs.to_string()),
    }
    for part in counts.into_iter().flat_map(|c| c.split(", ")) {
        if let Some(n) = part.strip_prefix("ahead ") {
            report.ahead = n.trim().parse().unwrap_or(0);
        } else if let Some(n) = part.strip_prefix("behind ") {
            report.behind = n.trim().parse().unwrap_or(0);
        }
    }
}

fn parse_log(out: &str) -> Result<Vec<CommitSummary>, GitError> {
    out.split('\u{1e}')
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let fields: Vec<&str> = record.split('\u{1f}').collect();
            match fields.as_slice() {
                [hash, date, author, message] => Ok(CommitSummary {
                    hash: hash.to_string(),
                    date: date.to_string(),
                    author: author.to_string(),
                    message: message.to_string(),
                }),
                _ => Err(GitError::Parse(format!("log record '{record}'"))),
            }
        })
        .collect()
}
