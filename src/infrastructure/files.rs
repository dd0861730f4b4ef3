//! Filesystem inspector: listing, reading, searching and stat-ing paths
//! relative to the shared working directory.

use super::workspace::WorkingDirectory;
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern, PatternError};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Files larger than this are refused by `read_file`.
pub const MAX_READ_BYTES: u64 = 10 * 1024 * 1024;

/// Directory names skipped by listing and search.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "coverage",
    ".next",
    ".nuxt",
    "out",
    "target",
];

#[derive(Debug, Error)]
pub enum FileError {
    #[error("path does not exist: {0}")]
    NotFound(String),
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("{0} is a directory, use list_files instead")]
    IsADirectory(String),
    #[error("{path} is too large ({size} bytes), limit is 10 MB")]
    TooLarge { path: String, size: u64 },
    #[error("invalid search pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<String>,
    /// Path relative to the working directory.
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub path: String,
    pub count: usize,
    pub entries: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub path: String,
    pub full_path: String,
    pub content: String,
    pub size: u64,
    pub lines: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub pattern: String,
    pub count: usize,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub full_path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub size_formatted: String,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub accessed: Option<String>,
    pub permissions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileInspector {
    workdir: WorkingDirectory,
}

impl FileInspector {
    pub fn new(workdir: WorkingDirectory) -> Self {
        Self { workdir }
    }

    pub async fn list_files(
        &self,
        path: &str,
        show_hidden: bool,
        recursive: bool,
    ) -> Result<Listing, FileError> {
        let base = self.workdir.current();
        let root = self.workdir.resolve(path);
        let meta = metadata(&root, path).await?;
        if !meta.is_dir() {
            return Err(FileError::NotADirectory(path.to_string()));
        }

        let mut entries = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            for DirItem {
                name,
                path: entry_path,
                meta,
                symlink,
            } in read_dir(&dir).await?
            {
                if (!show_hidden && name.starts_with('.')) || is_excluded(&name) {
                    continue;
                }
                let kind = if meta.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                // Linked directories are listed but never descended into.
                if recursive && kind == EntryKind::Directory && !symlink {
                    pending.push(entry_path.clone());
                }
                entries.push(FileEntry {
                    name,
                    kind,
                    size: meta.len(),
                    modified: timestamp(meta.modified()),
                    path: relative_to(&base, &entry_path),
                });
            }
        }

        entries.sort_by(|a, b| match (a.kind, b.kind) {
            (EntryKind::Directory, EntryKind::File) => Ordering::Less,
            (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
            _ => a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)),
        });

        debug!(path = %root.display(), count = entries.len(), "Listed directory");
        Ok(Listing {
            path: root.display().to_string(),
            count: entries.len(),
            entries,
        })
    }

    /// Read a text file. `max_lines == 0` returns the whole file.
    pub async fn read_file(&self, path: &str, max_lines: usize) -> Result<FileContent, FileError> {
        let full = self.workdir.resolve(path);
        let meta = metadata(&full, path).await?;
        if meta.is_dir() {
            return Err(FileError::IsADirectory(path.to_string()));
        }
        if meta.len() > MAX_READ_BYTES {
            return Err(FileError::TooLarge {
                path: path.to_string(),
                size: meta.len(),
            });
        }

        let bytes = fs::read(&full).await.map_err(|source| FileError::Io {
            path: path.to_string(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let total_lines = text.split('\n').count();

        let (content, truncated) = if max_lines > 0 && total_lines > max_lines {
            let kept: Vec<&str> = text.split('\n').take(max_lines).collect();
            let omitted = total_lines - max_lines;
            (
                format!("{}\n\n... ({omitted} lines omitted)", kept.join("\n")),
                true,
            )
        } else {
            (text, false)
        };

        Ok(FileContent {
            path: path.to_string(),
            full_path: full.display().to_string(),
            content,
            size: meta.len(),
            lines: total_lines,
            truncated,
        })
    }

    pub async fn search_files(
        &self,
        pattern: &str,
        search_path: &str,
    ) -> Result<SearchResults, FileError> {
        let matcher = glob_matcher(pattern)?;
        let base = self.workdir.current();
        let root = self.workdir.resolve(search_path);
        metadata(&root, search_path).await?;

        let mut matches = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            for DirItem {
                name,
                path: entry_path,
                meta,
                symlink,
            } in read_dir(&dir).await?
            {
                if name.starts_with('.') || is_excluded(&name) {
                    continue;
                }
                if meta.is_dir() {
                    if !symlink {
                        pending.push(entry_path);
                    }
                } else if matcher.matches(&name) {
                    matches.push(SearchMatch {
                        name,
                        path: relative_to(&base, &entry_path),
                        size: meta.len(),
                        modified: timestamp(meta.modified()),
                    });
                }
            }
        }
        matches.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(SearchResults {
            pattern: pattern.to_string(),
            count: matches.len(),
            matches,
        })
    }

    pub async fn get_file_info(&self, path: &str) -> Result<FileInfo, FileError> {
        let full = self.workdir.resolve(path);
        let meta = metadata(&full, path).await?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| full.display().to_string());

        Ok(FileInfo {
            name,
            path: path.to_string(),
            full_path: full.display().to_string(),
            kind: if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: meta.len(),
            size_formatted: human_size(meta.len()),
            created: timestamp(meta.created()),
            modified: timestamp(meta.modified()),
            accessed: timestamp(meta.accessed()),
            permissions: permissions(&meta),
        })
    }
}

async fn metadata(full: &Path, shown: &str) -> Result<std::fs::Metadata, FileError> {
    fs::metadata(full).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            FileError::NotFound(shown.to_string())
        } else {
            FileError::Io {
                path: shown.to_string(),
                source,
            }
        }
    })
}

struct DirItem {
    name: String,
    path: PathBuf,
    meta: std::fs::Metadata,
    symlink: bool,
}

async fn read_dir(dir: &Path) -> Result<Vec<DirItem>, FileError> {
    let io_err = |source| FileError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut reader = fs::read_dir(dir).await.map_err(io_err)?;
    let mut out = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let symlink = entry
            .file_type()
            .await
            .map(|kind| kind.is_symlink())
            .unwrap_or(false);
        // Broken symlinks and races with deletion are skipped.
        let Ok(meta) = fs::metadata(&path).await else {
            continue;
        };
        out.push(DirItem {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            meta,
            symlink,
        });
    }
    Ok(out)
}

fn is_excluded(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

fn relative_to(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

enum NameMatcher {
    Glob(Pattern),
    Substring(String),
}

impl NameMatcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Glob(pattern) => pattern.matches_with(
                name,
                MatchOptions {
                    case_sensitive: false,
                    ..Default::default()
                },
            ),
            Self::Substring(needle) => name.to_lowercase().contains(needle),
        }
    }
}

/// `*` and `?` wildcards, case-insensitive. Patterns without wildcards match
/// anywhere in the name.
fn glob_matcher(pattern: &str) -> Result<NameMatcher, FileError> {
    if !pattern.contains(['*', '?']) {
        return Ok(NameMatcher::Substring(pattern.to_lowercase()));
    }
    Pattern::new(pattern)
        .map(NameMatcher::Glob)
        .map_err(|source| FileError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn timestamp(time: std::io::Result<SystemTime>) -> Option<String> {
    time.ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
}

#[cfg(unix)]
fn permissions(meta: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    Some(format!("{:03o}", meta.permissions().mode() & 0o777))
}

#[cfg(not(unix))]
fn permissions(meta: &std::fs::Metadata) -> Option<String> {
    Some(if meta.permissions().readonly() { "444" } else { "666" }.to_string())
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
