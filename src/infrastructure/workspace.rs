//! Shared working-directory tracker.
//!
//! One [`WorkingDirectory`] is created at startup and cloned into every
//! collaborator that touches the filesystem. Clones share the same state, so a
//! directory change is observed by git, file and shell operations at once.

use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Number of visited directories kept in the history.
pub const DIRECTORY_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("path does not exist: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("failed to resolve {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
struct State {
    current: PathBuf,
    history: VecDeque<PathBuf>,
}

/// Cloneable handle to the current working directory.
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    state: Arc<RwLock<State>>,
}

/// Snapshot returned by `show_current_directory`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DirectoryReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    pub history: Vec<String>,
}

impl WorkingDirectory {
    pub fn new(initial: impl Into<PathBuf>) -> Self {
        let current = initial.into();
        let mut history = VecDeque::with_capacity(DIRECTORY_HISTORY_LIMIT);
        history.push_back(current.clone());
        Self {
            state: Arc::new(RwLock::new(State { current, history })),
        }
    }

    /// Start in the process working directory, falling back to `.`.
    pub fn from_process() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn current(&self) -> PathBuf {
        self.read().current.clone()
    }

    /// Resolve `path` against the current directory. `~` expands to the home directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        let candidate = Path::new(expanded.as_ref());
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.current().join(candidate)
        }
    }

    pub fn change_directory(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let target = self.resolve(path);
        if !target.exists() {
            return Err(WorkspaceError::NotFound(path.to_string()));
        }
        if !target.is_dir() {
            return Err(WorkspaceError::NotADirectory(path.to_string()));
        }
        let target = target
            .canonicalize()
            .map_err(|source| WorkspaceError::Resolve {
                path: path.to_string(),
                source,
            })?;

        let mut state = self.write();
        state.current = target.clone();
        state.history.push_back(target.clone());
        while state.history.len() > DIRECTORY_HISTORY_LIMIT {
            state.history.pop_front();
        }
        info!(path = %target.display(), "Working directory changed");
        Ok(target)
    }

    pub fn go_to_parent(&self) -> Result<PathBuf, WorkspaceError> {
        let current = self.current();
        match current.parent() {
            Some(parent) => self.change_directory(&parent.to_string_lossy()),
            None => {
                debug!("Already at filesystem root");
                Ok(current)
            }
        }
    }

    pub fn history(&self) -> Vec<PathBuf> {
        self.read().history.iter().cloned().collect()
    }

    pub fn report(&self) -> DirectoryReport {
        let state = self.read();
        DirectoryReport {
            path: state.current.display().to_string(),
            home: home_dir(),
            history: state
                .history
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        }
    }

    // A poisoned lock still holds a valid path; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn home_dir() -> Option<String> {
    let home = shellexpand::tilde("~");
    if home.as_ref() == "~" {
        None
    } else {
        Some(home.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_directory_changes() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(root.path().join("nested")).expect("mkdir");
        let tracker = WorkingDirectory::new(root.path().canonicalize().expect("canon"));
        let observer = tracker.clone();

        let changed = tracker.change_directory("nested").expect("cd");
        assert_eq!(observer.current(), changed);
        assert!(changed.ends_with("nested"));
    }

    #[test]
    fn rejects_missing_and_file_targets() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::write(root.path().join("file.txt"), "x").expect("write");
        let tracker = WorkingDirectory::new(root.path());

        assert!(matches!(
            tracker.change_directory("missing"),
            Err(WorkspaceError::NotFound(_))
        ));
        assert!(matches!(
            tracker.change_directory("file.txt"),
            Err(WorkspaceError::NotADirectory(_))
        ));
        assert_eq!(tracker.current(), root.path());
    }

    #[test]
    fn parent_is_recorded_in_history() {
        let root = tempfile::tempdir().expect("tempdir");
        let base = root.path().canonicalize().expect("canon");
        std::fs::create_dir(base.join("a")).expect("mkdir");
        let tracker = WorkingDirectory::new(base.join("a"));

        let parent = tracker.go_to_parent().expect("parent");
        assert_eq!(parent, base);
        assert_eq!(tracker.history(), vec![base.join("a"), base.clone()]);
        assert_eq!(tracker.current(), base);
    }

    #[test]
    fn history_is_bounded() {
        let root = tempfile::tempdir().expect("tempdir");
        let base = root.path().canonicalize().expect("canon");
        let tracker = WorkingDirectory::new(base.clone());
        for i in 0..15 {
            let dir = base.join(format!("d{i}"));
            std::fs::create_dir(&dir).expect("mkdir");
            tracker
                .change_directory(&dir.to_string_lossy())
                .expect("cd");
        }
        let history = tracker.history();
        assert_eq!(history.len(), DIRECTORY_HISTORY_LIMIT);
        assert_eq!(history.last(), Some(&base.join("d14")));
    }
}
