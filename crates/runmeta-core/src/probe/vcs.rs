//! Version-control information for the code probe.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Read-only view of the working tree the run was launched from.
pub trait VcsInfo: Send + Sync {
    /// Whether a working tree was detected.
    fn enabled(&self) -> bool;

    fn remote_url(&self) -> Option<String>;

    /// Hash of the last commit.
    fn last_commit(&self) -> Option<String>;

    /// Configured author email.
    fn email(&self) -> Option<String>;

    /// Top-level directory of the working tree.
    fn root(&self) -> Option<PathBuf>;
}

/// No version control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVcs;

impl VcsInfo for NoVcs {
    fn enabled(&self) -> bool {
        false
    }

    fn remote_url(&self) -> Option<String> {
        None
    }

    fn last_commit(&self) -> Option<String> {
        None
    }

    fn email(&self) -> Option<String> {
        None
    }

    fn root(&self) -> Option<PathBuf> {
        None
    }
}

/// Git working tree queried through the `git` executable.
///
/// Every query is best-effort: a missing `git` binary, a directory outside a
/// repository or a failing command all answer `None` / `false`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
    remote: String,
}

impl GitRepo {
    /// Repository containing `dir`, using the `origin` remote.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote: "origin".to_string(),
        }
    }

    /// Repository containing the process working directory.
    pub fn from_current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Use a different remote name.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn git(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| debug!(error = %e, "git not runnable"))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl VcsInfo for GitRepo {
    fn enabled(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"]).as_deref() == Some("true")
    }

    fn remote_url(&self) -> Option<String> {
        self.git(&["remote", "get-url", &self.remote])
    }

    fn last_commit(&self) -> Option<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    fn email(&self) -> Option<String> {
        self.git(&["config", "user.email"])
    }

    fn root(&self) -> Option<PathBuf> {
        self.git(&["rev-parse", "--show-toplevel"]).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_outside_repository_is_disabled() {
        let dir = tempdir().unwrap();
        let repo = GitRepo::new(dir.path().join("missing-subdir"));
        assert!(!repo.enabled());
        assert!(repo.last_commit().is_none());
        assert!(repo.root().is_none());
    }

    #[test]
    fn test_fresh_repository() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let ok = Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir.path())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !ok {
            return;
        }
        Command::new("git")
            .args(["remote", "add", "origin", "https://example.com/r.git"])
            .current_dir(dir.path())
            .status()
            .unwrap();

        let repo = GitRepo::new(dir.path());
        assert!(repo.enabled());
        assert_eq!(
            repo.remote_url().as_deref(),
            Some("https://example.com/r.git")
        );
        // No commits yet.
        assert!(repo.last_commit().is_none());
        assert!(repo.root().is_some());
    }

    #[test]
    fn test_no_vcs() {
        assert!(!NoVcs.enabled());
        assert!(NoVcs.remote_url().is_none());
    }
}
