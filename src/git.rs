//! Git repository operations.
//!
//! The engine only ever talks to git through the [`Vcs`] trait, so tests can
//! substitute an in-memory fake. [`Git`] is the real implementation: one
//! external `git` process per call, stdin disabled, working directory pinned
//! to the repository root, and a hard timeout on every invocation.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

/// Ceiling on every git invocation; exceeding it aborts the run.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// The narrow version-control capability the reconciliation walk needs.
///
/// All methods are read-only except the two tag-creation calls.
#[allow(async_fn_in_trait)]
pub trait Vcs {
    /// Full history of `path` reachable from `start_ref`, newest commit
    /// first, one `<hash> <describe>` line per revision that touched the
    /// path. Must not be pruned at a deletion: a path that was removed and
    /// later re-added has to show commits on both sides of the gap.
    async fn file_history(&self, start_ref: &str, path: &Path) -> Result<String, Error>;

    /// Content of `path` as of `commit`. `None` means the path does not
    /// exist at that commit, a routine answer when walking old history,
    /// not an error.
    async fn show_file(&self, commit: &str, path: &Path) -> Result<Option<String>, Error>;

    /// Resolve a tag name to the commit it points at (peeling annotated
    /// tags), anywhere in the repository. `None` if no such tag exists.
    async fn resolve_tag(&self, tag: &str) -> Result<Option<String>, Error>;

    /// Names of all branches (local and remote) containing `commit`. An
    /// empty list means the commit is unreachable from every branch tip.
    async fn branches_with_commit(&self, commit: &str) -> Result<Vec<String>, Error>;

    /// Create an annotated tag at `commit`. Returns `false` if git refused,
    /// typically because a conflicting tag of the same name exists.
    async fn create_annotated_tag(
        &self,
        tag: &str,
        commit: &str,
        message: &str,
    ) -> Result<bool, Error>;

    /// Create a lightweight tag at `commit`. Returns `false` if git refused.
    async fn create_lightweight_tag(&self, tag: &str, commit: &str) -> Result<bool, Error>;
}

/// A git repository handle backed by the `git` command-line tool.
pub struct Git {
    root: PathBuf,
    verbose: bool,
}

impl Git {
    /// Wrap the repository at `root`. With `verbose`, git's own stderr is
    /// passed through instead of discarded.
    pub fn new(root: PathBuf, verbose: bool) -> Self {
        Self { root, verbose }
    }

    /// Get the repository root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Run a git command and hand back the raw output, successful or not.
    async fn run_output(&self, args: &[&str]) -> Result<Output, Error> {
        tracing::debug!(command = %args.join(" "), "git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            // A timed-out invocation must not leave a hung git child behind.
            .kill_on_drop(true);

        timeout(COMMAND_TIMEOUT, cmd.output())
            .await
            .map_err(|_| Error::Timeout(args.join(" ")))?
            .map_err(|e| Error::Exec(format!("git {}: {e}", args.first().unwrap_or(&""))))
    }

    /// Run a git command that must succeed and capture its stdout.
    async fn run_stdout(&self, args: &[&str]) -> Result<String, Error> {
        let output = self.run_output(args).await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(Error::Failed(format!("git {}", args.join(" "))))
        }
    }
}

impl Vcs for Git {
    async fn file_history(&self, start_ref: &str, path: &Path) -> Result<String, Error> {
        let path = path.display().to_string();
        self.run_stdout(&[
            "log",
            start_ref,
            "--full-history",
            "--follow",
            "--format=format:%H %(describe)",
            "--",
            &path,
        ])
        .await
    }

    async fn show_file(&self, commit: &str, path: &Path) -> Result<Option<String>, Error> {
        let spec = format!("{commit}:{}", path.display());
        let output = self.run_output(&["show", &spec]).await?;

        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
        } else {
            Ok(None)
        }
    }

    async fn resolve_tag(&self, tag: &str) -> Result<Option<String>, Error> {
        // ^{commit} peels annotated tags down to the tagged commit.
        let refspec = format!("refs/tags/{tag}^{{commit}}");
        let output = self
            .run_output(&["rev-parse", "--verify", "--quiet", &refspec])
            .await?;

        if output.status.success() {
            Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ))
        } else {
            Ok(None)
        }
    }

    async fn branches_with_commit(&self, commit: &str) -> Result<Vec<String>, Error> {
        let out = self
            .run_stdout(&[
                "branch",
                "--all",
                "--contains",
                commit,
                "--format=%(refname:short)",
            ])
            .await?;

        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn create_annotated_tag(
        &self,
        tag: &str,
        commit: &str,
        message: &str,
    ) -> Result<bool, Error> {
        let output = self
            .run_output(&["tag", "--message", message, tag, commit])
            .await?;
        Ok(output.status.success())
    }

    async fn create_lightweight_tag(&self, tag: &str, commit: &str) -> Result<bool, Error> {
        let output = self.run_output(&["tag", tag, commit]).await?;
        Ok(output.status.success())
    }
}

/// Errors from git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute: {0}")]
    Exec(String),

    #[error("timed out after 10s: git {0}")]
    Timeout(String),

    #[error("{0}")]
    Failed(String),
}
