//! Version-control backends behind one capability set.
//!
//! Both backends shell out to their command-line tools. Every invocation is
//! bounded by a timeout; a non-zero exit or an expired timeout is reported as
//! a [`VcsError`] and never ends the process.

mod git;
mod jujutsu;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ChangeReport;

pub use git::GitBackend;
pub use jujutsu::JujutsuBackend;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("unknown backend: {0} (expected `git` or `jj`)")]
    UnknownBackend(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, VcsError>;

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsBackendKind {
    /// Primary backend.
    Git,
    /// Secondary backend, commits under a fixed synthetic identity.
    #[serde(rename = "jj")]
    Jujutsu,
}

impl VcsBackendKind {
    /// Metadata directory that marks a repository root.
    pub fn marker_dir(&self) -> &'static str {
        match self {
            VcsBackendKind::Git => ".git",
            VcsBackendKind::Jujutsu => ".jj",
        }
    }
}

impl fmt::Display for VcsBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsBackendKind::Git => write!(f, "git"),
            VcsBackendKind::Jujutsu => write!(f, "jj"),
        }
    }
}

impl FromStr for VcsBackendKind {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(VcsBackendKind::Git),
            "jj" | "jujutsu" => Ok(VcsBackendKind::Jujutsu),
            other => Err(VcsError::UnknownBackend(other.to_string())),
        }
    }
}

/// Author identity passed to the backend on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// The synthetic author used by the secondary backend.
    pub fn synthetic() -> Self {
        Self::new("autocommit", "autocommit@localhost")
    }
}

#[derive(Debug, Clone)]
pub struct VcsOptions {
    pub command_timeout: Duration,
    /// Identity for the primary backend; `None` uses the user's own config.
    pub identity: Option<CommitIdentity>,
}

impl Default for VcsOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            identity: None,
        }
    }
}

/// Build the backend selected at startup.
pub fn open_backend(
    kind: VcsBackendKind,
    root: impl Into<PathBuf>,
    options: &VcsOptions,
) -> Arc<dyn VcsPort> {
    match kind {
        VcsBackendKind::Git => Arc::new(GitBackend::new(root, options)),
        VcsBackendKind::Jujutsu => Arc::new(JujutsuBackend::new(root, options)),
    }
}

// ---------------------------------------------------------------------------
// VcsPort
// ---------------------------------------------------------------------------

/// Uniform operations over a version-control backend.
#[async_trait]
pub trait VcsPort: Send + Sync {
    fn kind(&self) -> VcsBackendKind;

    /// Root of the watched working copy.
    fn root(&self) -> &Path;

    /// Whether the backend's marker directory exists at the root.
    fn is_valid_repository(&self) -> bool {
        self.root().join(self.kind().marker_dir()).is_dir()
    }

    /// Create a repository at the root. Only call when
    /// [`is_valid_repository`](Self::is_valid_repository) is false.
    async fn initialize_repository(&self) -> Result<()>;

    /// One line per changed path.
    async fn diff_summary(&self) -> Result<String>;

    /// Full unified diff.
    async fn diff_details(&self) -> Result<String>;

    /// Human-readable history.
    async fn log(&self) -> Result<String>;

    /// Stage everything outstanding and record one commit with `message`.
    ///
    /// Either a new commit exists afterwards or an error is returned and no
    /// staged changes are left behind.
    async fn commit(&self, message: &str) -> Result<()>;

    /// Build a fresh [`ChangeReport`] from the summary and diff.
    async fn inspect(&self) -> Result<ChangeReport> {
        let summary = self.diff_summary().await?;
        let details = self.diff_details().await?;
        Ok(ChangeReport::new(summary, details))
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Runs one backend binary with a fixed argument prefix in the repository.
#[derive(Debug, Clone)]
pub(crate) struct CommandRunner {
    program: String,
    base_args: Vec<String>,
    envs: Vec<(String, String)>,
    workdir: PathBuf,
    timeout: Duration,
}

impl CommandRunner {
    pub(crate) fn new(program: impl Into<String>, workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            envs: Vec::new(),
            workdir: workdir.into(),
            timeout,
        }
    }

    pub(crate) fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub(crate) fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Render the full command line for logs and errors.
    pub(crate) fn command_line(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.base_args.iter().cloned());
        parts.extend(args.iter().map(|a| (*a).to_string()));
        parts.join(" ")
    }

    /// Run and return stdout. Non-zero exit and timeout are errors.
    pub(crate) async fn run(&self, args: &[&str]) -> Result<String> {
        let command = self.command_line(args);
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                return Err(VcsError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        debug!(
            command = %command,
            workdir = %self.workdir.display(),
            exit_code = ?output.status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "vcs command finished"
        );

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
