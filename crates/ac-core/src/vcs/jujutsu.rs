use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{CommandRunner, CommitIdentity, Result, VcsBackendKind, VcsOptions, VcsPort};

/// Secondary backend: the `jj` command-line tool, colocated with git.
///
/// Always commits as [`CommitIdentity::synthetic`] so it never prompts for
/// user configuration. `jj commit` snapshots the working copy and records the
/// commit in a single operation, so there is nothing to roll back.
///
/// `log` is called from notification tasks while a commit may be running, so
/// it reads the last recorded operation and never snapshots the working copy.
#[derive(Debug, Clone)]
pub struct JujutsuBackend {
    jj: CommandRunner,
}

impl JujutsuBackend {
    pub fn new(root: impl Into<PathBuf>, options: &VcsOptions) -> Self {
        let identity = CommitIdentity::synthetic();
        let jj = CommandRunner::new("jj", root, options.command_timeout).with_base_args([
            "--no-pager".to_string(),
            "--color".to_string(),
            "never".to_string(),
            "--config".to_string(),
            format!("user.name={}", identity.name),
            "--config".to_string(),
            format!("user.email={}", identity.email),
        ]);
        Self { jj }
    }
}

const LOG_ARGS: &[&str] = &["--ignore-working-copy", "log"];

#[async_trait]
impl VcsPort for JujutsuBackend {
    fn kind(&self) -> VcsBackendKind {
        VcsBackendKind::Jujutsu
    }

    fn root(&self) -> &Path {
        self.jj.workdir()
    }

    async fn initialize_repository(&self) -> Result<()> {
        self.jj.run(&["git", "init", "--colocate"]).await?;
        info!(repo = %self.root().display(), "initialised colocated jj repository");
        Ok(())
    }

    async fn diff_summary(&self) -> Result<String> {
        self.jj.run(&["diff", "--summary"]).await
    }

    async fn diff_details(&self) -> Result<String> {
        self.jj.run(&["diff", "--git"]).await
    }

    async fn log(&self) -> Result<String> {
        self.jj.run(LOG_ARGS).await
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.jj.run(&["commit", "--message", message]).await?;
        Ok(())
    }
}
