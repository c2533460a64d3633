use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use super::{CommandRunner, Result, VcsBackendKind, VcsError, VcsOptions, VcsPort};

/// Primary backend: the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct GitBackend {
    git: CommandRunner,
}

impl GitBackend {
    pub fn new(root: impl Into<PathBuf>, options: &VcsOptions) -> Self {
        let mut git = CommandRunner::new("git", root, options.command_timeout)
            .with_env("GIT_TERMINAL_PROMPT", "0")
            .with_env("LC_ALL", "C");
        if let Some(identity) = &options.identity {
            git = git.with_base_args([
                "-c".to_string(),
                format!("user.name={}", identity.name),
                "-c".to_string(),
                format!("user.email={}", identity.email),
            ]);
        }
        Self { git }
    }

    /// Undo `git add -A` after a failed commit so nothing stays staged.
    async fn rollback_index(&self) {
        if let Err(e) = self.git.run(&["reset", "--quiet"]).await {
            warn!(
                repo = %self.root().display(),
                error = %e,
                "failed to unstage changes after a failed commit"
            );
        }
    }
}

#[async_trait]
impl VcsPort for GitBackend {
    fn kind(&self) -> VcsBackendKind {
        VcsBackendKind::Git
    }

    fn root(&self) -> &Path {
        self.git.workdir()
    }

    async fn initialize_repository(&self) -> Result<()> {
        self.git.run(&["init", "--quiet"]).await?;
        info!(repo = %self.root().display(), "initialised git repository");
        Ok(())
    }

    async fn diff_summary(&self) -> Result<String> {
        self.git.run(&["status", "--short"]).await
    }

    async fn diff_details(&self) -> Result<String> {
        self.git.run(&["diff"]).await
    }

    async fn log(&self) -> Result<String> {
        match self.git.run(&["log"]).await {
            // A freshly initialised repository has no history yet.
            Err(VcsError::CommandFailed { stderr, .. })
                if stderr.contains("does not have any commits") =>
            {
                Ok(String::new())
            }
            other => other,
        }
    }

    async fn commit(&self, message: &str) -> Result<()> {
        if let Err(e) = self.git.run(&["add", "-A"]).await {
            self.rollback_index().await;
            return Err(e);
        }
        if let Err(e) = self.git.run(&["commit", "--quiet", "--message", message]).await {
            self.rollback_index().await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::CommitIdentity;

    #[test]
    fn identity_is_passed_as_config() {
        let options = VcsOptions {
            identity: Some(CommitIdentity::new("Ada", "ada@example.com")),
            ..VcsOptions::default()
        };
        let backend = GitBackend::new("/tmp/repo", &options);
        assert_eq!(
            backend.git.command_line(&["commit"]),
            "git -c user.name=Ada -c user.email=ada@example.com commit"
        );
    }

    #[test]
    fn no_identity_uses_plain_git() {
        let backend = GitBackend::new("/tmp/repo", &VcsOptions::default());
        assert_eq!(backend.git.command_line(&["status"]), "git status");
        assert_eq!(backend.root(), Path::new("/tmp/repo"));
        assert_eq!(backend.kind(), VcsBackendKind::Git);
    }
}
