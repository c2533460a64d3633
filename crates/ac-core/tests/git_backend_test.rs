//! Exercises the git backend against a real `git` binary in a temp dir.

use std::path::Path;
use std::process::Command;

use ac_core::session_log::SessionRecorder;
use ac_core::vcs::{open_backend, CommitIdentity, GitBackend, VcsBackendKind, VcsError, VcsOptions, VcsPort};

fn options() -> VcsOptions {
    VcsOptions {
        identity: Some(CommitIdentity::new("Test Author", "test@example.com")),
        ..VcsOptions::default()
    }
}

async fn init_repo(dir: &Path) -> GitBackend {
    let backend = GitBackend::new(dir, &options());
    assert!(!backend.is_valid_repository());
    backend.initialize_repository().await.expect("git init");
    assert!(backend.is_valid_repository());
    backend
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn commit_count(dir: &Path) -> usize {
    git(dir, &["rev-list", "--count", "HEAD"]).parse().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_repository_has_empty_log_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    assert_eq!(backend.log().await.unwrap(), "");
    let report = backend.inspect().await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn status_lines_count_changed_paths() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
    std::fs::write(dir.path().join("todo.md"), "- one\n").unwrap();

    let report = backend.inspect().await.unwrap();
    assert_eq!(report.affected_count(), 2);
    assert!(report.summary_text().contains("notes.txt"));
}

#[tokio::test]
async fn session_log_directory_is_invisible_to_git() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    let recorder = SessionRecorder::create(dir.path(), true).unwrap();
    recorder.log_line("started").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();

    let report = backend.inspect().await.unwrap();
    assert_eq!(report.affected_count(), 1);
    assert!(!report.summary_text().contains(".commit_logs"));
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commit_records_everything_outstanding() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
    backend.commit("Add notes").await.expect("commit");

    assert_eq!(commit_count(dir.path()), 1);
    assert_eq!(git(dir.path(), &["log", "-1", "--format=%s"]), "Add notes");
    assert_eq!(git(dir.path(), &["log", "-1", "--format=%an"]), "Test Author");
    assert!(backend.inspect().await.unwrap().is_empty());
    assert!(backend.log().await.unwrap().contains("Add notes"));

    std::fs::write(dir.path().join("notes.txt"), "hello again\n").unwrap();
    let report = backend.inspect().await.unwrap();
    assert_eq!(report.affected_count(), 1);
    assert!(report.detail_text().contains("+hello again"));
}

#[tokio::test]
async fn multiline_message_is_kept_intact() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
    backend
        .commit("Add a\n\n- first bullet\n- second bullet")
        .await
        .unwrap();
    let body = git(dir.path(), &["log", "-1", "--format=%B"]);
    assert!(body.contains("- second bullet"));
}

#[tokio::test]
async fn commit_with_nothing_to_commit_fails() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    let err = backend.commit("empty").await.unwrap_err();
    assert!(matches!(err, VcsError::CommandFailed { .. }), "got {err:?}");
    assert_eq!(commit_count(dir.path()), 0);
}

#[cfg(unix)]
fn install_rejecting_hook(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let hook = dir.join(".git/hooks/pre-commit");
    std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
    std::fs::write(&hook, "#!/bin/sh\necho rejected >&2\nexit 1\n").unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn rejected_commit_leaves_nothing_staged() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;

    std::fs::write(dir.path().join("first.txt"), "1\n").unwrap();
    backend.commit("First").await.unwrap();
    assert_eq!(commit_count(dir.path()), 1);

    install_rejecting_hook(dir.path());

    std::fs::write(dir.path().join("second.txt"), "2\n").unwrap();
    let err = backend.commit("Second").await.unwrap_err();
    assert!(err.to_string().contains("rejected"), "got {err}");

    assert_eq!(commit_count(dir.path()), 1);
    assert_eq!(git(dir.path(), &["diff", "--cached", "--name-only"]), "");
    // The change is still in the working tree for the next cycle.
    assert_eq!(backend.inspect().await.unwrap().affected_count(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn rejected_first_commit_unstages_on_unborn_head() {
    let dir = tempfile::tempdir().unwrap();
    let backend = init_repo(dir.path()).await;
    install_rejecting_hook(dir.path());

    std::fs::write(dir.path().join("first.txt"), "1\n").unwrap();
    std::fs::write(dir.path().join("second.txt"), "2\n").unwrap();
    let err = backend.commit("First").await.unwrap_err();
    assert!(err.to_string().contains("rejected"), "got {err}");

    assert_eq!(commit_count(dir.path()), 0);
    assert_eq!(git(dir.path(), &["diff", "--cached", "--name-only"]), "");
    assert_eq!(git(dir.path(), &["ls-files"]), "");
    assert_eq!(backend.inspect().await.unwrap().affected_count(), 2);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commands_outside_a_repository_fail() {
    let dir = tempfile::tempdir().unwrap();
    // Keep git from discovering a repository in a parent of the temp dir.
    let ceiling = dir.path().parent().unwrap().to_path_buf();
    std::env::set_var("GIT_CEILING_DIRECTORIES", &ceiling);

    let backend = open_backend(VcsBackendKind::Git, dir.path(), &options());
    assert_eq!(backend.kind(), VcsBackendKind::Git);
    assert!(!backend.is_valid_repository());
    let err = backend.diff_summary().await.unwrap_err();
    assert!(matches!(err, VcsError::CommandFailed { .. }), "got {err:?}");
}
