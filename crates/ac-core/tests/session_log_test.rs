use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ac_core::session_log::{SessionRecorder, SessionSummarizer, SUMMARY_HEADER};
use ac_core::types::CommitOutcome;
use async_trait::async_trait;

/// Echoes the number of log lines it was given.
#[derive(Default)]
struct CountingSummarizer {
    calls: AtomicUsize,
}

#[async_trait]
impl SessionSummarizer for CountingSummarizer {
    async fn summarize(&self, log_text: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("{} lines reviewed", log_text.lines().count())
    }
}

#[test]
fn each_run_gets_a_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = SessionRecorder::create(dir.path(), true).unwrap();
    let second = SessionRecorder::create(dir.path(), true).unwrap();
    assert_ne!(first.path(), second.path());

    let name = second.path().file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("session_"));
    assert!(name.ends_with("-2.log"), "got {name}");

    let ignore = dir.path().join(".commit_logs/.gitignore");
    assert_eq!(std::fs::read_to_string(ignore).unwrap(), "*\n");
}

#[test]
fn lines_are_timestamped_and_appended() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = SessionRecorder::create(dir.path(), true).unwrap();
    recorder.log_line("first").unwrap();
    recorder.log_line("second\n").unwrap();

    let text = recorder.contents().unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    // [YYYY-MM-DD HH:MM:SS] text
    assert!(lines[0].starts_with('['));
    assert_eq!(&lines[0][20..], "] first");
    assert!(lines[1].ends_with("] second"));
}

#[test]
fn skips_are_recorded_only_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let quiet = SessionRecorder::create(dir.path(), false).unwrap();
    quiet.record(&CommitOutcome::skipped("not yet", 2)).unwrap();
    quiet.record(&CommitOutcome::committed("Add notes", 1)).unwrap();
    quiet
        .record(&CommitOutcome::failed("Add more", 1, "hook rejected"))
        .unwrap();
    let text = quiet.contents().unwrap();
    assert!(!text.contains("not yet"));
    assert!(text.contains("Add notes"));
    assert!(text.contains("hook rejected"));

    let verbose = SessionRecorder::create(dir.path(), true).unwrap();
    verbose.record(&CommitOutcome::skipped("not yet", 2)).unwrap();
    assert!(verbose.contents().unwrap().contains("not yet"));
}

#[tokio::test]
async fn finish_appends_the_summary_once() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = SessionRecorder::create(dir.path(), true).unwrap();
    recorder.record(&CommitOutcome::committed("Add notes", 1)).unwrap();
    recorder.record(&CommitOutcome::committed("Fix typo", 1)).unwrap();

    let summarizer = CountingSummarizer::default();
    recorder.finish(&summarizer).await.unwrap();
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);

    let text = recorder.contents().unwrap();
    assert_eq!(text.matches(SUMMARY_HEADER).count(), 1);
    assert!(text.ends_with(&format!("\n\n{SUMMARY_HEADER}\n2 lines reviewed\n")));
}

#[tokio::test]
async fn empty_session_still_gets_a_summary() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(SessionRecorder::create(dir.path(), true).unwrap());
    recorder.finish(&CountingSummarizer::default()).await.unwrap();
    let text = recorder.contents().unwrap();
    assert!(text.contains("0 lines reviewed"));
}
