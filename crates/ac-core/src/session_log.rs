//! Append-only per-run session log.
//!
//! Each run writes `<root>/.commit_logs/session_<DD_MM_YYYY>-<n>.log`, where
//! `n` counts runs on the same day. The directory ignores itself so neither
//! backend ever reports or commits it.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::event_filter::SESSION_LOG_DIR;
use crate::types::CommitOutcome;

pub const SUMMARY_HEADER: &str = "=== Session Summary ===";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session log io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SessionError + '_ {
    move |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Produces the end-of-session summary. Implementations substitute their own
/// fallback text on failure; this call never fails.
#[async_trait]
pub trait SessionSummarizer: Send + Sync {
    async fn summarize(&self, log_text: &str) -> String;
}

// ---------------------------------------------------------------------------
// SessionRecorder
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SessionRecorder {
    path: PathBuf,
    file: Mutex<File>,
    record_skips: bool,
}

impl SessionRecorder {
    /// Create a fresh log for this run under `root`.
    pub fn create(root: &Path, record_skips: bool) -> Result<Self> {
        let dir = root.join(SESSION_LOG_DIR);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let ignore = dir.join(".gitignore");
        if !ignore.exists() {
            fs::write(&ignore, "*\n").map_err(io_err(&ignore))?;
        }

        let today = Local::now().date_naive();
        let path = next_session_path(&dir, today).map_err(io_err(&dir))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;

        info!(path = %path.display(), "logging session");
        Ok(Self {
            path,
            file: Mutex::new(file),
            record_skips,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn log_line(&self, text: &str) -> Result<()> {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "[{ts}] {}", text.trim_end()).map_err(io_err(&self.path))?;
        file.flush().map_err(io_err(&self.path))
    }

    /// Append an outcome. Skips are dropped unless recording them is enabled.
    pub fn record(&self, outcome: &CommitOutcome) -> Result<()> {
        if !outcome.committed && outcome.error.is_none() && !self.record_skips {
            return Ok(());
        }
        self.log_line(&outcome.log_line())
    }

    pub fn contents(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(io_err(&self.path))
    }

    /// Flush, summarize the whole log and append the summary.
    pub async fn finish(&self, summarizer: &dyn SessionSummarizer) -> Result<()> {
        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            file.flush().map_err(io_err(&self.path))?;
        }

        let log_text = self.contents()?;
        let summary = summarizer.summarize(&log_text).await;

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        write!(file, "\n{SUMMARY_HEADER}\n{}\n", summary.trim_end()).map_err(io_err(&self.path))?;
        file.flush().map_err(io_err(&self.path))?;
        info!(path = %self.path.display(), "session summary written");
        Ok(())
    }
}

/// `session_<date>-<n>.log` with `n` one past the highest existing counter.
fn next_session_path(dir: &Path, date: NaiveDate) -> std::io::Result<PathBuf> {
    let stamp = date.format("%d_%m_%Y").to_string();
    let prefix = format!("session_{stamp}-");

    let mut highest = 0u32;
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable session log entry");
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let counter = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".log"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(n) = counter {
            highest = highest.max(n);
        }
    }

    Ok(dir.join(format!("{prefix}{}.log", highest + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let path = next_session_path(dir.path(), date).unwrap();
        assert_eq!(path.file_name().unwrap(), "session_07_03_2025-1.log");
    }

    #[test]
    fn counter_skips_past_highest_for_the_same_day() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "session_07_03_2025-1.log",
            "session_07_03_2025-4.log",
            "session_06_03_2025-9.log",
            "session_07_03_2025-x.log",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let path = next_session_path(dir.path(), date).unwrap();
        assert_eq!(path.file_name().unwrap(), "session_07_03_2025-5.log");
    }
}
