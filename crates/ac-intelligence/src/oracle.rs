//! Judgment, description and session-summary calls with their fallbacks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ac_core::config::OracleConfig;
use ac_core::session_log::SessionSummarizer;
use ac_core::types::ChangeReport;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{GeminiProvider, LlmConfig, LlmError, LlmMessage, LlmProvider};
use crate::prompts;

pub const OFFLINE_SUMMARY: &str = "No API key configured; session summary skipped.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OracleError {
    /// No provider is configured; callers use their deterministic default.
    #[error("oracle is offline (no API key configured)")]
    Offline,

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle returned an empty answer")]
    Empty,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl OracleError {
    pub fn is_offline(&self) -> bool {
        matches!(self, OracleError::Offline)
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Commit,
    Wait,
}

impl Verdict {
    /// "Commit" iff the first word, lowercased and stripped of punctuation,
    /// is `yes`, `y` or `true`.
    pub fn parse(answer: &str) -> Self {
        let first = answer
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match first.as_str() {
            "yes" | "y" | "true" => Verdict::Commit,
            _ => Verdict::Wait,
        }
    }

    pub fn is_commit(self) -> bool {
        self == Verdict::Commit
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Commit => write!(f, "commit"),
            Verdict::Wait => write!(f, "wait"),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Text oracle backed by an optional LLM provider.
///
/// Every call is bounded by `timeout`. Without a provider the oracle is
/// offline: judgments return `offline_verdict` and descriptions fail with
/// [`OracleError::Offline`].
pub struct Oracle {
    provider: Option<Arc<dyn LlmProvider>>,
    llm: LlmConfig,
    timeout: Duration,
    offline_verdict: Verdict,
}

impl Oracle {
    pub fn new(provider: Arc<dyn LlmProvider>, llm: LlmConfig, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            llm,
            timeout,
            offline_verdict: Verdict::Commit,
        }
    }

    pub fn offline(offline_commit: bool) -> Self {
        Self {
            provider: None,
            llm: LlmConfig::default(),
            timeout: Duration::from_secs(20),
            offline_verdict: if offline_commit {
                Verdict::Commit
            } else {
                Verdict::Wait
            },
        }
    }

    /// Gemini when the configured key variable is set, offline otherwise.
    pub fn from_config(config: &OracleConfig) -> Self {
        let llm = LlmConfig {
            model: config.model.clone(),
            ..LlmConfig::default()
        };
        match config.api_key() {
            Some(key) => {
                info!(model = %config.model, "oracle using gemini");
                let provider = GeminiProvider::new(key).with_base_url(&config.base_url);
                Self::new(Arc::new(provider), llm, config.timeout())
            }
            None => {
                info!(
                    env = %config.api_key_env,
                    offline_commit = config.offline_commit,
                    "no API key set, oracle is offline"
                );
                let mut oracle = Self::offline(config.offline_commit);
                oracle.llm = llm;
                oracle.timeout = config.timeout();
                oracle
            }
        }
    }

    pub fn is_offline(&self) -> bool {
        self.provider.is_none()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ask(&self, call: &'static str, messages: Vec<LlmMessage>) -> Result<String> {
        let provider = self.provider.as_ref().ok_or(OracleError::Offline)?;
        debug!(call, provider = provider.name(), "querying oracle");
        let response = tokio::time::timeout(self.timeout, provider.complete(&messages, &self.llm))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(text.to_string())
    }

    /// Should the current change be committed now?
    pub async fn judge(&self, report: &ChangeReport, commit_frequency_hint: &str) -> Result<Verdict> {
        if self.is_offline() {
            return Ok(self.offline_verdict);
        }
        let answer = self
            .ask("judge", prompts::judge(report, commit_frequency_hint))
            .await?;
        let verdict = Verdict::parse(&answer);
        debug!(%verdict, answer = %answer, "judgment");
        Ok(verdict)
    }

    /// A commit message for the current change.
    pub async fn describe(&self, report: &ChangeReport, detail_level_hint: &str) -> Result<String> {
        self.ask("describe", prompts::describe(report, detail_level_hint))
            .await
    }

    /// A summary of a whole session log.
    pub async fn summarize(&self, log_text: &str, detail_level_hint: &str) -> Result<String> {
        self.ask("summarize", prompts::summarize(log_text, detail_level_hint))
            .await
    }

    /// Adapter for [`SessionRecorder::finish`](ac_core::session_log::SessionRecorder::finish).
    pub fn summarizer(&self, detail_level_hint: impl Into<String>) -> SessionSummary<'_> {
        SessionSummary {
            oracle: self,
            detail_level_hint: detail_level_hint.into(),
        }
    }
}

/// Session summarizer that never fails: errors become a placeholder line.
pub struct SessionSummary<'a> {
    oracle: &'a Oracle,
    detail_level_hint: String,
}

#[async_trait]
impl SessionSummarizer for SessionSummary<'_> {
    async fn summarize(&self, log_text: &str) -> String {
        match self.oracle.summarize(log_text, &self.detail_level_hint).await {
            Ok(summary) => summary,
            Err(OracleError::Offline) => OFFLINE_SUMMARY.to_string(),
            Err(e) => {
                warn!(error = %e, "session summary failed");
                format!("Summary unavailable: {e}")
            }
        }
    }
}
