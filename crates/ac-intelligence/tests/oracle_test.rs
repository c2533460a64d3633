use std::sync::Arc;
use std::time::Duration;

use ac_core::session_log::SessionSummarizer;
use ac_core::types::ChangeReport;
use ac_intelligence::llm::{LlmConfig, LlmError, LlmRole, MockProvider};
use ac_intelligence::oracle::{Oracle, OracleError, Verdict};

fn report() -> ChangeReport {
    ChangeReport::new("?? notes.txt\n", "")
}

fn oracle(mock: &Arc<MockProvider>, timeout: Duration) -> Oracle {
    Oracle::new(mock.clone(), LlmConfig::default(), timeout)
}

#[tokio::test]
async fn judgment_follows_the_answer() {
    let mock = Arc::new(MockProvider::new().with_text("Yes.").with_text("No, wait."));
    let oracle = oracle(&mock, Duration::from_secs(5));

    assert_eq!(oracle.judge(&report(), "often").await.unwrap(), Verdict::Commit);
    assert_eq!(oracle.judge(&report(), "often").await.unwrap(), Verdict::Wait);

    let requests = mock.captured_requests();
    assert_eq!(requests.len(), 2);
    let (messages, _) = &requests[0];
    assert_eq!(messages[0].role, LlmRole::System);
    assert!(messages[1].content.contains("often"));
    assert!(messages[1].content.contains("notes.txt"));
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out() {
    let mock = Arc::new(
        MockProvider::new()
            .with_text("yes")
            .with_delay(Duration::from_secs(60)),
    );
    let oracle = oracle(&mock, Duration::from_secs(2));

    let err = oracle.judge(&report(), "").await.unwrap_err();
    assert!(matches!(err, OracleError::Timeout(d) if d == Duration::from_secs(2)));
}

#[tokio::test]
async fn provider_errors_surface() {
    let mock = Arc::new(MockProvider::new().with_error(LlmError::ApiError {
        status: 500,
        message: "boom".into(),
    }));
    let oracle = oracle(&mock, Duration::from_secs(5));
    let err = oracle.describe(&report(), "").await.unwrap_err();
    assert!(matches!(err, OracleError::Llm(LlmError::ApiError { status: 500, .. })));
    assert!(!err.is_offline());
}

#[tokio::test]
async fn blank_description_is_a_failure() {
    let mock = Arc::new(MockProvider::new().with_text("   \n"));
    let oracle = oracle(&mock, Duration::from_secs(5));
    let err = oracle.describe(&report(), "terse").await.unwrap_err();
    assert!(matches!(err, OracleError::Empty));
}

#[tokio::test]
async fn description_is_trimmed_and_verbatim() {
    let mock = Arc::new(MockProvider::new().with_text("\n  Add notes file\n\n- initial draft\n"));
    let oracle = oracle(&mock, Duration::from_secs(5));
    let msg = oracle.describe(&report(), "terse").await.unwrap();
    assert_eq!(msg, "Add notes file\n\n- initial draft");

    let (messages, _) = &mock.captured_requests()[0];
    assert!(messages[1].content.contains("terse"));
}

#[tokio::test]
async fn summarizer_falls_back_to_a_placeholder() {
    let mock = Arc::new(MockProvider::new().with_error(LlmError::HttpError("refused".into())));
    let oracle = oracle(&mock, Duration::from_secs(5));
    let text = oracle.summarizer("bullets").summarize("[t] committed").await;
    assert!(text.starts_with("Summary unavailable:"));
    assert!(text.contains("refused"));
}

#[tokio::test]
async fn summarizer_passes_the_whole_log() {
    let mock = Arc::new(MockProvider::new().with_text("- added notes"));
    let oracle = oracle(&mock, Duration::from_secs(5));
    let text = oracle
        .summarizer("bullets")
        .summarize("[2025-01-01 10:00:00] committed (1 paths): Add notes\n")
        .await;
    assert_eq!(text, "- added notes");
    let (messages, _) = &mock.captured_requests()[0];
    assert!(messages[1].content.contains("Add notes"));
}
