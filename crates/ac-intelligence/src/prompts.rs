use ac_core::types::ChangeReport;

use crate::llm::LlmMessage;

/// Diffs beyond this many bytes are cut before being sent.
pub const MAX_DIFF_BYTES: usize = 24_000;
/// Session logs beyond this many bytes keep only their tail.
pub const MAX_LOG_BYTES: usize = 48_000;

const JUDGE_SYSTEM: &str = "You decide whether the current uncommitted changes in a \
repository should be committed right now. Answer with a single word: yes or no.";

const DESCRIBE_SYSTEM: &str = "You are a Git commit message assistant. Write a clear, \
concise, imperative commit message for the change below. Use present-tense verbs. \
Reply with the message only, no preamble and no code fences.";

const SUMMARY_SYSTEM: &str = "You are a code-review assistant. Summarize a working \
session from its commit log as a short list of high-level bullet points.";

/// Truncate to at most `max` bytes on a char boundary, marking the cut.
fn head(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[... {} bytes truncated]", &text[..end], text.len() - end)
}

/// Keep the last `max` bytes, since the end of a session matters most.
fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[... {} bytes truncated]\n{}", start, &text[start..])
}

fn change_block(report: &ChangeReport) -> String {
    let diff = report.detail_text().trim();
    let diff = if diff.is_empty() {
        "(no textual diff, e.g. only new untracked files)".to_string()
    } else {
        head(diff, MAX_DIFF_BYTES)
    };
    format!(
        "Changed paths ({}):\n{}\n\nDiff:\n{}",
        report.affected_count(),
        report.summary_text().trim_end(),
        diff
    )
}

pub fn judge(report: &ChangeReport, commit_frequency_hint: &str) -> Vec<LlmMessage> {
    vec![
        LlmMessage::system(JUDGE_SYSTEM),
        LlmMessage::user(format!(
            "Commit preference: {}\n\n{}\n\nShould these changes be committed now?",
            commit_frequency_hint.trim(),
            change_block(report)
        )),
    ]
}

pub fn describe(report: &ChangeReport, detail_level_hint: &str) -> Vec<LlmMessage> {
    vec![
        LlmMessage::system(DESCRIBE_SYSTEM),
        LlmMessage::user(format!(
            "Style preference: {}\n\n{}",
            detail_level_hint.trim(),
            change_block(report)
        )),
    ]
}

pub fn summarize(log_text: &str, detail_level_hint: &str) -> Vec<LlmMessage> {
    vec![
        LlmMessage::system(SUMMARY_SYSTEM),
        LlmMessage::user(format!(
            "Style preference: {}\n\nHere is the session log:\n\n{}",
            detail_level_hint.trim(),
            tail(log_text, MAX_LOG_BYTES)
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmRole;

    #[test]
    fn judge_prompt_carries_hint_and_paths() {
        let report = ChangeReport::new("?? notes.txt\n", "");
        let msgs = judge(&report, "commit often");
        assert_eq!(msgs[0].role, LlmRole::System);
        assert!(msgs[1].content.contains("commit often"));
        assert!(msgs[1].content.contains("?? notes.txt"));
        assert!(msgs[1].content.contains("Changed paths (1)"));
    }

    #[test]
    fn long_diffs_are_cut() {
        let diff = "é".repeat(MAX_DIFF_BYTES);
        let report = ChangeReport::new(" M a.txt\n", diff);
        let msgs = describe(&report, "terse");
        assert!(msgs[1].content.contains("bytes truncated"));
        assert!(msgs[1].content.len() < MAX_DIFF_BYTES + 1_000);
    }

    #[test]
    fn long_logs_keep_the_tail() {
        let mut log = "x".repeat(MAX_LOG_BYTES);
        log.push_str("LAST LINE");
        let msgs = summarize(&log, "bullets");
        assert!(msgs[1].content.ends_with("LAST LINE"));
        assert!(msgs[1].content.contains("bytes truncated"));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(head("abc", 10), "abc");
        assert_eq!(tail("abc", 10), "abc");
    }
}
