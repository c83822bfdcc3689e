use crate::error::{GuardError, GuardResult};
use crate::models::{Analysis, FailureReason};

use super::ValidationContext;

/// The Hemingway prompt sent to an LLM backend.
pub fn build_prompt(text: &str, context: &ValidationContext) -> String {
    format!(
        r#"Analyze this message for {context}:

"{text}"

Apply the Hemingway method: check for conciseness, clarity, and readability.

Return JSON only:
{{
  "approved": bool,
  "word_count": int,
  "read_time_seconds": int,
  "grade_level": float,
  "issues": [],
  "suggestion": ""
}}

"approved" is true when the message is good to send as-is. "grade_level" is the
Flesch-Kincaid grade. "issues" lists problems such as "too long", "passive
voice" or "unclear". "suggestion" is a shorter, clearer version when not
approved and an empty string otherwise.

Guidelines:
- Approve messages that are clear, concise, and appropriate for the context
- Flag overly long messages (>100 words for DMs, >200 for channels)
- Flag passive voice, jargon, or unclear phrasing
- Flag messages that could be misinterpreted
- Suggest a more concise version if there are issues"#,
        context = context.describe(),
        text = text,
    )
}

/// Parse a model reply into an `Analysis`. Tolerates a fenced code block or
/// chatter around the JSON object.
pub fn parse_analysis(raw: &str) -> GuardResult<Analysis> {
    let body = extract_json_object(raw).ok_or_else(|| {
        GuardError::ValidationFailed(FailureReason::Malformed("no JSON object in response".into()))
    })?;

    serde_json::from_str(body).map_err(|err| {
        GuardError::ValidationFailed(FailureReason::Malformed(format!(
            "failed to parse analysis: {err}"
        )))
    })
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
