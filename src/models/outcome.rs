use serde::{Deserialize, Serialize};

use super::Analysis;

/// Why a validation produced no verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum FailureReason {
    Timeout,
    Validator(String),
    Malformed(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("deadline exceeded"),
            FailureReason::Validator(msg) => write!(f, "validator error: {msg}"),
            FailureReason::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

/// Result of one validation request. Consumed exactly once by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    Clear,
    Flagged {
        issues: Vec<String>,
        suggested_replacement: Option<String>,
        analysis: Analysis,
    },
    Failed {
        reason: FailureReason,
    },
}

impl Outcome {
    /// `approved` always wins; there is no low-confidence tier.
    pub fn from_analysis(analysis: Analysis) -> Self {
        if analysis.approved {
            return Outcome::Clear;
        }

        let suggested_replacement = Some(analysis.suggestion.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Outcome::Flagged {
            issues: analysis.issues.clone(),
            suggested_replacement,
            analysis,
        }
    }

    /// The coordinator's resolution before any user input.
    pub fn decision(&self) -> Decision {
        match self {
            Outcome::Clear | Outcome::Failed { .. } => Decision::Release,
            Outcome::Flagged { .. } => Decision::Hold,
        }
    }
}

/// How a pending intercept is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "text", rename_all = "camelCase")]
pub enum Decision {
    /// Re-emit the original key, field untouched.
    Release,
    /// Write the text into the field, then re-emit the key.
    Replace(String),
    /// Show the outcome and wait for the user.
    Hold,
    /// Swallow the key for good.
    Drop,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Release => "release",
            Decision::Replace(_) => "replace",
            Decision::Hold => "hold",
            Decision::Drop => "drop",
        }
    }
}

/// Choice made on the approval surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", content = "text", rename_all = "camelCase")]
pub enum UserDecision {
    SendAnyway,
    UseSuggestion(String),
    Edit,
}

impl From<UserDecision> for Decision {
    fn from(choice: UserDecision) -> Self {
        match choice {
            UserDecision::SendAnyway => Decision::Release,
            UserDecision::UseSuggestion(text) => Decision::Replace(text),
            UserDecision::Edit => Decision::Drop,
        }
    }
}
