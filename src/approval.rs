use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Analysis, UserDecision};

/// Everything the user needs to decide about a flagged message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub context_tag: String,
    pub issues: Vec<String>,
    pub suggestion: Option<String>,
    pub original_text: String,
    pub analysis: Analysis,
}

/// The popover (or any other UI) that shows a flagged message.
#[async_trait]
pub trait ApprovalSurface: Send + Sync {
    /// Show the review and wait for the user's choice. The future is dropped
    /// when the review is abandoned (focus left, guard disabled, shutdown);
    /// `dismiss` is called right after.
    async fn present(&self, review: Review) -> UserDecision;

    fn dismiss(&self) {}
}
