pub mod analysis;
pub mod heuristic;
pub mod port;
pub mod prompt;

use async_trait::async_trait;

use crate::error::GuardResult;
use crate::models::Analysis;

pub use analysis::{build_prompt, parse_analysis};
pub use heuristic::HeuristicValidator;
pub use port::{ValidationPort, ValidationRequest};
pub use prompt::{CompletionBackend, PromptValidator};

/// Where the message is headed, as far as the validator cares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// "Slack", "Discord", ...
    pub app_name: String,
    /// "DM", "channel", "group" when known.
    pub channel_type: Option<String>,
}

impl ValidationContext {
    pub fn for_app(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            channel_type: None,
        }
    }

    pub fn describe(&self) -> String {
        let described = match &self.channel_type {
            Some(channel) => format!("{} {}", self.app_name, channel),
            None => self.app_name.clone(),
        };
        let described = described.trim();
        if described.is_empty() {
            "messaging app".to_string()
        } else {
            described.to_string()
        }
    }
}

/// Content check behind the send key. Implementations may be slow; the
/// port bounds them with a deadline and may drop the future at any await.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, content: &str, context: &ValidationContext) -> GuardResult<Analysis>;
}
