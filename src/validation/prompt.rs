use async_trait::async_trait;

use crate::error::{GuardError, GuardResult};
use crate::models::{Analysis, FailureReason};

use super::{build_prompt, parse_analysis, ValidationContext, Validator};

/// Anything that turns a prompt into a completion (an HTTP LLM client, a
/// local model, a CLI wrapper).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Validator that asks a completion backend for the Hemingway verdict.
pub struct PromptValidator<B> {
    backend: B,
}

impl<B: CompletionBackend> PromptValidator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: CompletionBackend> Validator for PromptValidator<B> {
    async fn validate(&self, content: &str, context: &ValidationContext) -> GuardResult<Analysis> {
        if content.trim().is_empty() {
            return Ok(Analysis::approved_empty());
        }

        let prompt = build_prompt(content, context);
        let reply = self.backend.complete(&prompt).await.map_err(|err| {
            GuardError::ValidationFailed(FailureReason::Validator(format!("{err:#}")))
        })?;
        parse_analysis(&reply)
    }
}
