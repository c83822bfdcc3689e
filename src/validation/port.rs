use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Event;
use crate::error::GuardError;
use crate::models::{FailureReason, Outcome};

use super::{ValidationContext, Validator};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "validation";

use crate::{log_debug, log_info};

/// One in-flight validation. Cancelling is idempotent and never waits for
/// the task; a cancelled task sends nothing back.
#[derive(Debug)]
pub struct ValidationRequest {
    pub generation: u64,
    pub deadline: Instant,
    cancel: CancellationToken,
}

impl ValidationRequest {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Runs validators on background tasks, bounded by a deadline, and reports
/// completions to the coordinator tagged with the request generation.
#[derive(Clone)]
pub struct ValidationPort {
    validator: Arc<dyn Validator>,
    timeout: Duration,
    events: mpsc::UnboundedSender<Event>,
}

impl ValidationPort {
    pub fn new(
        validator: Arc<dyn Validator>,
        timeout: Duration,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            validator,
            timeout,
            events,
        }
    }

    pub fn submit(&self, generation: u64, content: String, context_tag: String) -> ValidationRequest {
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + self.timeout;

        tokio::spawn(run_validation(
            Arc::clone(&self.validator),
            content,
            ValidationContext::for_app(context_tag),
            generation,
            deadline,
            cancel.clone(),
            self.events.clone(),
        ));

        ValidationRequest {
            generation,
            deadline,
            cancel,
        }
    }
}

async fn run_validation(
    validator: Arc<dyn Validator>,
    content: String,
    context: ValidationContext,
    generation: u64,
    deadline: Instant,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<Event>,
) {
    let started = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            log_debug!("request {generation} cancelled after {}ms", started.elapsed().as_millis());
            return;
        }
        result = tokio::time::timeout_at(deadline, validator.validate(&content, &context)) => {
            match result {
                Ok(Ok(analysis)) => Outcome::from_analysis(analysis),
                Ok(Err(err)) => Outcome::Failed { reason: failure_reason(err) },
                Err(_) => Outcome::Failed { reason: FailureReason::Timeout },
            }
        }
    };

    if cancel.is_cancelled() {
        return;
    }

    log_info!(
        "request {generation} finished in {}ms",
        started.elapsed().as_millis()
    );
    let _ = events.send(Event::ValidationFinished {
        generation,
        outcome,
    });
}

fn failure_reason(err: GuardError) -> FailureReason {
    match err {
        GuardError::ValidationFailed(reason) => reason,
        other => FailureReason::Validator(other.to_string()),
    }
}
