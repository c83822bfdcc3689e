use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalSurface, Review};
use crate::error::{GuardError, GuardResult};
use crate::field::{word_count, FieldAccessor};
use crate::focus::{FocusEvent, FocusTracker};
use crate::keys::{KeyCode, KeySuspender};
use crate::models::{
    Decision, FocusRef, Outcome, PendingIntercept, Session, TargetId, UserDecision,
};
use crate::validation::{ValidationPort, ValidationRequest};

use super::state::{CoordinatorState, CoordinatorStatus, Counters, SessionSummary};
use super::{CoordinatorConfig, Event};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "coordinator";

use crate::{log_debug, log_error, log_info, log_warn};

/// An approval prompt that is on screen.
struct OpenReview {
    generation: u64,
    cancel: CancellationToken,
}

/// The interception state machine. Runs as a single task and owns every
/// piece of mutable state; the rest of the system talks to it through
/// `Event`s.
pub struct Coordinator {
    config: CoordinatorConfig,
    suspender: KeySuspender,
    field: FieldAccessor,
    port: ValidationPort,
    approval: Arc<dyn ApprovalSurface>,
    tracker: Option<FocusTracker>,
    events: mpsc::UnboundedSender<Event>,
    status_tx: watch::Sender<CoordinatorStatus>,

    state: CoordinatorState,
    enabled: bool,
    session: Option<Session>,
    pending: Option<PendingIntercept>,
    request: Option<ValidationRequest>,
    review: Option<OpenReview>,
    last_epoch: u64,
    last_generation: u64,
    last_decision: Option<Decision>,
    counters: Counters,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: CoordinatorConfig,
        suspender: KeySuspender,
        field: FieldAccessor,
        port: ValidationPort,
        approval: Arc<dyn ApprovalSurface>,
        tracker: Option<FocusTracker>,
        events: mpsc::UnboundedSender<Event>,
        status_tx: watch::Sender<CoordinatorStatus>,
    ) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            suspender,
            field,
            port,
            approval,
            tracker,
            events,
            status_tx,
            state: CoordinatorState::Idle,
            enabled,
            session: None,
            pending: None,
            request: None,
            review: None,
            last_epoch: 0,
            last_generation: 0,
            last_decision: None,
            counters: Counters::default(),
        }
    }

    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Event>) {
        log_info!("coordinator running (enabled: {})", self.enabled);

        while let Some(event) = inbox.recv().await {
            match event {
                Event::Sync(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Event::Shutdown(ack) => {
                    self.shutdown().await;
                    self.publish();
                    let _ = ack.send(());
                    return;
                }
                other => {
                    self.handle(other);
                    self.publish();
                }
            }
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Focus(FocusEvent::Entered {
                target,
                focus,
                context_tag,
            }) => self.on_focus_entered(target, focus, context_tag),
            Event::Focus(FocusEvent::Left) => self.teardown("focus left the field"),
            Event::Trigger { key, epoch } => self.on_trigger(key, epoch),
            Event::ValidationFinished { generation, outcome } => {
                self.on_validation_finished(generation, outcome)
            }
            Event::UserDecided { generation, choice } => self.on_user_decided(generation, choice),
            Event::SetEnabled(enabled) => self.on_set_enabled(enabled),
            Event::Sync(_) | Event::Shutdown(_) => {}
        }
    }

    fn on_focus_entered(&mut self, target: TargetId, focus: FocusRef, context_tag: String) {
        if let Some(session) = &self.session {
            if session.is_same_field(&target, focus) {
                return;
            }
            self.teardown("focus moved to another field");
        }

        self.last_epoch += 1;
        let session = Session::begin(target, focus, context_tag, self.last_epoch);
        log_info!("session {} started in {}", session.id, session.context_tag);
        if self.enabled {
            self.suspender.arm(session.epoch);
        }
        self.session = Some(session);
        self.counters.sessions += 1;
        self.state = CoordinatorState::MonitoringSession;
    }

    /// End the session. An open intercept is dropped: the key must not be
    /// re-emitted into whatever has focus now.
    fn teardown(&mut self, reason: &str) {
        self.suspender.disarm();
        self.abandon_intercept(reason);
        self.suspender.discard();

        if let Some(session) = self.session.take() {
            log_info!("session {} ended: {reason}", session.id);
        }
        self.state = CoordinatorState::Idle;
    }

    /// Cancel validation and review for the open intercept, then drop it.
    fn abandon_intercept(&mut self, reason: &str) {
        self.cancel_background_work();
        if self.pending.is_some() {
            log_info!("dropping held key: {reason}");
            self.resolve(Decision::Drop);
        }
    }

    fn cancel_background_work(&mut self) {
        if let Some(request) = self.request.take() {
            request.cancel();
            self.counters.cancelled += 1;
            log_debug!("cancelled validation {}", request.generation);
        }
        if let Some(review) = self.review.take() {
            review.cancel.cancel();
        }
    }

    fn on_trigger(&mut self, key: KeyCode, epoch: u64) {
        let Some(session) = &self.session else {
            log_debug!("{key} arrived with no session; dropping");
            self.suspender.discard_stale(epoch);
            self.counters.dropped += 1;
            return;
        };

        if session.epoch != epoch {
            log_debug!("{key} belongs to epoch {epoch}, session is {}; dropping", session.epoch);
            self.suspender.discard_stale(epoch);
            self.counters.dropped += 1;
            return;
        }

        if self.pending.is_some() {
            log_warn!("{key} arrived while an intercept is open; ignoring");
            return;
        }

        if !self.enabled {
            // Disabled between the press and now.
            self.suspender.release(key);
            self.counters.released += 1;
            return;
        }

        self.state = CoordinatorState::Suspended;
        self.counters.intercepts += 1;
        let session_id = session.id;
        let focus = session.focus;
        let context_tag = session.context_tag.clone();

        let mut pending = PendingIntercept::new(session_id, key);
        match self.field.read_text(focus) {
            Ok(text) => pending.snapshot_text = text,
            Err(err) => {
                log_warn!("{err}; letting the message through");
                self.pending = Some(pending);
                self.counters.skipped += 1;
                self.resolve(Decision::Release);
                return;
            }
        }

        let words = word_count(&pending.snapshot_text);
        let snapshot = pending.snapshot_text.clone();
        self.pending = Some(pending);

        if words == 0 || words < self.config.min_words {
            log_debug!("{words} words is below {}; releasing", self.config.min_words.max(1));
            self.counters.skipped += 1;
            self.resolve(Decision::Release);
            return;
        }

        self.last_generation += 1;
        let request = self.port.submit(self.last_generation, snapshot, context_tag);
        log_info!(
            "validating {words} words (request {}, deadline in {}ms)",
            request.generation,
            request
                .deadline
                .saturating_duration_since(tokio::time::Instant::now())
                .as_millis()
        );
        self.request = Some(request);
        self.counters.validations += 1;
        self.state = CoordinatorState::Validating;
    }

    fn on_validation_finished(&mut self, generation: u64, outcome: Outcome) {
        let current = self.request.as_ref().map(|r| r.generation);
        if current != Some(generation) {
            log_debug!("discarding stale result for request {generation} (current {current:?})");
            self.counters.stale_results += 1;
            return;
        }
        self.request = None;

        match outcome.decision() {
            Decision::Hold => self.present(generation, outcome),
            decision => {
                if let Outcome::Failed { reason } = &outcome {
                    log_warn!("{}; sending anyway", GuardError::ValidationFailed(reason.clone()));
                    self.counters.failed += 1;
                }
                self.resolve(decision);
            }
        }
    }

    fn present(&mut self, generation: u64, outcome: Outcome) {
        let Outcome::Flagged {
            issues,
            suggested_replacement,
            analysis,
        } = outcome
        else {
            self.resolve(Decision::Release);
            return;
        };
        let (Some(pending), Some(session)) = (&self.pending, &self.session) else {
            return;
        };

        log_info!("message flagged: {}", issues.join(", "));
        let review = Review {
            context_tag: session.context_tag.clone(),
            issues,
            suggestion: suggested_replacement,
            original_text: pending.snapshot_text.clone(),
            analysis,
        };

        let cancel = CancellationToken::new();
        tokio::spawn(await_user_choice(
            Arc::clone(&self.approval),
            review,
            generation,
            cancel.clone(),
            self.events.clone(),
        ));

        self.review = Some(OpenReview { generation, cancel });
        self.counters.flagged += 1;
        self.state = CoordinatorState::AwaitingUserDecision;
    }

    fn on_user_decided(&mut self, generation: u64, choice: UserDecision) {
        match &self.review {
            Some(review) if review.generation == generation => {}
            _ => {
                log_debug!("ignoring choice for closed review {generation}");
                return;
            }
        }
        self.review = None;
        log_info!("user chose {choice:?}");
        self.resolve(Decision::from(choice));
    }

    fn on_set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        log_info!("guard {}", if enabled { "enabled" } else { "disabled" });

        if enabled {
            if let Some(session) = &self.session {
                self.suspender.arm(session.epoch);
            }
            return;
        }

        self.suspender.disarm();
        self.cancel_background_work();
        if self.pending.is_some() {
            self.resolve(Decision::Release);
        }
    }

    /// Apply a decision to the open intercept: optional write, then release
    /// or drop the held key.
    fn resolve(&mut self, decision: Decision) {
        self.state = CoordinatorState::Resolving;
        let Some(pending) = self.pending.take() else {
            self.state = self.resting_state();
            return;
        };

        let applied = match decision {
            Decision::Release => {
                self.suspender.release(pending.key);
                self.counters.released += 1;
                Decision::Release
            }
            Decision::Replace(text) => self.replace_and_release(&pending, text),
            Decision::Drop => {
                self.suspender.discard();
                self.counters.dropped += 1;
                Decision::Drop
            }
            Decision::Hold => {
                log_error!("hold is not a resolution; releasing");
                self.suspender.release(pending.key);
                self.counters.released += 1;
                Decision::Release
            }
        };

        log_debug!("resolved intercept from session {}: {}", pending.session_id, applied.label());
        self.last_decision = Some(applied);
        self.state = self.resting_state();
    }

    fn replace_and_release(&mut self, pending: &PendingIntercept, text: String) -> Decision {
        let written = match &self.session {
            Some(session) => self.field.write_text(session.focus, &text),
            None => Err(GuardError::FieldWriteFailed("no focused field".into())),
        };

        self.suspender.release(pending.key);
        match written {
            Ok(()) => {
                self.counters.replaced += 1;
                Decision::Replace(text)
            }
            Err(err) => {
                log_warn!("{err}; sending the original text");
                self.counters.write_fallbacks += 1;
                self.counters.released += 1;
                Decision::Release
            }
        }
    }

    fn resting_state(&self) -> CoordinatorState {
        if self.session.is_some() {
            CoordinatorState::MonitoringSession
        } else {
            CoordinatorState::Idle
        }
    }

    async fn shutdown(&mut self) {
        self.teardown("shutting down");
        if let Some(mut tracker) = self.tracker.take() {
            tracker.stop().await;
        }
        self.suspender.uninstall();
        log_info!("coordinator stopped");
    }

    fn snapshot(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            state: self.state,
            enabled: self.enabled,
            session: self.session.as_ref().map(SessionSummary::from),
            pending: self.pending.is_some(),
            in_flight: self.request.as_ref().map(|r| r.generation),
            awaiting_review: self.review.is_some(),
            last_decision: self.last_decision.clone(),
            counters: self.counters,
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.snapshot());
    }
}

async fn await_user_choice(
    approval: Arc<dyn ApprovalSurface>,
    review: Review,
    generation: u64,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<Event>,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => approval.dismiss(),
        choice = approval.present(review) => {
            let _ = events.send(Event::UserDecided { generation, choice });
        }
    }
}

/// Cloneable front door to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<Event>,
    status: watch::Receiver<CoordinatorStatus>,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<Event>,
        status: watch::Receiver<CoordinatorStatus>,
    ) -> Self {
        Self { events, status }
    }

    fn send(&self, event: Event) -> GuardResult<()> {
        self.events
            .send(event)
            .map_err(|_| GuardError::CoordinatorClosed)
    }

    /// Feed a focus change when running with `FocusFeed::Push`.
    pub fn focus_changed(&self, event: FocusEvent) -> GuardResult<()> {
        self.send(Event::Focus(event))
    }

    pub fn set_enabled(&self, enabled: bool) -> GuardResult<()> {
        self.send(Event::SetEnabled(enabled))
    }

    /// Status after every event sent before this call has been handled.
    pub async fn status(&self) -> GuardResult<CoordinatorStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Sync(tx))?;
        rx.await.map_err(|_| GuardError::CoordinatorClosed)
    }

    /// Latest published status, without waiting.
    pub fn latest(&self) -> CoordinatorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status.clone()
    }

    pub async fn shutdown(&self) -> GuardResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Shutdown(tx))?;
        rx.await.map_err(|_| GuardError::CoordinatorClosed)
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: Event) -> GuardResult<()> {
        self.send(event)
    }
}
