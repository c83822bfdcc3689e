use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::error::GuardError;
use crate::keys::{KeyCode, Modifiers};
use crate::models::{Decision, FocusRef, TargetId, UserDecision};
use crate::sim::{
    MemoryField, RecordingKeyCapture, ScriptedApproval, ScriptedFocusSource, ScriptedReply,
    ScriptedValidator,
};

const SLACK: &str = "com.tinyspeck.slackmacgap";
const LONG_ENOUGH: &str = "see you at the standup tomorrow";

struct Rig {
    handle: CoordinatorHandle,
    capture: Arc<RecordingKeyCapture>,
    field: Arc<MemoryField>,
    validator: Arc<ScriptedValidator>,
    approval: Arc<ScriptedApproval>,
}

impl Rig {
    fn start(validator: ScriptedValidator, approval: ScriptedApproval) -> Self {
        Self::start_with(CoordinatorConfig::default(), validator, approval)
    }

    fn start_with(
        config: CoordinatorConfig,
        validator: ScriptedValidator,
        approval: ScriptedApproval,
    ) -> Self {
        let capture = Arc::new(RecordingKeyCapture::new());
        let field = Arc::new(MemoryField::new());
        let validator = Arc::new(validator);
        let approval = Arc::new(approval);

        let handle = start(
            config,
            Collaborators {
                focus: FocusFeed::Push,
                key_capture: capture.clone(),
                field_io: field.clone(),
                validator: validator.clone(),
                approval: approval.clone(),
            },
        )
        .unwrap();

        Self {
            handle,
            capture,
            field,
            validator,
            approval,
        }
    }

    async fn enter(&self, focus: u64, text: &str) -> CoordinatorStatus {
        self.field.set_text(FocusRef(focus), text);
        self.handle
            .focus_changed(FocusEvent::Entered {
                target: TargetId::new(SLACK),
                focus: FocusRef(focus),
                context_tag: "Slack".into(),
            })
            .unwrap();
        self.handle.status().await.unwrap()
    }

    async fn leave(&self) -> CoordinatorStatus {
        self.handle.focus_changed(FocusEvent::Left).unwrap();
        self.handle.status().await.unwrap()
    }

    fn press(&self) -> bool {
        self.capture.press(KeyCode::RETURN, Modifiers::NONE)
    }

    /// Let background tasks run, then read the status.
    async fn settle(&self, wait: Duration) -> CoordinatorStatus {
        tokio::time::sleep(wait).await;
        self.handle.status().await.unwrap()
    }

    async fn settle_briefly(&self) -> CoordinatorStatus {
        self.settle(Duration::from_millis(10)).await
    }
}

#[tokio::test(start_paused = true)]
async fn clear_message_is_released_once() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    let status = rig.enter(1, LONG_ENOUGH).await;
    assert_eq!(status.state, CoordinatorState::MonitoringSession);

    assert!(rig.press());
    let status = rig.settle_briefly().await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(status.state, CoordinatorState::MonitoringSession);
    assert_eq!(status.last_decision, Some(Decision::Release));
    assert!(!status.pending);
    assert_eq!(rig.validator.seen(), vec![LONG_ENOUGH.to_string()]);
    assert!(rig.field.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn short_message_skips_validation() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    rig.enter(1, "ok thanks").await;

    assert!(rig.press());
    let status = rig.settle_briefly().await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(rig.validator.calls(), 0);
    assert_eq!(status.counters.skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn empty_field_is_never_validated_even_without_a_word_minimum() {
    let config = CoordinatorConfig {
        min_words: 0,
        ..CoordinatorConfig::default()
    };
    let rig = Rig::start_with(config, ScriptedValidator::approving(), ScriptedApproval::new());
    rig.enter(1, "  \n ").await;

    assert!(rig.press());
    let status = rig.settle_briefly().await;

    assert_eq!(rig.validator.calls(), 0);
    assert_eq!(status.counters.validations, 0);
    assert_eq!(status.counters.skipped, 1);
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);

    rig.field.set_text(FocusRef(1), "ok");
    assert!(rig.press());
    rig.settle_briefly().await;
    assert_eq!(rig.validator.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn keys_pass_untouched_outside_a_session() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());

    assert!(!rig.press());
    rig.enter(1, LONG_ENOUGH).await;
    rig.leave().await;
    assert!(!rig.press());

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN, KeyCode::RETURN]);
    assert_eq!(rig.validator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn shift_return_is_never_held() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    rig.enter(1, LONG_ENOUGH).await;

    assert!(!rig.capture.press(KeyCode::RETURN, Modifiers::SHIFT));
    rig.settle_briefly().await;
    assert_eq!(rig.validator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn accepted_suggestion_is_written_before_the_key() {
    let rig = Rig::start(
        ScriptedValidator::flagging(&["too wordy"], "See you at standup."),
        ScriptedApproval::new(),
    );
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    let status = rig.settle_briefly().await;
    assert_eq!(status.state, CoordinatorState::AwaitingUserDecision);
    assert!(status.awaiting_review);
    assert!(rig.capture.delivered().is_empty());

    let reviews = rig.approval.reviews();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].original_text, LONG_ENOUGH);
    assert_eq!(reviews[0].issues, vec!["too wordy".to_string()]);
    assert_eq!(reviews[0].suggestion.as_deref(), Some("See you at standup."));

    rig.approval
        .decide(UserDecision::UseSuggestion("See you at standup.".into()));
    let status = rig.settle_briefly().await;

    assert_eq!(rig.field.text(FocusRef(1)).as_deref(), Some("See you at standup."));
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(
        status.last_decision,
        Some(Decision::Replace("See you at standup.".into()))
    );
    assert_eq!(status.counters.replaced, 1);
    assert_eq!(status.state, CoordinatorState::MonitoringSession);
}

#[tokio::test(start_paused = true)]
async fn send_anyway_releases_the_original() {
    let rig = Rig::start(
        ScriptedValidator::flagging(&["too wordy"], "Shorter."),
        ScriptedApproval::always(UserDecision::SendAnyway),
    );
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    let status = rig.settle_briefly().await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(rig.field.text(FocusRef(1)).as_deref(), Some(LONG_ENOUGH));
    assert_eq!(status.last_decision, Some(Decision::Release));
    assert_eq!(status.counters.flagged, 1);
}

#[tokio::test(start_paused = true)]
async fn choosing_edit_drops_the_key_and_rearms() {
    let rig = Rig::start(
        ScriptedValidator::flagging(&["too wordy"], "Shorter."),
        ScriptedApproval::always(UserDecision::Edit),
    );
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    let status = rig.settle_briefly().await;
    assert!(rig.capture.delivered().is_empty());
    assert!(rig.capture.posted().is_empty());
    assert_eq!(status.last_decision, Some(Decision::Drop));
    assert_eq!(status.state, CoordinatorState::MonitoringSession);

    rig.validator.set_reply(ScriptedReply::Approve);
    assert!(rig.press());
    rig.settle_briefly().await;
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
}

#[tokio::test(start_paused = true)]
async fn rejected_write_falls_back_to_release() {
    let rig = Rig::start(
        ScriptedValidator::flagging(&["too wordy"], "Shorter."),
        ScriptedApproval::always(UserDecision::UseSuggestion("Shorter.".into())),
    );
    rig.enter(1, LONG_ENOUGH).await;
    rig.field.reject_writes(true);

    assert!(rig.press());
    let status = rig.settle_briefly().await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(rig.field.text(FocusRef(1)).as_deref(), Some(LONG_ENOUGH));
    assert_eq!(status.last_decision, Some(Decision::Release));
    assert_eq!(status.counters.write_fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn validation_timeout_releases() {
    let rig = Rig::start(
        ScriptedValidator::approving().with_delay(Duration::from_secs(10)),
        ScriptedApproval::new(),
    );
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    let status = rig.settle(Duration::from_secs(2)).await;
    assert_eq!(status.state, CoordinatorState::Validating);
    assert!(rig.capture.delivered().is_empty());

    let status = rig.settle(Duration::from_millis(1500)).await;
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(status.counters.failed, 1);
    assert_eq!(rig.validator.active(), 0);

    rig.settle(Duration::from_secs(10)).await;
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
}

#[tokio::test(start_paused = true)]
async fn validator_error_releases() {
    let rig = Rig::start(ScriptedValidator::erroring("rate limited"), ScriptedApproval::new());
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    let status = rig.settle_briefly().await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(status.counters.failed, 1);
    assert_eq!(status.last_decision, Some(Decision::Release));
}

#[tokio::test(start_paused = true)]
async fn unreadable_field_releases_without_validation() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    rig.enter(1, LONG_ENOUGH).await;
    rig.field.fail_reads(true);

    assert!(rig.press());
    rig.settle_briefly().await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(rig.validator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn leaving_during_validation_drops_the_key() {
    let rig = Rig::start(
        ScriptedValidator::approving().with_delay(Duration::from_secs(2)),
        ScriptedApproval::new(),
    );
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    rig.settle(Duration::from_millis(100)).await;
    assert_eq!(rig.validator.active(), 1);

    let status = rig.leave().await;
    assert_eq!(status.state, CoordinatorState::Idle);
    assert!(!status.pending);
    assert_eq!(status.in_flight, None);
    assert_eq!(status.counters.cancelled, 1);

    let status = rig.settle(Duration::from_secs(5)).await;
    assert!(rig.capture.delivered().is_empty());
    assert_eq!(rig.validator.active(), 0);
    assert_eq!(status.counters.stale_results, 0);
    assert_eq!(status.last_decision, Some(Decision::Drop));
}

#[tokio::test(start_paused = true)]
async fn leaving_during_review_dismisses_it() {
    let rig = Rig::start(
        ScriptedValidator::flagging(&["too wordy"], "Shorter."),
        ScriptedApproval::new(),
    );
    rig.enter(1, LONG_ENOUGH).await;
    assert!(rig.press());
    rig.settle_briefly().await;

    let status = rig.leave().await;
    assert!(!status.awaiting_review);
    rig.settle_briefly().await;
    assert_eq!(rig.approval.dismissed(), 1);

    rig.approval.decide(UserDecision::SendAnyway);
    rig.settle_briefly().await;
    assert!(rig.capture.delivered().is_empty());
}

#[tokio::test(start_paused = true)]
async fn switching_fields_starts_a_fresh_session() {
    let rig = Rig::start(
        ScriptedValidator::approving().with_delay(Duration::from_secs(2)),
        ScriptedApproval::new(),
    );
    let first = rig.enter(1, LONG_ENOUGH).await.session.unwrap();
    assert!(rig.press());
    rig.settle(Duration::from_millis(100)).await;

    let status = rig.enter(2, "a different draft entirely here").await;
    let second = status.session.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(status.state, CoordinatorState::MonitoringSession);
    assert_eq!(status.counters.sessions, 2);
    assert!(!status.pending);

    assert!(rig.press());
    rig.settle(Duration::from_secs(3)).await;
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(
        rig.validator.seen(),
        vec![
            LONG_ENOUGH.to_string(),
            "a different draft entirely here".to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reentering_the_same_field_keeps_the_session() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    let first = rig.enter(1, LONG_ENOUGH).await.session.unwrap();
    let again = rig.enter(1, LONG_ENOUGH).await;
    assert_eq!(again.session.unwrap().id, first.id);
    assert_eq!(again.counters.sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn second_trigger_while_pending_is_not_delivered_twice() {
    let rig = Rig::start(
        ScriptedValidator::approving().with_delay(Duration::from_millis(500)),
        ScriptedApproval::new(),
    );
    rig.enter(1, LONG_ENOUGH).await;

    assert!(rig.press());
    assert!(rig.capture.press(KeyCode::KEYPAD_ENTER, Modifiers::NONE));
    rig.settle(Duration::from_secs(1)).await;

    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);
    assert_eq!(rig.validator.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_events_are_ignored() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    rig.enter(1, LONG_ENOUGH).await;

    rig.handle
        .inject(Event::Trigger {
            key: KeyCode::RETURN,
            epoch: 99,
        })
        .unwrap();
    rig.handle
        .inject(Event::ValidationFinished {
            generation: 42,
            outcome: crate::models::Outcome::Clear,
        })
        .unwrap();
    rig.handle
        .inject(Event::UserDecided {
            generation: 42,
            choice: UserDecision::SendAnyway,
        })
        .unwrap();
    let status = rig.handle.status().await.unwrap();

    assert_eq!(status.counters.dropped, 1);
    assert_eq!(status.counters.stale_results, 1);
    assert_eq!(status.last_decision, None);
    assert!(rig.capture.delivered().is_empty());
    assert_eq!(status.state, CoordinatorState::MonitoringSession);
}

#[tokio::test(start_paused = true)]
async fn disabling_mid_validation_lets_the_message_through() {
    let rig = Rig::start(
        ScriptedValidator::approving().with_delay(Duration::from_secs(2)),
        ScriptedApproval::new(),
    );
    rig.enter(1, LONG_ENOUGH).await;
    assert!(rig.press());
    rig.settle(Duration::from_millis(100)).await;

    rig.handle.set_enabled(false).unwrap();
    let status = rig.handle.status().await.unwrap();
    assert!(!status.enabled);
    assert_eq!(status.in_flight, None);
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN]);

    assert!(!rig.press());
    rig.settle(Duration::from_secs(3)).await;
    assert_eq!(rig.capture.delivered(), vec![KeyCode::RETURN, KeyCode::RETURN]);
    assert_eq!(rig.validator.calls(), 1);

    rig.handle.set_enabled(true).unwrap();
    rig.handle.status().await.unwrap();
    assert!(rig.press());
}

#[tokio::test(start_paused = true)]
async fn status_is_published_on_the_watch_channel() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    let mut updates = rig.handle.subscribe();
    assert_eq!(updates.borrow().state, CoordinatorState::Idle);

    rig.enter(1, LONG_ENOUGH).await;
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow().state, CoordinatorState::MonitoringSession);
    assert_eq!(rig.handle.latest().counters.sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_removes_the_key_callback() {
    let rig = Rig::start(ScriptedValidator::approving(), ScriptedApproval::new());
    rig.enter(1, LONG_ENOUGH).await;
    assert!(rig.capture.is_enabled());

    rig.handle.shutdown().await.unwrap();
    assert!(!rig.capture.is_enabled());
    assert!(!rig.press());
    assert!(matches!(
        rig.handle.status().await,
        Err(GuardError::CoordinatorClosed)
    ));
}

#[tokio::test]
async fn missing_input_monitoring_refuses_to_start() {
    let err = start(
        CoordinatorConfig::default(),
        Collaborators {
            focus: FocusFeed::Push,
            key_capture: Arc::new(RecordingKeyCapture::denied()),
            field_io: Arc::new(MemoryField::new()),
            validator: Arc::new(ScriptedValidator::approving()),
            approval: Arc::new(ScriptedApproval::new()),
        },
    )
    .err()
    .expect("start should fail");
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn missing_accessibility_unwinds_key_capture() {
    let capture = Arc::new(RecordingKeyCapture::new());
    let err = start(
        CoordinatorConfig::default(),
        Collaborators {
            focus: FocusFeed::Poll(Arc::new(ScriptedFocusSource::denied())),
            key_capture: capture.clone(),
            field_io: Arc::new(MemoryField::new()),
            validator: Arc::new(ScriptedValidator::approving()),
            approval: Arc::new(ScriptedApproval::new()),
        },
    )
    .err()
    .expect("start should fail");

    assert!(matches!(
        err,
        GuardError::PermissionDenied {
            capability: crate::error::Capability::Accessibility
        }
    ));
    assert!(!capture.is_enabled());
    assert!(!capture.press(KeyCode::RETURN, Modifiers::NONE));
}
