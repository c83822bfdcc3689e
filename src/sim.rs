//! In-process stand-ins for the OS primitives and the validator. Used by the
//! replay runner and the tests; nothing here touches the real system.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::approval::{ApprovalSurface, Review};
use crate::error::{Capability, GuardError, GuardResult};
use crate::field::{word_count, FieldIo};
use crate::focus::{FocusSource, FocusedElement};
use crate::keys::{KeyCallback, KeyCapture, KeyCode, KeyEvent, Modifiers};
use crate::models::{Analysis, FailureReason, FocusRef, UserDecision};
use crate::validation::{ValidationContext, Validator};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Focus source whose answer is set by hand.
#[derive(Default)]
pub struct ScriptedFocusSource {
    denied: bool,
    failing: AtomicBool,
    current: Mutex<Option<FocusedElement>>,
}

impl ScriptedFocusSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn set(&self, element: Option<FocusedElement>) {
        *lock(&self.current) = element;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl FocusSource for ScriptedFocusSource {
    fn check_access(&self) -> GuardResult<()> {
        if self.denied {
            return Err(GuardError::PermissionDenied {
                capability: Capability::Accessibility,
            });
        }
        Ok(())
    }

    fn focused(&self) -> GuardResult<Option<FocusedElement>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GuardError::FocusUnavailable("scripted failure".into()));
        }
        Ok(lock(&self.current).clone())
    }
}

/// Key capture that records what the focused app would have received.
///
/// `press` plays a physical key-down through the installed callback.
/// With loopback on, keys posted by `post_key` are fed back through the
/// callback marked synthetic, the way a real event tap sees its own posts.
#[derive(Default)]
pub struct RecordingKeyCapture {
    denied: bool,
    enabled: AtomicBool,
    loopback: AtomicBool,
    callback: Mutex<Option<KeyCallback>>,
    posted: Mutex<Vec<KeyCode>>,
    delivered: Mutex<Vec<KeyCode>>,
    synthetic_swallowed: AtomicUsize,
}

impl RecordingKeyCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_loopback(&self, loopback: bool) {
        self.loopback.store(loopback, Ordering::SeqCst);
    }

    fn active_callback(&self) -> Option<KeyCallback> {
        if !self.is_enabled() {
            return None;
        }
        lock(&self.callback).clone()
    }

    /// Returns `true` when the key was swallowed.
    pub fn press(&self, key: KeyCode, modifiers: Modifiers) -> bool {
        let swallowed = match self.active_callback() {
            Some(callback) => callback(KeyEvent::new(key, modifiers)),
            None => false,
        };
        if !swallowed {
            lock(&self.delivered).push(key);
        }
        swallowed
    }

    /// Keys re-emitted through `post_key`.
    pub fn posted(&self) -> Vec<KeyCode> {
        lock(&self.posted).clone()
    }

    /// Keys that reached the focused app, physical or posted.
    pub fn delivered(&self) -> Vec<KeyCode> {
        lock(&self.delivered).clone()
    }

    pub fn synthetic_swallowed(&self) -> usize {
        self.synthetic_swallowed.load(Ordering::SeqCst)
    }
}

impl KeyCapture for RecordingKeyCapture {
    fn install(&self, callback: KeyCallback) -> GuardResult<()> {
        if self.denied {
            return Err(GuardError::PermissionDenied {
                capability: Capability::InputMonitoring,
            });
        }
        *lock(&self.callback) = Some(callback);
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn post_key(&self, key: KeyCode) {
        lock(&self.posted).push(key);

        let callback = if self.loopback.load(Ordering::SeqCst) {
            self.active_callback()
        } else {
            None
        };
        let swallowed = callback.is_some_and(|callback| {
            callback(KeyEvent {
                key,
                modifiers: Modifiers::NONE,
                synthetic: true,
            })
        });

        if swallowed {
            self.synthetic_swallowed.fetch_add(1, Ordering::SeqCst);
        } else {
            lock(&self.delivered).push(key);
        }
    }

    fn uninstall(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        lock(&self.callback).take();
    }
}

/// Text fields keyed by focus handle.
#[derive(Default)]
pub struct MemoryField {
    texts: Mutex<HashMap<FocusRef, String>>,
    writes: Mutex<Vec<(FocusRef, String)>>,
    reject_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&self, focus: FocusRef, text: &str) {
        lock(&self.texts).insert(focus, text.to_string());
    }

    pub fn text(&self, focus: FocusRef) -> Option<String> {
        lock(&self.texts).get(&focus).cloned()
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(FocusRef, String)> {
        lock(&self.writes).clone()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl FieldIo for MemoryField {
    fn read(&self, focus: FocusRef) -> GuardResult<String> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GuardError::FieldReadFailed("element went away".into()));
        }
        lock(&self.texts)
            .get(&focus)
            .cloned()
            .ok_or_else(|| GuardError::FieldReadFailed(format!("no field behind {focus:?}")))
    }

    fn write(&self, focus: FocusRef, text: &str) -> GuardResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(GuardError::FieldWriteFailed("value is not settable".into()));
        }
        lock(&self.texts).insert(focus, text.to_string());
        lock(&self.writes).push((focus, text.to_string()));
        Ok(())
    }
}

/// What a `ScriptedValidator` answers.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Approve,
    Flag {
        issues: Vec<String>,
        suggestion: String,
    },
    Error(String),
}

/// Validator with a fixed answer and an optional delay. Tracks how many
/// calls are running at once so tests can check that cancelled work stops.
pub struct ScriptedValidator {
    reply: Mutex<ScriptedReply>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub fn new(reply: ScriptedReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn approving() -> Self {
        Self::new(ScriptedReply::Approve)
    }

    pub fn flagging(issues: &[&str], suggestion: &str) -> Self {
        Self::new(ScriptedReply::Flag {
            issues: issues.iter().map(|issue| issue.to_string()).collect(),
            suggestion: suggestion.to_string(),
        })
    }

    pub fn erroring(message: &str) -> Self {
        Self::new(ScriptedReply::Error(message.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_reply(&self, reply: ScriptedReply) {
        *lock(&self.reply) = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Content of every call, in order.
    pub fn seen(&self) -> Vec<String> {
        lock(&self.seen).clone()
    }
}

/// Decrements the active count even when the future is dropped mid-await.
struct ActiveCall<'a>(&'a AtomicUsize);

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    async fn validate(&self, content: &str, _context: &ValidationContext) -> GuardResult<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(content.to_string());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _active = ActiveCall(&self.active);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let words = word_count(content) as u32;
        let reply = lock(&self.reply).clone();
        match reply {
            ScriptedReply::Approve => Ok(Analysis {
                approved: true,
                word_count: words,
                ..Analysis::default()
            }),
            ScriptedReply::Flag { issues, suggestion } => Ok(Analysis {
                approved: false,
                word_count: words,
                issues,
                suggestion,
                ..Analysis::default()
            }),
            ScriptedReply::Error(message) => Err(GuardError::ValidationFailed(
                FailureReason::Validator(message),
            )),
        }
    }
}

/// Approval surface that answers from a queue, or waits until `decide` is
/// called.
#[derive(Default)]
pub struct ScriptedApproval {
    queued: Mutex<VecDeque<UserDecision>>,
    fallback: Option<UserDecision>,
    think_time: Duration,
    ready: Notify,
    reviews: Mutex<Vec<Review>>,
    dismissed: AtomicUsize,
}

impl ScriptedApproval {
    /// Waits for `decide` on every review.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every review with `choice`.
    pub fn always(choice: UserDecision) -> Self {
        Self {
            fallback: Some(choice),
            ..Self::default()
        }
    }

    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn decide(&self, choice: UserDecision) {
        lock(&self.queued).push_back(choice);
        self.ready.notify_one();
    }

    pub fn reviews(&self) -> Vec<Review> {
        lock(&self.reviews).clone()
    }

    pub fn dismissed(&self) -> usize {
        self.dismissed.load(Ordering::SeqCst)
    }

    fn next_choice(&self) -> Option<UserDecision> {
        lock(&self.queued)
            .pop_front()
            .or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ApprovalSurface for ScriptedApproval {
    async fn present(&self, review: Review) -> UserDecision {
        lock(&self.reviews).push(review);

        let choice = loop {
            if let Some(choice) = self.next_choice() {
                break choice;
            }
            self.ready.notified().await;
        };

        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }
        choice
    }

    fn dismiss(&self) {
        self.dismissed.fetch_add(1, Ordering::SeqCst);
    }
}
