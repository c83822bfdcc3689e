use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::capture::{KeyCallback, KeyCapture, KeyEvent};
use super::{KeyCode, Modifiers};
use crate::coordinator::Event;
use crate::error::GuardResult;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "keys";

use crate::{log_debug, log_info};

#[derive(Debug, Clone)]
pub struct SuspenderConfig {
    pub trigger_keys: Vec<KeyCode>,
    /// Any of these held means the key passes untouched.
    pub pass_through: Modifiers,
}

impl Default for SuspenderConfig {
    fn default() -> Self {
        Self {
            trigger_keys: vec![KeyCode::RETURN, KeyCode::KEYPAD_ENTER],
            pass_through: Modifiers::PASS_THROUGH,
        }
    }
}

/// State shared with the OS callback. Atomics only: the callback never
/// blocks on a lock the coordinator might hold.
struct SuspenderShared {
    config: SuspenderConfig,
    armed: AtomicBool,
    epoch: AtomicU64,
    /// `epoch + 1` of the held key, `NOT_HOLDING` when nothing is held.
    held: AtomicU64,
    events: mpsc::UnboundedSender<Event>,
}

const NOT_HOLDING: u64 = 0;

impl SuspenderShared {
    fn on_key(&self, event: KeyEvent) -> bool {
        if event.synthetic || !self.config.trigger_keys.contains(&event.key) {
            return false;
        }
        if event.modifiers.intersects(self.config.pass_through) {
            return false;
        }
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }

        let epoch = self.epoch.load(Ordering::Acquire);
        if self
            .held
            .compare_exchange(NOT_HOLDING, epoch + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_debug!("{} pressed while another is held; dropping it", event.key);
            return true;
        }

        if self
            .events
            .send(Event::Trigger {
                key: event.key,
                epoch,
            })
            .is_err()
        {
            // Nobody left to resolve it.
            self.held.store(NOT_HOLDING, Ordering::Release);
            return false;
        }
        true
    }
}

/// Swallows the trigger key while armed and re-emits it on request.
///
/// Owned by the coordinator, which is the only caller of `arm`, `disarm`,
/// `release` and `discard`.
pub struct KeySuspender {
    shared: Arc<SuspenderShared>,
    capture: Arc<dyn KeyCapture>,
}

impl KeySuspender {
    /// Install the callback, initially disarmed.
    pub fn install(
        config: SuspenderConfig,
        capture: Arc<dyn KeyCapture>,
        events: mpsc::UnboundedSender<Event>,
    ) -> GuardResult<Self> {
        let shared = Arc::new(SuspenderShared {
            config,
            armed: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            held: AtomicU64::new(NOT_HOLDING),
            events,
        });

        let callback: KeyCallback = {
            let shared = Arc::clone(&shared);
            Arc::new(move |event| shared.on_key(event))
        };
        capture.install(callback)?;
        capture.set_enabled(false);
        log_info!("key capture installed for {:?}", shared.config.trigger_keys);

        Ok(Self { shared, capture })
    }

    /// The swallow/pass decision, exposed for callers that deliver events
    /// themselves.
    pub fn on_key(&self, event: KeyEvent) -> bool {
        self.shared.on_key(event)
    }

    pub fn arm(&self, epoch: u64) {
        self.shared.epoch.store(epoch, Ordering::Release);
        self.shared.armed.store(true, Ordering::Release);
        self.capture.set_enabled(true);
        log_debug!("armed (epoch {epoch})");
    }

    pub fn disarm(&self) {
        self.shared.armed.store(false, Ordering::Release);
        self.capture.set_enabled(false);
        log_debug!("disarmed");
    }

    pub fn is_holding(&self) -> bool {
        self.shared.held.load(Ordering::Acquire) != NOT_HOLDING
    }

    /// Re-emit the held key. Returns `false`, and posts nothing, when no key
    /// is held.
    pub fn release(&self, key: KeyCode) -> bool {
        if self.shared.held.swap(NOT_HOLDING, Ordering::AcqRel) == NOT_HOLDING {
            return false;
        }
        self.capture.post_key(key);
        log_debug!("released {key}");
        true
    }

    /// Forget the held key without re-emitting it.
    pub fn discard(&self) -> bool {
        let was_holding = self.shared.held.swap(NOT_HOLDING, Ordering::AcqRel) != NOT_HOLDING;
        if was_holding {
            log_debug!("discarded held key");
        }
        was_holding
    }

    /// Forget the held key only if it was swallowed under `epoch`. A key
    /// held for a newer session is left alone; its own trigger is still
    /// queued behind the stale one.
    pub fn discard_stale(&self, epoch: u64) -> bool {
        let cleared = self
            .shared
            .held
            .compare_exchange(epoch + 1, NOT_HOLDING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cleared {
            log_debug!("discarded key held under stale epoch {epoch}");
        }
        cleared
    }

    pub fn uninstall(&self) {
        self.disarm();
        self.discard();
        self.capture.uninstall();
        log_info!("key capture removed");
    }
}
