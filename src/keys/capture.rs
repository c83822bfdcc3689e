use std::sync::Arc;

use super::{KeyCode, Modifiers};
use crate::error::GuardResult;

/// A key-down seen by the capture primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub modifiers: Modifiers,
    /// Set by the primitive for events it posted itself through `post_key`
    /// (on macOS: tagged through the event source user-data field).
    pub synthetic: bool,
}

impl KeyEvent {
    pub fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            synthetic: false,
        }
    }
}

/// Returns `true` to swallow the event. Runs on the OS event thread and must
/// return in well under a millisecond.
pub type KeyCallback = Arc<dyn Fn(KeyEvent) -> bool + Send + Sync>;

/// System-wide key capture and re-emission.
pub trait KeyCapture: Send + Sync {
    /// Register the callback. Fails with `PermissionDenied` when input
    /// monitoring is not granted.
    fn install(&self, callback: KeyCallback) -> GuardResult<()>;

    /// Enable or disable delivery to the callback without tearing it down.
    fn set_enabled(&self, enabled: bool);

    /// Post a synthetic key-down/key-up pair.
    fn post_key(&self, key: KeyCode);

    /// Drop the callback registered by `install`.
    fn uninstall(&self);
}
