use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::KeyCode;

/// Identifies a monitored context: the owning application's bundle id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to the focused element, issued by the focus source and only
/// meaningful to the matching field primitive. Passed by value; nothing in the
/// core keeps a native reference alive between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FocusRef(pub u64);

/// One continuous period of focus on a monitored field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub target: TargetId,
    pub focus: FocusRef,
    /// Display name handed to the validator, e.g. "Slack".
    pub context_tag: String,
    pub started_at: DateTime<Utc>,
    /// Arming epoch; trigger events stamped with another epoch are stale.
    #[serde(skip)]
    pub epoch: u64,
}

impl Session {
    pub fn begin(target: TargetId, focus: FocusRef, context_tag: String, epoch: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            focus,
            context_tag,
            started_at: Utc::now(),
            epoch,
        }
    }

    pub fn is_same_field(&self, target: &TargetId, focus: FocusRef) -> bool {
        &self.target == target && self.focus == focus
    }
}

/// A swallowed trigger key waiting for a decision.
#[derive(Debug, Clone)]
pub struct PendingIntercept {
    pub session_id: Uuid,
    pub key: KeyCode,
    /// Field content at interception time. Never re-read during the cycle.
    pub snapshot_text: String,
    pub created_at: DateTime<Utc>,
}

impl PendingIntercept {
    pub fn new(session_id: Uuid, key: KeyCode) -> Self {
        Self {
            session_id,
            key,
            snapshot_text: String::new(),
            created_at: Utc::now(),
        }
    }
}
