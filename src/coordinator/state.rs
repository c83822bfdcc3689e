use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Decision, Session, TargetId};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorState {
    #[default]
    Idle,
    MonitoringSession,
    /// Key held, snapshot being read. Never observable between events.
    Suspended,
    Validating,
    AwaitingUserDecision,
    /// Applying a decision. Never observable between events.
    Resolving,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub target: TargetId,
    pub context_tag: String,
    pub started_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            target: session.target.clone(),
            context_tag: session.context_tag.clone(),
            started_at: session.started_at,
        }
    }
}

/// Running totals since the coordinator started.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub sessions: u64,
    pub intercepts: u64,
    /// Released without validation: too short or unreadable.
    pub skipped: u64,
    pub validations: u64,
    pub flagged: u64,
    pub failed: u64,
    pub released: u64,
    pub replaced: u64,
    /// Replacements that fell back to a plain release.
    pub write_fallbacks: u64,
    pub dropped: u64,
    pub cancelled: u64,
    pub stale_results: u64,
}

/// Published on the watch channel after every event.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub enabled: bool,
    pub session: Option<SessionSummary>,
    pub pending: bool,
    /// Generation of the validation in flight.
    pub in_flight: Option<u64>,
    pub awaiting_review: bool,
    pub last_decision: Option<Decision>,
    pub counters: Counters,
}
