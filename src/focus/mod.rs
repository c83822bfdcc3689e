pub mod loop_worker;
pub mod tracker;
pub mod transitions;

use serde::{Deserialize, Serialize};

use crate::error::GuardResult;
use crate::models::{FocusRef, TargetId};

pub use tracker::FocusTracker;
pub use transitions::FocusTransitions;

/// What the accessibility layer reports about the focused element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusedElement {
    pub bundle_id: String,
    pub role: String,
    /// `None` when the element doesn't expose the attribute.
    #[serde(default)]
    pub editable: Option<bool>,
    pub focus: FocusRef,
}

/// Edge reported to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FocusEvent {
    #[serde(rename_all = "camelCase")]
    Entered {
        target: TargetId,
        focus: FocusRef,
        context_tag: String,
    },
    Left,
}

/// System-wide focus query.
pub trait FocusSource: Send + Sync {
    /// Fails with `PermissionDenied` when the accessibility capability is
    /// not granted.
    fn check_access(&self) -> GuardResult<()>;

    /// The focused element, `Ok(None)` when nothing is focused. Errors are
    /// transient and read as "no change".
    fn focused(&self) -> GuardResult<Option<FocusedElement>>;
}
