mod analysis;
mod outcome;
mod session;

pub use analysis::Analysis;
pub use outcome::{Decision, FailureReason, Outcome, UserDecision};
pub use session::{FocusRef, PendingIntercept, Session, TargetId};
