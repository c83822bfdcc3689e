pub mod approval;
pub mod coordinator;
pub mod error;
pub mod field;
pub mod focus;
pub mod keys;
pub mod models;
pub mod replay;
pub mod settings;
pub mod sim;
pub mod targets;
pub mod utils;
pub mod validation;

pub use approval::{ApprovalSurface, Review};
pub use coordinator::{
    start, Collaborators, CoordinatorConfig, CoordinatorHandle, CoordinatorState,
    CoordinatorStatus, FocusFeed,
};
pub use error::{Capability, GuardError, GuardResult};
pub use field::FieldIo;
pub use focus::{FocusEvent, FocusSource, FocusedElement};
pub use keys::{KeyCapture, KeyCode, KeyEvent, Modifiers};
pub use models::{Decision, FocusRef, Outcome, TargetId, UserDecision};
pub use settings::{GuardSettings, SettingsStore};
pub use validation::{HeuristicValidator, PromptValidator, Validator};
