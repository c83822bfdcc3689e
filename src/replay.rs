//! Scripted scenarios driven through a real coordinator with the `sim`
//! primitives. A scenario is a JSON file:
//!
//! ```json
//! {
//!   "validator": { "kind": "flag", "issues": ["too long"], "suggestion": "Short.", "delayMs": 400 },
//!   "approval": { "choice": "useSuggestion", "text": "Short." },
//!   "steps": [
//!     { "atMs": 0,   "action": "focus", "bundleId": "com.tinyspeck.slackmacgap", "role": "AXTextArea", "focus": 1, "text": "see you at the standup" },
//!     { "atMs": 50,  "action": "press" },
//!     { "atMs": 900, "action": "blur" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::coordinator::{self, Collaborators, CoordinatorConfig, CoordinatorStatus, FocusFeed};
use crate::focus::{FocusTransitions, FocusedElement};
use crate::keys::{KeyCode, Modifiers};
use crate::models::{Decision, FocusRef, UserDecision};
use crate::settings::GuardSettings;
use crate::sim::{
    MemoryField, RecordingKeyCapture, ScriptedApproval, ScriptedReply, ScriptedValidator,
};
use crate::validation::{HeuristicValidator, Validator};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "replay";

use crate::log_info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub validator: ValidatorSpec,
    /// What the user picks when a message is flagged.
    #[serde(default = "default_choice")]
    pub approval: UserDecision,
    #[serde(default)]
    pub approval_delay_ms: u64,
    /// Extra time after the last step before the report is taken. Defaults
    /// to the validation timeout plus half a second.
    #[serde(default)]
    pub settle_ms: Option<u64>,
    pub steps: Vec<Step>,
}

fn default_choice() -> UserDecision {
    UserDecision::SendAnyway
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidatorSpec {
    /// The bundled length/passive-voice check.
    #[default]
    Heuristic,
    #[serde(rename_all = "camelCase")]
    Approve {
        #[serde(default)]
        delay_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Flag {
        #[serde(default)]
        issues: Vec<String>,
        #[serde(default)]
        suggestion: String,
        #[serde(default)]
        delay_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl ValidatorSpec {
    fn build(&self, settings: &GuardSettings) -> Arc<dyn Validator> {
        let (reply, delay_ms) = match self {
            ValidatorSpec::Heuristic => {
                return Arc::new(HeuristicValidator::new(settings.max_words));
            }
            ValidatorSpec::Approve { delay_ms } => (ScriptedReply::Approve, *delay_ms),
            ValidatorSpec::Flag {
                issues,
                suggestion,
                delay_ms,
            } => (
                ScriptedReply::Flag {
                    issues: issues.clone(),
                    suggestion: suggestion.clone(),
                },
                *delay_ms,
            ),
            ValidatorSpec::Error { message, delay_ms } => {
                (ScriptedReply::Error(message.clone()), *delay_ms)
            }
        };
        Arc::new(ScriptedValidator::new(reply).with_delay(Duration::from_millis(delay_ms)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Offset from the start of the run.
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// The focus source now reports this element.
    #[serde(rename_all = "camelCase")]
    Focus {
        bundle_id: String,
        #[serde(default = "default_role")]
        role: String,
        #[serde(default)]
        editable: Option<bool>,
        focus: u64,
        /// Field content, set before the focus change is reported.
        #[serde(default)]
        text: Option<String>,
    },
    /// Nothing is focused.
    Blur,
    /// Replace the text of a field.
    Type { focus: u64, text: String },
    /// Physical key-down.
    #[serde(rename_all = "camelCase")]
    Press {
        #[serde(default = "default_key")]
        key: u16,
        #[serde(default)]
        shift: bool,
    },
    SetEnabled { enabled: bool },
}

fn default_role() -> String {
    "AXTextArea".to_string()
}

fn default_key() -> u16 {
    KeyCode::RETURN.0
}

impl Action {
    fn label(&self) -> String {
        match self {
            Action::Focus { bundle_id, focus, .. } => format!("focus {bundle_id}#{focus}"),
            Action::Blur => "blur".to_string(),
            Action::Type { focus, text } => {
                format!("type {} words into #{focus}", text.split_whitespace().count())
            }
            Action::Press { key, shift } => {
                if *shift {
                    format!("press shift+{key}")
                } else {
                    format!("press {key}")
                }
            }
            Action::SetEnabled { enabled } => format!("set enabled {enabled}"),
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub at_ms: u64,
    pub action: String,
    /// Only for key presses: whether the key was held back.
    pub swallowed: Option<bool>,
    pub status: CoordinatorStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub steps: Vec<StepRecord>,
    /// Keys that reached the focused app, in order.
    pub delivered: Vec<KeyCode>,
    /// Replacement text written into fields, in order.
    pub writes: Vec<(FocusRef, String)>,
    pub final_status: CoordinatorStatus,
}

impl ReplayReport {
    pub fn last_decision(&self) -> Option<&Decision> {
        self.final_status.last_decision.as_ref()
    }
}

/// Run `scenario` against a fresh coordinator built from `settings`.
pub async fn run_scenario(scenario: &Scenario, settings: &GuardSettings) -> Result<ReplayReport> {
    let capture = Arc::new(RecordingKeyCapture::new());
    let field = Arc::new(MemoryField::new());
    let approval = Arc::new(
        ScriptedApproval::always(scenario.approval.clone())
            .with_think_time(Duration::from_millis(scenario.approval_delay_ms)),
    );

    let config = CoordinatorConfig::from_settings(settings);
    let mut transitions = FocusTransitions::new(config.catalog.clone());
    let handle = coordinator::start(
        config,
        Collaborators {
            focus: FocusFeed::Push,
            key_capture: capture.clone(),
            field_io: field.clone(),
            validator: scenario.validator.build(settings),
            approval,
        },
    )
    .context("Failed to start the coordinator")?;

    log_info!("replaying {} steps", scenario.steps.len());
    let started = Instant::now();
    let mut records = Vec::with_capacity(scenario.steps.len());

    for step in &scenario.steps {
        tokio::time::sleep_until(started + Duration::from_millis(step.at_ms)).await;

        let mut swallowed = None;
        match &step.action {
            Action::Focus {
                bundle_id,
                role,
                editable,
                focus,
                text,
            } => {
                if let Some(text) = text {
                    field.set_text(FocusRef(*focus), text);
                }
                let element = FocusedElement {
                    bundle_id: bundle_id.clone(),
                    role: role.clone(),
                    editable: *editable,
                    focus: FocusRef(*focus),
                };
                for event in transitions.observe(Some(&element)) {
                    handle.focus_changed(event)?;
                }
            }
            Action::Blur => {
                for event in transitions.observe(None) {
                    handle.focus_changed(event)?;
                }
            }
            Action::Type { focus, text } => field.set_text(FocusRef(*focus), text),
            Action::Press { key, shift } => {
                let modifiers = if *shift {
                    Modifiers::SHIFT
                } else {
                    Modifiers::NONE
                };
                swallowed = Some(capture.press(KeyCode(*key), modifiers));
            }
            Action::SetEnabled { enabled } => handle.set_enabled(*enabled)?,
        }

        let status = handle.status().await?;
        log_info!("{}ms {} -> {:?}", step.at_ms, step.action.label(), status.state);
        records.push(StepRecord {
            at_ms: step.at_ms,
            action: step.action.label(),
            swallowed,
            status,
        });
    }

    let settle = scenario
        .settle_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.validation_timeout() + Duration::from_millis(500));
    tokio::time::sleep(settle).await;

    let final_status = handle.status().await?;
    handle.shutdown().await?;

    Ok(ReplayReport {
        steps: records,
        delivered: capture.delivered(),
        writes: field.writes(),
        final_status,
    })
}
