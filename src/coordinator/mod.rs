pub mod controller;
pub mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::approval::ApprovalSurface;
use crate::error::GuardResult;
use crate::field::{FieldAccessor, FieldIo};
use crate::focus::{FocusEvent, FocusSource, FocusTracker};
use crate::keys::{KeyCapture, KeyCode, KeySuspender, Modifiers, SuspenderConfig};
use crate::models::{Outcome, UserDecision};
use crate::settings::GuardSettings;
use crate::targets::TargetCatalog;
use crate::validation::{ValidationPort, Validator};

pub use controller::{Coordinator, CoordinatorHandle};
pub use state::{CoordinatorState, CoordinatorStatus, Counters, SessionSummary};

/// Everything that reaches the coordinator goes through one inbox, in order.
#[derive(Debug)]
pub enum Event {
    Focus(FocusEvent),
    /// A trigger key was swallowed while armed under `epoch`.
    Trigger { key: KeyCode, epoch: u64 },
    ValidationFinished { generation: u64, outcome: Outcome },
    UserDecided { generation: u64, choice: UserDecision },
    SetEnabled(bool),
    /// Replies with the status once every earlier event is handled.
    Sync(oneshot::Sender<CoordinatorStatus>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub enabled: bool,
    pub min_words: usize,
    pub validation_timeout: Duration,
    pub focus_poll_interval: Duration,
    pub suspender: SuspenderConfig,
    pub catalog: TargetCatalog,
}

impl CoordinatorConfig {
    pub fn from_settings(settings: &GuardSettings) -> Self {
        Self {
            enabled: settings.enabled,
            min_words: settings.min_words,
            validation_timeout: settings.validation_timeout(),
            focus_poll_interval: settings.focus_poll_interval(),
            suspender: SuspenderConfig {
                trigger_keys: settings.trigger_key_codes(),
                pass_through: Modifiers::PASS_THROUGH,
            },
            catalog: settings.catalog(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from_settings(&GuardSettings::default())
    }
}

/// How focus changes reach the coordinator.
pub enum FocusFeed {
    /// Poll this source on the configured interval.
    Poll(Arc<dyn FocusSource>),
    /// The caller pushes events through `CoordinatorHandle::focus_changed`
    /// (observer-style sources, replays, tests).
    Push,
}

/// The external primitives the coordinator drives.
pub struct Collaborators {
    pub focus: FocusFeed,
    pub key_capture: Arc<dyn KeyCapture>,
    pub field_io: Arc<dyn FieldIo>,
    pub validator: Arc<dyn Validator>,
    pub approval: Arc<dyn ApprovalSurface>,
}

/// Install the key callback, start focus tracking and spawn the coordinator.
///
/// Fails with `PermissionDenied` when either capability is missing; nothing
/// is left installed in that case.
pub fn start(config: CoordinatorConfig, collaborators: Collaborators) -> GuardResult<CoordinatorHandle> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let suspender = KeySuspender::install(
        config.suspender.clone(),
        collaborators.key_capture,
        events_tx.clone(),
    )?;

    let tracker = match collaborators.focus {
        FocusFeed::Poll(source) => {
            let mut tracker =
                FocusTracker::new(source, config.catalog.clone(), config.focus_poll_interval);
            if let Err(err) = tracker.start(events_tx.clone()) {
                suspender.uninstall();
                return Err(err);
            }
            Some(tracker)
        }
        FocusFeed::Push => None,
    };

    let port = ValidationPort::new(
        collaborators.validator,
        config.validation_timeout,
        events_tx.clone(),
    );
    let (status_tx, status_rx) = watch::channel(CoordinatorStatus {
        enabled: config.enabled,
        ..CoordinatorStatus::default()
    });

    let coordinator = Coordinator::new(
        config,
        suspender,
        FieldAccessor::new(collaborators.field_io),
        port,
        collaborators.approval,
        tracker,
        events_tx.clone(),
        status_tx,
    );
    tokio::spawn(coordinator.run(events_rx));

    Ok(CoordinatorHandle::new(events_tx, status_rx))
}
