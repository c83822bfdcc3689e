use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::coordinator::Event;
use crate::error::{GuardError, GuardResult};

use super::{FocusSource, FocusTransitions, FocusedElement};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "focus";

use crate::{log_debug, log_info, log_warn};

/// An unresponsive app can stall accessibility queries for seconds.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

type FocusRead = JoinHandle<GuardResult<Option<FocusedElement>>>;

pub async fn focus_loop(
    source: Arc<dyn FocusSource>,
    mut transitions: FocusTransitions,
    interval: Duration,
    events: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // A read that outlived its timeout; awaited again instead of starting another.
    let mut in_flight: Option<FocusRead> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reading = match read_focus(&source, &mut in_flight).await {
                    Ok(reading) => reading,
                    Err(err) => {
                        log_debug!("focus unreadable, keeping last state: {err}");
                        continue;
                    }
                };

                for event in transitions.observe(reading.as_ref()) {
                    if events.send(Event::Focus(event)).is_err() {
                        log_info!("coordinator gone; focus loop exiting");
                        return;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("focus loop shutting down");
                break;
            }
        }
    }
}

async fn read_focus(
    source: &Arc<dyn FocusSource>,
    in_flight: &mut Option<FocusRead>,
) -> GuardResult<Option<FocusedElement>> {
    let mut read = match in_flight.take() {
        Some(pending) => pending,
        None => {
            let source = Arc::clone(source);
            tokio::task::spawn_blocking(move || source.focused())
        }
    };

    match tokio::time::timeout(READ_TIMEOUT, &mut read).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(GuardError::FocusUnavailable(format!(
            "focus read worker failed: {join_err}"
        ))),
        Err(_) => {
            log_warn!("focus read still pending after {}ms", READ_TIMEOUT.as_millis());
            *in_flight = Some(read);
            Err(GuardError::FocusUnavailable("timed out".into()))
        }
    }
}
