use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Event;
use crate::error::GuardResult;
use crate::targets::TargetCatalog;

use super::loop_worker::focus_loop;
use super::{FocusSource, FocusTransitions};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "focus";

use crate::{log_error, log_info};

/// Owns the focus polling task.
pub struct FocusTracker {
    source: Arc<dyn FocusSource>,
    catalog: TargetCatalog,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl FocusTracker {
    pub fn new(source: Arc<dyn FocusSource>, catalog: TargetCatalog, interval: Duration) -> Self {
        Self {
            source,
            catalog,
            interval,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Checks the accessibility capability first and refuses to start
    /// without it. Starting twice is a no-op.
    pub fn start(&mut self, events: mpsc::UnboundedSender<Event>) -> GuardResult<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        self.source.check_access()?;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(focus_loop(
            Arc::clone(&self.source),
            FocusTransitions::new(self.catalog.clone()),
            self.interval,
            events,
            cancel_token.clone(),
        ));

        log_info!(
            "watching {} target apps every {}ms",
            self.catalog.len(),
            self.interval.as_millis()
        );
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log_error!("focus loop task failed to join: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::GuardError;
    use crate::focus::{FocusEvent, FocusedElement};
    use crate::models::FocusRef;
    use crate::sim::ScriptedFocusSource;

    fn slack_field(focus: u64) -> FocusedElement {
        FocusedElement {
            bundle_id: "com.tinyspeck.slackmacgap".into(),
            role: "AXTextArea".into(),
            editable: Some(true),
            focus: FocusRef(focus),
        }
    }

    async fn next_focus(rx: &mut mpsc::UnboundedReceiver<Event>) -> FocusEvent {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("focus event in time")
            .expect("channel open");
        match event {
            Event::Focus(focus) => focus,
            other => panic!("expected focus event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_enter_and_leave() {
        let source = Arc::new(ScriptedFocusSource::new());
        let mut tracker = FocusTracker::new(
            source.clone(),
            TargetCatalog::default(),
            Duration::from_millis(5),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.start(tx).unwrap();

        source.set(Some(slack_field(4)));
        assert!(matches!(
            next_focus(&mut rx).await,
            FocusEvent::Entered { focus: FocusRef(4), .. }
        ));

        source.set(None);
        assert_eq!(next_focus(&mut rx).await, FocusEvent::Left);

        tracker.stop().await;
        assert!(!tracker.is_running());
    }

    #[tokio::test]
    async fn read_errors_are_no_change() {
        let source = Arc::new(ScriptedFocusSource::new());
        let mut tracker = FocusTracker::new(
            source.clone(),
            TargetCatalog::default(),
            Duration::from_millis(5),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.start(tx).unwrap();

        source.set(Some(slack_field(1)));
        assert!(matches!(next_focus(&mut rx).await, FocusEvent::Entered { .. }));

        source.set_failing(true);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());

        source.set_failing(false);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());

        tracker.stop().await;
    }

    /// Blocks every read until released, counting overlapping reads.
    #[derive(Default)]
    struct StuckFocusSource {
        released: std::sync::Mutex<bool>,
        wake: std::sync::Condvar,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl StuckFocusSource {
        fn release(&self) {
            *self.released.lock().unwrap() = true;
            self.wake.notify_all();
        }
    }

    impl FocusSource for StuckFocusSource {
        fn check_access(&self) -> GuardResult<()> {
            Ok(())
        }

        fn focused(&self) -> GuardResult<Option<FocusedElement>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);

            let mut released = self.released.lock().unwrap();
            while !*released {
                released = self.wake.wait(released).unwrap();
            }
            drop(released);

            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(slack_field(7)))
        }
    }

    #[tokio::test]
    async fn hung_read_is_awaited_instead_of_restarted() {
        let source = Arc::new(StuckFocusSource::default());
        let mut tracker = FocusTracker::new(
            source.clone(),
            TargetCatalog::default(),
            Duration::from_millis(5),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.start(tx).unwrap();

        // Long enough for the read timeout to lapse twice.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());

        source.release();
        assert!(matches!(
            next_focus(&mut rx).await,
            FocusEvent::Entered { focus: FocusRef(7), .. }
        ));
        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);

        tracker.stop().await;
    }

    #[tokio::test]
    async fn refuses_to_start_without_accessibility() {
        let source = Arc::new(ScriptedFocusSource::denied());
        let mut tracker =
            FocusTracker::new(source, TargetCatalog::default(), Duration::from_millis(5));
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = tracker.start(tx).unwrap_err();
        assert!(matches!(err, GuardError::PermissionDenied { .. }));
        assert!(!tracker.is_running());
    }

    #[tokio::test]
    async fn restarts_after_stop() {
        let source = Arc::new(ScriptedFocusSource::new());
        source.set(Some(slack_field(2)));
        let mut tracker = FocusTracker::new(
            source.clone(),
            TargetCatalog::default(),
            Duration::from_millis(5),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.start(tx.clone()).unwrap();
        assert!(matches!(next_focus(&mut rx).await, FocusEvent::Entered { .. }));
        tracker.stop().await;

        tracker.start(tx).unwrap();
        assert!(matches!(next_focus(&mut rx).await, FocusEvent::Entered { .. }));
        tracker.stop().await;
    }
}
