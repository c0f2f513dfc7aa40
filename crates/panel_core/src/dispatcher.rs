//! Command dispatch: pulse commands gated by the busy flag, repeating
//! commands run as cancellable sessions.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{
    domain::{CommandArg, CommandId, POWER_COMMAND},
    protocol::DeviceStatus,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{cancel::CancelToken, panel::Panel, transport::DeviceTransport, PanelEvent};

/// Pause between the first request of a held command and its auto-repeat.
pub const DEFAULT_FIRST_REPEAT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PulseOutcome {
    /// Another pulse was in flight; nothing was sent.
    Skipped,
    /// The response (or its `not ok` stand-in) was reconciled into the panel.
    Completed(DeviceStatus),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatReport {
    /// Requests started, including one aborted in flight.
    pub requests: usize,
    pub failures: usize,
}

/// One activation of a repeating command.
#[derive(Debug)]
pub struct DispatchSession {
    token: CancelToken,
    fired: bool,
}

impl DispatchSession {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            fired: false,
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl Default for DispatchSession {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Dispatcher {
    transport: Arc<dyn DeviceTransport>,
    pub(crate) panel: RwLock<Panel>,
    busy: AtomicBool,
    session: Mutex<Option<CancelToken>>,
    first_repeat_delay: Duration,
    events: broadcast::Sender<PanelEvent>,
}

struct BusyGuard<'a> {
    dispatcher: &'a Dispatcher,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.busy.store(false, Ordering::Release);
        self.dispatcher.emit(PanelEvent::BusyChanged(false));
    }
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn DeviceTransport>, panel: Panel) -> Arc<Self> {
        Self::with_first_repeat_delay(transport, panel, DEFAULT_FIRST_REPEAT_DELAY)
    }

    pub fn with_first_repeat_delay(
        transport: Arc<dyn DeviceTransport>,
        panel: Panel,
        first_repeat_delay: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            transport,
            panel: RwLock::new(panel),
            busy: AtomicBool::new(false),
            session: Mutex::new(None),
            first_repeat_delay,
            events,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> Panel {
        self.panel.read().await.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub async fn has_active_session(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    pub(crate) fn emit(&self, event: PanelEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn try_acquire_busy(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.emit(PanelEvent::BusyChanged(true));
        Some(BusyGuard { dispatcher: self })
    }

    /// Sends one command and reconciles the panel from its response. A no-op
    /// while another pulse is in flight.
    pub async fn issue_pulse(&self, command: &CommandId, arg: Option<&CommandArg>) -> PulseOutcome {
        let Some(_busy) = self.try_acquire_busy() else {
            debug!(%command, "dispatch: pulse ignored while busy");
            return PulseOutcome::Skipped;
        };

        let status = match self.transport.send(command, arg).await {
            Ok(status) => status,
            Err(error) => {
                warn!(%command, %error, "dispatch: pulse transport failure, treating as not ok");
                DeviceStatus::not_ok()
            }
        };
        self.apply(command, arg, &status).await;
        PulseOutcome::Completed(status)
    }

    /// Reads the power state and reconciles as if `power` had been issued,
    /// which brings a freshly built panel in line with the device.
    pub async fn refresh(&self) -> PulseOutcome {
        let Some(_busy) = self.try_acquire_busy() else {
            debug!("dispatch: refresh ignored while busy");
            return PulseOutcome::Skipped;
        };

        let power = CommandId::from(POWER_COMMAND);
        let status = match self.transport.query(&power).await {
            Ok(status) => status,
            Err(error) => {
                warn!(%error, "dispatch: power query failed, treating as not ok");
                DeviceStatus::not_ok()
            }
        };
        self.apply(&power, None, &status).await;
        PulseOutcome::Completed(status)
    }

    async fn apply(&self, command: &CommandId, arg: Option<&CommandArg>, status: &DeviceStatus) {
        let changed = self.panel.write().await.reconcile(command, arg, status);
        info!(
            %command,
            arg = arg.map(CommandArg::as_str),
            ok = status.ok,
            changed,
            "panel: reconciled"
        );
        self.emit(PanelEvent::Reconciled {
            command: command.clone(),
            arg: arg.cloned(),
            status: status.clone(),
        });
    }

    /// Re-issues `command` until the session is cancelled by a release or by
    /// a newer repeating command.
    pub async fn issue_repeating(&self, command: &CommandId) -> RepeatReport {
        let session = self.begin_session().await;
        self.issue_repeating_in(command, session).await
    }

    /// Runs `command` in a session already installed by
    /// [`begin_session`](Self::begin_session). A session cancelled before this
    /// runs sends nothing.
    pub async fn issue_repeating_in(
        &self,
        command: &CommandId,
        session: DispatchSession,
    ) -> RepeatReport {
        info!(%command, "dispatch: repeat session started");
        self.emit(PanelEvent::RepeatStarted {
            command: command.clone(),
        });

        let report = run_repeating(
            self.transport.as_ref(),
            command,
            session,
            self.first_repeat_delay,
        )
        .await;

        info!(
            %command,
            requests = report.requests,
            failures = report.failures,
            "dispatch: repeat session stopped"
        );
        self.emit(PanelEvent::RepeatStopped {
            command: command.clone(),
            report,
        });
        report
    }

    /// Installs a fresh session as the current one, cancelling its predecessor.
    /// From here on a release cancels it, even before its loop starts.
    pub async fn begin_session(&self) -> DispatchSession {
        let session = DispatchSession::new();
        let previous = self.session.lock().await.replace(session.token().clone());
        if let Some(previous) = previous {
            debug!("dispatch: superseding previous repeat session");
            previous.cancel();
        }
        session
    }

    /// Cancels the current repeat session, if any. Returns whether one was live.
    pub async fn cancel_repeating(&self) -> bool {
        match self.session.lock().await.take() {
            Some(token) => {
                let live = !token.is_cancelled();
                token.cancel();
                live
            }
            None => false,
        }
    }
}

/// The repeat loop. The session's token is its only cancellation input.
pub async fn run_repeating(
    transport: &dyn DeviceTransport,
    command: &CommandId,
    mut session: DispatchSession,
    first_repeat_delay: Duration,
) -> RepeatReport {
    let token = session.token.clone();
    let mut report = RepeatReport::default();

    loop {
        if token.is_cancelled() {
            break;
        }

        report.requests += 1;
        match token.race(transport.send(command, None)).await {
            None => {
                debug!(%command, "dispatch: in-flight repeat request aborted");
                break;
            }
            Some(Err(error)) => {
                report.failures += 1;
                warn!(%command, %error, "dispatch: repeat request failed");
            }
            Some(Ok(status)) => {
                debug!(%command, ok = status.ok, "dispatch: repeat request settled");
            }
        }

        if !session.fired {
            session.fired = true;
            if token
                .race(tokio::time::sleep(first_repeat_delay))
                .await
                .is_none()
            {
                break;
            }
        }

        // Lets release handlers run even when the transport completes synchronously.
        tokio::task::yield_now().await;
    }

    debug!(%command, fired = session.has_fired(), "dispatch: repeat loop exited");
    report
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
