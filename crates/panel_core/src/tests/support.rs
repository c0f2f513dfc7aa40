use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{CommandArg, CommandId, ControlDescriptor},
    protocol::{command_path, DeviceStatus},
};
use tokio::sync::{oneshot, Mutex};

use crate::{
    panel::Panel,
    transport::{DeviceTransport, TransportError},
};

/// Scripted device: records every request, answers from a queue and falls
/// back to a default status. Each request takes `latency` of (paused) time.
pub(crate) struct FakeTransport {
    latency: Duration,
    default_status: DeviceStatus,
    scripted: Mutex<VecDeque<Result<DeviceStatus, TransportError>>>,
    calls: Mutex<Vec<String>>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeTransport {
    pub(crate) fn answering(default_status: DeviceStatus) -> Self {
        Self {
            latency: Duration::from_millis(10),
            default_status,
            scripted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
        }
    }

    pub(crate) fn ok() -> Self {
        Self::answering(DeviceStatus::ok())
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) async fn script(&self, outcome: Result<DeviceStatus, TransportError>) {
        self.scripted.lock().await.push_back(outcome);
    }

    /// The next request blocks until the returned sender fires or is dropped.
    pub(crate) async fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock().await = Some(rx);
        tx
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|recorded| recorded.as_str() == call)
            .count()
    }

    pub(crate) async fn wait_for_calls(&self, expected: usize) {
        while self.calls.lock().await.len() < expected {
            tokio::task::yield_now().await;
        }
    }

    async fn respond(&self, call: String) -> Result<DeviceStatus, TransportError> {
        self.calls.lock().await.push(call);
        let hold = self.hold.lock().await.take();
        if let Some(release) = hold {
            let _ = release.await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.scripted
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_status.clone()))
    }
}

#[async_trait]
impl DeviceTransport for FakeTransport {
    async fn send(
        &self,
        command: &CommandId,
        arg: Option<&CommandArg>,
    ) -> Result<DeviceStatus, TransportError> {
        self.respond(format!("POST {}", command_path(command, arg)))
            .await
    }

    async fn query(&self, command: &CommandId) -> Result<DeviceStatus, TransportError> {
        self.respond(format!("GET {}", command_path(command, None)))
            .await
    }
}

pub(crate) fn sample_panel() -> Panel {
    Panel::new([
        ControlDescriptor::pulse("power", None),
        ControlDescriptor::pulse("mute", None),
        ControlDescriptor::pulse("source", Some("hdmi1")),
        ControlDescriptor::pulse("source", Some("hdmi2")),
        ControlDescriptor::repeating("vu"),
        ControlDescriptor::repeating("vd"),
    ])
}

pub(crate) fn command(id: &str) -> CommandId {
    CommandId::from(id)
}

pub(crate) fn arg(value: &str) -> CommandArg {
    CommandArg::from(value)
}
