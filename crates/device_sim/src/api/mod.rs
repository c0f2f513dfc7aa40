use std::{sync::Arc, time::Duration};

use shared::{
    domain::{CommandId, MUTE_COMMAND, SOURCE_COMMAND},
    error::DeviceFault,
    protocol::DeviceStatus,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::device::Amplifier;

pub const VOLUME_UP_COMMAND: &str = "vu";
pub const VOLUME_DOWN_COMMAND: &str = "vd";

#[derive(Clone)]
pub struct ApiContext {
    pub device: Arc<Mutex<Amplifier>>,
    pub latency: Duration,
}

impl ApiContext {
    pub fn new(device: Amplifier, latency: Duration) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            latency,
        }
    }
}

/// Read-only view of a command's state (`GET /api/{command}`).
pub async fn query(ctx: &ApiContext, command: &CommandId) -> DeviceStatus {
    simulate_latency(ctx).await;
    let device = ctx.device.lock().await;

    let outcome = if command.is_power() {
        Ok(device.power_status())
    } else if !device.is_on() {
        Err(DeviceFault::PoweredOff)
    } else {
        match command.as_str() {
            MUTE_COMMAND => device.mute_status(),
            SOURCE_COMMAND => device.source_status(),
            _ => Err(DeviceFault::UnknownCommand),
        }
    };

    debug!(%command, ok = outcome.is_ok(), "query answered");
    into_status(&device, outcome)
}

/// Executes a command (`POST /api/{command}[/{arg}]`). Every command except
/// power is rejected while the amplifier is off.
pub async fn invoke(ctx: &ApiContext, command: &CommandId, arg: Option<&str>) -> DeviceStatus {
    simulate_latency(ctx).await;
    let mut device = ctx.device.lock().await;

    let outcome = if command.is_power() {
        Ok(device.toggle_power())
    } else if !device.is_on() {
        Err(DeviceFault::PoweredOff)
    } else {
        match command.as_str() {
            MUTE_COMMAND => device.toggle_mute(),
            SOURCE_COMMAND => match arg.filter(|arg| !arg.is_empty()) {
                Some(source) => device.select_source(source),
                None => Err(DeviceFault::MissingArgument),
            },
            VOLUME_UP_COMMAND => device.volume_up(),
            VOLUME_DOWN_COMMAND => device.volume_down(),
            _ => Err(DeviceFault::UnknownCommand),
        }
    };

    match &outcome {
        Ok(_) => info!(
            %command,
            arg = arg.unwrap_or_default(),
            power = device.is_on(),
            mute = device.is_muted(),
            source = device.source(),
            volume = device.volume(),
            "command executed"
        ),
        Err(fault) => warn!(%command, arg = arg.unwrap_or_default(), %fault, "command rejected"),
    }
    into_status(&device, outcome)
}

/// A rejected source selection still reports the source that stayed current.
fn into_status(device: &Amplifier, outcome: Result<DeviceStatus, DeviceFault>) -> DeviceStatus {
    match outcome {
        Ok(status) => status,
        Err(DeviceFault::UnknownSource) => {
            DeviceStatus::rejected(DeviceFault::UnknownSource).with_source(device.source())
        }
        Err(fault) => DeviceStatus::rejected(fault),
    }
}

async fn simulate_latency(ctx: &ApiContext) {
    if !ctx.latency.is_zero() {
        tokio::time::sleep(ctx.latency).await;
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
