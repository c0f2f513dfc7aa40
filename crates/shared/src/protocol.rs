use serde::{Deserialize, Serialize};

use crate::{
    domain::{CommandArg, CommandId},
    error::DeviceFault,
};

pub const API_PREFIX: &str = "/api";

/// Body returned by every control-plane call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceStatus {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    /// Stand-in for any transport outcome that produced no usable body.
    pub fn not_ok() -> Self {
        Self::default()
    }

    pub fn rejected(fault: DeviceFault) -> Self {
        Self {
            ok: false,
            error: Some(fault.to_string()),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_mute(mut self, mute: bool) -> Self {
        self.mute = Some(mute);
        self
    }

    pub fn is_muted(&self) -> bool {
        self.mute.unwrap_or(false)
    }
}

/// Path of the control endpoint for a command. An empty argument is treated
/// as no argument.
pub fn command_path(command: &CommandId, arg: Option<&CommandArg>) -> String {
    match arg.filter(|arg| !arg.as_str().is_empty()) {
        Some(arg) => format!("{API_PREFIX}/{command}/{arg}"),
        None => format!("{API_PREFIX}/{command}"),
    }
}
