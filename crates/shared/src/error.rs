use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a device rejects a command. The display text is what travels in
/// the `error` field of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFault {
    #[error("amplifier turned off")]
    PoweredOff,
    #[error("unknown command")]
    UnknownCommand,
    #[error("unknown source")]
    UnknownSource,
    #[error("missing argument")]
    MissingArgument,
}
