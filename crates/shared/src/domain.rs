use std::fmt;

use serde::{Deserialize, Serialize};

/// Command that toggles the device and gates every other control.
pub const POWER_COMMAND: &str = "power";
/// Command that toggles mute; its button mirrors the reported mute state.
pub const MUTE_COMMAND: &str = "mute";
/// Command whose argument selects one of the mutually exclusive inputs.
pub const SOURCE_COMMAND: &str = "source";

macro_rules! str_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

str_newtype!(CommandId);
str_newtype!(CommandArg);

impl CommandId {
    pub fn is_power(&self) -> bool {
        self.0 == POWER_COMMAND
    }

    pub fn is_mute(&self) -> bool {
        self.0 == MUTE_COMMAND
    }

    pub fn is_source_select(&self) -> bool {
        self.0 == SOURCE_COMMAND
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// One request per press.
    #[default]
    Pulse,
    /// Re-issued while the control is held.
    #[serde(alias = "long")]
    Repeating,
}

/// A command as issued by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    pub arg: Option<CommandArg>,
    pub mode: ControlMode,
}

/// Static description of one on-screen control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub command: CommandId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<CommandArg>,
    #[serde(default)]
    pub mode: ControlMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ControlDescriptor {
    pub fn pulse(command: &str, arg: Option<&str>) -> Self {
        Self {
            command: CommandId::from(command),
            arg: arg.map(CommandArg::from),
            mode: ControlMode::Pulse,
            label: None,
        }
    }

    pub fn repeating(command: &str) -> Self {
        Self {
            command: CommandId::from(command),
            arg: None,
            mode: ControlMode::Repeating,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Exact `(command, arg)` match, where a missing argument only matches a missing argument.
    pub fn matches(&self, command: &CommandId, arg: Option<&CommandArg>) -> bool {
        &self.command == command && self.arg.as_ref() == arg
    }

    pub fn is_source_select(&self) -> bool {
        self.command.is_source_select()
    }

    pub fn is_mute(&self) -> bool {
        self.command.is_mute()
    }

    pub fn to_command(&self) -> Command {
        Command {
            id: self.command.clone(),
            arg: self.arg.clone(),
            mode: self.mode,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.label, &self.arg) {
            (Some(label), _) => label.clone(),
            (None, Some(arg)) => format!("{}/{}", self.command, arg),
            (None, None) => self.command.to_string(),
        }
    }
}
