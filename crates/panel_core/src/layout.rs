//! Panel layout: the static list of controls, read once at startup.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use shared::domain::{ControlDescriptor, ControlMode, MUTE_COMMAND, POWER_COMMAND, SOURCE_COMMAND};
use thiserror::Error;

use crate::panel::Panel;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to read panel layout '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid panel layout: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("panel layout has no controls")]
    Empty,
    #[error("control #{index} has an empty command id")]
    EmptyCommand { index: usize },
    #[error("control #{index} ({command}) has an empty argument")]
    EmptyArgument { index: usize, command: String },
    #[error("control #{index} ({command}) is repeating and cannot take an argument")]
    RepeatingWithArgument { index: usize, command: String },
    #[error("control #{index} duplicates {name}")]
    Duplicate { index: usize, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelLayout {
    #[serde(rename = "control", default)]
    pub controls: Vec<ControlDescriptor>,
}

impl Default for PanelLayout {
    /// Front panel of a stereo integrated amplifier.
    fn default() -> Self {
        let sources = [
            ("00", "A1"),
            ("01", "A2"),
            ("02", "A3"),
            ("03", "A4"),
            ("04", "D1"),
            ("05", "D2"),
        ];
        let mut controls = vec![
            ControlDescriptor::pulse(POWER_COMMAND, None).with_label("Power"),
            ControlDescriptor::pulse(MUTE_COMMAND, None).with_label("Mute"),
            ControlDescriptor::repeating("vd").with_label("Vol -"),
            ControlDescriptor::repeating("vu").with_label("Vol +"),
        ];
        controls.extend(
            sources
                .into_iter()
                .map(|(code, label)| ControlDescriptor::pulse(SOURCE_COMMAND, Some(code)).with_label(label)),
        );
        Self { controls }
    }
}

impl PanelLayout {
    pub fn from_toml_str(raw: &str) -> Result<Self, LayoutError> {
        let layout: Self = toml::from_str(raw)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.controls.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, control) in self.controls.iter().enumerate() {
            let command = control.command.to_string();
            if command.trim().is_empty() {
                return Err(LayoutError::EmptyCommand { index });
            }
            match (&control.arg, control.mode) {
                (Some(arg), _) if arg.as_str().is_empty() => {
                    return Err(LayoutError::EmptyArgument { index, command });
                }
                (Some(_), ControlMode::Repeating) => {
                    return Err(LayoutError::RepeatingWithArgument { index, command });
                }
                _ => {}
            }
            if !seen.insert((control.command.clone(), control.arg.clone())) {
                return Err(LayoutError::Duplicate {
                    index,
                    name: control.display_name(),
                });
            }
        }

        Ok(())
    }

    pub fn into_panel(self) -> Panel {
        Panel::new(self.controls)
    }
}
