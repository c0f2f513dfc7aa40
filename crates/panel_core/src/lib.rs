//! Command dispatch and panel reconciliation for a networked amplifier
//! control surface.
//!
//! A host builds a [`Panel`] from a [`PanelLayout`], wraps it in a
//! [`Dispatcher`] with a [`DeviceTransport`], and forwards press/release input
//! through a [`PanelController`]. Rendering follows [`PanelEvent`]s or
//! [`Dispatcher::snapshot`].

use shared::{
    domain::{CommandArg, CommandId},
    protocol::DeviceStatus,
};

pub mod cancel;
pub mod controller;
pub mod dispatcher;
pub mod layout;
pub mod panel;
pub mod transport;

pub use cancel::CancelToken;
pub use controller::{InputEvent, PanelController};
pub use dispatcher::{
    run_repeating, DispatchSession, Dispatcher, PulseOutcome, RepeatReport,
    DEFAULT_FIRST_REPEAT_DELAY,
};
pub use layout::{LayoutError, PanelLayout};
pub use panel::{Control, ControlIndex, Panel, VisualState};
pub use transport::{DeviceTransport, HttpTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// A pulse (or refresh) started or finished; hosts show a loading marker while set.
    BusyChanged(bool),
    Reconciled {
        command: CommandId,
        arg: Option<CommandArg>,
        status: DeviceStatus,
    },
    PressedChanged {
        control: ControlIndex,
        pressed: bool,
    },
    RepeatStarted {
        command: CommandId,
    },
    RepeatStopped {
        command: CommandId,
        report: RepeatReport,
    },
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
