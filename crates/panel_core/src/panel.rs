//! Control panel model and response reconciliation.

use serde::Serialize;
use shared::{
    domain::{CommandArg, CommandId, ControlDescriptor},
    protocol::DeviceStatus,
};

/// Display attributes the host renders for a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisualState {
    /// Highlighted ("on").
    pub active: bool,
    /// Interactive.
    pub enabled: bool,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            active: false,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ControlIndex(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub descriptor: ControlDescriptor,
    pub state: VisualState,
    /// Held down by the user; maintained by input handling, never by reconciliation.
    pub pressed: bool,
}

impl Control {
    fn new(descriptor: ControlDescriptor) -> Self {
        Self {
            descriptor,
            state: VisualState::default(),
            pressed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Panel {
    controls: Vec<Control>,
}

impl Panel {
    pub fn new(descriptors: impl IntoIterator<Item = ControlDescriptor>) -> Self {
        Self {
            controls: descriptors.into_iter().map(Control::new).collect(),
        }
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control(&self, index: ControlIndex) -> Option<&Control> {
        self.controls.get(index.0)
    }

    pub fn find(&self, command: &CommandId, arg: Option<&CommandArg>) -> Option<ControlIndex> {
        self.controls
            .iter()
            .position(|control| control.descriptor.matches(command, arg))
            .map(ControlIndex)
    }

    pub fn state_of(&self, command: &str, arg: Option<&str>) -> Option<VisualState> {
        let command = CommandId::from(command);
        let arg = arg.map(CommandArg::from);
        self.find(&command, arg.as_ref())
            .and_then(|index| self.control(index))
            .map(|control| control.state)
    }

    /// Returns whether the flag changed.
    pub fn set_pressed(&mut self, index: ControlIndex, pressed: bool) -> bool {
        match self.controls.get_mut(index.0) {
            Some(control) if control.pressed != pressed => {
                control.pressed = pressed;
                true
            }
            _ => false,
        }
    }

    /// Recomputes every control from the response to `(issued, issued_arg)`.
    /// Returns how many controls changed.
    pub fn reconcile(
        &mut self,
        issued: &CommandId,
        issued_arg: Option<&CommandArg>,
        status: &DeviceStatus,
    ) -> usize {
        let mut changed = 0;
        for control in &mut self.controls {
            let next = reconcile_control(&control.descriptor, control.state, issued, issued_arg, status);
            if next != control.state {
                control.state = next;
                changed += 1;
            }
        }
        changed
    }
}

/// Next visual state of one control. Depends only on its own prior state, so
/// the panel pass is order-insensitive.
pub fn reconcile_control(
    descriptor: &ControlDescriptor,
    prior: VisualState,
    issued: &CommandId,
    issued_arg: Option<&CommandArg>,
    status: &DeviceStatus,
) -> VisualState {
    let mut next = prior;

    if descriptor.matches(issued, issued_arg) {
        next.active = status.ok;
    } else if issued.is_power() {
        next.enabled = status.ok;
        if status.ok {
            let reported_source = descriptor.is_source_select()
                && matches!(
                    (descriptor.arg.as_ref(), status.source.as_deref()),
                    (Some(arg), Some(source)) if arg.as_str() == source
                );
            if reported_source || (descriptor.is_mute() && status.is_muted()) {
                next.active = true;
            }
        } else {
            next.active = false;
        }
    } else if issued.is_source_select() && descriptor.is_source_select() {
        next.active = false;
    }

    next
}

#[cfg(test)]
#[path = "tests/panel_tests.rs"]
mod tests;
