use std::fmt::Write as _;

use panel_core::{Control, Panel};
use shared::domain::ControlMode;

/// One line per control: `[*]` active, `[ ]` idle, `[-]` disabled.
pub fn render_panel(panel: &Panel) -> String {
    let mut out = String::new();
    for control in panel.controls() {
        let _ = writeln!(out, "{}", render_control(control));
    }
    out
}

fn render_control(control: &Control) -> String {
    let marker = match (control.state.enabled, control.state.active) {
        (false, _) => "[-]",
        (true, true) => "[*]",
        (true, false) => "[ ]",
    };
    let descriptor = &control.descriptor;
    let target = match &descriptor.arg {
        Some(arg) => format!("{} {}", descriptor.command, arg),
        None => descriptor.command.to_string(),
    };
    let hold = match descriptor.mode {
        ControlMode::Repeating => " (hold)",
        ControlMode::Pulse => "",
    };
    format!("{marker} {:<8} {target}{hold}", descriptor.display_name())
}
