//! Input handling: turns press/release events into dispatcher calls.

use std::sync::Arc;

use shared::domain::ControlMode;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{dispatcher::Dispatcher, panel::ControlIndex, PanelEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(ControlIndex),
    Release(ControlIndex),
}

pub struct PanelController {
    dispatcher: Arc<Dispatcher>,
}

impl PanelController {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn handle(&self, event: InputEvent) -> Option<JoinHandle<()>> {
        match event {
            InputEvent::Press(index) => self.press(index).await,
            InputEvent::Release(index) => {
                self.release(index).await;
                None
            }
        }
    }

    /// Starts the control's command on the runtime. Ignored for disabled
    /// controls and while a pulse is in flight.
    pub async fn press(&self, index: ControlIndex) -> Option<JoinHandle<()>> {
        if self.dispatcher.is_busy() {
            debug!(control = index.0, "input: press ignored while busy");
            return None;
        }

        let command = {
            let mut panel = self.dispatcher.panel.write().await;
            let Some(control) = panel.control(index) else {
                warn!(control = index.0, "input: press on unknown control");
                return None;
            };
            if !control.state.enabled {
                debug!(control = index.0, "input: press ignored on disabled control");
                return None;
            }
            let command = control.descriptor.to_command();
            panel.set_pressed(index, true);
            command
        };
        self.dispatcher.emit(PanelEvent::PressedChanged {
            control: index,
            pressed: true,
        });

        let dispatcher = Arc::clone(&self.dispatcher);
        let task = match command.mode {
            ControlMode::Repeating => {
                // Installed before spawning so a release that beats the task still cancels it.
                let session = dispatcher.begin_session().await;
                tokio::spawn(async move {
                    dispatcher.issue_repeating_in(&command.id, session).await;
                })
            }
            ControlMode::Pulse => tokio::spawn(async move {
                dispatcher
                    .issue_pulse(&command.id, command.arg.as_ref())
                    .await;
            }),
        };
        Some(task)
    }

    /// Clears the pressed flag (unless the control is disabled) and always
    /// stops any repeat session.
    pub async fn release(&self, index: ControlIndex) {
        let released = {
            let mut panel = self.dispatcher.panel.write().await;
            let enabled = panel
                .control(index)
                .is_some_and(|control| control.state.enabled);
            enabled && panel.set_pressed(index, false)
        };
        if released {
            self.dispatcher.emit(PanelEvent::PressedChanged {
                control: index,
                pressed: false,
            });
        }

        if self.dispatcher.cancel_repeating().await {
            debug!(control = index.0, "input: release stopped repeat session");
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
