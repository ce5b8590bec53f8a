use std::sync::Arc;

use tracing::{debug, info, warn};

use super::SharedCoordinator;
use crate::capture::CaptureMethod;
use crate::wire::{ClientMessage, ServerMessage};
use crate::Result;

/// Applies configuration-channel commands to the coordinator.
pub struct ControlChannel {
    coordinator: Arc<SharedCoordinator>,
}

impl ControlChannel {
    pub fn new(coordinator: Arc<SharedCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Greeting for a newly connected client.
    pub fn init_message(&self) -> ServerMessage {
        ServerMessage::init_config(&self.coordinator.config())
    }

    /// Parse and apply one JSON command.
    pub fn handle_text(&self, text: &str) -> Result<Option<ServerMessage>> {
        let message = ClientMessage::parse(text)?;
        Ok(self.handle(message))
    }

    pub fn handle(&self, message: ClientMessage) -> Option<ServerMessage> {
        debug!(?message, "Control message");
        match message {
            ClientMessage::SetCaptureConfig {
                window_name,
                method,
                capture_fps,
            } => {
                let mut config = self.coordinator.config();
                if let Some(name) = window_name {
                    config.window_name = name;
                }
                if let Some(index) = method {
                    match CaptureMethod::from_index(index) {
                        Some(m) => config.method = m,
                        None => warn!(index, "Unknown capture method, keeping {:?}", config.method),
                    }
                }
                if let Some(fps) = capture_fps {
                    config.fps = fps;
                }
                self.coordinator.set_config(config);
                None
            }
            ClientMessage::ToggleMapping { state } => {
                info!(state, "Mapping toggled");
                self.coordinator.set_mapping(state);
                None
            }
            ClientMessage::ToggleInference { state } => {
                info!(state, "Inferencing toggled");
                self.coordinator.set_inferencing(state);
                None
            }
            ClientMessage::GetWindowList => Some(ServerMessage::WindowList {
                windows: self.coordinator.window_source().window_titles(),
            }),
        }
    }
}
