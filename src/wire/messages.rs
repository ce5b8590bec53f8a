use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Raw,
    Depth,
}

/// Messages pushed to frame consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once to each new client.
    InitConfig {
        method: u8,
        window_name: String,
        capturefps: u32,
    },
    FrameUpdate {
        frame_type: FrameKind,
        /// `data:image/jpeg;base64,...` URL.
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capture_time: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        infer_time: Option<f64>,
    },
    WindowList {
        windows: Vec<String>,
    },
}

impl ServerMessage {
    pub fn init_config(config: &CaptureConfig) -> Self {
        ServerMessage::InitConfig {
            method: config.method.index(),
            window_name: config.window_name.clone(),
            capturefps: config.fps,
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Commands arriving on the configuration channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Partial update; absent fields keep their current value.
    #[serde(rename = "set_capture_config")]
    SetCaptureConfig {
        window_name: Option<String>,
        method: Option<u8>,
        capture_fps: Option<u32>,
    },
    #[serde(rename = "toggle_mapping")]
    ToggleMapping {
        #[serde(default)]
        state: bool,
    },
    #[serde(rename = "toggle_Inference", alias = "toggle_inference")]
    ToggleInference {
        #[serde(default)]
        state: bool,
    },
    #[serde(rename = "get_window_list")]
    GetWindowList,
}

impl ClientMessage {
    pub fn parse(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
