pub mod capture;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod wire;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureMethod;

pub use capture::{CaptureConfig, FrameData};
pub use error::{Error, Result};
pub use pipeline::{SharedCoordinator, System};

/// Environment prefix for configuration overrides, e.g.
/// `DEPTHCAST__CAPTURE__FPS=60`.
pub const ENV_PREFIX: &str = "DEPTHCAST";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureSettings,
    pub inference: InferenceSettings,
    pub pipeline: PipelineSettings,
}

/// Starting capture configuration; the running value lives in the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub method: CaptureMethod,
    pub window_name: String,
    pub fps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Network input width the engine resizes frames to.
    pub net_width: u32,
    pub net_height: u32,
    /// Initial state of the inferencing run-state flag.
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Initial state of the mapping run-state flag.
    pub mapping: bool,
    /// Sleep while the inferencing flag is off.
    pub idle_poll_ms: u64,
    pub broadcast_interval_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            method: CaptureMethod::Modern,
            window_name: "GameProcess".into(),
            fps: capture::DEFAULT_FPS,
        }
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            net_width: 504,
            net_height: 504,
            enabled: false,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mapping: false,
            idle_poll_ms: 100,
            broadcast_interval_ms: 33, // ~30fps check rate
            jpeg_quality: 70,
        }
    }
}

impl Config {
    /// Layer an optional TOML file under `DEPTHCAST__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.fps == 0 || self.capture.fps > capture::MAX_FPS {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "capture.fps {} outside 1..={}",
                    self.capture.fps,
                    capture::MAX_FPS
                ),
            });
        }
        if self.inference.net_width == 0 || self.inference.net_height == 0 {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "inference network size {}x{} is empty",
                    self.inference.net_width, self.inference.net_height
                ),
            });
        }
        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return Err(Error::InvalidConfig {
                reason: format!("jpeg_quality {} outside 1..=100", self.pipeline.jpeg_quality),
            });
        }
        Ok(())
    }
}
