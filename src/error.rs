use thiserror::Error;

/// Errors surfaced at startup or while encoding wire messages.
///
/// Routine capture and inference misses are never errors; they show up as
/// absent values on the hot path.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration invalid: {reason}")]
    InvalidConfig { reason: String },

    #[error("Inference engine failed to load: {reason}")]
    EngineInit { reason: String },

    #[error("Failed to spawn thread {name}: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed depth packet: {reason}")]
    Packet { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
