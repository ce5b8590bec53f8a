//! Wire formats for the configuration and frame consumption channels.

pub mod depth;
pub mod jpeg;
pub mod messages;

pub use messages::{ClientMessage, FrameKind, ServerMessage};
