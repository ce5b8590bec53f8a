//! Shared coordinator and the worker loops around it.

pub mod broadcast;
pub mod capture_loop;
pub mod control;
pub mod coordinator;
pub mod inference_loop;
pub mod system;

pub use broadcast::{BroadcastLoop, FrameSink, Outbound};
pub use capture_loop::CaptureLoop;
pub use control::ControlChannel;
pub use coordinator::{SharedCoordinator, Telemetry};
pub use inference_loop::InferenceLoop;
pub use system::System;
