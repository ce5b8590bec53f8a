pub mod backend;
pub mod config;
pub mod frame;
pub mod grabber;
pub mod source;

pub use backend::{BackendFactory, CaptureBackend, CompatBackend, ModernBackend};
pub use config::{BackendKind, CaptureConfig, CaptureMethod, TargetHandle, DEFAULT_FPS, MAX_FPS};
pub use frame::{DepthMap, Extrinsics, FrameData, Intrinsics, NO_SEQUENCE};
pub use grabber::ScreenGrabber;
pub use source::{SyntheticWindows, WindowSource, WindowState};
