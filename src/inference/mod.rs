//! Depth inference boundary.
//!
//! The pipeline treats an engine as a synchronous `image -> DepthResult`
//! call. Engines that batch or run asynchronously adapt to this shape.

pub mod colormap;
pub mod luminance;

use image::RgbImage;

use crate::capture::frame::unix_millis;
use crate::capture::{DepthMap, Extrinsics, FrameData, Intrinsics};

pub use colormap::colorize;
pub use luminance::LuminanceDepth;

pub struct DepthResult {
    /// Relative depth at network resolution.
    pub depth_map: DepthMap,
    /// Colorized depth for previews.
    pub visual: RgbImage,
    /// Rescaled to the source image resolution.
    pub intrinsics: Intrinsics,
    pub extrinsics: Extrinsics,
    pub infer_time_ms: f64,
    pub is_valid: bool,
}

impl DepthResult {
    pub fn invalid() -> Self {
        Self {
            depth_map: DepthMap::new(0, 0),
            visual: RgbImage::new(0, 0),
            intrinsics: Intrinsics::default(),
            extrinsics: Extrinsics::default(),
            infer_time_ms: 0.0,
            is_valid: false,
        }
    }

    /// Package as a derived frame carrying the source frame's sequence number.
    pub fn into_frame(self, source: &FrameData) -> FrameData {
        FrameData {
            image: Some(self.visual.into()),
            raw_depth: Some(self.depth_map.into()),
            intrinsics: self.intrinsics,
            extrinsics: self.extrinsics,
            sequence_id: source.sequence_id,
            timestamp_ms: unix_millis(),
            duration_ms: self.infer_time_ms,
        }
    }
}

pub trait DepthEngine: Send {
    fn name(&self) -> &str;

    fn predict(&mut self, input: &RgbImage) -> DepthResult;
}

/// Runs on the inference thread so model loading stays off the caller.
pub type EngineLoader = Box<dyn FnOnce() -> crate::Result<Box<dyn DepthEngine>> + Send>;
