use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use image::{ImageBuffer, Luma, RgbImage};

/// Single-channel float depth map at network resolution.
pub type DepthMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Sequence number carried by a frame that was never published.
pub const NO_SEQUENCE: i64 = -1;

/// 3x3 pinhole intrinsics, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics(pub [[f32; 3]; 3]);

/// 3x4 rotation + translation, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics(pub [[f32; 4]; 3]);

impl Intrinsics {
    pub fn pinhole(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self([[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]])
    }

    /// Map intrinsics estimated at `from` resolution onto `to` resolution.
    pub fn rescaled(self, from: (u32, u32), to: (u32, u32)) -> Self {
        let sx = to.0 as f32 / from.0.max(1) as f32;
        let sy = to.1 as f32 / from.1.max(1) as f32;
        let mut k = self.0;
        k[0][0] *= sx; // fx
        k[0][2] *= sx; // cx
        k[1][1] *= sy; // fy
        k[1][2] *= sy; // cy
        Self(k)
    }

    pub fn flat(&self) -> [f32; 9] {
        let mut out = [0.0; 9];
        for (i, row) in self.0.iter().enumerate() {
            out[i * 3..i * 3 + 3].copy_from_slice(row);
        }
        out
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::pinhole(1.0, 1.0, 0.0, 0.0)
    }
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ])
    }

    pub fn flat(&self) -> [f32; 12] {
        let mut out = [0.0; 12];
        for (i, row) in self.0.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(row);
        }
        out
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

/// One raw or derived image sample.
///
/// Cloning copies the `Arc` handles only; published buffers are never
/// mutated, every new frame carries a fresh allocation.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Captured image for raw frames, colorized depth for derived ones.
    pub image: Option<Arc<RgbImage>>,
    /// Raw float depth, derived frames only.
    pub raw_depth: Option<Arc<DepthMap>>,
    pub intrinsics: Intrinsics,
    pub extrinsics: Extrinsics,
    pub sequence_id: i64,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: f64,
    /// Time spent producing this frame (capture or inference).
    pub duration_ms: f64,
}

impl FrameData {
    /// Frame wrapping a freshly captured image.
    pub fn captured(image: RgbImage, sequence_id: i64, duration: Duration) -> Self {
        Self {
            image: Some(Arc::new(image)),
            sequence_id,
            timestamp_ms: unix_millis(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            ..Self::default()
        }
    }

    /// A frame is empty iff it has no image.
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            image: None,
            raw_depth: None,
            intrinsics: Intrinsics::default(),
            extrinsics: Extrinsics::default(),
            sequence_id: NO_SEQUENCE,
            timestamp_ms: 0.0,
            duration_ms: 0.0,
        }
    }
}

pub(crate) fn unix_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
