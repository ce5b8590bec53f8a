use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{Luma, RgbImage};
use tracing::{info, instrument};

use super::{colorize, DepthEngine, DepthResult};
use crate::capture::{DepthMap, Extrinsics, Intrinsics};
use crate::{Error, InferenceSettings, Result};

/// Reference engine: inverse luminance as relative depth.
///
/// Stands in for a learned model with the same input/output contract. Frames
/// are resized to the network resolution, intrinsics are estimated there
/// with a focal length equal to the network width and then mapped back to
/// the source resolution.
pub struct LuminanceDepth {
    net_width: u32,
    net_height: u32,
}

impl LuminanceDepth {
    pub fn load(settings: &InferenceSettings) -> Result<Self> {
        if settings.net_width == 0 || settings.net_height == 0 {
            return Err(Error::EngineInit {
                reason: format!(
                    "network resolution {}x{} is empty",
                    settings.net_width, settings.net_height
                ),
            });
        }
        info!(
            width = settings.net_width,
            height = settings.net_height,
            "Luminance depth engine ready [CPU]"
        );
        Ok(Self {
            net_width: settings.net_width,
            net_height: settings.net_height,
        })
    }
}

impl DepthEngine for LuminanceDepth {
    fn name(&self) -> &str {
        "luminance"
    }

    #[instrument(skip_all, fields(w = input.width(), h = input.height()))]
    fn predict(&mut self, input: &RgbImage) -> DepthResult {
        let (width, height) = input.dimensions();
        if width == 0 || height == 0 {
            return DepthResult::invalid();
        }

        let start = Instant::now();
        let (nw, nh) = (self.net_width, self.net_height);
        let resized = imageops::resize(input, nw, nh, FilterType::Triangle);

        let depth_map = DepthMap::from_fn(nw, nh, |x, y| {
            let [r, g, b] = resized.get_pixel(x, y).0;
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0;
            Luma([1.0 - luma])
        });
        let visual = colorize(&depth_map);

        let focal = nw as f32;
        let intrinsics = Intrinsics::pinhole(focal, focal, nw as f32 / 2.0, nh as f32 / 2.0)
            .rescaled((nw, nh), (width, height));

        DepthResult {
            depth_map,
            visual,
            intrinsics,
            extrinsics: Extrinsics::identity(),
            infer_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            is_valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn engine(w: u32, h: u32) -> LuminanceDepth {
        LuminanceDepth::load(&InferenceSettings {
            net_width: w,
            net_height: h,
            enabled: true,
        })
        .unwrap()
    }

    #[test]
    fn rejects_empty_network_size() {
        let settings = InferenceSettings {
            net_width: 0,
            ..InferenceSettings::default()
        };
        assert!(matches!(LuminanceDepth::load(&settings), Err(Error::EngineInit { .. })));
    }

    #[test]
    fn output_is_at_network_resolution() {
        let mut engine = engine(16, 8);
        let result = engine.predict(&RgbImage::new(64, 64));
        assert!(result.is_valid);
        assert_eq!(result.depth_map.dimensions(), (16, 8));
        assert_eq!(result.visual.dimensions(), (16, 8));
    }

    #[test]
    fn brighter_pixels_are_closer() {
        let mut engine = engine(2, 1);
        let input = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let result = engine.predict(&input);
        let far = result.depth_map.get_pixel(0, 0).0[0];
        let near = result.depth_map.get_pixel(1, 0).0[0];
        assert!(far > near);
    }

    #[test]
    fn intrinsics_map_to_source_resolution() {
        let mut engine = engine(10, 10);
        let result = engine.predict(&RgbImage::new(20, 40));
        let k = result.intrinsics.0;
        assert_eq!(k[0][0], 20.0); // fx = 10 * 2
        assert_eq!(k[1][1], 40.0); // fy = 10 * 4
        assert_eq!(k[0][2], 10.0);
        assert_eq!(k[1][2], 20.0);
    }

    #[test]
    fn empty_input_is_invalid() {
        let mut engine = engine(4, 4);
        assert!(!engine.predict(&RgbImage::new(0, 0)).is_valid);
    }
}
