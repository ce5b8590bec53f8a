use image::{Rgb, RgbImage};

use crate::capture::DepthMap;

/// Inferno palette control points, evenly spaced over 0..=1.
const INFERNO: [[u8; 3]; 9] = [
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

/// Palette color for `t` in 0..=1 (clamped).
pub fn inferno(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (INFERNO.len() - 1) as f32;
    let lo = (scaled.floor() as usize).min(INFERNO.len() - 2);
    let frac = scaled - lo as f32;
    let (a, b) = (INFERNO[lo], INFERNO[lo + 1]);
    let mix = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * frac).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Min/max-normalize `depth` and map it through the inferno palette.
///
/// A constant map renders entirely in the darkest palette color.
pub fn colorize(depth: &DepthMap) -> RgbImage {
    let (min, max) = depth
        .pixels()
        .map(|p| p.0[0])
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let range = max - min;
    let flat = !range.is_finite() || range <= f32::EPSILON;

    RgbImage::from_fn(depth.width(), depth.height(), |x, y| {
        if flat {
            return inferno(0.0);
        }
        let v = depth.get_pixel(x, y).0[0];
        inferno((v - min) / range)
    })
}
