//! Binary depth packet for point-cloud consumers.
//!
//! Little-endian, packed:
//!
//! ```text
//! u32      magic (0xDEADBEEF)
//! i32      width
//! i32      height
//! f32 x 9  intrinsics, row-major
//! f32 x 12 extrinsics, row-major
//! f32 x width*height depth
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::capture::{Extrinsics, FrameData, Intrinsics};
use crate::{Error, Result};

pub const DEPTH_MAGIC: u32 = 0xDEAD_BEEF;
pub const HEADER_LEN: usize = 4 + 4 + 4 + 9 * 4 + 12 * 4;

#[derive(Debug, Clone, PartialEq)]
pub struct DepthPacket {
    pub width: u32,
    pub height: u32,
    pub intrinsics: Intrinsics,
    pub extrinsics: Extrinsics,
    pub depth: Vec<f32>,
}

/// Encode a derived frame; `None` when it carries no raw depth.
pub fn encode(frame: &FrameData) -> Option<Bytes> {
    let depth = frame.raw_depth.as_ref()?;
    let (width, height) = depth.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let width_i32 = i32::try_from(width).ok()?;
    let height_i32 = i32::try_from(height).ok()?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + depth.as_raw().len() * 4);
    buf.put_u32_le(DEPTH_MAGIC);
    buf.put_i32_le(width_i32);
    buf.put_i32_le(height_i32);
    for v in frame.intrinsics.flat() {
        buf.put_f32_le(v);
    }
    for v in frame.extrinsics.flat() {
        buf.put_f32_le(v);
    }
    for v in depth.as_raw() {
        buf.put_f32_le(*v);
    }
    Some(buf.freeze())
}

pub fn decode(mut data: &[u8]) -> Result<DepthPacket> {
    let malformed = |reason: String| Error::Packet { reason };

    if data.len() < HEADER_LEN {
        return Err(malformed(format!("{} bytes is shorter than the header", data.len())));
    }
    let magic = data.get_u32_le();
    if magic != DEPTH_MAGIC {
        return Err(malformed(format!("bad magic {magic:#010x}")));
    }
    let width = u32::try_from(data.get_i32_le()).map_err(|_| malformed("negative width".into()))?;
    let height = u32::try_from(data.get_i32_le()).map_err(|_| malformed("negative height".into()))?;

    let mut k = [[0f32; 3]; 3];
    for row in k.iter_mut() {
        for v in row.iter_mut() {
            *v = data.get_f32_le();
        }
    }
    let mut rt = [[0f32; 4]; 3];
    for row in rt.iter_mut() {
        for v in row.iter_mut() {
            *v = data.get_f32_le();
        }
    }

    let expected = width as usize * height as usize * 4;
    if data.remaining() != expected {
        return Err(malformed(format!(
            "expected {expected} depth bytes for {width}x{height}, got {}",
            data.remaining()
        )));
    }
    let depth = (0..width as usize * height as usize).map(|_| data.get_f32_le()).collect();

    Ok(DepthPacket {
        width,
        height,
        intrinsics: Intrinsics(k),
        extrinsics: Extrinsics(rt),
        depth,
    })
}
