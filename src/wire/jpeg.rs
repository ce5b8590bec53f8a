use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use super::messages::{FrameKind, ServerMessage};
use crate::capture::FrameData;
use crate::Result;

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(image)?;
    Ok(out)
}

pub fn data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

/// `frame_update` preview for a raw or depth frame; `None` for empty frames.
pub fn frame_update(kind: FrameKind, frame: &FrameData, quality: u8) -> Result<Option<ServerMessage>> {
    let Some(image) = frame.image.as_deref() else {
        return Ok(None);
    };
    let data = data_url(&encode_jpeg(image, quality)?);
    let (capture_time, infer_time) = match kind {
        FrameKind::Raw => (Some(frame.duration_ms), None),
        FrameKind::Depth => (None, Some(frame.duration_ms)),
    };
    Ok(Some(ServerMessage::FrameUpdate {
        frame_type: kind,
        data,
        capture_time,
        infer_time,
    }))
}
