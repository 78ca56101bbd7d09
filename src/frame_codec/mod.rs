//! FrameCodec - Frame Encoding
//!
//! ## Responsibilities
//!
//! - Encode a raw RGB frame into a bounded-size JPEG
//! - Wrap the JPEG into the transport payload (base64 + capture timestamp)
//!
//! Oversized captures are downscaled so the longest side never exceeds the
//! configured bound; this keeps the payload size predictable regardless of
//! what the frame source produces.

use crate::error::{Error, Result};
use crate::frame_source::RawFrame;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use std::io::Cursor;

/// Outbound frame message for the detection channel
#[derive(Debug, Clone, Serialize)]
pub struct FramePayload {
    /// Base64-encoded JPEG
    pub frame: String,
    /// Capture time, milliseconds since epoch
    pub timestamp: i64,
}

/// Encode a raw frame to JPEG, downscaling if the longest side exceeds `max_dimension`
pub fn encode_jpeg(frame: &RawFrame, quality: u8, max_dimension: u32) -> Result<Vec<u8>> {
    if frame.pixels.len() != frame.expected_len() {
        return Err(Error::Internal(format!(
            "frame buffer length {} does not match {}x{} RGB",
            frame.pixels.len(),
            frame.width,
            frame.height
        )));
    }

    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| Error::Internal("frame buffer rejected by image decoder".to_string()))?;

    let longest = frame.width.max(frame.height);
    let image = if longest > max_dimension {
        let scale = max_dimension as f32 / longest as f32;
        let new_width = ((frame.width as f32 * scale) as u32).max(1);
        let new_height = ((frame.height as f32 * scale) as u32).max(1);
        DynamicImage::ImageRgb8(image)
            .resize_exact(new_width, new_height, FilterType::Triangle)
            .into_rgb8()
    } else {
        image
    };

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    image.write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}

/// Wrap an encoded JPEG into the outbound channel payload
pub fn to_payload(jpeg: &[u8], timestamp_ms: i64) -> FramePayload {
    FramePayload {
        frame: BASE64.encode(jpeg),
        timestamp: timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::{FrameSource, TestPatternSource};

    #[tokio::test]
    async fn test_encode_produces_jpeg() {
        let mut source = TestPatternSource::new(64, 48);
        let frame = source.capture().await.unwrap().unwrap();
        let jpeg = encode_jpeg(&frame, 80, 640).unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_encode_downscales_oversized_frames() {
        let mut source = TestPatternSource::new(1280, 720);
        let frame = source.capture().await.unwrap().unwrap();
        let bounded = encode_jpeg(&frame, 80, 640).unwrap();
        let unbounded = encode_jpeg(&frame, 80, 1280).unwrap();
        assert!(bounded.len() < unbounded.len());
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let frame = RawFrame {
            width: 10,
            height: 10,
            pixels: vec![0; 10],
        };
        assert!(encode_jpeg(&frame, 80, 640).is_err());
    }

    #[test]
    fn test_payload_shape() {
        let payload = to_payload(b"notajpeg", 1_700_000_000_000);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("frame").unwrap().is_string());
        assert_eq!(
            json.get("timestamp").unwrap().as_i64(),
            Some(1_700_000_000_000)
        );
    }
}
