//! FrameSource - Frame Acquisition Seam
//!
//! ## Responsibilities
//!
//! - "Capture one frame now" interface to whatever produces video frames
//! - Deterministic synthetic source for headless operation and tests
//!
//! The engine makes no assumption about capture cadence; the session's
//! transmission loop adapts to whatever the source yields.

use crate::error::Result;
use std::future::Future;

/// A single raw captured frame, tightly packed RGB8
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawFrame {
    /// Expected pixel buffer length for the frame dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Frame acquisition interface
///
/// `capture` returns `Ok(None)` when the source has no frame ready yet
/// (e.g. camera warming up); the caller skips that scheduling tick and
/// retries on the next one. Errors are likewise non-fatal to the session.
pub trait FrameSource: Send + 'static {
    fn capture(&mut self) -> impl Future<Output = Result<Option<RawFrame>>> + Send;
}

/// Deterministic moving-gradient source
///
/// Stands in for a camera when none is attached: every capture yields a
/// gradient that shifts with the frame index, so consecutive frames differ
/// and encode to non-trivial JPEGs.
#[derive(Debug)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
        }
    }

    fn render(&self) -> RawFrame {
        let shift = (self.frame_index % 256) as u8;
        let mut pixels = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push((x % 256) as u8 ^ shift);
                pixels.push((y % 256) as u8);
                pixels.push(shift);
            }
        }
        RawFrame {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

impl FrameSource for TestPatternSource {
    async fn capture(&mut self) -> Result<Option<RawFrame>> {
        let frame = self.render();
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_source_yields_full_frames() {
        let mut source = TestPatternSource::new(32, 24);
        let frame = source.capture().await.unwrap().unwrap();
        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 24);
        assert_eq!(frame.pixels.len(), frame.expected_len());
    }

    #[tokio::test]
    async fn test_pattern_source_frames_differ() {
        let mut source = TestPatternSource::new(16, 16);
        let first = source.capture().await.unwrap().unwrap();
        let second = source.capture().await.unwrap().unwrap();
        assert_ne!(first.pixels, second.pixels);
    }
}
