//! Engine configuration
//!
//! All knobs have environment-backed defaults so a session can be started
//! with `EngineConfig::default()` in development.

use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Detection service WebSocket base URL (session id is appended as a path segment)
    pub detector_ws_url: String,
    /// Session registration API base URL
    pub api_base_url: String,
    /// Minimum delay between a detection result and the next frame send
    pub frame_interval: Duration,
    /// JPEG quality for encoded frames (1-100)
    pub jpeg_quality: u8,
    /// Longest side of an encoded frame; larger captures are downscaled
    pub max_frame_dimension: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector_ws_url: std::env::var("PROCTOR_DETECTOR_WS_URL")
                .unwrap_or_else(|_| "ws://localhost:8000".to_string()),
            api_base_url: std::env::var("PROCTOR_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            frame_interval: Duration::from_millis(
                std::env::var("PROCTOR_FRAME_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            ),
            jpeg_quality: std::env::var("PROCTOR_JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(80),
            max_frame_dimension: 640,
        }
    }
}

impl EngineConfig {
    /// Build the WebSocket URL for a session's detection channel
    pub fn channel_url(&self, session_id: &str) -> String {
        format!(
            "{}/ws/{}",
            self.detector_ws_url.trim_end_matches('/'),
            session_id
        )
    }
}
