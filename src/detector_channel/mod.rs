//! DetectorChannel - Detection Service Streaming Connection
//!
//! ## Responsibilities
//!
//! - Duplex WebSocket connection to the detection service, one per session
//! - Outbound frame payloads, inbound detection results
//! - Wire-format parsing with per-message error isolation
//!
//! The connection is split into independent send and receive halves so the
//! session loop can await inbound messages while sending frames. A single
//! malformed message is reported and skipped; only transport loss ends the
//! stream. Reconnection is never attempted: after a drop the session runs
//! on in degraded mode until it is explicitly ended.

use crate::aggregator::DetectionUpdate;
use crate::error::{Error, Result};
use crate::frame_codec::FramePayload;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Parsed inbound message
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Detection results for one frame round trip
    Update(DetectionUpdate),
    /// Error reported by the detection service for one frame
    ServiceError(String),
}

/// Raw wire shape of inbound messages
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireInbound {
    Error { error: String },
    Update(DetectionUpdate),
}

/// Sending half of a detection channel
pub struct DetectorSink {
    sink: SplitSink<WsStream, Message>,
}

/// Receiving half of a detection channel
pub struct DetectorStream {
    stream: SplitStream<WsStream>,
}

/// Open the detection channel for a session
pub async fn connect(url: &str) -> Result<(DetectorSink, DetectorStream)> {
    let (ws, _response) = connect_async(url).await?;
    tracing::info!(url = %url, "Detection channel connected");

    let (sink, stream) = ws.split();
    Ok((DetectorSink { sink }, DetectorStream { stream }))
}

impl DetectorSink {
    /// Send one encoded frame
    pub async fn send_frame(&mut self, payload: &FramePayload) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Close the sending half, flushing a close frame
    pub async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!(error = %e, "Detection channel close failed");
        }
    }
}

impl DetectorStream {
    /// Await the next inbound message
    ///
    /// Returns `None` once the channel is closed (locally or remotely).
    /// `Some(Err(..))` reports a malformed message (`ChannelError`) or the
    /// transport failing mid-read (`ChannelClosed`); after `ChannelClosed`
    /// the stream yields `None`.
    pub async fn next(&mut self) -> Option<Result<InboundMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(parse_inbound(&text)),
                Some(Ok(Message::Close(_))) => return None,
                // Binary frames and ping/pong are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Detection channel transport error");
                    return Some(Err(Error::ChannelClosed));
                }
                None => return None,
            }
        }
    }
}

fn parse_inbound(text: &str) -> Result<InboundMessage> {
    match serde_json::from_str::<WireInbound>(text) {
        Ok(WireInbound::Error { error }) => Ok(InboundMessage::ServiceError(error)),
        Ok(WireInbound::Update(update)) => Ok(InboundMessage::Update(update)),
        Err(e) => Err(Error::ChannelError(format!("unparseable message: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_message() {
        let text = r#"{
            "status": "success",
            "alerts": [{"type": "Looking Away", "details": "Direction: Left", "timestamp": 1700000000000}],
            "stats": {
                "total_frames_captured": 42,
                "looking_away_frames": 7,
                "mobile_detected_frames": 0,
                "multiple_people_frames": 0,
                "no_face_frames": 1
            },
            "integrity_score": 93
        }"#;

        match parse_inbound(text).unwrap() {
            InboundMessage::Update(update) => {
                assert_eq!(update.stats.total_frames_captured, 42);
                assert_eq!(update.alerts.len(), 1);
                assert_eq!(update.alerts[0].kind, "Looking Away");
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_update_without_alerts() {
        let text = r#"{"stats": {"total_frames_captured": 1}}"#;
        match parse_inbound(text).unwrap() {
            InboundMessage::Update(update) => assert!(update.alerts.is_empty()),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_message() {
        let text = r#"{"error": "Frame processing error", "timestamp": "2026-01-01T00:00:00"}"#;
        match parse_inbound(text).unwrap() {
            InboundMessage::ServiceError(message) => {
                assert_eq!(message, "Frame processing error")
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_message() {
        assert!(matches!(
            parse_inbound("not json"),
            Err(Error::ChannelError(_))
        ));
        // Valid JSON that matches neither wire shape is also a channel error
        assert!(matches!(
            parse_inbound(r#"{"unexpected": true}"#),
            Err(Error::ChannelError(_))
        ));
    }
}
