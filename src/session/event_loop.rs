//! Per-session event loop
//!
//! One task per session multiplexes three event sources: the 1-second
//! elapsed-time tick, inbound detection results, and the single-flight
//! frame send timer. All handlers are short; the only awaited work is the
//! capture/encode/send of a frame and the network round trip itself.
//!
//! Single-flight discipline: at most one frame is outstanding. The next
//! send is armed only when the previous round trip has produced a result
//! (or a service-side error), plus the configured inter-frame delay. This
//! bounds queueing against a slow detection service to one round trip.

use crate::aggregator::Aggregator;
use crate::detector_channel::{DetectorSink, DetectorStream, InboundMessage};
use crate::error::{Error, Result};
use crate::frame_codec;
use crate::frame_source::FrameSource;
use crate::scoring::{score, ScoreBreakdown};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub(crate) struct EventLoopContext<S: FrameSource> {
    pub cancel: CancellationToken,
    pub source: S,
    pub sink: Option<DetectorSink>,
    pub stream: Option<DetectorStream>,
    pub aggregator: Arc<RwLock<Aggregator>>,
    pub live_score: Arc<RwLock<ScoreBreakdown>>,
    pub elapsed_secs: Arc<AtomicU64>,
    pub channel_lost: Arc<AtomicBool>,
    pub frame_interval: Duration,
    pub jpeg_quality: u8,
    pub max_frame_dimension: u32,
}

pub(crate) async fn run<S: FrameSource>(mut ctx: EventLoopContext<S>) {
    let mut ticker = interval_at(
        Instant::now() + Duration::from_secs(1),
        Duration::from_secs(1),
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Single-flight token: true while a frame round trip is outstanding
    let mut in_flight = false;
    // First send fires as soon as the channel is open
    let mut next_send = ctx.sink.as_ref().map(|_| Instant::now());

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,

            _ = ticker.tick() => {
                ctx.elapsed_secs.fetch_add(1, Ordering::Relaxed);
            }

            inbound = next_inbound(&mut ctx.stream) => {
                match inbound {
                    Some(Ok(InboundMessage::Update(update))) => {
                        // Score is refreshed under the aggregator lock so any
                        // observer seeing the new counters sees the new score
                        let mut aggregator = ctx.aggregator.write().await;
                        aggregator.apply(update);
                        let breakdown = score(aggregator.stats());
                        *ctx.live_score.write().await = breakdown;
                        drop(aggregator);

                        in_flight = false;
                        next_send = Some(Instant::now() + ctx.frame_interval);
                    }
                    Some(Ok(InboundMessage::ServiceError(message))) => {
                        tracing::warn!(error = %message, "Detection service rejected a frame");
                        // A service error still completes the round trip
                        in_flight = false;
                        next_send = Some(Instant::now() + ctx.frame_interval);
                    }
                    Some(Err(Error::ChannelClosed)) | None => {
                        tracing::info!("Detection channel lost; session continues degraded");
                        ctx.channel_lost.store(true, Ordering::Relaxed);
                        ctx.stream = None;
                        if let Some(mut sink) = ctx.sink.take() {
                            sink.close().await;
                        }
                        next_send = None;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Ignoring malformed channel message");
                        in_flight = false;
                        next_send = Some(Instant::now() + ctx.frame_interval);
                    }
                }
            }

            _ = send_gate(next_send, ctx.sink.is_some() && !in_flight) => {
                match ctx.source.capture().await {
                    Ok(Some(raw)) => {
                        match frame_codec::encode_jpeg(&raw, ctx.jpeg_quality, ctx.max_frame_dimension) {
                            Ok(jpeg) => {
                                let payload =
                                    frame_codec::to_payload(&jpeg, Utc::now().timestamp_millis());
                                let mut send_failed = false;
                                if let Some(sink) = ctx.sink.as_mut() {
                                    match sink.send_frame(&payload).await {
                                        Ok(()) => {
                                            in_flight = true;
                                            next_send = None;
                                        }
                                        Err(e) => {
                                            tracing::warn!(error = %e, "Frame send failed; detection channel lost");
                                            send_failed = true;
                                        }
                                    }
                                }
                                if send_failed {
                                    ctx.channel_lost.store(true, Ordering::Relaxed);
                                    ctx.stream = None;
                                    if let Some(mut sink) = ctx.sink.take() {
                                        sink.close().await;
                                    }
                                    next_send = None;
                                }
                            }
                            Err(e) => {
                                // Skip this frame; the loop stays alive
                                tracing::debug!(error = %e, "Frame encoding failed; skipping");
                                next_send = Some(Instant::now() + ctx.frame_interval);
                            }
                        }
                    }
                    Ok(None) => {
                        // Source not ready yet; retry on the next tick
                        next_send = Some(Instant::now() + ctx.frame_interval);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Frame capture failed; skipping");
                        next_send = Some(Instant::now() + ctx.frame_interval);
                    }
                }
            }
        }
    }

    if let Some(mut sink) = ctx.sink.take() {
        sink.close().await;
    }
}

async fn next_inbound(stream: &mut Option<DetectorStream>) -> Option<Result<InboundMessage>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn send_gate(at: Option<Instant>, armed: bool) {
    match at {
        Some(deadline) if armed => tokio::time::sleep_until(deadline).await,
        _ => std::future::pending().await,
    }
}
